//! Index record decoding.
//!
//! Index records take their fixed-length size from the page header rather
//! than carrying it themselves, and the set of columns a record stores
//! depends on its b-tree level and on how the index relates to its
//! underlying table. The decision table lives in [`select_columns`].

use tracing::{debug, trace};

use crate::address::{PageAddress, RowIdentifier};
use crate::error::{Error, Result};
use crate::mark::Marks;
use crate::page::Page;
use crate::records::fixed_var::{
    self, fixed_field, uniqueifier_field, variable_field, FixedVarParts,
};
use crate::records::{RecordField, RecordType};
use crate::schema::{IndexColumnStructure, IndexKind, IndexStructure};

/// Position of a record within the b-tree, derived from the page header
/// level. Level 1 always classifies as Root, so in trees of depth three or
/// more the first non-leaf level and the true root share a label. Observed
/// engine behavior, reproduced as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Leaf,
    Node,
    Root,
}

impl NodeType {
    pub fn from_level(level: u8) -> NodeType {
        match level {
            0 => NodeType::Leaf,
            1 => NodeType::Root,
            _ => NodeType::Node,
        }
    }
}

/// A decoded index record. Fields borrow the page buffer.
#[derive(Debug)]
pub struct IndexRecord<'a> {
    pub slot: usize,
    pub slot_offset: usize,
    pub node_type: NodeType,
    pub parts: FixedVarParts,
    /// Pointer to the next b-tree level down. Root and Node records only.
    pub down_page_pointer: Option<PageAddress>,
    /// Physical row location, present when the record stores an explicit
    /// row identifier (non-clustered index over a heap).
    pub row_identifier: Option<RowIdentifier>,
    pub fields: Vec<RecordField<'a>>,
    pub marks: Marks,
}

impl<'a> IndexRecord<'a> {
    pub fn record_type(&self) -> RecordType {
        self.parts.record_type
    }

    pub fn field(&self, name: &str) -> Option<&RecordField<'a>> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

/// Columns an index record stores, per node type and index shape.
///
/// Root and Node levels of a clustered index, and of a non-clustered index
/// over a clustered table, store only the key and uniqueifier columns. A
/// non-clustered index over a heap stores the full column set at the Node
/// level; at the Root level a unique index drops the carried-along
/// clustered keys and keeps only its declared key columns. Leaf records
/// always store the full declared set.
fn select_columns<'a>(
    structure: &'a IndexStructure,
    node_type: NodeType,
) -> Vec<&'a IndexColumnStructure> {
    let key_or_uniqueifier = |c: &&IndexColumnStructure| c.is_index_key || c.column.is_uniqueifier;

    match node_type {
        NodeType::Leaf => structure.columns.iter().collect(),
        NodeType::Node => {
            if structure.index_kind == IndexKind::Clustered
                || structure.underlying_kind() == IndexKind::Clustered
            {
                structure.columns.iter().filter(key_or_uniqueifier).collect()
            } else {
                structure.columns.iter().collect()
            }
        }
        NodeType::Root => {
            if structure.index_kind == IndexKind::Clustered
                || (structure.underlying_kind() == IndexKind::Clustered && !structure.is_unique)
            {
                structure.columns.iter().filter(key_or_uniqueifier).collect()
            } else {
                structure.columns.iter().filter(|c| c.is_index_key).collect()
            }
        }
    }
}

/// Whether this record actually carries a uniqueifier value, which shifts
/// null-bitmap indexing: the schema must declare one and the record must
/// have a variable-length slot for it.
fn record_has_uniqueifier(
    structure: &IndexStructure,
    node_type: NodeType,
    parts: &FixedVarParts,
) -> bool {
    structure.columns.iter().any(|c| {
        if !c.column.is_uniqueifier {
            return false;
        }
        let offset = match node_type {
            NodeType::Leaf => c.column.leaf_offset,
            _ => c.column.node_offset,
        };
        match crate::schema::ColumnStructure::variable_index(offset) {
            Some(index) => index < parts.variable_length_column_count,
            None => false,
        }
    })
}

/// Decode the index record in `slot` against the supplied index structure.
pub fn load_index_record<'a>(
    page: &'a Page,
    slot: usize,
    structure: &'a IndexStructure,
) -> Result<IndexRecord<'a>> {
    let slot_offset = page
        .slot_offset(slot)
        .ok_or_else(|| Error::malformed(0, format!("slot {slot} not in page")))?
        as usize;

    let fixed_length_size = page.header().fixed_length_size as usize;
    let node_type = NodeType::from_level(page.header().level);

    debug!(
        slot,
        slot_offset,
        ?node_type,
        level = page.header().level,
        "loading index record"
    );

    let mut marks = Marks::new();
    let mut parts = FixedVarParts::parse(page.data(), slot_offset, fixed_length_size, &mut marks)?;
    parts.has_uniqueifier = record_has_uniqueifier(structure, node_type, &parts);

    let mut record = IndexRecord {
        slot,
        slot_offset,
        node_type,
        parts,
        down_page_pointer: None,
        row_identifier: None,
        fields: Vec::new(),
        marks,
    };

    if matches!(node_type, NodeType::Root | NodeType::Node) {
        load_down_page_pointer(&mut record, page, fixed_length_size)?;
    }

    let columns = select_columns(structure, node_type);
    trace!(count = columns.len(), "column set selected");

    for column in columns {
        let field = load_column(&mut record, page, column, node_type, fixed_length_size)?;
        record.fields.push(field);
    }

    Ok(record)
}

/// The down-page pointer occupies the last 6 bytes of the fixed region.
fn load_down_page_pointer(
    record: &mut IndexRecord<'_>,
    page: &Page,
    fixed_length_size: usize,
) -> Result<()> {
    let offset = (record.slot_offset + fixed_length_size)
        .checked_sub(PageAddress::SIZE)
        .ok_or_else(|| {
            Error::malformed(
                record.slot_offset,
                format!("fixed region of {fixed_length_size} bytes cannot hold a down-page pointer"),
            )
        })?;
    let pointer = PageAddress::parse(page.data(), offset, "down page pointer")?;
    record.marks.push("down page pointer", offset, PageAddress::SIZE);
    record.down_page_pointer = Some(pointer);
    Ok(())
}

fn load_column<'a>(
    record: &mut IndexRecord<'a>,
    page: &'a Page,
    column: &'a IndexColumnStructure,
    node_type: NodeType,
    fixed_length_size: usize,
) -> Result<RecordField<'a>> {
    let declared_offset = match node_type {
        NodeType::Leaf => column.column.leaf_offset,
        _ => column.column.node_offset,
    };

    if record.parts.has_null_bitmap && record.parts.is_null(&column.column) {
        return Ok(RecordField::absent(&column.column));
    }

    // The first slot of a Root/Node page is the infimum sentinel: all key
    // values are null regardless of the encoded bytes.
    if matches!(node_type, NodeType::Root | NodeType::Node) && record.slot == 0 {
        return Ok(RecordField::absent(&column.column));
    }

    if declared_offset >= 0 {
        // The row-identifier check applies at the Leaf and Node levels only;
        // a Root record stores the same bytes as a plain fixed field.
        let is_rid = match node_type {
            NodeType::Leaf => fixed_var::is_row_identifier(&column.column, true, fixed_length_size),
            NodeType::Node => {
                fixed_var::is_row_identifier(&column.column, false, fixed_length_size)
            }
            NodeType::Root => false,
        };

        if is_rid {
            let offset = record.slot_offset + declared_offset as usize;
            record.row_identifier = Some(RowIdentifier::parse(
                page.data(),
                offset,
                "row identifier",
            )?);
            record
                .marks
                .push("row identifier", offset, RowIdentifier::SIZE);
            return Ok(RecordField::absent(&column.column));
        }

        return fixed_field(
            page.data(),
            &column.column,
            &record.parts,
            declared_offset as usize,
            &mut record.marks,
        );
    }

    if column.column.is_uniqueifier {
        return uniqueifier_field(
            page.data(),
            &column.column,
            &record.parts,
            declared_offset,
            &mut record.marks,
        );
    }

    if record.parts.has_variable_length_columns {
        return variable_field(
            page.data(),
            &column.column,
            &record.parts,
            declared_offset,
            &mut record.marks,
        );
    }

    Ok(RecordField::absent(&column.column))
}
