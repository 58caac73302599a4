//! Heap and clustered-index data record decoding.
//!
//! Unlike index records, data records are self-describing: the fixed-length
//! size is the u16 at slot offset + 2 rather than the page header's pminlen.
//! Forwarding records are a stub (status byte plus the row identifier the
//! row moved to) and carry no fields at all.

use tracing::debug;

use crate::address::RowIdentifier;
use crate::bytes;
use crate::error::{Error, Result};
use crate::mark::Marks;
use crate::page::Page;
use crate::records::blob::load_lob_pointer;
use crate::records::fixed_var::{fixed_field, uniqueifier_field, variable_field, FixedVarParts};
use crate::records::sparse::{load_sparse_vector, SparseVector};
use crate::records::{RecordField, RecordType};
use crate::schema::{ColumnStructure, TableStructure};

/// A decoded data record. Fields borrow the page buffer.
#[derive(Debug)]
pub struct DataRecord<'a> {
    pub slot: usize,
    pub slot_offset: usize,
    pub status_b: u8,
    pub parts: FixedVarParts,
    /// Where the row moved to, for forwarding stubs.
    pub forwarding_stub: Option<RowIdentifier>,
    pub sparse_vector: Option<SparseVector<'a>>,
    pub fields: Vec<RecordField<'a>>,
    pub marks: Marks,
}

impl<'a> DataRecord<'a> {
    pub fn record_type(&self) -> RecordType {
        self.parts.record_type
    }

    pub fn field(&self, name: &str) -> Option<&RecordField<'a>> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

/// Decode the data record in `slot` against the supplied table structure.
pub fn load_data_record<'a>(
    page: &'a Page,
    slot: usize,
    structure: &'a TableStructure,
) -> Result<DataRecord<'a>> {
    let slot_offset = page
        .slot_offset(slot)
        .ok_or_else(|| Error::malformed(0, format!("slot {slot} not in page")))?
        as usize;

    let status_a = bytes::u8_at(page.data(), slot_offset, "status bits a")?;
    let record_type = RecordType::from_bits(status_a >> 1);

    debug!(slot, slot_offset, ?record_type, "loading data record");

    let mut marks = Marks::new();

    if record_type == RecordType::Forwarding {
        return load_forwarding_stub(page, slot, slot_offset, status_a, marks);
    }

    let status_b = bytes::u8_at(page.data(), slot_offset + 1, "status bits b")?;
    let fixed_length_size =
        bytes::u16_at(page.data(), slot_offset + 2, "fixed length size")? as usize;

    let mut parts = FixedVarParts::parse(page.data(), slot_offset, fixed_length_size, &mut marks)?;
    marks.push("status bits b", slot_offset + 1, 1);
    marks.push("fixed length size", slot_offset + 2, 2);

    parts.has_uniqueifier = record_has_uniqueifier(structure, &parts);

    let mut record = DataRecord {
        slot,
        slot_offset,
        status_b,
        parts,
        forwarding_stub: None,
        sparse_vector: None,
        fields: Vec::new(),
        marks,
    };

    for column in &structure.columns {
        // Dropped columns keep their metadata but no longer resolve;
        // sparse columns live in the sparse vector, decoded below.
        if column.is_dropped || column.is_sparse {
            continue;
        }
        let field = load_column(&mut record, page, column)?;
        record.fields.push(field);
    }

    if structure.has_sparse_columns()
        && record.parts.has_variable_length_columns
        && record.parts.variable_length_column_count > 0
    {
        load_sparse_fields(&mut record, page, structure)?;
    }

    Ok(record)
}

fn load_forwarding_stub<'a>(
    page: &'a Page,
    slot: usize,
    slot_offset: usize,
    status_a: u8,
    mut marks: Marks,
) -> Result<DataRecord<'a>> {
    marks.push("status bits a", slot_offset, 1);

    let stub = RowIdentifier::parse(page.data(), slot_offset + 1, "forwarding stub")?;
    marks.push("forwarding stub", slot_offset + 1, RowIdentifier::SIZE);

    Ok(DataRecord {
        slot,
        slot_offset,
        status_b: 0,
        parts: FixedVarParts {
            slot_offset,
            fixed_length_size: 0,
            status_a,
            record_type: RecordType::Forwarding,
            has_null_bitmap: false,
            has_variable_length_columns: false,
            has_uniqueifier: false,
            column_count: 0,
            null_bitmap: Vec::new(),
            variable_length_column_count: 0,
            offset_array: Vec::new(),
            variable_length_data_offset: 0,
        },
        forwarding_stub: Some(stub),
        sparse_vector: None,
        fields: Vec::new(),
        marks,
    })
}

/// Whether the record actually stores a uniqueifier value: the schema must
/// declare one and the record must have a variable-length slot for it.
fn record_has_uniqueifier(structure: &TableStructure, parts: &FixedVarParts) -> bool {
    structure.columns.iter().any(|c| {
        c.is_uniqueifier
            && match ColumnStructure::variable_index(c.leaf_offset) {
                Some(index) => index < parts.variable_length_column_count,
                None => false,
            }
    })
}

fn load_column<'a>(
    record: &mut DataRecord<'a>,
    page: &'a Page,
    column: &'a ColumnStructure,
) -> Result<RecordField<'a>> {
    if record.parts.has_null_bitmap && record.parts.is_null(column) {
        return Ok(RecordField::absent(column));
    }

    if column.leaf_offset >= 0 {
        return fixed_field(
            page.data(),
            column,
            &record.parts,
            column.leaf_offset as usize,
            &mut record.marks,
        );
    }

    if column.is_uniqueifier {
        return uniqueifier_field(
            page.data(),
            column,
            &record.parts,
            column.leaf_offset,
            &mut record.marks,
        );
    }

    if record.parts.has_variable_length_columns {
        let mut field = variable_field(
            page.data(),
            column,
            &record.parts,
            column.leaf_offset,
            &mut record.marks,
        )?;

        // A set complex bit means the slot stores a pointer to off-row
        // data, not the value itself.
        let is_complex = field
            .variable_index
            .and_then(|index| record.parts.variable_entry(index))
            .is_some_and(|(_, complex)| complex);

        if is_complex && field.length > 0 {
            let absolute = record.slot_offset + field.offset;
            field.lob = Some(load_lob_pointer(field.data, absolute, &mut record.marks)?);
        }

        return Ok(field);
    }

    Ok(RecordField::absent(column))
}

/// The sparse vector occupies the record's last variable-length slot.
fn load_sparse_fields<'a>(
    record: &mut DataRecord<'a>,
    page: &'a Page,
    structure: &'a TableStructure,
) -> Result<()> {
    let index = record.parts.variable_length_column_count - 1;
    let (start, end) = record.parts.variable_range(index);
    if end < start {
        return Err(Error::malformed(
            record.slot_offset + start,
            format!("sparse vector end offset {end} precedes start {start}"),
        ));
    }

    let data = bytes::slice_at(
        page.data(),
        record.slot_offset + start,
        end - start,
        "sparse vector",
    )?;

    let vector = load_sparse_vector(data, record.slot_offset + start, structure, &mut record.marks)?;
    record.fields.extend(vector.fields.iter().cloned());
    record.sparse_vector = Some(vector);

    Ok(())
}
