//! Sparse column vector decoding.
//!
//! Tables with sparse columns pack the stored ones into a "complex vector"
//! region referenced from a variable-length slot of the parent record:
//! a discriminator, a count, parallel column-id and end-offset arrays, then
//! the data blocks back to back.

use tracing::trace;

use crate::bytes;
use crate::error::{Error, Result};
use crate::mark::Marks;
use crate::records::RecordField;
use crate::schema::TableStructure;

const COLUMN_COUNT_OFFSET: usize = 2;
const COLUMNS_OFFSET: usize = 4;

/// In-row sparse vectors carry discriminator 5. Anything else decodes as
/// `Unknown` with no fields rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseVectorKind {
    InRow,
    Unknown(i16),
}

impl SparseVectorKind {
    fn from_header(header: i16) -> SparseVectorKind {
        match header {
            5 => SparseVectorKind::InRow,
            other => SparseVectorKind::Unknown(other),
        }
    }
}

/// A decoded sparse vector. The fields it contributes are appended to the
/// parent record's field list by the data record loader.
#[derive(Debug)]
pub struct SparseVector<'a> {
    pub kind: SparseVectorKind,
    pub column_count: i16,
    pub column_ids: Vec<u16>,
    pub end_offsets: Vec<u16>,
    pub fields: Vec<RecordField<'a>>,
}

/// Decode a sparse vector from its sub-region of the record.
///
/// `data` is the vector's bytes; `vector_offset` is its absolute position
/// in the page, used for provenance marks. Column ids resolve against the
/// table structure; an id the schema does not know is a
/// [`Error::SchemaMismatch`].
pub fn load_sparse_vector<'a>(
    data: &'a [u8],
    vector_offset: usize,
    structure: &'a TableStructure,
    marks: &mut Marks,
) -> Result<SparseVector<'a>> {
    let header = bytes::i16_at(data, 0, "sparse vector header")?;
    marks.push("complex header", vector_offset, 2);

    let kind = SparseVectorKind::from_header(header);

    if kind != SparseVectorKind::InRow {
        trace!(header, "unrecognized complex header");
        return Ok(SparseVector {
            kind,
            column_count: 0,
            column_ids: Vec::new(),
            end_offsets: Vec::new(),
            fields: Vec::new(),
        });
    }

    let column_count = bytes::i16_at(data, COLUMN_COUNT_OFFSET, "sparse column count")?;
    marks.push("sparse column count", vector_offset + COLUMN_COUNT_OFFSET, 2);

    if column_count < 0 {
        return Err(Error::malformed(
            vector_offset + COLUMN_COUNT_OFFSET,
            format!("negative sparse column count {column_count}"),
        ));
    }

    let count = column_count as usize;
    let mut column_ids = Vec::with_capacity(count);
    let mut end_offsets = Vec::with_capacity(count);

    for index in 0..count {
        column_ids.push(bytes::u16_at(
            data,
            COLUMNS_OFFSET + index * 2,
            "sparse column ids",
        )?);
        end_offsets.push(bytes::u16_at(
            data,
            COLUMNS_OFFSET + count * 2 + index * 2,
            "sparse column offsets",
        )?);
    }
    marks.push("sparse column ids", vector_offset + COLUMNS_OFFSET, count * 2);
    marks.push(
        "sparse column offsets",
        vector_offset + COLUMNS_OFFSET + count * 2,
        count * 2,
    );

    // Data blocks run back to back after the two arrays; each end offset is
    // relative to the vector start.
    let mut previous_end = COLUMNS_OFFSET + count * 4;
    let mut fields = Vec::with_capacity(count);

    for index in 0..count {
        let end = end_offsets[index] as usize;
        if end < previous_end || end > data.len() {
            return Err(Error::malformed(
                vector_offset + previous_end,
                format!("sparse block {index} end offset {end} out of range"),
            ));
        }

        let column_id = column_ids[index] as i32;
        let column = structure
            .column_by_id(column_id)
            .ok_or(Error::SchemaMismatch {
                kind: "sparse column",
                key: column_id as i64,
            })?;

        let length = end - previous_end;
        marks.push(&column.name, vector_offset + previous_end, length);

        fields.push(RecordField {
            column,
            data: &data[previous_end..end],
            offset: previous_end,
            length,
            is_sparse: true,
            variable_index: None,
            lob: None,
        });

        previous_end = end;
    }

    Ok(SparseVector {
        kind,
        column_count,
        column_ids,
        end_offsets,
        fields,
    })
}

#[cfg(test)]
mod sparse_vector_tests {
    use super::*;
    use crate::schema::{ColumnStructure, DataKind, IndexKind, TableStructure};

    fn sparse_column(column_id: i32, name: &str) -> ColumnStructure {
        ColumnStructure {
            column_id,
            name: name.to_string(),
            data_kind: DataKind::Int,
            data_length: 4,
            precision: 0,
            scale: 0,
            leaf_offset: 0,
            node_offset: 0,
            null_bit: 0,
            is_dropped: false,
            is_uniqueifier: false,
            is_sparse: true,
            is_key: false,
        }
    }

    fn table(columns: Vec<ColumnStructure>) -> TableStructure {
        TableStructure {
            allocation_unit_id: 1,
            object_id: 100,
            index_id: 0,
            partition_id: 1,
            index_kind: IndexKind::Heap,
            compression: Default::default(),
            columns,
        }
    }

    /// Vector with two stored sparse columns: id 5 (4 bytes) and id 7
    /// (2 bytes).
    fn two_column_vector() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&5i16.to_le_bytes()); // in-row discriminator
        data.extend_from_slice(&2i16.to_le_bytes()); // column count
        data.extend_from_slice(&5u16.to_le_bytes()); // ids
        data.extend_from_slice(&7u16.to_le_bytes());
        // Blocks start at 4 + 4*2 = 12; end offsets are vector-relative.
        data.extend_from_slice(&16u16.to_le_bytes());
        data.extend_from_slice(&18u16.to_le_bytes());
        data.extend_from_slice(&99i32.to_le_bytes()); // column 5 value
        data.extend_from_slice(&7i16.to_le_bytes()); // column 7 value
        data
    }

    #[test]
    fn decodes_ids_and_lengths() {
        let structure = table(vec![sparse_column(5, "s1"), sparse_column(7, "s2")]);
        let data = two_column_vector();
        let mut marks = Marks::new();
        let vector = load_sparse_vector(&data, 200, &structure, &mut marks).unwrap();

        assert_eq!(vector.kind, SparseVectorKind::InRow);
        assert_eq!(vector.column_ids, vec![5, 7]);
        assert_eq!(vector.end_offsets, vec![16, 18]);
        assert_eq!(vector.fields.len(), 2);
        assert_eq!(vector.fields[0].data, &99i32.to_le_bytes());
        assert_eq!(vector.fields[1].data, &7i16.to_le_bytes());
        assert!(vector.fields.iter().all(|f| f.is_sparse));
    }

    #[test]
    fn unknown_discriminator_yields_no_fields() {
        let structure = table(vec![sparse_column(5, "s1")]);
        let data = 9i16.to_le_bytes().to_vec();
        let mut marks = Marks::new();
        let vector = load_sparse_vector(&data, 0, &structure, &mut marks).unwrap();

        assert_eq!(vector.kind, SparseVectorKind::Unknown(9));
        assert!(vector.fields.is_empty());
    }

    #[test]
    fn unknown_column_id_is_schema_mismatch() {
        let structure = table(vec![sparse_column(5, "s1")]);
        let data = two_column_vector();
        let mut marks = Marks::new();
        assert!(matches!(
            load_sparse_vector(&data, 0, &structure, &mut marks),
            Err(Error::SchemaMismatch {
                kind: "sparse column",
                key: 7
            })
        ));
    }

    #[test]
    fn end_offset_before_block_start_is_malformed() {
        let structure = table(vec![sparse_column(5, "s1")]);
        let mut data = Vec::new();
        data.extend_from_slice(&5i16.to_le_bytes());
        data.extend_from_slice(&1i16.to_le_bytes());
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes()); // end before 4 + 4
        let mut marks = Marks::new();
        assert!(matches!(
            load_sparse_vector(&data, 0, &structure, &mut marks),
            Err(Error::Malformed { .. })
        ));
    }
}
