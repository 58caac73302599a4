//! The record decoder core: primitives shared by every fixed/var record
//! variant.
//!
//! Decoding always runs in the same order: status bits A, null bitmap,
//! variable-length offset array, then per-column field resolution. The data,
//! index and compressed decoders differ only in where the fixed-length size
//! comes from and which columns they resolve.

use tracing::trace;

use crate::bytes::{self, BitVector};
use crate::error::{Error, Result};
use crate::mark::Marks;
use crate::records::{RecordField, RecordType};
use crate::schema::{ColumnStructure, DataKind};

/// The complex-column flag on a variable-length offset array entry. A set
/// top bit means the slot holds a sparse vector or LOB pointer rather than a
/// plain value; the remaining 15 bits are the end offset.
const COMPLEX_COLUMN_BIT: u16 = 0x8000;

/// Shared prelude of every fixed/var record: status bits, null bitmap and
/// the variable-length column offset array. All offsets inside are relative
/// to the record start (the slot offset).
#[derive(Debug, Clone)]
pub struct FixedVarParts {
    pub slot_offset: usize,
    /// Size of the fixed-length portion; the column count sits immediately
    /// after it.
    pub fixed_length_size: usize,
    pub status_a: u8,
    pub record_type: RecordType,
    pub has_null_bitmap: bool,
    pub has_variable_length_columns: bool,
    /// Whether this record carries a uniqueifier value. Set by the variant
    /// loader once it has seen the schema; shifts null-bitmap indexing.
    pub has_uniqueifier: bool,
    pub column_count: i16,
    pub null_bitmap: Vec<u8>,
    pub variable_length_column_count: usize,
    /// Raw end-offset entries, complex bit included.
    pub offset_array: Vec<u16>,
    /// First byte of variable-length data, relative to the record start.
    pub variable_length_data_offset: usize,
}

impl FixedVarParts {
    /// Decode the shared prelude of a record at `slot_offset`.
    pub fn parse(
        data: &[u8],
        slot_offset: usize,
        fixed_length_size: usize,
        marks: &mut Marks,
    ) -> Result<FixedVarParts> {
        let status_a = bytes::u8_at(data, slot_offset, "status bits a")?;
        marks.push("status bits a", slot_offset, 1);

        let record_type = RecordType::from_bits(status_a >> 1);
        let has_null_bitmap = bytes::bit(status_a, 4);
        let has_variable_length_columns = bytes::bit(status_a, 5);

        trace!(
            slot_offset,
            ?record_type,
            has_null_bitmap,
            has_variable_length_columns,
            "status bits a"
        );

        let mut column_count = 0i16;
        let mut null_bitmap = Vec::new();

        if has_null_bitmap {
            let count_offset = slot_offset + fixed_length_size;
            column_count = bytes::i16_at(data, count_offset, "column count")?;
            marks.push("column count", count_offset, 2);

            if column_count < 0 {
                return Err(Error::malformed(
                    count_offset,
                    format!("negative column count {column_count}"),
                ));
            }

            let bitmap_size = (column_count as usize).div_ceil(8);
            null_bitmap = bytes::slice_at(data, count_offset + 2, bitmap_size, "null bitmap")?
                .to_vec();
            marks.push("null bitmap", count_offset + 2, bitmap_size);
        }

        // Bytes between the end of the fixed region and the variable column
        // count: the column count and null bitmap, when present.
        let variable_start_index = if has_null_bitmap {
            2 + null_bitmap.len()
        } else {
            0
        };

        let mut variable_length_column_count = 0usize;
        let mut offset_array = Vec::new();
        let mut variable_length_data_offset = 0usize;

        if has_variable_length_columns {
            let count_offset = slot_offset + fixed_length_size + variable_start_index;
            variable_length_column_count =
                bytes::u16_at(data, count_offset, "variable length column count")? as usize;
            marks.push("variable length column count", count_offset, 2);

            offset_array.reserve(variable_length_column_count);
            for index in 0..variable_length_column_count {
                offset_array.push(bytes::u16_at(
                    data,
                    count_offset + 2 + index * 2,
                    "column offset array",
                )?);
            }
            marks.push(
                "column offset array",
                count_offset + 2,
                variable_length_column_count * 2,
            );

            variable_length_data_offset = fixed_length_size
                + 2
                + variable_start_index
                + 2 * variable_length_column_count;
        }

        Ok(FixedVarParts {
            slot_offset,
            fixed_length_size,
            status_a,
            record_type,
            has_null_bitmap,
            has_variable_length_columns,
            has_uniqueifier: false,
            column_count,
            null_bitmap,
            variable_length_column_count,
            offset_array,
            variable_length_data_offset,
        })
    }

    /// Whether the null bitmap marks `column` null.
    ///
    /// Source-faithful indexing rule: the declared null bit is adjusted down
    /// by one when the record carries a uniqueifier; without one, the
    /// declared value is used as-is. Declared values below 1 mean the column
    /// has no bitmap presence at all.
    pub fn is_null(&self, column: &ColumnStructure) -> bool {
        if !self.has_null_bitmap || column.null_bit < 1 {
            return false;
        }
        let index = if self.has_uniqueifier {
            column.null_bit as usize - 1
        } else {
            column.null_bit as usize
        };
        BitVector::new(&self.null_bitmap).get(index)
    }

    /// End offset and complex flag for variable-length slot `index`, or
    /// `None` past the end of the offset array.
    pub fn variable_entry(&self, index: usize) -> Option<(u16, bool)> {
        self.offset_array
            .get(index)
            .map(|&raw| (raw & !COMPLEX_COLUMN_BIT, raw & COMPLEX_COLUMN_BIT != 0))
    }

    /// Start/end byte range of variable-length slot `index`, relative to the
    /// record start. A slot past the end of the offset array resolves to an
    /// empty range (absent, not an error).
    pub fn variable_range(&self, index: usize) -> (usize, usize) {
        let start = if index == 0 {
            self.variable_length_data_offset
        } else {
            match self.variable_entry(index - 1) {
                Some((end, _)) => end as usize,
                None => self.variable_length_data_offset,
            }
        };
        match self.variable_entry(index) {
            Some((end, _)) => (start, end as usize),
            None => (start, start),
        }
    }
}

/// Structural heuristic for a physical row-identifier column: raw binary,
/// exactly 8 bytes, placed at the tail position of the fixed region (which
/// differs between leaf and node levels).
pub fn is_row_identifier(column: &ColumnStructure, leaf: bool, fixed_length_size: usize) -> bool {
    if column.data_kind != DataKind::Binary || column.data_length != 8 {
        return false;
    }
    let expected = if leaf {
        fixed_length_size as i64 - 8
    } else {
        fixed_length_size as i64 - 14
    };
    let declared = if leaf {
        column.leaf_offset as i64
    } else {
        column.node_offset as i64
    };
    declared == expected
}

/// A fixed-length field at a declared offset within the fixed region.
pub fn fixed_field<'a>(
    data: &'a [u8],
    column: &'a ColumnStructure,
    parts: &FixedVarParts,
    offset: usize,
    marks: &mut Marks,
) -> Result<RecordField<'a>> {
    let length = column.data_length.max(0) as usize;
    let absolute = parts.slot_offset + offset;
    let slice = bytes::slice_at(data, absolute, length, "fixed length field")?;
    marks.push(&column.name, absolute, length);

    Ok(RecordField {
        column,
        data: slice,
        offset,
        length,
        is_sparse: false,
        variable_index: None,
        lob: None,
    })
}

/// A variable-length field resolved through the offset array. A slot index
/// past the array bounds yields a zero-length field.
pub fn variable_field<'a>(
    data: &'a [u8],
    column: &'a ColumnStructure,
    parts: &FixedVarParts,
    declared_offset: i16,
    marks: &mut Marks,
) -> Result<RecordField<'a>> {
    let variable_index = match ColumnStructure::variable_index(declared_offset) {
        Some(index) => index,
        None => return Ok(RecordField::absent(column)),
    };

    let (start, end) = parts.variable_range(variable_index);
    if end < start {
        return Err(Error::malformed(
            parts.slot_offset + start,
            format!(
                "variable column {} end offset {end} precedes start {start}",
                column.name
            ),
        ));
    }

    let length = end - start;
    let absolute = parts.slot_offset + start;
    let slice = bytes::slice_at(data, absolute, length, "variable length field")?;
    marks.push(&column.name, absolute, length);

    Ok(RecordField {
        column,
        data: slice,
        offset: start,
        length,
        is_sparse: false,
        variable_index: Some(variable_index),
        lob: None,
    })
}

/// The uniqueifier occupies a variable-length slot but is always exactly
/// four bytes when stored. A missing slot decodes as zero, never an error.
pub fn uniqueifier_field<'a>(
    data: &'a [u8],
    column: &'a ColumnStructure,
    parts: &FixedVarParts,
    declared_offset: i16,
    marks: &mut Marks,
) -> Result<RecordField<'a>> {
    let variable_index = match ColumnStructure::variable_index(declared_offset) {
        Some(index) => index,
        None => return Ok(RecordField::absent(column)),
    };

    if variable_index >= parts.variable_length_column_count {
        return Ok(RecordField::absent(column));
    }

    let (start, _) = parts.variable_range(variable_index);
    let length = 4;
    let absolute = parts.slot_offset + start;
    let slice = bytes::slice_at(data, absolute, length, "uniqueifier")?;
    marks.push("uniqueifier", absolute, length);

    Ok(RecordField {
        column,
        data: slice,
        offset: start,
        length,
        is_sparse: false,
        variable_index: Some(variable_index),
        lob: None,
    })
}
