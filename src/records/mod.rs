//! Record decoding: the structures stored in page slots.
//!
//! All fixed/var records share one family of primitives (status bits, null
//! bitmap, variable-length offset array) in [`fixed_var`]; the data, index
//! and compressed variants diverge in control flow on top of them.

pub mod blob;
pub mod compressed;
pub mod data;
pub mod fixed_var;
pub mod index;
pub mod sparse;

pub use blob::{load_lob_pointer, BlobChildLink, LobPointer, OverflowField, RootField};
pub use compressed::{
    load_compressed_record, load_compression_info, CompressedDataRecord, CompressionInfo,
    Dictionary, CI_SLOT_OFFSET,
};
pub use data::{load_data_record, DataRecord};
pub use fixed_var::FixedVarParts;
pub use index::{load_index_record, IndexRecord, NodeType};
pub use sparse::{load_sparse_vector, SparseVector, SparseVectorKind};

use crate::schema::ColumnStructure;

/// Record type, bits 1-3 of status bits A. Three bits, so the set is closed;
/// every pattern has a meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Primary,
    Forwarded,
    /// Forwarding stub left behind when a heap row moves to another page.
    Forwarding,
    Index,
    /// Off-row BLOB fragment.
    Blob,
    GhostIndex,
    GhostData,
    GhostVersion,
}

impl RecordType {
    pub fn from_bits(bits: u8) -> RecordType {
        match bits & 0x07 {
            0 => RecordType::Primary,
            1 => RecordType::Forwarded,
            2 => RecordType::Forwarding,
            3 => RecordType::Index,
            4 => RecordType::Blob,
            5 => RecordType::GhostIndex,
            6 => RecordType::GhostData,
            _ => RecordType::GhostVersion,
        }
    }

    pub fn is_ghost(&self) -> bool {
        matches!(
            self,
            RecordType::GhostIndex | RecordType::GhostData | RecordType::GhostVersion
        )
    }
}

/// One decoded column value within a record.
///
/// The field borrows its bytes from the page buffer; it never copies. An
/// absent value (null, missing uniqueifier slot, sparse column not stored)
/// is a zero-length field.
#[derive(Debug, Clone)]
pub struct RecordField<'a> {
    pub column: &'a ColumnStructure,
    pub data: &'a [u8],
    /// Byte offset relative to the record start.
    pub offset: usize,
    pub length: usize,
    pub is_sparse: bool,
    /// Variable-length slot index, for fields resolved through the offset
    /// array.
    pub variable_index: Option<usize>,
    /// Decoded LOB pointer, when this field stores an off-row reference
    /// rather than the value itself.
    pub lob: Option<LobPointer>,
}

impl<'a> RecordField<'a> {
    /// An absent value: null, or a slot the record simply does not carry.
    pub fn absent(column: &'a ColumnStructure) -> RecordField<'a> {
        RecordField {
            column,
            data: &[],
            offset: 0,
            length: 0,
            is_sparse: false,
            variable_index: None,
            lob: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.column.name
    }

    pub fn is_absent(&self) -> bool {
        self.length == 0
    }
}

#[cfg(test)]
mod record_type_tests {
    use super::*;

    #[test]
    fn three_bit_tag_covers_every_variant() {
        assert_eq!(RecordType::from_bits(0), RecordType::Primary);
        assert_eq!(RecordType::from_bits(1), RecordType::Forwarded);
        assert_eq!(RecordType::from_bits(2), RecordType::Forwarding);
        assert_eq!(RecordType::from_bits(3), RecordType::Index);
        assert_eq!(RecordType::from_bits(4), RecordType::Blob);
        assert_eq!(RecordType::from_bits(5), RecordType::GhostIndex);
        assert_eq!(RecordType::from_bits(6), RecordType::GhostData);
        assert_eq!(RecordType::from_bits(7), RecordType::GhostVersion);
    }

    #[test]
    fn ghost_variants() {
        assert!(RecordType::GhostData.is_ghost());
        assert!(!RecordType::Primary.is_ghost());
    }
}
