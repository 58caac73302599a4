//! Table, index and column structure metadata.
//!
//! These are fully-resolved, immutable value objects supplied by the metadata
//! collaborator (the engine catalog). The decoder only ever reads them; it is
//! handed a reference per decode call and never holds ambient state.

/// Storage-level data type of a column, as far as the decoder needs to
/// distinguish them. Fixed-width kinds decode from the fixed region; the
/// variable and LOB kinds from the variable-length offset array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Money,
    SmallMoney,
    Decimal,
    DateTime,
    SmallDateTime,
    UniqueIdentifier,
    Char,
    VarChar,
    NChar,
    NVarChar,
    Binary,
    VarBinary,
    Text,
    NText,
    Image,
    Variant,
}

impl DataKind {
    /// LOB kinds store an in-row pointer to off-row fragments rather than the
    /// value itself.
    pub fn is_lob(&self) -> bool {
        matches!(self, DataKind::Text | DataKind::NText | DataKind::Image)
    }
}

/// Whether a row set is a heap, the clustered index itself, or a separate
/// non-clustered index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Heap,
    Clustered,
    NonClustered,
}

/// Compression applied to a row set's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    #[default]
    None,
    Row,
    Page,
    Columnstore,
    ColumnstoreArchive,
}

/// One column of a table or index row layout.
///
/// `leaf_offset`/`node_offset` carry the wire format's sign convention
/// exactly: a non-negative value is a byte offset into the fixed-length
/// region; a negative value means the column lives in variable-length slot
/// `abs(offset) - 1`. The sign is load-bearing, not an accident.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStructure {
    pub column_id: i32,
    pub name: String,
    pub data_kind: DataKind,
    /// Declared byte length for fixed-width columns; maximum for variable.
    pub data_length: i16,
    pub precision: u8,
    pub scale: u8,
    pub leaf_offset: i16,
    pub node_offset: i16,
    /// 1-based index into the null bitmap; values below 1 mean the column is
    /// not represented in the bitmap.
    pub null_bit: i16,
    pub is_dropped: bool,
    pub is_uniqueifier: bool,
    pub is_sparse: bool,
    /// Key column of the owning row set's index.
    pub is_key: bool,
}

impl ColumnStructure {
    /// Variable-length slot index encoded by a negative offset, if any.
    pub fn variable_index(offset: i16) -> Option<usize> {
        if offset < 0 {
            Some(offset.unsigned_abs() as usize - 1)
        } else {
            None
        }
    }
}

/// A column as it participates in an index: the underlying column plus its
/// role within the index definition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumnStructure {
    pub column: ColumnStructure,
    pub index_column_id: i32,
    /// Declared key column of this index (as opposed to a carried-along
    /// clustered key or include column).
    pub is_index_key: bool,
    pub is_include: bool,
}

/// Row layout of a table's heap or clustered index, keyed by allocation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStructure {
    pub allocation_unit_id: i64,
    pub object_id: i32,
    pub index_id: i32,
    pub partition_id: i64,
    pub index_kind: IndexKind,
    pub compression: CompressionLevel,
    pub columns: Vec<ColumnStructure>,
}

impl TableStructure {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_sparse_columns(&self) -> bool {
        self.columns.iter().any(|c| c.is_sparse)
    }

    pub fn has_uniqueifier(&self) -> bool {
        self.columns.iter().any(|c| c.is_uniqueifier)
    }

    pub fn column_by_id(&self, column_id: i32) -> Option<&ColumnStructure> {
        self.columns.iter().find(|c| c.column_id == column_id)
    }
}

/// Row layout of an index's b-tree levels, keyed by allocation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStructure {
    pub allocation_unit_id: i64,
    pub object_id: i32,
    pub index_id: i32,
    pub index_kind: IndexKind,
    pub is_unique: bool,
    pub has_filter: bool,
    /// Structure of the underlying table, when the index sits on top of one.
    /// Its `index_kind` decides whether node records carry clustered keys or
    /// physical row identifiers.
    pub table: Option<TableStructure>,
    pub columns: Vec<IndexColumnStructure>,
}

impl IndexStructure {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_uniqueifier(&self) -> bool {
        self.columns.iter().any(|c| c.column.is_uniqueifier)
    }

    /// Index kind of the underlying table, `Heap` when no table structure
    /// was supplied.
    pub fn underlying_kind(&self) -> IndexKind {
        self.table
            .as_ref()
            .map(|t| t.index_kind)
            .unwrap_or(IndexKind::Heap)
    }
}

#[cfg(test)]
mod schema_tests {
    use super::*;

    #[test]
    fn negative_offset_encodes_variable_slot_index() {
        assert_eq!(ColumnStructure::variable_index(-1), Some(0));
        assert_eq!(ColumnStructure::variable_index(-3), Some(2));
        assert_eq!(ColumnStructure::variable_index(0), None);
        assert_eq!(ColumnStructure::variable_index(4), None);
    }

    #[test]
    fn lob_kinds() {
        assert!(DataKind::Text.is_lob());
        assert!(DataKind::Image.is_lob());
        assert!(!DataKind::VarBinary.is_lob());
    }
}
