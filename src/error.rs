use crate::page::PageType;

/// Errors surfaced while decoding page structures.
///
/// Absent-but-valid conditions (missing uniqueifier slot, sparse column not
/// stored, variable-length index past the end of the offset array) are not
/// errors; they resolve to zero-length fields at the decode site.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The buffer is too short for the structure being decoded. Always a
    /// caller error: pages are exactly 8,192 bytes on disk.
    #[error("buffer too short decoding {context}: need {expected} bytes at offset {offset}, have {actual}")]
    Truncated {
        context: &'static str,
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// A length or count field inside the page disagrees with the bytes that
    /// are actually there.
    #[error("malformed page data at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    /// A decode referenced metadata the caller did not supply, e.g. a sparse
    /// column id with no matching column in the table structure.
    #[error("{kind} {key} not found in supplied metadata")]
    SchemaMismatch { kind: &'static str, key: i64 },

    /// The page type is not one of the database-wide allocation bitmap kinds
    /// (GAM/SGAM/DCM/BCM), so no well-known first page exists for it.
    #[error("page type {0:?} is not a database allocation bitmap")]
    NotAllocationKind(PageType),

    #[error("i/o error reading page: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
