//! Decoding for the physical on-disk page format of SQL Server data files:
//! fixed 8,192-byte pages holding headers, allocation bitmaps and row
//! records (heap, index, compressed, sparse and LOB variants).
//!
//! The crate is a pure decoding core. Every operation takes an immutable
//! page buffer plus immutable schema metadata and produces structured
//! values; records borrow the page buffer rather than copying it. Page
//! fetching lives behind the [`source::PageSource`] trait and schema
//! resolution is the caller's job.

pub mod address;
pub mod allocation;
pub mod bytes;
pub mod error;
pub mod mark;
pub mod page;
pub mod records;
pub mod schema;
pub mod source;

pub use address::{LogSequenceNumber, PageAddress, RowIdentifier};
pub use error::{Error, Result};
pub use mark::{Mark, Marks};
pub use page::{BootPage, LogFragment, Page, PageHeader, PageType, PAGE_SIZE};
pub use source::{FilePageSource, MemoryPageSource, PageSource};
