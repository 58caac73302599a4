//! The page-source boundary: where raw page buffers come from.
//!
//! The decoding core never does I/O; everything it consumes arrives through
//! this trait. The file-backed implementation reads 8 KiB pages out of a
//! database file; the in-memory one backs tests and fixtures.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::address::PageAddress;
use crate::error::{Error, Result};
use crate::page::{Page, PAGE_SIZE};

/// Supplies raw page buffers by address. Implementations are synchronous;
/// callers that want parallel fetches fan out across their own workers.
pub trait PageSource {
    fn page(&self, address: PageAddress) -> Result<Vec<u8>>;

    /// Fetch and parse in one step.
    fn fetch(&self, address: PageAddress) -> Result<Page> {
        Page::parse(self.page(address)?)
    }
}

/// Reads pages from a single database file by seeking to
/// `page_id * PAGE_SIZE`.
pub struct FilePageSource {
    file: Mutex<File>,
    file_id: i16,
    page_count: i32,
}

impl FilePageSource {
    /// Open a database file as file id 1 (the primary data file).
    pub fn open(path: impl AsRef<Path>) -> Result<FilePageSource> {
        Self::open_as(path, 1)
    }

    pub fn open_as(path: impl AsRef<Path>, file_id: i16) -> Result<FilePageSource> {
        let file = File::open(path)?;
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as i32;
        Ok(FilePageSource {
            file: Mutex::new(file),
            file_id,
            page_count,
        })
    }

    pub fn page_count(&self) -> i32 {
        self.page_count
    }

    /// File size expressed in extents (8 pages each), rounded up.
    pub fn size_in_extents(&self) -> usize {
        (self.page_count as usize).div_ceil(8)
    }
}

impl PageSource for FilePageSource {
    fn page(&self, address: PageAddress) -> Result<Vec<u8>> {
        if address.file_id != self.file_id || address.page_id < 0 || address.page_id >= self.page_count
        {
            return Err(Error::SchemaMismatch {
                kind: "page",
                key: address.page_id as i64,
            });
        }

        let mut file = self.file.lock().expect("page source lock poisoned");
        file.seek(SeekFrom::Start(address.page_id as u64 * PAGE_SIZE as u64))?;
        let mut buffer = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

/// In-memory page source for tests and fixtures.
#[derive(Default)]
pub struct MemoryPageSource {
    pages: HashMap<PageAddress, Vec<u8>>,
}

impl MemoryPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: PageAddress, data: Vec<u8>) {
        self.pages.insert(address, data);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl PageSource for MemoryPageSource {
    fn page(&self, address: PageAddress) -> Result<Vec<u8>> {
        self.pages
            .get(&address)
            .cloned()
            .ok_or(Error::SchemaMismatch {
                kind: "page",
                key: address.page_id as i64,
            })
    }
}
