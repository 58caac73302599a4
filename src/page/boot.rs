//! The boot page: database-level metadata at the fixed address (1, 9).

use crate::address::PageAddress;
use crate::bytes;
use crate::error::{Error, Result};
use crate::page::{Page, PageType};

/// The boot page always lives at file 1, page 9.
pub const BOOT_PAGE_ADDRESS: PageAddress = PageAddress::new(1, 9);

// Field offsets within the page, reverse engineered from live databases.
const CURRENT_VERSION_OFFSET: usize = 100;
const CREATED_VERSION_OFFSET: usize = 102;
const DATABASE_NAME_OFFSET: usize = 148;
const DATABASE_NAME_CHARS: usize = 128;
const DATABASE_ID_OFFSET: usize = 408;
const FIRST_ALLOCATION_UNITS_PAGE_OFFSET: usize = 564;

/// Decoded boot page fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootPage {
    pub current_version: i16,
    pub created_version: i16,
    pub database_id: i32,
    pub database_name: String,
    /// First page of the allocation units system table, the entry point for
    /// walking the catalog.
    pub first_allocation_units_page: PageAddress,
}

impl BootPage {
    pub fn parse(page: &Page) -> Result<BootPage> {
        if page.page_type() != PageType::Boot {
            return Err(Error::malformed(
                1,
                format!("expected a boot page, found {:?}", page.page_type()),
            ));
        }

        let data = page.data();
        let context = "boot page";

        Ok(BootPage {
            current_version: bytes::i16_at(data, CURRENT_VERSION_OFFSET, context)?,
            created_version: bytes::i16_at(data, CREATED_VERSION_OFFSET, context)?,
            database_id: bytes::i32_at(data, DATABASE_ID_OFFSET, context)?,
            database_name: parse_name(data)?,
            first_allocation_units_page: PageAddress::parse(
                data,
                FIRST_ALLOCATION_UNITS_PAGE_OFFSET,
                context,
            )?,
        })
    }
}

/// Database name: fixed-width UTF-16LE field, padded with NUL or space.
fn parse_name(data: &[u8]) -> Result<String> {
    let raw = bytes::slice_at(
        data,
        DATABASE_NAME_OFFSET,
        DATABASE_NAME_CHARS * 2,
        "boot page name",
    )?;

    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    Ok(String::from_utf16_lossy(&units).trim_end().to_string())
}
