//! Page, row and log addresses.

use std::fmt;

use crate::bytes;
use crate::error::Result;

/// Uniquely identifies a page within a database: file id + page id within
/// the file. Wire form is 6 bytes: page id (u32 LE) then file id (u16 LE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageAddress {
    pub file_id: i16,
    pub page_id: i32,
}

impl PageAddress {
    pub const SIZE: usize = 6;

    /// The "no page" sentinel used by header chain links.
    pub const EMPTY: PageAddress = PageAddress {
        file_id: 0,
        page_id: 0,
    };

    pub const fn new(file_id: i16, page_id: i32) -> Self {
        Self { file_id, page_id }
    }

    pub fn parse(data: &[u8], offset: usize, context: &'static str) -> Result<Self> {
        let page_id = bytes::i32_at(data, offset, context)?;
        let file_id = bytes::i16_at(data, offset + 4, context)?;
        Ok(Self { file_id, page_id })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for PageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_id, self.page_id)
    }
}

/// Identifies a row: page address + slot index. Wire form is 8 bytes:
/// page address (6) then slot (u16 LE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowIdentifier {
    pub page_address: PageAddress,
    pub slot: u16,
}

impl RowIdentifier {
    pub const SIZE: usize = 8;

    pub const fn new(page_address: PageAddress, slot: u16) -> Self {
        Self { page_address, slot }
    }

    pub fn parse(data: &[u8], offset: usize, context: &'static str) -> Result<Self> {
        let page_address = PageAddress::parse(data, offset, context)?;
        let slot = bytes::u16_at(data, offset + PageAddress::SIZE, context)?;
        Ok(Self { page_address, slot })
    }
}

impl fmt::Display for RowIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_address, self.slot)
    }
}

/// Log sequence number: three little-endian integers, displayed the way the
/// engine prints them (colon-separated hex).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogSequenceNumber {
    pub file_sequence: u32,
    pub block: u32,
    pub slot: u16,
}

impl LogSequenceNumber {
    pub const SIZE: usize = 10;

    pub fn parse(data: &[u8], offset: usize, context: &'static str) -> Result<Self> {
        Ok(Self {
            file_sequence: bytes::u32_at(data, offset, context)?,
            block: bytes::u32_at(data, offset + 4, context)?,
            slot: bytes::u16_at(data, offset + 8, context)?,
        })
    }
}

impl fmt::Display for LogSequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}:{:08x}:{:04x}",
            self.file_sequence, self.block, self.slot
        )
    }
}

#[cfg(test)]
mod address_tests {
    use super::*;

    #[test]
    fn page_address_wire_form_round_trip() {
        // page id 9, file id 1
        let data = [0x09, 0x00, 0x00, 0x00, 0x01, 0x00];
        let address = PageAddress::parse(&data, 0, "test").unwrap();
        assert_eq!(address, PageAddress::new(1, 9));
        assert_eq!(address.to_string(), "1:9");
    }

    #[test]
    fn empty_sentinel_is_zero_zero() {
        let data = [0u8; 6];
        assert!(PageAddress::parse(&data, 0, "test").unwrap().is_empty());
        assert!(!PageAddress::new(1, 0).is_empty());
    }

    #[test]
    fn ordering_is_file_then_page() {
        assert!(PageAddress::new(1, 500) < PageAddress::new(2, 1));
        assert!(PageAddress::new(1, 1) < PageAddress::new(1, 2));
    }

    #[test]
    fn row_identifier_includes_slot() {
        let data = [0x10, 0x00, 0x00, 0x00, 0x01, 0x00, 0x03, 0x00];
        let rid = RowIdentifier::parse(&data, 0, "test").unwrap();
        assert_eq!(rid.page_address, PageAddress::new(1, 16));
        assert_eq!(rid.slot, 3);
        assert_eq!(rid.to_string(), "1:16:3");
    }

    #[test]
    fn lsn_displays_as_hex_triple() {
        let lsn = LogSequenceNumber {
            file_sequence: 31,
            block: 256,
            slot: 1,
        };
        assert_eq!(lsn.to_string(), "0000001f:00000100:0001");
    }
}
