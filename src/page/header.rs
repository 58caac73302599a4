//! The fixed 96-byte page header.
//!
//! Every page, regardless of type, begins with the same header layout. Field
//! offsets are fixed by the on-disk format and reproduced here exactly.

use crate::address::{LogSequenceNumber, PageAddress};
use crate::bytes;
use crate::error::{Error, Result};

pub const PAGE_SIZE: usize = 8192;
pub const HEADER_SIZE: usize = 96;

/// Page type tag, byte 1 of the header. Raw values outside the known set
/// decode as `Unknown` rather than failing, so foreign or future page kinds
/// do not abort a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    None,
    Data,
    Index,
    /// Text/image mix page (LOB data shared between rows).
    Lob3,
    /// Text/image tree page (LOB b-tree node).
    Lob4,
    Sort,
    Gam,
    Sgam,
    Iam,
    Pfs,
    Boot,
    FileHeader,
    Dcm,
    Bcm,
    Unknown(u8),
}

impl PageType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => PageType::None,
            1 => PageType::Data,
            2 => PageType::Index,
            3 => PageType::Lob3,
            4 => PageType::Lob4,
            7 => PageType::Sort,
            8 => PageType::Gam,
            9 => PageType::Sgam,
            10 => PageType::Iam,
            11 => PageType::Pfs,
            13 => PageType::Boot,
            15 => PageType::FileHeader,
            16 => PageType::Dcm,
            17 => PageType::Bcm,
            other => PageType::Unknown(other),
        }
    }

    /// Extent allocation bitmap kinds (one bit per extent).
    pub fn is_allocation_bitmap(&self) -> bool {
        matches!(
            self,
            PageType::Gam | PageType::Sgam | PageType::Iam | PageType::Dcm | PageType::Bcm
        )
    }

    /// Database-wide bitmaps placed at well-known page ids and strided by the
    /// allocation interval, as opposed to IAM pages which are chained.
    pub fn is_database_bitmap(&self) -> bool {
        matches!(
            self,
            PageType::Gam | PageType::Sgam | PageType::Dcm | PageType::Bcm
        )
    }
}

/// Decoded page header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub header_version: u8,
    pub page_type: PageType,
    pub type_flag_bits: u8,
    /// B-tree depth of this page, 0 = leaf level.
    pub level: u8,
    pub flag_bits: u16,
    pub index_id: i16,
    pub previous_page: PageAddress,
    /// Size in bytes of a record's fixed-length portion (pminlen). Index
    /// record decoding reads its column count and bitmaps relative to this.
    pub fixed_length_size: u16,
    pub next_page: PageAddress,
    pub slot_count: u16,
    pub object_id: i32,
    pub free_count: u16,
    pub free_data: u16,
    pub page_address: PageAddress,
    pub reserved_count: u16,
    pub lsn: LogSequenceNumber,
    pub xact_reserved: u16,
    pub internal_transaction_id: PageAddress,
    pub ghost_record_count: u16,
    pub torn_bits: i32,
}

impl PageHeader {
    /// Decode the header from the front of a page buffer. Pure function; the
    /// only failure is a buffer shorter than the 96-byte header, which is a
    /// caller error rather than a recoverable condition.
    pub fn parse(data: &[u8]) -> Result<PageHeader> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                context: "page header",
                offset: 0,
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let context = "page header";

        Ok(PageHeader {
            header_version: bytes::u8_at(data, 0, context)?,
            page_type: PageType::from_raw(bytes::u8_at(data, 1, context)?),
            type_flag_bits: bytes::u8_at(data, 2, context)?,
            level: bytes::u8_at(data, 3, context)?,
            flag_bits: bytes::u16_at(data, 4, context)?,
            index_id: bytes::i16_at(data, 6, context)?,
            previous_page: PageAddress::parse(data, 8, context)?,
            fixed_length_size: bytes::u16_at(data, 14, context)?,
            next_page: PageAddress::parse(data, 16, context)?,
            slot_count: bytes::u16_at(data, 22, context)?,
            object_id: bytes::i32_at(data, 24, context)?,
            free_count: bytes::u16_at(data, 28, context)?,
            free_data: bytes::u16_at(data, 30, context)?,
            page_address: PageAddress::parse(data, 32, context)?,
            reserved_count: bytes::u16_at(data, 38, context)?,
            lsn: LogSequenceNumber::parse(data, 40, context)?,
            xact_reserved: bytes::u16_at(data, 50, context)?,
            internal_transaction_id: PageAddress::parse(data, 52, context)?,
            ghost_record_count: bytes::u16_at(data, 58, context)?,
            torn_bits: bytes::i32_at(data, 60, context)?,
        })
    }
}
