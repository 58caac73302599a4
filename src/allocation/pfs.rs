//! PFS (page free space) byte decoding.
//!
//! One status byte per page, least significant bit first:
//!
//! ```text
//!     bit 7      unused
//!     bit 6      is allocated
//!     bit 5      is mixed extent
//!     bit 4      is IAM page
//!     bit 3      has ghost records
//!     bits 0-2   space free: 000 empty, 001 50%, 010 80%, 011 95%, 100 100%
//! ```
//!
//! Decode and encode round-trip bit-exact; this is the one place the crate
//! re-encodes anything, and it exists so the round trip can be verified.

use crate::bytes;
use crate::error::{Error, Result};
use crate::page::{Page, PageType};

/// Pages covered by a single PFS page.
pub const PFS_INTERVAL: usize = 8088;

const PFS_BYTES_OFFSET: usize = 100;

const GHOST_BIT: u8 = 3;
const IAM_BIT: u8 = 4;
const MIXED_BIT: u8 = 5;
const ALLOCATED_BIT: u8 = 6;
const SPACE_FREE_MASK: u8 = 0x07;

/// Approximate fullness of a page, the low three bits of its PFS byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceFree {
    Empty,
    FiftyPercent,
    EightyPercent,
    NinetyFivePercent,
    Full,
    /// Bit patterns 5-7 are not produced by the engine; kept verbatim so the
    /// byte still round-trips.
    Unknown(u8),
}

impl SpaceFree {
    pub fn from_bits(bits: u8) -> Self {
        match bits & SPACE_FREE_MASK {
            0 => SpaceFree::Empty,
            1 => SpaceFree::FiftyPercent,
            2 => SpaceFree::EightyPercent,
            3 => SpaceFree::NinetyFivePercent,
            4 => SpaceFree::Full,
            other => SpaceFree::Unknown(other),
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            SpaceFree::Empty => 0,
            SpaceFree::FiftyPercent => 1,
            SpaceFree::EightyPercent => 2,
            SpaceFree::NinetyFivePercent => 3,
            SpaceFree::Full => 4,
            SpaceFree::Unknown(bits) => bits & SPACE_FREE_MASK,
        }
    }
}

/// Decoded single-page status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PfsByte {
    pub space_free: SpaceFree,
    pub has_ghost_records: bool,
    pub is_iam: bool,
    pub is_mixed: bool,
    pub is_allocated: bool,
}

impl PfsByte {
    /// Decode a PFS byte. Bit 7 is unused by the format and ignored.
    pub fn decode(value: u8) -> PfsByte {
        PfsByte {
            space_free: SpaceFree::from_bits(value),
            has_ghost_records: bytes::bit(value, GHOST_BIT),
            is_iam: bytes::bit(value, IAM_BIT),
            is_mixed: bytes::bit(value, MIXED_BIT),
            is_allocated: bytes::bit(value, ALLOCATED_BIT),
        }
    }

    pub fn encode(self) -> u8 {
        let mut value = self.space_free.to_bits();
        if self.has_ghost_records {
            value |= 1 << GHOST_BIT;
        }
        if self.is_iam {
            value |= 1 << IAM_BIT;
        }
        if self.is_mixed {
            value |= 1 << MIXED_BIT;
        }
        if self.is_allocated {
            value |= 1 << ALLOCATED_BIT;
        }
        value
    }
}

/// A PFS page: one status byte for each of the [`PFS_INTERVAL`] pages it
/// covers, starting at byte offset 100.
#[derive(Debug, Clone)]
pub struct PfsPage {
    page: Page,
}

impl PfsPage {
    pub fn parse(page: Page) -> Result<PfsPage> {
        if page.page_type() != PageType::Pfs {
            return Err(Error::malformed(
                1,
                format!("expected a PFS page, found {:?}", page.page_type()),
            ));
        }
        Ok(PfsPage { page })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Status of a page by id, or `None` when this PFS page does not cover
    /// it. The byte index is the page id's position within the interval.
    pub fn status(&self, page_id: i32) -> Option<PfsByte> {
        if page_id < 0 {
            return None;
        }
        let interval_start =
            (page_id as usize / PFS_INTERVAL) * PFS_INTERVAL;
        if interval_start != (self.page.page_address().page_id as usize / PFS_INTERVAL) * PFS_INTERVAL {
            return None;
        }
        let index = page_id as usize % PFS_INTERVAL;
        self.page
            .data()
            .get(PFS_BYTES_OFFSET + index)
            .map(|&value| PfsByte::decode(value))
    }
}

#[cfg(test)]
mod pfs_tests {
    use super::*;
    use crate::page::PAGE_SIZE;

    #[test]
    fn decodes_flag_bits() {
        let pfs = PfsByte::decode(0x40 | 0x10 | 0x03);
        assert!(pfs.is_allocated);
        assert!(pfs.is_iam);
        assert!(!pfs.is_mixed);
        assert!(!pfs.has_ghost_records);
        assert_eq!(pfs.space_free, SpaceFree::NinetyFivePercent);
    }

    #[test]
    fn round_trips_every_valid_byte() {
        // Valid bytes: bit 7 clear (unused by the format).
        for value in 0u8..0x80 {
            assert_eq!(PfsByte::decode(value).encode(), value, "byte {value:#04x}");
        }
    }

    #[test]
    fn unused_space_free_patterns_survive_round_trip() {
        let pfs = PfsByte::decode(0x07);
        assert_eq!(pfs.space_free, SpaceFree::Unknown(7));
        assert_eq!(pfs.encode(), 0x07);
    }

    #[test]
    fn pfs_page_indexes_by_interval_position() {
        let mut data = vec![0u8; PAGE_SIZE];
        data[1] = 11; // pfs page type
        // This PFS page is page 1:1, covering pages 0..8088.
        data[32..36].copy_from_slice(&1u32.to_le_bytes());
        data[36..38].copy_from_slice(&1u16.to_le_bytes());
        data[PFS_BYTES_OFFSET + 9] = 0x44; // page 9: allocated, 100% full

        let pfs = PfsPage::parse(Page::parse(data).unwrap()).unwrap();
        let status = pfs.status(9).unwrap();
        assert!(status.is_allocated);
        assert_eq!(status.space_free, SpaceFree::Full);
        assert!(!pfs.status(3).unwrap().is_allocated);
        // Page outside this interval.
        assert!(pfs.status(9000).is_none());
    }

    #[test]
    fn non_pfs_page_is_rejected() {
        let mut data = vec![0u8; PAGE_SIZE];
        data[1] = 1;
        assert!(PfsPage::parse(Page::parse(data).unwrap()).is_err());
    }
}
