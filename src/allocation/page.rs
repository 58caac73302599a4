//! Allocation bitmap pages (IAM, GAM, SGAM, DCM, BCM).
//!
//! Each page carries one bit per extent for a span of [`ALLOCATION_INTERVAL`]
//! extents:
//!
//! ```text
//!     page header      96 bytes
//!     bitmap        7,988 bytes (63,904 bits, one per extent)
//!     unused          108 bytes
//! ```
//!
//! IAM pages additionally carry a start page (the first page of the mapped
//! interval) and a small table of single page slots: pages allocated to the
//! object individually from mixed extents rather than as a full extent.

use crate::address::PageAddress;
use crate::bytes::{self, BitVector};
use crate::error::{Error, Result};
use crate::page::{Page, PageType};

/// Extents covered by one allocation page. Sometimes described as 64,000
/// extents; it is actually 63,904.
pub const ALLOCATION_INTERVAL: usize = 63_904;

/// Well-known first page ids of the database-wide bitmaps.
pub const FIRST_GAM_PAGE: i32 = 2;
pub const FIRST_SGAM_PAGE: i32 = 3;
pub const FIRST_DCM_PAGE: i32 = 6;
pub const FIRST_BCM_PAGE: i32 = 7;

const BITMAP_OFFSET: usize = 194;
const BITMAP_BYTES: usize = ALLOCATION_INTERVAL / 8;
const IAM_START_PAGE_OFFSET: usize = 136;
const SINGLE_PAGE_SLOT_OFFSET: usize = 142;
const SINGLE_PAGE_SLOT_COUNT: usize = 8;

/// A decoded allocation bitmap page.
#[derive(Debug, Clone)]
pub struct AllocationPage {
    page: Page,
    /// Absolute extent number represented by bit 0 of this page's bitmap.
    start_extent: usize,
    /// File whose extents this bitmap covers. Equal to the page's own file
    /// for database bitmaps; for IAM pages, the file of the mapped interval.
    covered_file_id: i16,
    /// IAM only: the first page of the mapped interval.
    start_page: Option<PageAddress>,
    /// IAM only: individually allocated pages.
    single_page_slots: Vec<PageAddress>,
}

impl AllocationPage {
    /// Parse an IAM page. The covered extent range is derived from the start
    /// page stored in the IAM record.
    pub fn parse_iam(page: Page) -> Result<AllocationPage> {
        if page.page_type() != PageType::Iam {
            return Err(Error::malformed(
                1,
                format!("expected an IAM page, found {:?}", page.page_type()),
            ));
        }

        let start_page = PageAddress::parse(page.data(), IAM_START_PAGE_OFFSET, "IAM start page")?;

        let mut single_page_slots = Vec::new();
        for slot in 0..SINGLE_PAGE_SLOT_COUNT {
            let address = PageAddress::parse(
                page.data(),
                SINGLE_PAGE_SLOT_OFFSET + slot * PageAddress::SIZE,
                "IAM single page slot",
            )?;
            if !address.is_empty() {
                single_page_slots.push(address);
            }
        }

        Ok(AllocationPage {
            start_extent: start_page.page_id as usize / 8,
            covered_file_id: start_page.file_id,
            start_page: Some(start_page),
            single_page_slots,
            page,
        })
    }

    /// Parse a GAM/SGAM/DCM/BCM page covering extents
    /// `[start_extent, start_extent + ALLOCATION_INTERVAL)` of its own file.
    pub fn parse_interval(page: Page, start_extent: usize) -> Result<AllocationPage> {
        if !page.page_type().is_database_bitmap() {
            return Err(Error::NotAllocationKind(page.page_type()));
        }

        Ok(AllocationPage {
            start_extent,
            covered_file_id: page.page_address().file_id,
            start_page: None,
            single_page_slots: Vec::new(),
            page,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn start_extent(&self) -> usize {
        self.start_extent
    }

    pub fn covered_file_id(&self) -> i16 {
        self.covered_file_id
    }

    pub fn start_page(&self) -> Option<PageAddress> {
        self.start_page
    }

    pub fn single_page_slots(&self) -> &[PageAddress] {
        &self.single_page_slots
    }

    pub fn covers(&self, extent: usize) -> bool {
        extent >= self.start_extent && extent < self.start_extent + ALLOCATION_INTERVAL
    }

    /// Allocation bit for an absolute extent number. Extents outside this
    /// page's range read as unallocated.
    pub fn is_allocated(&self, extent: usize) -> bool {
        if !self.covers(extent) {
            return false;
        }
        self.bitmap().get(extent - self.start_extent)
    }

    fn bitmap(&self) -> BitVector<'_> {
        BitVector::new(&self.page.data()[BITMAP_OFFSET..BITMAP_OFFSET + BITMAP_BYTES])
    }
}
