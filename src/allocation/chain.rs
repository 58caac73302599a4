//! Allocation chains: ordered sequences of allocation pages covering a file.
//!
//! IAM chains are linked lists followed through the header `next_page`
//! pointer until the empty sentinel. GAM/SGAM/DCM/BCM chains are computed:
//! one page per allocation interval, starting at the well-known first page id
//! and striding by the interval, `ceil(file_size_extents / 63904)` pages in
//! total.

use std::collections::HashSet;

use tracing::debug;

use crate::address::PageAddress;
use crate::allocation::page::{
    AllocationPage, ALLOCATION_INTERVAL, FIRST_BCM_PAGE, FIRST_DCM_PAGE, FIRST_GAM_PAGE,
    FIRST_SGAM_PAGE,
};
use crate::error::{Error, Result};
use crate::page::PageType;
use crate::source::PageSource;

/// An ordered sequence of allocation pages.
#[derive(Debug, Clone, Default)]
pub struct AllocationChain {
    pages: Vec<AllocationPage>,
}

impl AllocationChain {
    /// Follow an IAM chain from its first page, accumulating pages until the
    /// `next_page` link is the empty sentinel. A repeated address means the
    /// chain loops, which only a corrupt file produces.
    pub fn load_iam(source: &dyn PageSource, first_page: PageAddress) -> Result<AllocationChain> {
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut address = first_page;

        loop {
            if !seen.insert(address) {
                return Err(Error::malformed(
                    16,
                    format!("IAM chain loops back to page {address}"),
                ));
            }

            let page = AllocationPage::parse_iam(source.fetch(address)?)?;
            let next = page.page().header().next_page;
            debug!(page = %address, %next, "loaded IAM chain page");
            pages.push(page);

            if next.is_empty() {
                break;
            }
            address = next;
        }

        Ok(AllocationChain { pages })
    }

    /// Build a GAM/SGAM/DCM/BCM chain for one file. The page count is
    /// derived from the file size; page `i` covers extents
    /// `[i * 63904, (i + 1) * 63904)`.
    pub fn load_interval(
        source: &dyn PageSource,
        file_id: i16,
        page_type: PageType,
        file_size_extents: usize,
    ) -> Result<AllocationChain> {
        let first_page_id = match page_type {
            PageType::Gam => FIRST_GAM_PAGE,
            PageType::Sgam => FIRST_SGAM_PAGE,
            PageType::Dcm => FIRST_DCM_PAGE,
            PageType::Bcm => FIRST_BCM_PAGE,
            other => return Err(Error::NotAllocationKind(other)),
        };

        let page_count = file_size_extents.div_ceil(ALLOCATION_INTERVAL);
        debug!(?page_type, file_id, page_count, "building allocation chain");

        let mut pages = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let address = PageAddress::new(
                file_id,
                first_page_id + (index * ALLOCATION_INTERVAL) as i32,
            );
            let page = source.fetch(address)?;
            pages.push(AllocationPage::parse_interval(
                page,
                index * ALLOCATION_INTERVAL,
            )?);
        }

        Ok(AllocationChain { pages })
    }

    pub fn pages(&self) -> &[AllocationPage] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether `extent` of `file_id` is allocated. Returns `false` when no
    /// page in the chain covers the extent: unallocated by default, never an
    /// error.
    pub fn is_extent_allocated(&self, extent: usize, file_id: i16) -> bool {
        self.pages
            .iter()
            .find(|page| page.covered_file_id() == file_id && page.covers(extent))
            .map(|page| page.is_allocated(extent))
            .unwrap_or(false)
    }

    /// All single page slots across the chain's IAM pages, in chain order.
    pub fn single_page_slots(&self) -> impl Iterator<Item = PageAddress> + '_ {
        self.pages
            .iter()
            .flat_map(|page| page.single_page_slots().iter().copied())
    }
}

#[cfg(test)]
mod chain_tests {
    use super::*;
    use crate::allocation::page::test_support::*;
    use crate::source::MemoryPageSource;

    #[test]
    fn interval_chain_covers_file_exactly() {
        // 150,000 extents need ceil(150000 / 63904) = 3 pages.
        let mut source = MemoryPageSource::new();
        for index in 0..3 {
            let address = PageAddress::new(1, FIRST_GAM_PAGE + (index * ALLOCATION_INTERVAL) as i32);
            source.insert(
                address,
                raw_allocation_page(8, address, PageAddress::EMPTY, &[index]),
            );
        }

        let chain =
            AllocationChain::load_interval(&source, 1, PageType::Gam, 150_000).unwrap();
        assert_eq!(chain.len(), 3);

        // Every extent in range is covered by exactly one page.
        for extent in [0usize, 63_903, 63_904, 127_807, 127_808, 149_999] {
            let covering = chain.pages().iter().filter(|p| p.covers(extent)).count();
            assert_eq!(covering, 1, "extent {extent}");
        }

        // Page i has bit i set, offset by its interval.
        assert!(chain.is_extent_allocated(0, 1));
        assert!(chain.is_extent_allocated(ALLOCATION_INTERVAL + 1, 1));
        assert!(chain.is_extent_allocated(2 * ALLOCATION_INTERVAL + 2, 1));
        assert!(!chain.is_extent_allocated(1, 1));
        // Wrong file: unallocated by default.
        assert!(!chain.is_extent_allocated(0, 2));
        // Uncovered extent: unallocated by default.
        assert!(!chain.is_extent_allocated(10 * ALLOCATION_INTERVAL, 1));
    }

    #[test]
    fn small_file_gets_single_interval_page() {
        let address = PageAddress::new(1, FIRST_DCM_PAGE);
        let mut source = MemoryPageSource::new();
        source.insert(
            address,
            raw_allocation_page(16, address, PageAddress::EMPTY, &[]),
        );

        let chain = AllocationChain::load_interval(&source, 1, PageType::Dcm, 1_000).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn non_bitmap_page_type_is_rejected() {
        let source = MemoryPageSource::new();
        assert!(matches!(
            AllocationChain::load_interval(&source, 1, PageType::Data, 100),
            Err(Error::NotAllocationKind(PageType::Data))
        ));
    }

    #[test]
    fn iam_chain_follows_next_page_links() {
        let first = PageAddress::new(1, 80);
        let second = PageAddress::new(1, 90);
        let mut source = MemoryPageSource::new();

        let mut page_one = raw_allocation_page(10, first, second, &[1]);
        set_iam_start_page(&mut page_one, PageAddress::new(1, 0));
        source.insert(first, page_one);

        let mut page_two = raw_allocation_page(10, second, PageAddress::EMPTY, &[0]);
        set_iam_start_page(&mut page_two, PageAddress::new(2, 0));
        source.insert(second, page_two);

        let chain = AllocationChain::load_iam(&source, first).unwrap();
        assert_eq!(chain.len(), 2);
        // File 1 extents come from the first page, file 2 from the second.
        assert!(chain.is_extent_allocated(1, 1));
        assert!(!chain.is_extent_allocated(1, 2));
        assert!(chain.is_extent_allocated(0, 2));
    }

    #[test]
    fn iam_chain_with_empty_next_is_single_page() {
        let first = PageAddress::new(1, 80);
        let mut source = MemoryPageSource::new();
        let mut data = raw_allocation_page(10, first, PageAddress::EMPTY, &[]);
        set_iam_start_page(&mut data, PageAddress::new(1, 0));
        source.insert(first, data);

        let chain = AllocationChain::load_iam(&source, first).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn looping_iam_chain_is_malformed() {
        let first = PageAddress::new(1, 80);
        let mut source = MemoryPageSource::new();
        let mut data = raw_allocation_page(10, first, first, &[]);
        set_iam_start_page(&mut data, PageAddress::new(1, 0));
        source.insert(first, data);

        assert!(matches!(
            AllocationChain::load_iam(&source, first),
            Err(Error::Malformed { .. })
        ));
    }
}
