//! Page buffer, header and slot offset table.

mod boot;
mod header;

pub use boot::{BootPage, BOOT_PAGE_ADDRESS};
pub use header::{PageHeader, PageType, HEADER_SIZE, PAGE_SIZE};

use crate::address::{LogSequenceNumber, PageAddress};
use crate::bytes;
use crate::error::{Error, Result};

/// A decoded page: the raw 8,192-byte buffer, its header, and the slot
/// offset table from the tail of the page.
///
/// Pages are immutable once parsed. The one mutating operation,
/// [`Page::apply_log_fragment`], returns a new page value. Records decoded
/// from a page borrow its buffer and must not outlive it.
#[derive(Debug, Clone)]
pub struct Page {
    data: Box<[u8]>,
    header: PageHeader,
    offset_table: Vec<u16>,
    /// Identity of the allocation unit this page belongs to. Identity only;
    /// the page does not own or resolve the unit.
    allocation_unit_id: Option<i64>,
}

impl Page {
    /// Parse a raw page buffer. The buffer must be exactly [`PAGE_SIZE`]
    /// bytes; anything else is a caller error.
    pub fn parse(data: Vec<u8>) -> Result<Page> {
        if data.len() != PAGE_SIZE {
            return Err(Error::Truncated {
                context: "page",
                offset: 0,
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }

        let header = PageHeader::parse(&data)?;
        let offset_table = Self::parse_offset_table(&data, header.slot_count)?;

        Ok(Page {
            data: data.into_boxed_slice(),
            header,
            offset_table,
            allocation_unit_id: None,
        })
    }

    /// Slot offsets are 2-byte entries packed backwards from the end of the
    /// page: slot `i` lives at `PAGE_SIZE - 2 * (i + 1)`. Entry order is slot
    /// order, which is not necessarily byte order within the page.
    fn parse_offset_table(data: &[u8], slot_count: u16) -> Result<Vec<u16>> {
        // The table grows backwards towards the header; it can never occupy
        // more than the space between the header and the end of the page.
        let max_slots = (PAGE_SIZE - HEADER_SIZE) / 2;
        if slot_count as usize > max_slots {
            return Err(Error::malformed(
                22,
                format!("slot count {slot_count} exceeds page capacity of {max_slots}"),
            ));
        }

        let mut offsets = Vec::with_capacity(slot_count as usize);
        for slot in 0..slot_count as usize {
            let position = PAGE_SIZE - 2 * (slot + 1);
            offsets.push(bytes::u16_at(data, position, "offset table")?);
        }
        Ok(offsets)
    }

    pub fn with_allocation_unit(mut self, allocation_unit_id: i64) -> Self {
        self.allocation_unit_id = Some(allocation_unit_id);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    pub fn page_type(&self) -> PageType {
        self.header.page_type
    }

    pub fn page_address(&self) -> PageAddress {
        self.header.page_address
    }

    pub fn offset_table(&self) -> &[u16] {
        &self.offset_table
    }

    pub fn slot_offset(&self, slot: usize) -> Option<u16> {
        self.offset_table.get(slot).copied()
    }

    pub fn allocation_unit_id(&self) -> Option<i64> {
        self.allocation_unit_id
    }

    /// Overlay a transaction-log fragment onto this page, producing the page
    /// as it would have looked after the logged write. The fragment's offset
    /// is relative to the start of the record in `slot`.
    pub fn apply_log_fragment(&self, fragment: &LogFragment) -> Result<Page> {
        let slot_offset = self
            .slot_offset(fragment.slot)
            .ok_or_else(|| Error::malformed(0, format!("slot {} not in page", fragment.slot)))?;

        let start = slot_offset as usize + fragment.offset;
        let end = start + fragment.data.len();

        if end > PAGE_SIZE {
            return Err(Error::malformed(
                start,
                format!(
                    "log fragment of {} bytes does not fit at offset {start}",
                    fragment.data.len()
                ),
            ));
        }

        let mut data = self.data.to_vec();
        data[start..end].copy_from_slice(&fragment.data);

        let mut page = Page::parse(data)?;
        page.allocation_unit_id = self.allocation_unit_id;
        Ok(page)
    }
}

/// A fragment of page data recovered from the transaction log: bytes written
/// at an offset within a slot's record, used for point-in-time
/// reconstruction of a page.
#[derive(Debug, Clone)]
pub struct LogFragment {
    pub slot: usize,
    /// Byte offset relative to the record start.
    pub offset: usize,
    pub data: Vec<u8>,
    pub lsn: LogSequenceNumber,
}
