//! Little-endian primitives for reading values out of a page buffer.
//!
//! Every multi-byte value in the format is little-endian. All readers bounds
//! check and report a tagged [`Error::Truncated`] rather than panicking, so a
//! corrupt length field never takes the decoder down.

use crate::error::{Error, Result};

fn take<'a>(data: &'a [u8], offset: usize, len: usize, context: &'static str) -> Result<&'a [u8]> {
    data.get(offset..offset + len).ok_or(Error::Truncated {
        context,
        offset,
        expected: len,
        actual: data.len(),
    })
}

pub fn u8_at(data: &[u8], offset: usize, context: &'static str) -> Result<u8> {
    Ok(take(data, offset, 1, context)?[0])
}

pub fn u16_at(data: &[u8], offset: usize, context: &'static str) -> Result<u16> {
    let bytes = take(data, offset, 2, context)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn i16_at(data: &[u8], offset: usize, context: &'static str) -> Result<i16> {
    Ok(u16_at(data, offset, context)? as i16)
}

pub fn u32_at(data: &[u8], offset: usize, context: &'static str) -> Result<u32> {
    let bytes = take(data, offset, 4, context)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn i32_at(data: &[u8], offset: usize, context: &'static str) -> Result<i32> {
    Ok(u32_at(data, offset, context)? as i32)
}

pub fn i64_at(data: &[u8], offset: usize, context: &'static str) -> Result<i64> {
    let bytes = take(data, offset, 8, context)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(buf))
}

pub fn slice_at<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    context: &'static str,
) -> Result<&'a [u8]> {
    take(data, offset, len, context)
}

/// A read-only bit vector over a byte range, least significant bit first
/// within each byte. This is the bit order of every bitmap in the format
/// (null bitmaps, allocation maps, status bytes).
#[derive(Debug, Clone, Copy)]
pub struct BitVector<'a> {
    bytes: &'a [u8],
}

impl<'a> BitVector<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() * 8
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bit at `index`, or `false` when the index is past the end. Bitmaps in
    /// the format are padded with zero bits, so out-of-range reads as clear
    /// match the on-disk semantics.
    pub fn get(&self, index: usize) -> bool {
        match self.bytes.get(index / 8) {
            Some(byte) => byte & (1 << (index % 8)) != 0,
            None => false,
        }
    }
}

/// Bit `index` (0 = least significant) of a single byte.
pub fn bit(byte: u8, index: u8) -> bool {
    byte & (1 << index) != 0
}
