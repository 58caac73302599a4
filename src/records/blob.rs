//! LOB pointer decoding: in-row references to off-row large-object data.
//!
//! Two pointer shapes exist. An overflow pointer is a fixed 24-byte
//! structure with exactly one child link (a single off-row fragment). A root
//! pointer fans out: after a 12-byte header it packs one 12-byte link
//! (4-byte length + 8-byte row identifier) per fragment.

use crate::address::RowIdentifier;
use crate::bytes;
use crate::error::{Error, Result};
use crate::mark::Marks;

const CHILD_OFFSET: usize = 12;
const UNUSED_OFFSET: usize = 3;
const UPDATE_SEQ_OFFSET: usize = 4;
const TIMESTAMP_OFFSET: usize = 6;
// The level byte sits at a different position in the two pointer shapes.
const OVERFLOW_LEVEL_OFFSET: usize = 1;
const ROOT_LEVEL_OFFSET: usize = 2;

const OVERFLOW_FIELD_SIZE: usize = 24;
const LINK_SIZE: usize = 12;

pub const OVERFLOW_POINTER_TYPE: u8 = 2;
pub const ROOT_POINTER_TYPE: u8 = 1;

/// A link to one off-row fragment: where it lives and how long it claims
/// to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobChildLink {
    pub row_identifier: RowIdentifier,
    pub length: i32,
}

/// Single-fragment overflow pointer: always 24 bytes, always one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowField {
    pub pointer_type: u8,
    pub level: u8,
    pub unused: u8,
    pub update_seq: i16,
    pub timestamp: u32,
    pub length: i32,
    pub links: Vec<BlobChildLink>,
}

/// Root pointer with `(byte_length - 12) / 12` child links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootField {
    pub pointer_type: u8,
    pub level: u8,
    pub unused: u8,
    pub update_seq: i16,
    pub timestamp: u32,
    pub links: Vec<BlobChildLink>,
}

/// A decoded LOB pointer of either shape, or a placeholder for a pointer
/// type byte this decoder does not recognize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobPointer {
    Overflow(OverflowField),
    Root(RootField),
    Unknown { pointer_type: u8 },
}

/// Decode an overflow pointer. `offset` is the field's position within the
/// page, used only for provenance marks; `data` is the field's bytes and
/// must be exactly 24 long.
pub fn load_overflow_field(data: &[u8], offset: usize, marks: &mut Marks) -> Result<OverflowField> {
    if data.len() != OVERFLOW_FIELD_SIZE {
        return Err(Error::Truncated {
            context: "overflow field",
            offset,
            expected: OVERFLOW_FIELD_SIZE,
            actual: data.len(),
        });
    }

    let context = "overflow field";
    marks.push("pointer type", offset, 1);
    marks.push("level", offset + OVERFLOW_LEVEL_OFFSET, 1);
    marks.push("unused", offset + UNUSED_OFFSET, 1);
    marks.push("update seq", offset + UPDATE_SEQ_OFFSET, 2);
    marks.push("timestamp", offset + TIMESTAMP_OFFSET, 4);
    marks.push("length", offset + CHILD_OFFSET, 4);
    marks.push("row identifier", offset + CHILD_OFFSET + 4, RowIdentifier::SIZE);

    let length = bytes::i32_at(data, CHILD_OFFSET, context)?;
    let row_identifier = RowIdentifier::parse(data, CHILD_OFFSET + 4, context)?;

    Ok(OverflowField {
        pointer_type: data[0],
        level: data[OVERFLOW_LEVEL_OFFSET],
        unused: data[UNUSED_OFFSET],
        update_seq: bytes::i16_at(data, UPDATE_SEQ_OFFSET, context)?,
        timestamp: bytes::u32_at(data, TIMESTAMP_OFFSET, context)?,
        length,
        links: vec![BlobChildLink {
            row_identifier,
            length,
        }],
    })
}

/// Decode a root pointer. Link count is derived from the byte length.
pub fn load_root_field(data: &[u8], offset: usize, marks: &mut Marks) -> Result<RootField> {
    if data.len() < CHILD_OFFSET {
        return Err(Error::Truncated {
            context: "root field",
            offset,
            expected: CHILD_OFFSET,
            actual: data.len(),
        });
    }

    let context = "root field";
    marks.push("pointer type", offset, 1);
    marks.push("level", offset + ROOT_LEVEL_OFFSET, 1);
    marks.push("unused", offset + UNUSED_OFFSET, 1);
    marks.push("update seq", offset + UPDATE_SEQ_OFFSET, 2);
    marks.push("timestamp", offset + TIMESTAMP_OFFSET, 4);

    let link_count = (data.len() - CHILD_OFFSET) / LINK_SIZE;
    let mut links = Vec::with_capacity(link_count);

    for index in 0..link_count {
        let at = CHILD_OFFSET + index * LINK_SIZE;
        let length = bytes::i32_at(data, at, context)?;
        let row_identifier = RowIdentifier::parse(data, at + 4, context)?;
        marks.push(format!("child {index} length"), offset + at, 4);
        marks.push(
            format!("child {index} row identifier"),
            offset + at + 4,
            RowIdentifier::SIZE,
        );
        links.push(BlobChildLink {
            row_identifier,
            length,
        });
    }

    Ok(RootField {
        pointer_type: data[0],
        level: data[ROOT_LEVEL_OFFSET],
        unused: data[UNUSED_OFFSET],
        update_seq: bytes::i16_at(data, UPDATE_SEQ_OFFSET, context)?,
        timestamp: bytes::u32_at(data, TIMESTAMP_OFFSET, context)?,
        links,
    })
}

/// Dispatch on the pointer type byte. Unrecognized types decode to
/// [`LobPointer::Unknown`] so a foreign pointer never aborts sibling fields.
pub fn load_lob_pointer(data: &[u8], offset: usize, marks: &mut Marks) -> Result<LobPointer> {
    let pointer_type = bytes::u8_at(data, 0, "lob pointer")?;
    match pointer_type {
        OVERFLOW_POINTER_TYPE => Ok(LobPointer::Overflow(load_overflow_field(
            data, offset, marks,
        )?)),
        ROOT_POINTER_TYPE => Ok(LobPointer::Root(load_root_field(data, offset, marks)?)),
        other => Ok(LobPointer::Unknown {
            pointer_type: other,
        }),
    }
}
