//! Page-compression decoding: the CI record, its anchor and dictionary,
//! and per-slot CD records.
//!
//! A page compressed at PAGE level carries a compression-info (CI) record
//! at a fixed offset. Row values are CD records: a 4-bit descriptor per
//! column says how the value is stored (inline short form, dictionary
//! symbol, long region, or omitted and deferred to the anchor record,
//! which supplies the per-column defaults the deltas are taken against).

use tracing::debug;

use crate::bytes::{self, bit};
use crate::error::{Error, Result};
use crate::mark::Marks;
use crate::page::Page;
use crate::records::RecordField;
use crate::schema::TableStructure;

/// The CI record always sits at the start of the record space, before any
/// slot the offset table names.
pub const CI_SLOT_OFFSET: usize = 96;

/// How one column's value is stored in a CD record, from its 4-bit
/// descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdDescriptor {
    /// Not stored; the anchor record supplies the value when present.
    Null,
    /// The value is zero; no bytes stored.
    ZeroByte,
    /// Inline value of the given byte length (descriptors 2 through 9
    /// encode lengths 1 through 8).
    Short(u8),
    /// Stored in the trailing long data region.
    Long,
    /// A true bit; no bytes stored.
    BitTrue,
    /// One stored byte indexing the page dictionary.
    PageSymbol,
    Unknown(u8),
}

impl CdDescriptor {
    pub fn from_nibble(nibble: u8) -> CdDescriptor {
        match nibble {
            0 => CdDescriptor::Null,
            1 => CdDescriptor::ZeroByte,
            2..=9 => CdDescriptor::Short(nibble - 1),
            10 => CdDescriptor::Long,
            11 => CdDescriptor::BitTrue,
            12 => CdDescriptor::PageSymbol,
            other => CdDescriptor::Unknown(other),
        }
    }

    /// Bytes the descriptor stores in the short data region.
    fn short_length(&self) -> usize {
        match self {
            CdDescriptor::Short(length) => *length as usize,
            CdDescriptor::PageSymbol => 1,
            _ => 0,
        }
    }
}

/// Shared byte sequences referenced by `PageSymbol` descriptors.
#[derive(Debug)]
pub struct Dictionary<'a> {
    pub entries: Vec<&'a [u8]>,
}

impl<'a> Dictionary<'a> {
    pub fn entry(&self, index: usize) -> Option<&'a [u8]> {
        self.entries.get(index).copied()
    }
}

/// Decode a dictionary at `offset`: u16 entry count, u16 end offsets
/// (relative to the packed entry bytes that follow the array), then the
/// entries back to back.
pub fn load_dictionary<'a>(
    data: &'a [u8],
    offset: usize,
    marks: &mut Marks,
) -> Result<Dictionary<'a>> {
    let count = bytes::u16_at(data, offset, "dictionary entry count")? as usize;
    marks.push("dictionary entry count", offset, 2);

    let mut ends = Vec::with_capacity(count);
    for index in 0..count {
        ends.push(bytes::u16_at(data, offset + 2 + index * 2, "dictionary entry offsets")? as usize);
    }
    marks.push("dictionary entry offsets", offset + 2, count * 2);

    let entries_offset = offset + 2 + count * 2;
    let mut entries = Vec::with_capacity(count);
    let mut previous_end = 0usize;

    for (index, &end) in ends.iter().enumerate() {
        if end < previous_end {
            return Err(Error::malformed(
                entries_offset + previous_end,
                format!("dictionary entry {index} end offset {end} precedes {previous_end}"),
            ));
        }
        let entry = bytes::slice_at(
            data,
            entries_offset + previous_end,
            end - previous_end,
            "dictionary entry",
        )?;
        marks.push(
            format!("dictionary entry {index}"),
            entries_offset + previous_end,
            end - previous_end,
        );
        entries.push(entry);
        previous_end = end;
    }

    Ok(Dictionary { entries })
}

/// A decoded CD record. Fields borrow the page buffer (or, for deferred
/// values, the anchor record's bytes within the same page).
#[derive(Debug)]
pub struct CompressedDataRecord<'a> {
    pub slot_offset: usize,
    pub header: u8,
    pub column_count: usize,
    pub descriptors: Vec<CdDescriptor>,
    pub fields: Vec<RecordField<'a>>,
}

impl<'a> CompressedDataRecord<'a> {
    pub fn field(&self, name: &str) -> Option<&RecordField<'a>> {
        self.fields.iter().find(|f| f.name() == name)
    }
}

/// Decode a CD record at `offset` within the page buffer.
///
/// `anchor` supplies values for `Null` descriptors (delta encoding);
/// `dictionary` resolves `PageSymbol` references. The anchor record itself
/// is decoded with neither.
pub fn parse_cd_record<'a>(
    data: &'a [u8],
    offset: usize,
    structure: &'a TableStructure,
    anchor: Option<&CompressedDataRecord<'a>>,
    dictionary: Option<&Dictionary<'a>>,
    marks: &mut Marks,
) -> Result<CompressedDataRecord<'a>> {
    let header = bytes::u8_at(data, offset, "cd record header")?;
    marks.push("cd record header", offset, 1);

    // One count byte, or two with the first byte's top bit set.
    let first = bytes::u8_at(data, offset + 1, "cd column count")?;
    let (column_count, count_size) = if first & 0x80 != 0 {
        let second = bytes::u8_at(data, offset + 2, "cd column count")?;
        ((((first & 0x7f) as usize) << 8) | second as usize, 2usize)
    } else {
        (first as usize, 1usize)
    };
    marks.push("cd column count", offset + 1, count_size);

    let cd_array_offset = offset + 1 + count_size;
    let cd_array_size = column_count.div_ceil(2);
    let cd_array = bytes::slice_at(data, cd_array_offset, cd_array_size, "cd array")?;
    marks.push("cd array", cd_array_offset, cd_array_size);

    // Low nibble first: column 2i in the low nibble of byte i, column 2i+1
    // in the high nibble.
    let descriptors: Vec<CdDescriptor> = (0..column_count)
        .map(|index| {
            let byte = cd_array[index / 2];
            let nibble = if index % 2 == 0 { byte & 0x0f } else { byte >> 4 };
            CdDescriptor::from_nibble(nibble)
        })
        .collect();

    // Short values are packed after the CD array in column order.
    let mut cursor = cd_array_offset + cd_array_size;
    let mut short_ranges = Vec::with_capacity(column_count);
    for descriptor in &descriptors {
        let length = descriptor.short_length();
        short_ranges.push((cursor, length));
        cursor += length;
    }

    // Long values live in a trailing region shaped like the dictionary:
    // u16 count, u16 end offsets, packed bytes.
    let long_count = descriptors
        .iter()
        .filter(|d| matches!(d, CdDescriptor::Long))
        .count();
    let mut long_slices: Vec<(usize, &'a [u8])> = Vec::with_capacity(long_count);
    if long_count > 0 {
        let declared = bytes::u16_at(data, cursor, "long region count")? as usize;
        marks.push("long region count", cursor, 2);
        if declared != long_count {
            return Err(Error::malformed(
                cursor,
                format!("long region declares {declared} entries, descriptors need {long_count}"),
            ));
        }

        let mut ends = Vec::with_capacity(long_count);
        for index in 0..long_count {
            ends.push(bytes::u16_at(data, cursor + 2 + index * 2, "long region offsets")? as usize);
        }
        marks.push("long region offsets", cursor + 2, long_count * 2);

        let entries_offset = cursor + 2 + long_count * 2;
        let mut previous_end = 0usize;
        for (index, &end) in ends.iter().enumerate() {
            if end < previous_end {
                return Err(Error::malformed(
                    entries_offset + previous_end,
                    format!("long value {index} end offset {end} precedes {previous_end}"),
                ));
            }
            let position = entries_offset + previous_end;
            long_slices.push((
                position,
                bytes::slice_at(data, position, end - previous_end, "long value")?,
            ));
            previous_end = end;
        }
    }

    debug!(offset, column_count, long_count, "cd record layout");

    let mut fields = Vec::with_capacity(column_count);
    let mut long_index = 0usize;

    for (index, descriptor) in descriptors.iter().enumerate() {
        let column = structure
            .columns
            .get(index)
            .ok_or(Error::SchemaMismatch {
                kind: "compressed column",
                key: index as i64,
            })?;

        let (short_offset, short_length) = short_ranges[index];

        let field = match descriptor {
            CdDescriptor::Null => match anchor.and_then(|a| a.fields.get(index)) {
                Some(anchor_field) => {
                    let mut field = anchor_field.clone();
                    field.column = column;
                    field
                }
                None => RecordField::absent(column),
            },
            CdDescriptor::ZeroByte | CdDescriptor::BitTrue | CdDescriptor::Unknown(_) => {
                RecordField::absent(column)
            }
            CdDescriptor::Short(_) => {
                let slice = bytes::slice_at(data, short_offset, short_length, "short value")?;
                marks.push(&column.name, short_offset, short_length);
                RecordField {
                    column,
                    data: slice,
                    offset: short_offset - offset,
                    length: short_length,
                    is_sparse: false,
                    variable_index: None,
                    lob: None,
                }
            }
            CdDescriptor::PageSymbol => {
                let symbol = bytes::u8_at(data, short_offset, "page symbol")? as usize;
                marks.push("page symbol", short_offset, 1);
                let entry = dictionary
                    .and_then(|d| d.entry(symbol))
                    .ok_or_else(|| {
                        Error::malformed(
                            short_offset,
                            format!("page symbol {symbol} has no dictionary entry"),
                        )
                    })?;
                RecordField {
                    column,
                    data: entry,
                    offset: short_offset - offset,
                    length: entry.len(),
                    is_sparse: false,
                    variable_index: None,
                    lob: None,
                }
            }
            CdDescriptor::Long => {
                let (position, slice) = long_slices[long_index];
                long_index += 1;
                marks.push(&column.name, position, slice.len());
                RecordField {
                    column,
                    data: slice,
                    offset: position - offset,
                    length: slice.len(),
                    is_sparse: false,
                    variable_index: None,
                    lob: None,
                }
            }
        };

        fields.push(field);
    }

    Ok(CompressedDataRecord {
        slot_offset: offset,
        header,
        column_count,
        descriptors,
        fields,
    })
}

/// The page-level compression-info record.
#[derive(Debug)]
pub struct CompressionInfo<'a> {
    pub header: u8,
    pub has_anchor_record: bool,
    pub has_dictionary: bool,
    pub page_modification_count: i16,
    pub length: u16,
    pub size: i16,
    pub anchor_record: Option<CompressedDataRecord<'a>>,
    pub dictionary: Option<Dictionary<'a>>,
    pub marks: Marks,
}

/// Decode the CI record of a page-compressed page: header byte, page
/// modification count, length and size, then the anchor record and the
/// dictionary when the header flags say they are present. The dictionary
/// starts `size` bytes after the CI record itself.
pub fn load_compression_info<'a>(
    page: &'a Page,
    structure: &'a TableStructure,
) -> Result<CompressionInfo<'a>> {
    let data = page.data();
    let mut marks = Marks::new();

    let header = bytes::u8_at(data, CI_SLOT_OFFSET, "ci header")?;
    marks.push("ci header", CI_SLOT_OFFSET, 1);

    let has_anchor_record = bit(header, 1);
    let has_dictionary = bit(header, 2);

    let page_modification_count =
        bytes::i16_at(data, CI_SLOT_OFFSET + 1, "page modification count")?;
    marks.push("page modification count", CI_SLOT_OFFSET + 1, 2);

    let length = bytes::u16_at(data, CI_SLOT_OFFSET + 3, "ci length")?;
    marks.push("ci length", CI_SLOT_OFFSET + 3, 2);

    let size = bytes::i16_at(data, CI_SLOT_OFFSET + 5, "ci size")?;
    marks.push("ci size", CI_SLOT_OFFSET + 5, 2);

    if size < 0 {
        return Err(Error::malformed(
            CI_SLOT_OFFSET + 5,
            format!("negative ci size {size}"),
        ));
    }

    debug!(has_anchor_record, has_dictionary, size, "ci record");

    let anchor_record = if has_anchor_record {
        Some(parse_cd_record(
            data,
            CI_SLOT_OFFSET + 7,
            structure,
            None,
            None,
            &mut marks,
        )?)
    } else {
        None
    };

    let dictionary = if has_dictionary {
        Some(load_dictionary(
            data,
            CI_SLOT_OFFSET + size as usize,
            &mut marks,
        )?)
    } else {
        None
    };

    Ok(CompressionInfo {
        header,
        has_anchor_record,
        has_dictionary,
        page_modification_count,
        length,
        size,
        anchor_record,
        dictionary,
        marks,
    })
}

/// Decode the CD record in `slot`, resolving nulls and symbols through the
/// page's compression info.
pub fn load_compressed_record<'a>(
    page: &'a Page,
    slot: usize,
    structure: &'a TableStructure,
    info: &CompressionInfo<'a>,
) -> Result<(CompressedDataRecord<'a>, Marks)> {
    let slot_offset = page
        .slot_offset(slot)
        .ok_or_else(|| Error::malformed(0, format!("slot {slot} not in page")))?
        as usize;

    let mut marks = Marks::new();
    let record = parse_cd_record(
        page.data(),
        slot_offset,
        structure,
        info.anchor_record.as_ref(),
        info.dictionary.as_ref(),
        &mut marks,
    )?;

    Ok((record, marks))
}

#[cfg(test)]
mod compressed_tests {
    use super::*;
    use crate::page::PAGE_SIZE;
    use crate::schema::{ColumnStructure, DataKind, IndexKind};

    fn column(name: &str, column_id: i32) -> ColumnStructure {
        ColumnStructure {
            column_id,
            name: name.to_string(),
            data_kind: DataKind::Int,
            data_length: 4,
            precision: 0,
            scale: 0,
            leaf_offset: 0,
            node_offset: 0,
            null_bit: 0,
            is_dropped: false,
            is_uniqueifier: false,
            is_sparse: false,
            is_key: false,
        }
    }

    fn table(columns: Vec<ColumnStructure>) -> TableStructure {
        TableStructure {
            allocation_unit_id: 1,
            object_id: 100,
            index_id: 0,
            partition_id: 1,
            index_kind: IndexKind::Clustered,
            compression: crate::schema::CompressionLevel::Page,
            columns,
        }
    }

    #[test]
    fn descriptor_nibble_values() {
        assert_eq!(CdDescriptor::from_nibble(0), CdDescriptor::Null);
        assert_eq!(CdDescriptor::from_nibble(1), CdDescriptor::ZeroByte);
        assert_eq!(CdDescriptor::from_nibble(2), CdDescriptor::Short(1));
        assert_eq!(CdDescriptor::from_nibble(9), CdDescriptor::Short(8));
        assert_eq!(CdDescriptor::from_nibble(10), CdDescriptor::Long);
        assert_eq!(CdDescriptor::from_nibble(11), CdDescriptor::BitTrue);
        assert_eq!(CdDescriptor::from_nibble(12), CdDescriptor::PageSymbol);
        assert_eq!(CdDescriptor::from_nibble(13), CdDescriptor::Unknown(13));
    }

    #[test]
    fn cd_array_is_low_nibble_first() {
        // Three columns: Short(4), Null, ZeroByte. Nibbles 5, 0, 1 packed
        // as [0x05, 0x01].
        let mut data = vec![0u8; 32];
        data[1] = 3; // column count
        data[2] = 0x05;
        data[3] = 0x01;
        data[4..8].copy_from_slice(&9i32.to_le_bytes());

        let structure = table(vec![column("a", 1), column("b", 2), column("c", 3)]);
        let mut marks = Marks::new();
        let record = parse_cd_record(&data, 0, &structure, None, None, &mut marks).unwrap();

        assert_eq!(
            record.descriptors,
            vec![
                CdDescriptor::Short(4),
                CdDescriptor::Null,
                CdDescriptor::ZeroByte
            ]
        );
        assert_eq!(record.fields[0].data, &9i32.to_le_bytes());
        assert!(record.fields[1].is_absent());
        assert!(record.fields[2].is_absent());
    }

    #[test]
    fn two_byte_column_count() {
        // Top bit set on the first count byte: count = 0x0103 = 259.
        let mut data = vec![0u8; 1024];
        data[1] = 0x81;
        data[2] = 0x03;
        // 259 Null descriptors, CD array is ceil(259/2) = 130 zero bytes.
        let columns: Vec<_> = (0..259).map(|i| column(&format!("c{i}"), i)).collect();
        let structure = table(columns);
        let mut marks = Marks::new();
        let record = parse_cd_record(&data, 0, &structure, None, None, &mut marks).unwrap();
        assert_eq!(record.column_count, 259);
        assert!(record.fields.iter().all(|f| f.is_absent()));
    }

    #[test]
    fn long_values_come_from_the_trailing_region() {
        // Two Long columns: nibbles 0xA, 0xA -> one 0xAA byte; no short
        // data; long region: count 2, ends [3, 5], bytes "abcde".
        let mut data = vec![0u8; 32];
        data[1] = 2;
        data[2] = 0xAA;
        data[3..5].copy_from_slice(&2u16.to_le_bytes());
        data[5..7].copy_from_slice(&3u16.to_le_bytes());
        data[7..9].copy_from_slice(&5u16.to_le_bytes());
        data[9..14].copy_from_slice(b"abcde");

        let structure = table(vec![column("a", 1), column("b", 2)]);
        let mut marks = Marks::new();
        let record = parse_cd_record(&data, 0, &structure, None, None, &mut marks).unwrap();

        assert_eq!(record.fields[0].data, b"abc");
        assert_eq!(record.fields[1].data, b"de");
    }

    #[test]
    fn page_symbol_resolves_through_dictionary() {
        // Dictionary with one 3-byte entry, record with one PageSymbol
        // column referencing entry 0.
        let mut dict_data = vec![0u8; 16];
        dict_data[0..2].copy_from_slice(&1u16.to_le_bytes());
        dict_data[2..4].copy_from_slice(&3u16.to_le_bytes());
        dict_data[4..7].copy_from_slice(b"xyz");
        let mut marks = Marks::new();
        let dictionary = load_dictionary(&dict_data, 0, &mut marks).unwrap();
        assert_eq!(dictionary.entries, vec![b"xyz".as_slice()]);

        let mut data = vec![0u8; 8];
        data[1] = 1;
        data[2] = 0x0C; // PageSymbol
        data[3] = 0; // symbol index

        let structure = table(vec![column("a", 1)]);
        let record =
            parse_cd_record(&data, 0, &structure, None, Some(&dictionary), &mut marks).unwrap();
        assert_eq!(record.fields[0].data, b"xyz");
    }

    #[test]
    fn missing_dictionary_entry_is_malformed() {
        let mut data = vec![0u8; 8];
        data[1] = 1;
        data[2] = 0x0C;
        data[3] = 4; // no dictionary at all

        let structure = table(vec![column("a", 1)]);
        let mut marks = Marks::new();
        assert!(matches!(
            parse_cd_record(&data, 0, &structure, None, None, &mut marks),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn null_descriptor_falls_back_to_anchor() {
        let structure = table(vec![column("a", 1)]);

        // Anchor: one Short(4) value.
        let mut anchor_data = vec![0u8; 8];
        anchor_data[1] = 1;
        anchor_data[2] = 0x05;
        anchor_data[3..7].copy_from_slice(&42i32.to_le_bytes());
        let mut marks = Marks::new();
        let anchor = parse_cd_record(&anchor_data, 0, &structure, None, None, &mut marks).unwrap();

        // Record: Null descriptor.
        let mut data = vec![0u8; 4];
        data[1] = 1;
        data[2] = 0x00;
        let record =
            parse_cd_record(&data, 0, &structure, Some(&anchor), None, &mut marks).unwrap();
        assert_eq!(record.fields[0].data, &42i32.to_le_bytes());
    }

    #[test]
    fn compression_info_with_anchor_and_dictionary() {
        let mut data = vec![0u8; PAGE_SIZE];
        data[1] = 1; // data page
        data[96] = 0x06; // has anchor + has dictionary
        data[97..99].copy_from_slice(&3i16.to_le_bytes()); // page mod count
        data[99..101].copy_from_slice(&20u16.to_le_bytes()); // ci length
        data[101..103].copy_from_slice(&14i16.to_le_bytes()); // ci size
        // Anchor at 103: header, count 1, Short(4), 4 bytes.
        data[104] = 1;
        data[105] = 0x05;
        data[106..110].copy_from_slice(&7i32.to_le_bytes());
        // Dictionary at 96 + 14 = 110: one 2-byte entry.
        data[110..112].copy_from_slice(&1u16.to_le_bytes());
        data[112..114].copy_from_slice(&2u16.to_le_bytes());
        data[114..116].copy_from_slice(b"hi");

        let page = Page::parse(data).unwrap();
        let structure = table(vec![column("a", 1)]);
        let info = load_compression_info(&page, &structure).unwrap();

        assert!(info.has_anchor_record);
        assert!(info.has_dictionary);
        assert_eq!(info.page_modification_count, 3);
        assert_eq!(info.size, 14);
        assert_eq!(
            info.anchor_record.as_ref().unwrap().fields[0].data,
            &7i32.to_le_bytes()
        );
        assert_eq!(info.dictionary.as_ref().unwrap().entries, vec![b"hi".as_slice()]);
    }

    #[test]
    fn compressed_slot_resolves_null_and_symbol_through_info() {
        let mut data = vec![0u8; PAGE_SIZE];
        data[1] = 1;
        data[22..24].copy_from_slice(&1u16.to_le_bytes()); // one slot
        data[96] = 0x06;
        data[101..103].copy_from_slice(&14i16.to_le_bytes());
        // Anchor: two columns, Short(4) then Null.
        data[104] = 2;
        data[105] = 0x05; // low nibble Short(4), high nibble Null
        data[106..110].copy_from_slice(&100i32.to_le_bytes());
        // Dictionary at 110: one entry "ab".
        data[110..112].copy_from_slice(&1u16.to_le_bytes());
        data[112..114].copy_from_slice(&2u16.to_le_bytes());
        data[114..116].copy_from_slice(b"ab");
        // Slot 0 record at 200: Null (anchor fallback) + PageSymbol.
        data[200] = 0;
        data[201] = 2;
        data[202] = 0xC0; // low nibble Null, high nibble PageSymbol
        data[203] = 0; // symbol
        data[PAGE_SIZE - 2..].copy_from_slice(&200u16.to_le_bytes());

        let page = Page::parse(data).unwrap();
        let structure = table(vec![column("a", 1), column("b", 2)]);
        let info = load_compression_info(&page, &structure).unwrap();

        let (record, _marks) = load_compressed_record(&page, 0, &structure, &info).unwrap();
        assert_eq!(record.field("a").unwrap().data, &100i32.to_le_bytes());
        assert_eq!(record.field("b").unwrap().data, b"ab");
    }
}
