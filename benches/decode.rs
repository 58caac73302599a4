use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mdf_internals::allocation::PfsByte;
use mdf_internals::page::{PageHeader, PAGE_SIZE};
use mdf_internals::records::load_data_record;
use mdf_internals::schema::{ColumnStructure, DataKind, IndexKind, TableStructure};
use mdf_internals::Page;

fn header_buffer() -> Vec<u8> {
    let mut data = vec![0u8; PAGE_SIZE];
    data[0] = 1;
    data[1] = 1; // data page
    data[22..24].copy_from_slice(&1u16.to_le_bytes());
    data[24..28].copy_from_slice(&245575913i32.to_le_bytes());
    data[32..36].copy_from_slice(&1000u32.to_le_bytes());
    data[36..38].copy_from_slice(&1u16.to_le_bytes());
    data
}

fn fixture_table() -> TableStructure {
    let column = |name: &str, column_id: i32, leaf_offset: i16, null_bit: i16| ColumnStructure {
        column_id,
        name: name.to_string(),
        data_kind: DataKind::Int,
        data_length: 4,
        precision: 0,
        scale: 0,
        leaf_offset,
        node_offset: leaf_offset,
        null_bit,
        is_dropped: false,
        is_uniqueifier: false,
        is_sparse: false,
        is_key: false,
    };

    TableStructure {
        allocation_unit_id: 1,
        object_id: 100,
        index_id: 0,
        partition_id: 1,
        index_kind: IndexKind::Heap,
        compression: Default::default(),
        columns: vec![
            column("a", 1, 4, 1),
            column("b", 2, 8, 2),
            column("c", 3, 12, 3),
        ],
    }
}

fn fixture_page() -> Page {
    let mut data = header_buffer();
    let record = 200usize;
    data[record] = 0x10; // primary, has null bitmap
    data[record + 2..record + 4].copy_from_slice(&16u16.to_le_bytes());
    data[record + 4..record + 8].copy_from_slice(&1i32.to_le_bytes());
    data[record + 8..record + 12].copy_from_slice(&2i32.to_le_bytes());
    data[record + 12..record + 16].copy_from_slice(&3i32.to_le_bytes());
    data[record + 16..record + 18].copy_from_slice(&3i16.to_le_bytes());
    data[PAGE_SIZE - 2..].copy_from_slice(&(record as u16).to_le_bytes());
    Page::parse(data).unwrap()
}

fn bench_header_parse(c: &mut Criterion) {
    let data = header_buffer();
    c.bench_function("page_header_parse", |b| {
        b.iter(|| PageHeader::parse(black_box(&data)).unwrap())
    });
}

fn bench_pfs_round_trip(c: &mut Criterion) {
    c.bench_function("pfs_byte_round_trip", |b| {
        b.iter(|| {
            for value in 0u8..=0x7f {
                let decoded = PfsByte::decode(black_box(value));
                black_box(decoded.encode());
            }
        })
    });
}

fn bench_data_record_decode(c: &mut Criterion) {
    let page = fixture_page();
    let structure = fixture_table();
    c.bench_function("data_record_decode", |b| {
        b.iter(|| load_data_record(black_box(&page), 0, &structure).unwrap())
    });
}

criterion_group!(
    benches,
    bench_header_parse,
    bench_pfs_round_trip,
    bench_data_record_decode
);
criterion_main!(benches);
