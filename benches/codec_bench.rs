use chronofile::codec::{decode_block, encode_block, CodecKind};
use chronofile::record::FieldValue;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn price_kind() -> CodecKind {
    CodecKind::Composite(vec![
        CodecKind::Timestamp,
        CodecKind::MultipliedDelta { multiplier: 10_000, divisor: 1, bits: 40 },
    ])
}

fn price_items(n: usize) -> Vec<Vec<FieldValue>> {
    (0..n as i64)
        .map(|i| vec![FieldValue::Timestamp(1000 + i * 600_000_000), FieldValue::F64(1.2345 + i as f64 * 0.0001)])
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let kind = price_kind();
    let items = price_items(4096);

    c.bench_function("encode_block_4096_composite_items", |b| {
        b.iter(|| encode_block(black_box(&kind), black_box(&items), 1 << 20).unwrap())
    });

    let block = encode_block(&kind, &items, 1 << 20).unwrap();
    c.bench_function("decode_block_4096_composite_items", |b| {
        b.iter(|| decode_block(black_box(&kind), black_box(&block.bytes)).unwrap())
    });

    let timestamp_kind = CodecKind::Timestamp;
    let timestamps: Vec<Vec<FieldValue>> = (0..4096i64).map(|i| vec![FieldValue::Timestamp(i * 1_000_000)]).collect();
    c.bench_function("encode_block_4096_timestamps", |b| {
        b.iter(|| encode_block(black_box(&timestamp_kind), black_box(&timestamps), 1 << 20).unwrap())
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
