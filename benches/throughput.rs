use belog::segment::IntoSegment;
use belog::SpscRingBuffer;
use criterion::{criterion_group, criterion_main, Criterion};

fn bench_ring_roundtrip(c: &mut Criterion) {
    let ring = SpscRingBuffer::<20>::new().expect("alloc");

    c.bench_function("spsc_produce_consume_64b", |b| {
        b.iter(|| {
            assert!(ring.produce(64, |buf| {
                buf.fill(0x11);
                true
            }));
            assert!(ring.consume(|_| true));
        })
    });
}

fn bench_segment_encode(c: &mut Criterion) {
    let mut buf = [0u8; 64];

    c.bench_function("encode_int_segment", |b| {
        b.iter(|| 12345678i64.into_segment().encode(&mut buf))
    });

    c.bench_function("encode_literal_segment", |b| {
        b.iter(|| "a static piece of a line".into_segment().encode(&mut buf))
    });
}

criterion_group!(benches, bench_ring_roundtrip, bench_segment_encode);
criterion_main!(benches);
