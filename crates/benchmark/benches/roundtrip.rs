#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput};
use relink_benchmark::{create_codec, forest, ring};

#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

const SIZES: [usize; 3] = [16, 64, 128];

fn bench_encode(c: &mut Criterion) {
    let codec = create_codec();
    let mut group = c.benchmark_group("encode");

    for size in SIZES {
        let graph = ring(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("ring", size), &graph, |b, g| {
            b.iter(|| codec.encode(g).unwrap());
        });

        let graph = forest(size, 32);
        group.bench_with_input(
            BenchmarkId::new("forest", size),
            &graph,
            |b, g| b.iter(|| codec.encode(g).unwrap()),
        );
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let codec = create_codec();
    let mut group = c.benchmark_group("decode");

    for size in SIZES {
        let node = codec.encode(&ring(size)).unwrap();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("ring", size), &node, |b, n| {
            b.iter(|| codec.decode(n).unwrap());
        });
    }

    group.finish();
}

fn bench_formats(c: &mut Criterion) {
    let codec = create_codec();
    // each ring node adds three levels of JSON nesting, and serde_json
    // stops parsing at 128
    let node = codec.encode(&ring(32)).unwrap();
    let bytes = codec.to_bytes(&node).unwrap();
    let text = relink::envelope::to_string(&node);

    let mut group = c.benchmark_group("formats");
    group.bench_function("wire_write", |b| {
        b.iter(|| codec.to_bytes(&node).unwrap());
    });
    group.bench_function("wire_read", |b| {
        b.iter(|| codec.from_bytes(&bytes).unwrap());
    });
    group.bench_function("envelope_write", |b| {
        b.iter(|| relink::envelope::to_string(&node));
    });
    group.bench_function("envelope_read", |b| {
        b.iter(|| relink::envelope::from_str(&text).unwrap());
    });
    group.finish();
}

criterion::criterion_group!(benches, bench_encode, bench_decode, bench_formats);
criterion::criterion_main!(benches);
