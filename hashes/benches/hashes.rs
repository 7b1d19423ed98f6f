use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wallet_core_hashes::{blake256, blake256d};

fn bench_blake256(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake256");

    for (size, label) in [(10, "10b"), (1024, "1k"), (65536, "64k")] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, &size| {
            let mut engine = blake256::Hash::engine();
            let bytes = vec![1u8; size];
            b.iter(|| {
                engine.input(&bytes);
                black_box(&engine);
            });
        });
    }
    group.finish();
}

fn bench_blake256d(c: &mut Criterion) {
    let mut group = c.benchmark_group("blake256d");

    for (size, label) in [(10, "10b"), (1024, "1k"), (65536, "64k")] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, &size| {
            let bytes = vec![1u8; size];
            b.iter(|| black_box(blake256d::Hash::hash(&bytes)));
        });
    }
    group.finish();
}

criterion_group!(hash_benches, bench_blake256, bench_blake256d);
criterion_main!(hash_benches);
