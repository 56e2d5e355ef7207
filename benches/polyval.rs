//! POLYVAL benchmarks.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polyeval::{Key, Polyval};

fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("polyval");

    for size in &[16usize, 64, 256, 1024, 4096, 8192] {
        let buf = vec![0u8; *size];

        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_function(BenchmarkId::new("update_padded", size), |b| {
            let key = Key::new(&[1u8; 16]).expect("non-zero key");
            let mut m = Polyval::new(&key);
            b.iter(|| m.update_padded(&buf));
        });
    }

    group.finish();
}

criterion_group!(benches, bench);
criterion_main!(benches);
