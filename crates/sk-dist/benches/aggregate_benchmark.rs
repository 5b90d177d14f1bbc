use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sk_dist::{aggregate, SelfComm};

fn bench_aggregate(c: &mut Criterion) {
    let comm = SelfComm;

    // Heavy duplication: many particles per pixel, as in a dense sky slice.
    let npix = 12 * 256 * 256u64;
    let pix: Vec<u64> = (0..500_000).map(|i| (i * 7919) % npix).collect();
    let weights: Vec<f64> = (0..500_000).map(|i| (i % 13) as f64 * 0.1).collect();

    c.bench_function("aggregate_500k_nside256", |b| {
        b.iter(|| aggregate(black_box(&pix), black_box(&weights), npix, &comm).unwrap())
    });

    // Sparse touch: few pixels hit, exercises the zero-fill path.
    let sparse_pix: Vec<u64> = (0..10_000).map(|i| (i % 64) as u64).collect();
    let sparse_w: Vec<f64> = vec![1.0; 10_000];

    c.bench_function("aggregate_sparse_nside256", |b| {
        b.iter(|| aggregate(black_box(&sparse_pix), black_box(&sparse_w), npix, &comm).unwrap())
    });
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
