use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use vicinity::{Index, IndexOptions, Kernel, MetricKind, ScalarKind};

fn f32_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn random_bytes(rng: &mut SmallRng, dims: usize) -> Vec<u8> {
    let v: Vec<f32> = (0..dims).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
    f32_bytes(&v)
}

fn bench_kernels(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(1);
    let a = random_bytes(&mut rng, 256);
    let b = random_bytes(&mut rng, 256);

    let cosine = Kernel::bind(ScalarKind::F32, MetricKind::Cosine).unwrap();
    c.bench_function("cosine_f32_256d", |bench| {
        bench.iter(|| cosine.distance(black_box(&a), black_box(&b)))
    });

    let l2 = Kernel::bind(ScalarKind::F32, MetricKind::SqEuclidean).unwrap();
    c.bench_function("sqeuclidean_f32_256d", |bench| {
        bench.iter(|| l2.distance(black_box(&a), black_box(&b)))
    });
}

fn bench_search(c: &mut Criterion) {
    let mut rng = SmallRng::seed_from_u64(2);
    let index = Index::new(IndexOptions {
        dims: 128,
        metric: MetricKind::Cosine,
        ..IndexOptions::default()
    })
    .unwrap();
    for i in 0..5_000u64 {
        index.insert(i, &random_bytes(&mut rng, 128)).unwrap();
    }
    let query = random_bytes(&mut rng, 128);

    c.bench_function("search_5k_k10_ef64", |bench| {
        bench.iter(|| index.search_with_ef(black_box(&query), 10, 64).unwrap())
    });
}

criterion_group!(benches, bench_kernels, bench_search);
criterion_main!(benches);
