//! Benchmarks comparing naive and tiled kernels, and one-shot against progressive reconstruction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::DMatrix;
use svd_compress::{
    build_svd_from_pairs, compute_gram, eigen_decompose, multiply, GramComputer, Quantization, RankReconstructor,
    ReconstructionStrategy, SvdTriple, TilingStrategy,
};

const RANKS: [usize; 4] = [5, 20, 50, 100];

fn synthetic_channel(rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |i, j| {
        let smooth = 0.5 + 0.3 * ((i as f64) * 0.05).sin() * ((j as f64) * 0.07).cos();
        let texture = ((i * 31 + j * 17) % 23) as f64 / 255.0;
        (smooth + texture).min(1.0)
    })
}

fn decompose(a_norm: &DMatrix<f64>) -> SvdTriple {
    let w = compute_gram(a_norm).expect("Failed to compute Gram matrix");
    let pairs = eigen_decompose(&w).expect("Failed to decompose Gram matrix");
    build_svd_from_pairs(a_norm, &pairs).expect("Failed to build SVD")
}

fn benchmark_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_kernels");
    group.sample_size(10);

    let a = synthetic_channel(256, 192);
    let b = synthetic_channel(192, 128);

    for strategy in [TilingStrategy::Naive, TilingStrategy::Blocked { tile: 32 }, TilingStrategy::blocked()] {
        let label = format!("{strategy:?}");
        group.bench_with_input(BenchmarkId::new("gram", &label), &strategy, |bench, &strategy| {
            let computer = GramComputer::new(strategy);
            bench.iter(|| computer.compute(black_box(&a)))
        });
        group.bench_with_input(BenchmarkId::new("multiply", &label), &strategy, |bench, &strategy| {
            bench.iter(|| multiply(black_box(&a), black_box(&b), strategy))
        });
    }

    group.finish();
}

fn benchmark_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_reconstruction");
    group.sample_size(10);

    let triple = decompose(&synthetic_channel(256, 192));

    for strategy in [ReconstructionStrategy::OuterProduct, ReconstructionStrategy::DenseMultiply] {
        let reconstructor = RankReconstructor::new(strategy, TilingStrategy::blocked(), Quantization::Truncate);
        let label = format!("{strategy:?}");

        group.bench_function(BenchmarkId::new("one_shot_per_rank", &label), |bench| {
            bench.iter(|| {
                for k in RANKS {
                    let _approximation = reconstructor.reconstruct(black_box(&triple), k);
                }
            })
        });
    }

    let reconstructor = RankReconstructor::default();
    group.bench_function("progressive_all_ranks", |bench| {
        bench.iter(|| reconstructor.reconstruct_progressive(black_box(&triple), &RANKS))
    });

    group.finish();
}

criterion_group!(benches, benchmark_kernels, benchmark_reconstruction);
criterion_main!(benches);
