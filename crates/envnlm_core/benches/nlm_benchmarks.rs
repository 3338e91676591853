//! Criterion benchmarks for the environment NLM core.
//!
//! Run with: cargo bench -p envnlm_core
//! Run specific: cargo bench -p envnlm_core -- environment_table

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;
use rand_distr::Normal;

use envnlm_core::{
    nlm_denoise, CentralBlend, EnvironmentBuilder, EnvironmentTable, Execution, NeighborTable,
    NlmConfig, PairComparator, RotationalComparator, ScalarField,
};

// =============================================================================
// Helper Functions for Test Data Generation
// =============================================================================

fn random_field_f32(size: usize, seed: u64) -> ScalarField<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0f32, 1.0).unwrap();
    ScalarField::from_fn((size, size, size), |_, _, _| rng.sample(normal))
}

fn builder_f32(radius: f32) -> EnvironmentBuilder<f32> {
    let neighbors = NeighborTable::within_radius(radius, [1.0, 1.0, 1.0]).unwrap();
    EnvironmentBuilder::new(&neighbors, CentralBlend::AllButFar, false)
}

// =============================================================================
// Environment Table Benchmarks
// =============================================================================

fn bench_environment_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("environment_table");

    for size in [16, 32] {
        let field = random_field_f32(size, 42);
        group.throughput(Throughput::Elements((size * size * size) as u64));

        for radius in [1.0f32, 2.0] {
            let builder = builder_f32(radius);
            let build = |f, parallel| EnvironmentTable::build(f, &builder, parallel);
            group.bench_with_input(
                BenchmarkId::new(format!("sequential_r{}", radius), size),
                &size,
                |b, _| b.iter(|| build(black_box(&field), false)),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("parallel_r{}", radius), size),
                &size,
                |b, _| b.iter(|| build(black_box(&field), true)),
            );
        }
    }

    group.finish();
}

// =============================================================================
// Comparator Benchmarks
// =============================================================================

fn bench_rotational_comparator(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotational_comparator");
    let field = random_field_f32(8, 123);
    let table = EnvironmentTable::build(&field, &builder_f32(1.5), false);
    let comparator = RotationalComparator::default();
    let n = table.len();

    group.throughput(Throughput::Elements((n - 1) as u64));
    group.bench_function("row_against_all", |b| {
        b.iter(|| {
            let mut best = f32::INFINITY;
            for j in 1..n {
                best = best.min(comparator.distance(black_box(&table), 0, j));
            }
            best
        })
    });

    group.finish();
}

// =============================================================================
// Full Pass Benchmarks
// =============================================================================

fn bench_full_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("nlm_denoise");
    group.sample_size(10);

    for size in [8, 12, 16] {
        let field = random_field_f32(size, 7);
        let n = size * size * size;
        group.throughput(Throughput::Elements((n * (n - 1) / 2) as u64));

        for (label, enable_prefilter) in [("prefilter", true), ("exhaustive", false)] {
            let config = NlmConfig::<f32> {
                percentile_threshold: 0.1,
                enable_prefilter,
                execution: Execution::Parallel,
                ..NlmConfig::default()
            };
            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, _| {
                b.iter(|| nlm_denoise(black_box(&field), config.clone()).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_environment_table,
    bench_rotational_comparator,
    bench_full_pass
);
criterion_main!(benches);
