//! Selection benchmarks for dispatch_core.
//!
//! Run with: `cargo bench -p dispatch_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dispatch_core::claim::DispatchTables;
use dispatch_core::config::DispatchConfig;
use dispatch_core::pool::FacilityPool;
use dispatch_test_utils::fixtures::WorldBuilder;

/// Full selection pass over a pool of 256 spread-out requests.
pub fn selection_benchmark(c: &mut Criterion) {
    let mut w = WorldBuilder::new();
    let depot = w.depot(0, 0, 10_000);
    let mut requests = Vec::new();
    for i in 0..256 {
        requests.push(w.pickup(((i % 16) + 1) * 100, ((i / 16) + 1) * 100, 5000));
    }
    let unit = w.unit(depot, 0, 0);
    w.heading(unit, 1, 1);
    let world = w.world();

    let config = DispatchConfig::default();
    let mut tables = DispatchTables::new();
    let mut pool = FacilityPool::new(depot);
    for &id in &requests {
        pool.add_pickup(id, &world, &mut tables, &config, 0);
    }

    let mut tick = 0u64;
    c.bench_function("select_target_256_candidates", |b| {
        b.iter(|| {
            tick += 1;
            black_box(pool.select_target(unit, &world, &mut tables, &config, tick))
        })
    });
}

criterion_group!(benches, selection_benchmark);
criterion_main!(benches);
