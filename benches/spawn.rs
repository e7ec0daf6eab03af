use criterion::*;
use std::hint::black_box;

use weft::prelude::*;

mod common;
use common::*;

fn spawn_benchmark(c: &mut Criterion) {
    init_components();

    let mut group = c.benchmark_group("spawn");

    for &(label, n) in &[
        ("spawn_1k", AGENTS_SMALL),
        ("spawn_10k", AGENTS_MED),
        ("spawn_100k", AGENTS_LARGE),
    ] {
        group.bench_function(label, |b| {
            b.iter_batched(
                World::new,
                |mut world| {
                    populate(&mut world, n).unwrap();
                    black_box(world);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
