// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Pipeline Scheduler Benchmark
// © 1998–2026 Miroslav Šotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pic_core::partition::Partition;
use pic_core::seeding::seed_uniform;
use pic_types::config::{SchedulerMode, SimulationConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

const CONFIG: &str = r#"{
    "geometry": "cartesian2d",
    "n_space": [128, 64],
    "cell_length": [0.5, 0.5],
    "timestep": 0.1,
    "cluster_width": 4,
    "pack_slabs": 8,
    "species": [
        {"name": "electron", "mass": 1.0, "charge": -1,
         "boundaries": [{"min": "reflective", "max": "reflective"},
                        {"min": "periodic", "max": "periodic"}],
         "track_quantum_parameter": true,
         "radiation": {"schwinger_field": 100.0, "loss_coefficient": 0.01}}
    ]
}"#;

fn loaded(mode: SchedulerMode) -> Partition {
    let mut cfg = SimulationConfig::from_json_str(CONFIG).expect("valid config");
    cfg.scheduler.mode = mode;
    let mut partition = Partition::from_config(&cfg).expect("partition");
    partition.fields_mut().e[1].fill(0.2);
    partition.fields_mut().b[2].fill(0.4);
    let assigner = partition.species()[0].assigner().clone();
    let mut rng = StdRng::seed_from_u64(9);
    let records = seed_uniform(&mut rng, &assigner, 16, 1.0, -1, 0.1).expect("seed");
    partition.inject(0, &records).expect("inject");
    partition.finalize(&[]).expect("initial sort");
    partition
}

fn bench_pipeline_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_step");
    group.sample_size(20);

    for mode in [SchedulerMode::Flat, SchedulerMode::TaskGraph] {
        group.bench_with_input(BenchmarkId::new("electrons_131k", format!("{mode:?}")), &mode, |b, &mode| {
            b.iter_batched(
                || loaded(mode),
                |mut partition| {
                    let report = partition.step().expect("step should succeed");
                    black_box(report.tally.radiated);
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline_step);
criterion_main!(benches);
