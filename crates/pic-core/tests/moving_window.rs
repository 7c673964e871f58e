// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Moving Window Integration Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Window shifts re-derive every species' keys and bins between passes.

use pic_core::partition::Partition;
use pic_core::seeding::seed_uniform;
use pic_core::store::{kinetic_energy, ParticleRecord};
use pic_types::config::SimulationConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

const CONFIG: &str = r#"{
    "geometry": "cartesian2d",
    "n_space": [16, 4],
    "cell_length": [1.0, 1.0],
    "timestep": 0.5,
    "cluster_width": 4,
    "pack_slabs": 2,
    "scheduler": {"mode": "task_graph"},
    "species": [
        {"name": "electron", "mass": 1.0, "charge": -1,
         "boundaries": [{"min": "absorbing", "max": "absorbing"},
                        {"min": "periodic", "max": "periodic"}]}
    ],
    "moving_window": {"velocity_x": 1.0, "delay": 0.0, "cells_per_shift": 2}
}"#;

fn at_rest(x: f64, y: f64) -> ParticleRecord {
    ParticleRecord {
        position: [x, y, 0.0],
        momentum: [0.0, 0.0, 0.1],
        weight: 1.0,
        charge: -1,
        chi: 0.0,
    }
}

#[test]
fn shift_drops_trailing_slabs() {
    let cfg = SimulationConfig::from_json_str(CONFIG).expect("valid config");
    let mut partition = Partition::from_config(&cfg).expect("partition");
    for (i, v) in partition.fields_mut().b[0].iter_mut().enumerate() {
        *v = (i / 9) as f64;
    }
    partition
        .inject(0, &[at_rest(0.2, 1.0), at_rest(2.4, 2.0), at_rest(5.0, 3.0), at_rest(12.0, 0.5)])
        .expect("inject");
    partition.finalize(&[]).expect("initial sort");

    let mut shifts = Vec::new();
    for _ in 0..4 {
        let report = partition.step().expect("step");
        shifts.push(report.window_shift);
    }
    // 2 cells of travel reached at t = 2.0
    assert_eq!(shifts, vec![None, None, None, Some(2)]);

    let sp = &partition.species()[0];
    assert_eq!(sp.assigner().domain_min(0), 2.0);
    assert_eq!(sp.live_count(), 3);
    sp.verify_layout().expect("settled");
    let mut xs: Vec<f64> = sp.store().positions(0).to_vec();
    xs.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(xs, vec![2.4, 5.0, 12.0]);

    let lost = partition.totals().lost_boundary;
    assert!((lost - kinetic_energy(1.0, [0.0, 0.0, 0.1], 1.0)).abs() < 1e-12);
    // node planes moved down by two
    assert_eq!(partition.fields().b[0][[0, 0]], 2.0);
    assert_eq!(partition.fields().b[0][[20, 0]], 0.0);
}

#[test]
fn cylindrical_window_waits_for_delay() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/wakefield_cyl.json");
    let cfg = SimulationConfig::from_file(path.to_str().expect("utf-8 path")).expect("config file");
    let mut partition = Partition::from_config(&cfg).expect("partition");
    let assigner = partition.species()[0].assigner().clone();
    let mut rng = StdRng::seed_from_u64(3);
    let records = seed_uniform(&mut rng, &assigner, 1, 1.0, -1, 0.05).expect("seed");
    let n = records.len();
    partition.inject(0, &records).expect("inject");
    partition.finalize(&[]).expect("initial sort");

    for _ in 0..5 {
        let report = partition.step().expect("step");
        assert_eq!(report.window_shift, None);
    }
    let sp = &partition.species()[0];
    sp.verify_layout().expect("settled");
    assert_eq!(sp.live_count() + partition.totals().exits, n);
}
