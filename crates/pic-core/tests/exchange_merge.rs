// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Exchange and Merge Integration Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Particles leaving one partition through an exchange face are merged
//! into the neighbouring partition by the same cycle sort.

use pic_core::partition::Partition;
use pic_core::species::Species;
use pic_core::store::ParticleRecord;
use pic_types::config::SimulationConfig;

fn config(origin_x: f64) -> SimulationConfig {
    let json = format!(
        r#"{{
        "geometry": "cartesian1d",
        "n_space": [8],
        "cell_length": [1.0],
        "origin": [{origin_x}],
        "timestep": 0.5,
        "cluster_width": 3,
        "pack_slabs": 2,
        "species": [
            {{"name": "electron", "mass": 1.0, "charge": -1,
              "boundaries": [{{"min": "exchange", "max": "exchange"}}]}}
        ]
    }}"#
    );
    SimulationConfig::from_json_str(&json).expect("valid config")
}

fn electron(x: f64, ux: f64, weight: f64) -> ParticleRecord {
    ParticleRecord {
        position: [x, 0.0, 0.0],
        momentum: [ux, 0.0, 0.0],
        weight,
        charge: -1,
        chi: 0.0,
    }
}

#[test]
fn merged_buffer_lands_in_its_cell() {
    let cfg = config(0.0);
    let mut sp = Species::from_config(&cfg, 0).expect("species");
    let resident: Vec<ParticleRecord> = [0.1, 1.2, 2.0, 2.2, 4.9, 6.0, 7.5]
        .iter()
        .enumerate()
        .map(|(i, &x)| electron(x, 0.0, i as f64))
        .collect();
    sp.inject(&resident).expect("inject");
    sp.finalize(&[]).expect("initial sort");

    let cell = 2;
    let before = sp.bin_index().clone();
    let lower: Vec<f64> = sp.store().weights()[..before.first_index[cell]].to_vec();

    let stats = sp
        .finalize(&[electron(1.8, 0.0, 100.0), electron(2.4, 0.0, 101.0)])
        .expect("merge");
    assert_eq!(stats.merged, 2);

    let after = sp.bin_index();
    assert_eq!(after.count[cell], before.count[cell] + 2);
    let range = after.cell_range(cell);
    for slot in 0..sp.store().len() {
        if sp.store().weights()[slot] >= 100.0 {
            assert!(range.contains(&slot), "arrival at slot {slot} outside {range:?}");
        }
    }
    // cells below the target keep their slots
    assert_eq!(&sp.store().weights()[..after.first_index[cell]], lower.as_slice());
    sp.verify_layout().expect("settled");
}

#[test]
fn exchange_face_feeds_the_neighbour() {
    let mut left = Partition::from_config(&config(0.0)).expect("left partition");
    let mut right = Partition::from_config(&config(8.0)).expect("right partition");
    left.inject(0, &[electron(7.9, 50.0, 1.0), electron(3.0, 0.0, 2.0), electron(0.1, -50.0, 3.0)])
        .expect("inject left");
    left.finalize(&[]).expect("sort left");

    let report = left.advance().expect("advance left");
    left.finalize(&[]).expect("finalize left");
    assert_eq!(report.tally.exits, 2);
    assert_eq!(left.species()[0].live_count(), 1);

    let outbound = &report.outbound[0];
    let upper = outbound.face(0, true).to_vec();
    let lower = outbound.face(0, false).to_vec();
    assert_eq!(upper.len(), 1);
    assert_eq!(lower.len(), 1);
    assert!(upper[0].position[0] >= 8.0);

    let stats = right.finalize(&[upper]).expect("merge right");
    assert_eq!(stats[0].merged, 1);
    let sp = &right.species()[0];
    assert_eq!(sp.live_count(), 1);
    assert_eq!(sp.store().weights(), &[1.0]);
    assert_eq!(sp.store().cell_keys(), &[0]);
    sp.verify_layout().expect("settled");
}

#[test]
fn inbound_outside_the_partition_is_rejected() {
    let mut right = Partition::from_config(&config(8.0)).expect("right partition");
    let err = right
        .finalize(&[vec![electron(2.0, 0.0, 1.0)]])
        .expect_err("x = 2 lies left of the partition");
    assert!(err.is_fatal_to_step());
}
