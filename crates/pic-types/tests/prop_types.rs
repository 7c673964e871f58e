// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Property-Based Tests (proptest) for pic-types
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for pic-types using proptest.
//!
//! Covers: geometry arity, configuration validation and serialization
//! roundtrip, error classification.

use pic_types::config::{
    AxisBoundary, BoundaryKind, GeometryKind, SchedulerConfig, SimulationConfig, SpeciesConfig,
};
use pic_types::error::PicError;
use proptest::prelude::*;

fn geometry_strategy() -> impl Strategy<Value = GeometryKind> {
    prop_oneof![
        Just(GeometryKind::Cartesian1d),
        Just(GeometryKind::Cartesian2d),
        Just(GeometryKind::Cartesian3d),
        Just(GeometryKind::Cylindrical),
    ]
}

fn build_config(geometry: GeometryKind, n: usize, dx: f64, dt: f64) -> SimulationConfig {
    let nd = geometry.field_dims();
    let boundaries = (0..nd)
        .map(|axis| {
            if geometry.is_radial_axis(axis) {
                AxisBoundary {
                    min: BoundaryKind::Reflective,
                    max: BoundaryKind::Absorbing,
                }
            } else {
                AxisBoundary::both(BoundaryKind::Exchange)
            }
        })
        .collect();
    SimulationConfig {
        geometry,
        n_space: vec![n; nd],
        cell_length: vec![dx; nd],
        origin: vec![0.0; nd],
        oversize: 2,
        timestep: dt,
        cluster_width: 2,
        pack_slabs: 1,
        scheduler: SchedulerConfig::default(),
        species: vec![SpeciesConfig {
            name: "electron".to_string(),
            mass: 1.0,
            charge: -1,
            time_frozen: 0.0,
            boundaries,
            track_quantum_parameter: false,
            ionization: None,
            radiation: None,
            pair_production: None,
            merging: None,
        }],
        moving_window: None,
    }
}

// ── Geometry ─────────────────────────────────────────────────────────

proptest! {
    /// Particle positions carry at least as many components as field axes.
    #[test]
    fn particle_dims_cover_field_dims(geometry in geometry_strategy()) {
        prop_assert!(geometry.particle_dims() >= geometry.field_dims());
        prop_assert!(geometry.field_dims() >= 1);
        prop_assert!(geometry.particle_dims() <= 3);
    }

    /// Key cells are one more than n_space on every axis.
    #[test]
    fn key_cells_are_dual(geometry in geometry_strategy(), n in 1usize..64) {
        let cfg = build_config(geometry, n, 0.5, 0.1);
        prop_assert!(cfg.key_cells().iter().all(|&k| k == n + 1));
    }
}

// ── Validation ───────────────────────────────────────────────────────

proptest! {
    /// Well-formed configurations validate for every geometry.
    #[test]
    fn valid_config_accepted(
        geometry in geometry_strategy(),
        n in 1usize..128,
        dx in 0.01f64..4.0,
        dt in 0.001f64..1.0,
    ) {
        let cfg = build_config(geometry, n, dx, dt);
        prop_assert!(cfg.validate().is_ok());
    }

    /// Non-positive timesteps are rejected as configuration errors.
    #[test]
    fn non_positive_timestep_rejected(
        geometry in geometry_strategy(),
        dt in -1.0f64..=0.0,
    ) {
        let cfg = build_config(geometry, 8, 0.5, dt);
        match cfg.validate() {
            Err(PicError::ConfigError(msg)) => prop_assert!(msg.contains("timestep")),
            other => prop_assert!(false, "expected ConfigError, got {:?}", other),
        }
    }

    /// Serialization roundtrip preserves geometry and grid extents.
    #[test]
    fn config_roundtrip(
        geometry in geometry_strategy(),
        n in 1usize..64,
        dx in 0.01f64..4.0,
    ) {
        let cfg = build_config(geometry, n, dx, 0.1);
        let json = serde_json::to_string(&cfg).unwrap();
        let back = SimulationConfig::from_json_str(&json).unwrap();
        prop_assert_eq!(back.geometry, cfg.geometry);
        prop_assert_eq!(back.n_space, cfg.n_space);
        prop_assert_eq!(back.cell_length, cfg.cell_length);
        prop_assert_eq!(back.species[0].boundaries.clone(), cfg.species[0].boundaries.clone());
    }
}

// ── Error classification ─────────────────────────────────────────────

proptest! {
    /// Cell range violations always abort the step.
    #[test]
    fn cell_out_of_range_is_fatal(
        particle in 0usize..10_000,
        axis in 0usize..3,
        index in -100i64..100,
        length in 1usize..64,
    ) {
        let err = PicError::CellOutOfRange { particle, axis, index, length };
        prop_assert!(err.is_fatal_to_step());
        prop_assert!(!PicError::ConfigError("x".to_string()).is_fatal_to_step());
    }
}
