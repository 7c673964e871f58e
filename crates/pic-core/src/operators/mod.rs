// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Reference Stage Operators
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Deterministic stage operators in normalized units.
//!
//! Lengths in c/omega, times in 1/omega, fields in m_e c omega / e,
//! momenta per unit species mass (electron mass for photons).

pub mod boundary;
pub mod interpolator;
pub mod ionization;
pub mod pair_production;
pub mod projector;
pub mod pusher;
pub mod radiation;

pub use boundary::BoundaryConditions;
pub use interpolator::FieldInterpolator;
pub use ionization::ThresholdIonization;
pub use pair_production::ThresholdPairProduction;
pub use projector::ChargeCurrentProjector;
pub use pusher::BorisPusher;
pub use radiation::ContinuousRadiation;

use crate::stage::StageOperator;
use pic_types::config::SimulationConfig;
use pic_types::error::{PicError, PicResult};

fn species_target(cfg: &SimulationConfig, name: &str) -> PicResult<usize> {
    cfg.species_index(name)
        .ok_or_else(|| PicError::ConfigError(format!("unknown product species '{name}'")))
}

/// Full operator set of species `index` as configured.
pub fn species_operators(
    cfg: &SimulationConfig,
    index: usize,
) -> PicResult<Vec<Box<dyn StageOperator>>> {
    let sp = cfg.species.get(index).ok_or_else(|| {
        PicError::ConfigError(format!("species index {index} out of range"))
    })?;
    let mut ops: Vec<Box<dyn StageOperator>> = vec![Box::new(FieldInterpolator)];
    if let Some(ion) = &sp.ionization {
        ops.push(Box::new(ThresholdIonization::new(
            ion.threshold_field,
            ion.max_charge,
            species_target(cfg, &ion.electron_species)?,
        )?));
    }
    if let Some(rad) = &sp.radiation {
        ops.push(Box::new(ContinuousRadiation::new(
            rad.schwinger_field,
            rad.loss_coefficient,
            rad.chi_min,
        )?));
    }
    if let Some(pair) = &sp.pair_production {
        ops.push(Box::new(ThresholdPairProduction::new(
            pair.schwinger_field,
            pair.chi_threshold,
            species_target(cfg, &pair.electron_species)?,
            species_target(cfg, &pair.positron_species)?,
        )?));
    }
    ops.push(Box::new(BorisPusher));
    ops.push(Box::new(BoundaryConditions::new(sp.boundaries.clone())));
    if !sp.is_massless() {
        ops.push(Box::new(ChargeCurrentProjector));
    }
    Ok(ops)
}

/// Operators of a frozen species: projection only, keys still recomputed.
pub fn frozen_operators(cfg: &SimulationConfig, index: usize) -> PicResult<Vec<Box<dyn StageOperator>>> {
    let sp = cfg.species.get(index).ok_or_else(|| {
        PicError::ConfigError(format!("species index {index} out of range"))
    })?;
    let mut ops: Vec<Box<dyn StageOperator>> = Vec::new();
    if !sp.is_massless() {
        ops.push(Box::new(ChargeCurrentProjector));
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;

    const CONFIG: &str = r#"{
        "geometry": "cartesian1d",
        "n_space": [8],
        "cell_length": [1.0],
        "timestep": 0.1,
        "species": [
            {"name": "electron", "mass": 1.0, "charge": -1,
             "boundaries": [{"min": "periodic", "max": "periodic"}],
             "radiation": {"loss_coefficient": 0.1}},
            {"name": "positron", "mass": 1.0, "charge": 1,
             "boundaries": [{"min": "absorbing", "max": "absorbing"}]},
            {"name": "photon", "mass": 0.0, "charge": 0,
             "boundaries": [{"min": "absorbing", "max": "absorbing"}],
             "pair_production": {"chi_threshold": 1.0,
                "electron_species": "electron", "positron_species": "positron"}}
        ]
    }"#;

    fn kinds(ops: &[Box<dyn StageOperator>]) -> Vec<StageKind> {
        ops.iter().map(|op| op.kind()).collect()
    }

    #[test]
    fn test_operator_sets_follow_species_config() {
        let cfg = SimulationConfig::from_json_str(CONFIG).expect("valid config");
        assert_eq!(
            kinds(&species_operators(&cfg, 0).expect("electron ops")),
            vec![
                StageKind::Interpolate,
                StageKind::Radiate,
                StageKind::Push,
                StageKind::Boundary,
                StageKind::Project
            ]
        );
        let photon = kinds(&species_operators(&cfg, 2).expect("photon ops"));
        assert!(photon.contains(&StageKind::PairProduce));
        assert!(!photon.contains(&StageKind::Project));
        assert_eq!(kinds(&frozen_operators(&cfg, 1).expect("frozen")), vec![StageKind::Project]);
        assert!(species_operators(&cfg, 3).is_err());
    }
}
