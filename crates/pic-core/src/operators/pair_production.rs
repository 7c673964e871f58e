// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Threshold Pair Production
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Photon decay into an electron/positron pair above a chi threshold.

use crate::stage::{StageContext, StageError, StageKind, StageOperator, StageScratch};
use crate::store::{cross, dot, ParticleChunkMut, ParticleRecord};
use pic_types::error::{PicError, PicResult};
use std::ops::Range;

/// Quantum parameter of a photon with momentum `k` (electron-mass units).
pub fn photon_quantum_parameter(k: [f64; 3], e: [f64; 3], b: [f64; 3], schwinger_field: f64) -> f64 {
    let k_norm = dot(k, k).sqrt();
    if k_norm == 0.0 {
        return 0.0;
    }
    let n = [k[0] / k_norm, k[1] / k_norm, k[2] / k_norm];
    let nxb = cross(n, b);
    let f = [e[0] + nxb[0], e[1] + nxb[1], e[2] + nxb[2]];
    let en = dot(e, n);
    k_norm * (dot(f, f) - en * en).max(0.0).sqrt() / schwinger_field
}

#[derive(Debug, Clone)]
pub struct ThresholdPairProduction {
    schwinger_field: f64,
    chi_threshold: f64,
    electron_species: usize,
    positron_species: usize,
}

impl ThresholdPairProduction {
    pub fn new(
        schwinger_field: f64,
        chi_threshold: f64,
        electron_species: usize,
        positron_species: usize,
    ) -> PicResult<Self> {
        if !schwinger_field.is_finite() || schwinger_field <= 0.0 {
            return Err(PicError::ConfigError(format!(
                "schwinger_field must be finite and > 0, got {schwinger_field}"
            )));
        }
        if !chi_threshold.is_finite() || chi_threshold <= 0.0 {
            return Err(PicError::ConfigError(format!(
                "pair-production chi_threshold must be finite and > 0, got {chi_threshold}"
            )));
        }
        Ok(ThresholdPairProduction {
            schwinger_field,
            chi_threshold,
            electron_species,
            positron_species,
        })
    }
}

impl StageOperator for ThresholdPairProduction {
    fn kind(&self) -> StageKind {
        StageKind::PairProduce
    }

    fn apply(
        &self,
        ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError> {
        if ctx.species.mass != 0.0 {
            return Err(StageError::new(format!(
                "pair production needs photons, '{}' has mass {}",
                ctx.species.name, ctx.species.mass
            )));
        }
        for i in range {
            if !particles.is_active(i) {
                continue;
            }
            let k = particles.momentum(i);
            let chi = photon_quantum_parameter(
                k,
                scratch.fields.e[i],
                scratch.fields.b[i],
                self.schwinger_field,
            );
            if let Some(chi_store) = particles.chi.as_deref_mut() {
                chi_store[i] = chi;
            }
            if chi < self.chi_threshold {
                continue;
            }
            let weight = particles.weight[i];
            let half = [0.5 * k[0], 0.5 * k[1], 0.5 * k[2]];
            let position = particles.position(i);
            for (target, charge) in [(self.electron_species, -1), (self.positron_species, 1)] {
                scratch.spawn(
                    target,
                    ParticleRecord {
                        position,
                        momentum: half,
                        weight,
                        charge,
                        chi: 0.5 * chi,
                    },
                );
            }
            scratch.tally.pair_converted += weight * dot(k, k).sqrt();
            particles.mark_exit(i);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldGrid, GridGeometry};
    use crate::keys::CellKeyAssigner;
    use crate::stage::SpeciesProperties;
    use crate::store::ParticleStore;
    use pic_types::config::GeometryKind;
    use pic_types::constants::EXIT_KEY;

    fn run(mass: f64, momenta: &[[f64; 3]]) -> (Result<(), StageError>, ParticleStore, StageScratch) {
        let assigner = CellKeyAssigner::new(GeometryKind::Cartesian1d, &[0.0], &[1.0], &[4])
            .expect("valid assigner");
        let fields = FieldGrid::new(GridGeometry::new(&[1.0], &[4], 2).expect("valid grid"));
        let species = SpeciesProperties {
            name: "photon".to_string(),
            index: 2,
            mass,
        };
        let ctx = StageContext {
            fields: &fields,
            assigner: &assigner,
            species: &species,
            timestep: 0.1,
            time: 0.0,
        };
        let mut store = ParticleStore::new(1, true).expect("valid store");
        for &k in momenta {
            let record = ParticleRecord {
                position: [1.5, 0.0, 0.0],
                momentum: k,
                weight: 1.0,
                ..Default::default()
            };
            store.push(&record, 2);
        }
        let op = ThresholdPairProduction::new(10.0, 1.0, 0, 1).expect("valid params");
        let mut scratch = StageScratch::new(momenta.len(), 1, None);
        for e in scratch.fields.e.iter_mut() {
            *e = [0.0, 5.0, 0.0];
        }
        let result = {
            let mut chunk = store.as_chunk_mut();
            op.apply(&ctx, &mut chunk, 0..momenta.len(), &mut scratch)
        };
        (result, store, scratch)
    }

    #[test]
    fn test_energetic_photon_decays() {
        // chi = |k| * 5 / 10: 4 -> 2 decays, 1 -> 0.5 survives
        let (result, store, scratch) = run(0.0, &[[4.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        result.expect("pair production");
        assert_eq!(store.cell_keys(), &[EXIT_KEY, 2]);
        assert_eq!(scratch.products.len(), 2);
        let charges: Vec<i16> = scratch.products.iter().map(|p| p.record.charge).collect();
        assert_eq!(charges, vec![-1, 1]);
        assert_eq!(scratch.products[1].target, 1);
        assert_eq!(scratch.products[0].record.momentum, [2.0, 0.0, 0.0]);
        assert_eq!(scratch.tally.pair_converted, 4.0);
        assert_eq!(scratch.tally.created, 2);
        assert!((store.chi().expect("tracked")[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_massive_species_is_rejected() {
        let (result, _, _) = run(1.0, &[[4.0, 0.0, 0.0]]);
        assert!(result.is_err());
    }
}
