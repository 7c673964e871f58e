// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Threshold Ionization
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Field-threshold ionization.
//!
//! Above the threshold field an ion loses one electron per step until it
//! reaches `max_charge`. The electron is spawned at the ion position with
//! the ion velocity and routed to the configured electron species.

use crate::stage::{StageContext, StageError, StageKind, StageOperator, StageScratch};
use crate::store::{dot, ParticleChunkMut, ParticleRecord};
use pic_types::error::{PicError, PicResult};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct ThresholdIonization {
    threshold_field: f64,
    max_charge: i16,
    electron_species: usize,
}

impl ThresholdIonization {
    pub fn new(threshold_field: f64, max_charge: i16, electron_species: usize) -> PicResult<Self> {
        if !threshold_field.is_finite() || threshold_field <= 0.0 {
            return Err(PicError::ConfigError(format!(
                "ionization threshold must be finite and > 0, got {threshold_field}"
            )));
        }
        Ok(ThresholdIonization {
            threshold_field,
            max_charge,
            electron_species,
        })
    }
}

impl StageOperator for ThresholdIonization {
    fn kind(&self) -> StageKind {
        StageKind::Ionize
    }

    fn apply(
        &self,
        _ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError> {
        let threshold2 = self.threshold_field * self.threshold_field;
        for i in range {
            if !particles.is_active(i) || particles.charge[i] >= self.max_charge {
                continue;
            }
            let e = scratch.fields.e[i];
            if dot(e, e) <= threshold2 {
                continue;
            }
            particles.charge[i] += 1;
            let electron = ParticleRecord {
                position: particles.position(i),
                momentum: particles.momentum(i),
                weight: particles.weight[i],
                charge: -1,
                chi: 0.0,
            };
            scratch.spawn(self.electron_species, electron);
        }
        Ok(())
    }
}
