// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Continuous Radiation Reaction
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Continuous radiation-reaction drag driven by the quantum parameter.
//!
//! `d(gamma)/dt = -loss_coefficient * chi^2` above `chi_min`; the momentum
//! direction is kept and the removed energy goes to the bin tally.

use crate::stage::{StageContext, StageError, StageKind, StageOperator, StageScratch};
use crate::store::{cross, dot, lorentz_factor, ParticleChunkMut};
use pic_types::error::{PicError, PicResult};
use std::ops::Range;

/// Quantum parameter of a massive particle with momentum `u` per unit mass.
pub fn quantum_parameter(u: [f64; 3], e: [f64; 3], b: [f64; 3], schwinger_field: f64) -> f64 {
    let gamma = lorentz_factor(u);
    let v = [u[0] / gamma, u[1] / gamma, u[2] / gamma];
    let vxb = cross(v, b);
    let f = [e[0] + vxb[0], e[1] + vxb[1], e[2] + vxb[2]];
    let ev = dot(e, v);
    gamma * (dot(f, f) - ev * ev).max(0.0).sqrt() / schwinger_field
}

#[derive(Debug, Clone)]
pub struct ContinuousRadiation {
    schwinger_field: f64,
    loss_coefficient: f64,
    chi_min: f64,
}

impl ContinuousRadiation {
    pub fn new(schwinger_field: f64, loss_coefficient: f64, chi_min: f64) -> PicResult<Self> {
        if !schwinger_field.is_finite() || schwinger_field <= 0.0 {
            return Err(PicError::ConfigError(format!(
                "schwinger_field must be finite and > 0, got {schwinger_field}"
            )));
        }
        if !loss_coefficient.is_finite() || loss_coefficient < 0.0 || !chi_min.is_finite() {
            return Err(PicError::ConfigError(
                "radiation loss_coefficient and chi_min must be finite, coefficient >= 0"
                    .to_string(),
            ));
        }
        Ok(ContinuousRadiation {
            schwinger_field,
            loss_coefficient,
            chi_min,
        })
    }
}

impl StageOperator for ContinuousRadiation {
    fn kind(&self) -> StageKind {
        StageKind::Radiate
    }

    fn apply(
        &self,
        ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError> {
        let mass = ctx.species.mass;
        if mass <= 0.0 {
            return Err(StageError::new(format!(
                "radiation reaction needs a massive species, '{}' has mass {mass}",
                ctx.species.name
            )));
        }
        for i in range {
            if !particles.is_active(i) {
                continue;
            }
            let u = particles.momentum(i);
            let chi = quantum_parameter(u, scratch.fields.e[i], scratch.fields.b[i], self.schwinger_field);
            if let Some(chi_store) = particles.chi.as_deref_mut() {
                chi_store[i] = chi;
            }
            if chi < self.chi_min {
                continue;
            }
            let gamma = lorentz_factor(u);
            let new_gamma = (gamma - self.loss_coefficient * chi * chi * ctx.timestep).max(1.0);
            let u_norm = dot(u, u).sqrt();
            if u_norm == 0.0 {
                continue;
            }
            let scale = (new_gamma * new_gamma - 1.0).max(0.0).sqrt() / u_norm;
            particles.set_momentum(i, [u[0] * scale, u[1] * scale, u[2] * scale]);
            scratch.tally.radiated += particles.weight[i] * mass * (gamma - new_gamma);
        }
        Ok(())
    }
}
