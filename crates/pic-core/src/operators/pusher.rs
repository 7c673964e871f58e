// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Boris Pusher
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Relativistic Boris momentum/position push.
//!
//! Massive particles: half electric kick, magnetic rotation at the
//! mid-step Lorentz factor, second half kick, then drift with `u / gamma`.
//! Photons drift at the speed of light along their momentum.

use crate::stage::{StageContext, StageError, StageKind, StageOperator, StageScratch};
use crate::store::{cross, dot, lorentz_factor, ParticleChunkMut};
use std::ops::Range;

/// One relativistic Boris step of momentum `u` (per unit mass).
pub fn boris_rotate(u: [f64; 3], e: [f64; 3], b: [f64; 3], charge_over_mass: f64, dt: f64) -> [f64; 3] {
    let qmdt2 = 0.5 * charge_over_mass * dt;
    let u_minus = [
        u[0] + qmdt2 * e[0],
        u[1] + qmdt2 * e[1],
        u[2] + qmdt2 * e[2],
    ];
    let gamma_minus = lorentz_factor(u_minus);
    let t = [
        qmdt2 * b[0] / gamma_minus,
        qmdt2 * b[1] / gamma_minus,
        qmdt2 * b[2] / gamma_minus,
    ];
    let t2 = dot(t, t);
    let s = [
        2.0 * t[0] / (1.0 + t2),
        2.0 * t[1] / (1.0 + t2),
        2.0 * t[2] / (1.0 + t2),
    ];
    let u_prime = {
        let c = cross(u_minus, t);
        [u_minus[0] + c[0], u_minus[1] + c[1], u_minus[2] + c[2]]
    };
    let u_plus = {
        let c = cross(u_prime, s);
        [u_minus[0] + c[0], u_minus[1] + c[1], u_minus[2] + c[2]]
    };
    [
        u_plus[0] + qmdt2 * e[0],
        u_plus[1] + qmdt2 * e[1],
        u_plus[2] + qmdt2 * e[2],
    ]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BorisPusher;

impl StageOperator for BorisPusher {
    fn kind(&self) -> StageKind {
        StageKind::Push
    }

    fn apply(
        &self,
        ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError> {
        let dt = ctx.timestep;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(StageError::new(format!("timestep must be finite and > 0, got {dt}")));
        }
        let mass = ctx.species.mass;
        let dims = particles.dims();
        for i in range {
            if !particles.is_active(i) {
                continue;
            }
            let mut u = particles.momentum(i);
            let velocity = if mass == 0.0 {
                let norm = dot(u, u).sqrt();
                if norm == 0.0 {
                    [0.0; 3]
                } else {
                    [u[0] / norm, u[1] / norm, u[2] / norm]
                }
            } else {
                let qm = f64::from(particles.charge[i]) / mass;
                if qm != 0.0 {
                    u = boris_rotate(u, scratch.fields.e[i], scratch.fields.b[i], qm, dt);
                    particles.set_momentum(i, u);
                }
                let gamma = lorentz_factor(u);
                [u[0] / gamma, u[1] / gamma, u[2] / gamma]
            };
            if velocity.iter().any(|v| !v.is_finite()) {
                return Err(StageError::new(format!(
                    "non-finite velocity for particle {}",
                    particles.offset() + i
                )));
            }
            for (axis, v) in velocity.iter().enumerate().take(dims) {
                particles.position[axis][i] += v * dt;
            }
        }
        Ok(())
    }
}
