// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Charge/Current Projector
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Direct charge and current deposition into the unit's private buffer.

use crate::stage::{StageContext, StageError, StageKind, StageOperator, StageScratch};
use crate::store::{lorentz_factor, ParticleChunkMut};
use std::ops::Range;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChargeCurrentProjector;

impl StageOperator for ChargeCurrentProjector {
    fn kind(&self) -> StageKind {
        StageKind::Project
    }

    fn apply(
        &self,
        ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError> {
        // photons carry no charge
        if ctx.species.mass == 0.0 {
            return Ok(());
        }
        let buffer = scratch
            .deposit
            .as_mut()
            .ok_or_else(|| StageError::new("projection scheduled without a deposition buffer"))?;
        let geometry = ctx.fields.geometry();
        for i in range {
            if !particles.is_active(i) || particles.charge[i] == 0 {
                continue;
            }
            let d = ctx.assigner.distances(&particles.position(i));
            let stencil = geometry.stencil(&d).ok_or_else(|| {
                StageError::new(format!(
                    "particle {} deposits outside the node grid",
                    particles.offset() + i
                ))
            })?;
            let q = f64::from(particles.charge[i]) * particles.weight[i];
            let u = particles.momentum(i);
            let gamma = lorentz_factor(u);
            let current = [q * u[0] / gamma, q * u[1] / gamma, q * u[2] / gamma];
            buffer.deposit(&stencil, q, current);
        }
        Ok(())
    }
}
