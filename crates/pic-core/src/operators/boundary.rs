// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Particle Boundary Conditions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-face particle boundary handling.
//!
//! A particle leaves through a face when its coordinate drops below the
//! lower edge or reaches the upper edge. The radial axis of cylindrical
//! geometry only has an upper face. Exchanged particles are copied into
//! the bin's outbound buffer before being marked as exits; the key
//! recomputation that follows in the same stage never sees them.

use crate::keys::AxisMetric;
use crate::stage::{StageContext, StageError, StageKind, StageOperator, StageScratch};
use crate::store::{kinetic_energy, ParticleChunkMut};
use pic_types::config::{AxisBoundary, BoundaryKind};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct BoundaryConditions {
    axes: Vec<AxisBoundary>,
}

impl BoundaryConditions {
    pub fn new(axes: Vec<AxisBoundary>) -> Self {
        BoundaryConditions { axes }
    }

    pub fn axes(&self) -> &[AxisBoundary] {
        &self.axes
    }
}

enum Face {
    Lower,
    Upper,
}

impl StageOperator for BoundaryConditions {
    fn kind(&self) -> StageKind {
        StageKind::Boundary
    }

    fn apply(
        &self,
        ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError> {
        let assigner = ctx.assigner;
        if self.axes.len() != assigner.dims() {
            return Err(StageError::new(format!(
                "{} boundary axes configured for a {}-axis grid",
                self.axes.len(),
                assigner.dims()
            )));
        }
        for i in range {
            for (axis, bc) in self.axes.iter().enumerate() {
                if !particles.is_active(i) {
                    break;
                }
                let lo = assigner.domain_min(axis);
                let hi = assigner.domain_max(axis);
                let metric = assigner.metric(axis);
                let x = metric.coordinate(&particles.position(i));
                let (face, kind) = match metric {
                    AxisMetric::Cartesian { .. } if x < lo => (Face::Lower, bc.min),
                    _ if x >= hi => (Face::Upper, bc.max),
                    _ => continue,
                };
                match (kind, metric) {
                    (BoundaryKind::Periodic, AxisMetric::Cartesian { component }) => {
                        let length = hi - lo;
                        match face {
                            Face::Lower => particles.position[component][i] += length,
                            Face::Upper => particles.position[component][i] -= length,
                        }
                    }
                    (BoundaryKind::Periodic, AxisMetric::Radial { .. }) => {
                        return Err(StageError::new("radial axis cannot be periodic"));
                    }
                    (BoundaryKind::Reflective, AxisMetric::Cartesian { component }) => {
                        let edge = match face {
                            Face::Lower => lo,
                            Face::Upper => hi,
                        };
                        particles.position[component][i] = 2.0 * edge - x;
                        particles.momentum[component][i] = -particles.momentum[component][i];
                    }
                    (BoundaryKind::Reflective, AxisMetric::Radial { components: [a, b] }) => {
                        reflect_radial(particles, i, [a, b], x, hi);
                    }
                    (BoundaryKind::Absorbing, _) => {
                        scratch.tally.lost_boundary +=
                            kinetic_energy(ctx.species.mass, particles.momentum(i), particles.weight[i]);
                        particles.mark_exit(i);
                    }
                    (BoundaryKind::Exchange, _) => {
                        let upper = matches!(face, Face::Upper);
                        scratch.exchange.push(axis, upper, particles.record(i));
                        particles.mark_exit(i);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Mirror the radius about `edge` and flip the radial momentum.
fn reflect_radial(particles: &mut ParticleChunkMut<'_>, i: usize, [a, b]: [usize; 2], r: f64, edge: f64) {
    let ya = particles.position[a][i];
    let yb = particles.position[b][i];
    let (na, nb) = if r > 0.0 { (ya / r, yb / r) } else { (1.0, 0.0) };
    let r_new = (2.0 * edge - r).max(0.0);
    particles.position[a][i] = na * r_new;
    particles.position[b][i] = nb * r_new;
    let u_r = particles.momentum[a][i] * na + particles.momentum[b][i] * nb;
    particles.momentum[a][i] -= 2.0 * u_r * na;
    particles.momentum[b][i] -= 2.0 * u_r * nb;
}
