// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Particle Seeding
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Initial particle loading.

use crate::keys::{AxisMetric, CellKeyAssigner};
use crate::store::ParticleRecord;
use pic_types::error::{PicError, PicResult};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Uniform load of `per_cell` particles in every physical cell with a
/// Maxwellian momentum spread `thermal_momentum` per component.
///
/// Radial cells are filled uniformly in area, so the density is flat in
/// the (y, z) plane.
pub fn seed_uniform<R: Rng + ?Sized>(
    rng: &mut R,
    assigner: &CellKeyAssigner,
    per_cell: usize,
    weight: f64,
    charge: i16,
    thermal_momentum: f64,
) -> PicResult<Vec<ParticleRecord>> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(PicError::ConfigError(format!(
            "seed weight must be finite and > 0, got {weight}"
        )));
    }
    let thermal = Normal::new(0.0, thermal_momentum).map_err(|e| {
        PicError::ConfigError(format!("invalid thermal momentum {thermal_momentum}: {e}"))
    })?;

    let dims = assigner.dims();
    let n_space = assigner.n_space();
    let cells: usize = n_space.iter().product();
    let mut records = Vec::with_capacity(cells * per_cell);
    let mut cell = [0usize; 3];
    for flat in 0..cells {
        let mut rem = flat;
        for axis in (0..dims).rev() {
            cell[axis] = rem % n_space[axis];
            rem /= n_space[axis];
        }
        for _ in 0..per_cell {
            let mut position = [0.0; 3];
            for axis in 0..dims {
                let dx = assigner.cell_length()[axis];
                let lo = assigner.domain_min(axis) + cell[axis] as f64 * dx;
                match assigner.metric(axis) {
                    AxisMetric::Cartesian { component } => {
                        position[component] = lo + rng.gen::<f64>() * dx;
                    }
                    AxisMetric::Radial { components: [a, b] } => {
                        let hi = lo + dx;
                        let r = (lo * lo + rng.gen::<f64>() * (hi * hi - lo * lo)).sqrt();
                        let theta = 2.0 * PI * rng.gen::<f64>();
                        position[a] = r * theta.cos();
                        position[b] = r * theta.sin();
                    }
                }
            }
            let momentum = [
                thermal.sample(rng),
                thermal.sample(rng),
                thermal.sample(rng),
            ];
            records.push(ParticleRecord {
                position,
                momentum,
                weight,
                charge,
                chi: 0.0,
            });
        }
    }
    Ok(records)
}
