// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Field Grid and Deposition Buffers
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Node grids shared by interpolation and projection.
//!
//! Every axis carries `n_space + 1 + 2 * oversize` nodes; node
//! `oversize + k` sits at distance `k * dx` from the local origin. The
//! three-point second-order shape is used both ways, so a particle reads
//! and writes the same stencil.

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use pic_types::constants::{MAX_DIMS, SHAPE_SUPPORT};
use pic_types::error::{PicError, PicResult};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    dx_inv: Vec<f64>,
    oversize: usize,
    nodes: Vec<usize>,
}

impl GridGeometry {
    pub fn new(cell_length: &[f64], n_space: &[usize], oversize: usize) -> PicResult<Self> {
        if cell_length.len() != n_space.len() || n_space.is_empty() || n_space.len() > MAX_DIMS {
            return Err(PicError::ConfigError(format!(
                "grid needs 1..={MAX_DIMS} matching axes, got cell_length={}, n_space={}",
                cell_length.len(),
                n_space.len()
            )));
        }
        if oversize < SHAPE_SUPPORT {
            return Err(PicError::ConfigError(format!(
                "oversize {oversize} cannot hold a shape of support {SHAPE_SUPPORT}"
            )));
        }
        if cell_length.iter().any(|&dx| !dx.is_finite() || dx <= 0.0) {
            return Err(PicError::ConfigError(
                "grid cell_length entries must be finite and > 0".to_string(),
            ));
        }
        Ok(GridGeometry {
            dx_inv: cell_length.iter().map(|dx| 1.0 / dx).collect(),
            oversize,
            nodes: n_space.iter().map(|n| n + 1 + 2 * oversize).collect(),
        })
    }

    pub fn dims(&self) -> usize {
        self.nodes.len()
    }

    pub fn oversize(&self) -> usize {
        self.oversize
    }

    pub fn shape(&self) -> &[usize] {
        &self.nodes
    }

    /// Stencil of a particle at per-axis `distances` from the origin, or
    /// `None` when the stencil would leave the node grid.
    pub fn stencil(&self, distances: &[f64; MAX_DIMS]) -> Option<Stencil> {
        let mut stencil = Stencil {
            dims: self.dims(),
            base: [0; MAX_DIMS],
            weights: [[0.0; 3]; MAX_DIMS],
        };
        for axis in 0..self.dims() {
            let xn = distances[axis] * self.dx_inv[axis];
            if !xn.is_finite() {
                return None;
            }
            let nearest = xn.round();
            let delta = xn - nearest;
            let node = self.oversize as i64 + nearest as i64;
            if node < 1 || node + 1 >= self.nodes[axis] as i64 {
                return None;
            }
            stencil.base[axis] = (node - 1) as usize;
            stencil.weights[axis] = [
                0.5 * (0.5 - delta) * (0.5 - delta),
                0.75 - delta * delta,
                0.5 * (0.5 + delta) * (0.5 + delta),
            ];
        }
        Some(stencil)
    }

    /// Node window along x touched by particles of slabs `slabs`,
    /// allowing them to drift `oversize - 1` slabs out.
    pub fn window_for_slabs(&self, slabs: Range<usize>) -> Range<usize> {
        let end = (slabs.end + 2 * self.oversize).min(self.nodes[0]);
        slabs.start.min(end)..end
    }
}

/// Second-order weights over `3^dims` nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    dims: usize,
    base: [usize; MAX_DIMS],
    weights: [[f64; 3]; MAX_DIMS],
}

impl Stencil {
    pub fn for_each(&self, mut f: impl FnMut(&[usize], f64)) {
        let points = 3usize.pow(self.dims as u32);
        let mut idx = [0usize; MAX_DIMS];
        for flat in 0..points {
            let mut rem = flat;
            let mut w = 1.0;
            for axis in 0..self.dims {
                let k = rem % 3;
                rem /= 3;
                idx[axis] = self.base[axis] + k;
                w *= self.weights[axis][k];
            }
            f(&idx[..self.dims], w);
        }
    }

    pub fn base(&self, axis: usize) -> usize {
        self.base[axis]
    }
}

fn zeros(shape: &[usize]) -> ArrayD<f64> {
    ArrayD::zeros(IxDyn(shape))
}

fn shift_axis0(a: &mut ArrayD<f64>, cells: usize) {
    let n = a.shape()[0];
    if cells >= n {
        a.fill(0.0);
        return;
    }
    let tail = a.slice_axis(Axis(0), Slice::from(cells..)).to_owned();
    a.slice_axis_mut(Axis(0), Slice::from(..n - cells)).assign(&tail);
    a.slice_axis_mut(Axis(0), Slice::from(n - cells..)).fill(0.0);
}

/// Electromagnetic field on the node grid; read-only during a pass.
#[derive(Debug, Clone)]
pub struct FieldGrid {
    geometry: GridGeometry,
    pub e: [ArrayD<f64>; 3],
    pub b: [ArrayD<f64>; 3],
}

impl FieldGrid {
    pub fn new(geometry: GridGeometry) -> Self {
        let shape = geometry.shape().to_vec();
        FieldGrid {
            geometry,
            e: [zeros(&shape), zeros(&shape), zeros(&shape)],
            b: [zeros(&shape), zeros(&shape), zeros(&shape)],
        }
    }

    pub fn uniform(geometry: GridGeometry, e: [f64; 3], b: [f64; 3]) -> Self {
        let mut grid = Self::new(geometry);
        for c in 0..3 {
            grid.e[c].fill(e[c]);
            grid.b[c].fill(b[c]);
        }
        grid
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// E and B at a particle, `None` outside the node grid.
    pub fn interpolate(&self, distances: &[f64; MAX_DIMS]) -> Option<([f64; 3], [f64; 3])> {
        let stencil = self.geometry.stencil(distances)?;
        let mut e = [0.0; 3];
        let mut b = [0.0; 3];
        stencil.for_each(|idx, w| {
            for c in 0..3 {
                e[c] += w * self.e[c][idx];
                b[c] += w * self.b[c][idx];
            }
        });
        Some((e, b))
    }

    /// Drop `cells` node planes at the lower x edge; new planes are zero.
    pub fn shift_x(&mut self, cells: usize) {
        for a in self.e.iter_mut().chain(self.b.iter_mut()) {
            shift_axis0(a, cells);
        }
    }
}

/// Charge density and current accumulated over one pass.
#[derive(Debug, Clone)]
pub struct DepositGrid {
    geometry: GridGeometry,
    pub rho: ArrayD<f64>,
    pub j: [ArrayD<f64>; 3],
}

impl DepositGrid {
    pub fn new(geometry: GridGeometry) -> Self {
        let shape = geometry.shape().to_vec();
        DepositGrid {
            geometry,
            rho: zeros(&shape),
            j: [zeros(&shape), zeros(&shape), zeros(&shape)],
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn clear(&mut self) {
        self.rho.fill(0.0);
        for j in &mut self.j {
            j.fill(0.0);
        }
    }

    /// Empty buffer over the x-window of `slabs`.
    pub fn buffer_for_slabs(&self, slabs: Range<usize>) -> DepositionBuffer {
        DepositionBuffer::new(&self.geometry, self.geometry.window_for_slabs(slabs))
    }

    /// Add a buffer into its window.
    pub fn accumulate(&mut self, buffer: &DepositionBuffer) {
        let window = Slice::from(buffer.x_nodes.clone());
        let mut rho = self.rho.slice_axis_mut(Axis(0), window);
        rho += &buffer.rho;
        for c in 0..3 {
            let mut j = self.j[c].slice_axis_mut(Axis(0), window);
            j += &buffer.j[c];
        }
        for (stencil, charge, current) in &buffer.spill {
            stencil.for_each(|idx, w| {
                self.rho[idx] += w * charge;
                for c in 0..3 {
                    self.j[c][idx] += w * current[c];
                }
            });
        }
    }

    pub fn total_charge(&self) -> f64 {
        self.rho.sum()
    }

    pub fn shift_x(&mut self, cells: usize) {
        shift_axis0(&mut self.rho, cells);
        for j in &mut self.j {
            shift_axis0(j, cells);
        }
    }
}

/// Exclusively owned deposition window of one bin or pack.
///
/// Stencils that fall outside the window (periodic wrap, long drifts) are
/// kept aside and replayed onto the full grid when the buffer is merged.
#[derive(Debug, Clone)]
pub struct DepositionBuffer {
    x_nodes: Range<usize>,
    pub rho: ArrayD<f64>,
    pub j: [ArrayD<f64>; 3],
    spill: Vec<(Stencil, f64, [f64; 3])>,
}

impl DepositionBuffer {
    pub fn new(geometry: &GridGeometry, x_nodes: Range<usize>) -> Self {
        let mut shape = geometry.shape().to_vec();
        shape[0] = x_nodes.len();
        DepositionBuffer {
            x_nodes,
            rho: zeros(&shape),
            j: [zeros(&shape), zeros(&shape), zeros(&shape)],
            spill: Vec::new(),
        }
    }

    pub fn x_nodes(&self) -> Range<usize> {
        self.x_nodes.clone()
    }

    /// Stencils deposited outside the window.
    pub fn spilled(&self) -> usize {
        self.spill.len()
    }

    /// Spread `charge` and `current` over a stencil.
    pub fn deposit(&mut self, stencil: &Stencil, charge: f64, current: [f64; 3]) {
        let lo = stencil.base(0);
        if lo < self.x_nodes.start || lo + 3 > self.x_nodes.end {
            self.spill.push((*stencil, charge, current));
            return;
        }
        let x0 = self.x_nodes.start;
        stencil.for_each(|idx, w| {
            let mut local = [0usize; MAX_DIMS];
            local[..idx.len()].copy_from_slice(idx);
            local[0] -= x0;
            let at = &local[..idx.len()];
            self.rho[at] += w * charge;
            for c in 0..3 {
                self.j[c][at] += w * current[c];
            }
        });
    }
}
