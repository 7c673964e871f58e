// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Cell Key Assignment
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Discretization of particle positions into mixed-radix cell keys.
//!
//! `key = sum_axis(key * length[axis] + round(distance(axis) * dx_inv[axis]))`
//! with axis 0 most significant, so one x-slab is a contiguous key run.
//! Each axis measures distance either as a Cartesian offset from the local
//! origin or as the radial distance from the symmetry axis; the choice is
//! resolved once per axis when the assigner is built.

use crate::store::{ParticleChunkMut, ParticleRecord, ParticleStore};
use pic_types::config::{GeometryKind, SimulationConfig};
use pic_types::constants::{EXIT_KEY, MAX_DIMS};
use pic_types::error::{PicError, PicResult};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisMetric {
    /// Offset of one position component from the origin.
    Cartesian { component: usize },
    /// `sqrt(a^2 + b^2)` over two position components.
    Radial { components: [usize; 2] },
}

impl AxisMetric {
    #[inline]
    pub fn coordinate(self, position: &[f64; 3]) -> f64 {
        match self {
            AxisMetric::Cartesian { component } => position[component],
            AxisMetric::Radial { components: [a, b] } => {
                (position[a] * position[a] + position[b] * position[b]).sqrt()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CellKeyAssigner {
    geometry: GeometryKind,
    metrics: Vec<AxisMetric>,
    origin: Vec<f64>,
    cell_length: Vec<f64>,
    dx_inv: Vec<f64>,
    n_space: Vec<usize>,
    /// Key cells per axis, `n_space + 1`.
    length: Vec<usize>,
}

impl CellKeyAssigner {
    pub fn new(
        geometry: GeometryKind,
        origin: &[f64],
        cell_length: &[f64],
        n_space: &[usize],
    ) -> PicResult<Self> {
        let nd = geometry.field_dims();
        if origin.len() != nd || cell_length.len() != nd || n_space.len() != nd {
            return Err(PicError::ConfigError(format!(
                "{geometry:?} key assigner needs {nd} axes, got origin={}, cell_length={}, n_space={}",
                origin.len(),
                cell_length.len(),
                n_space.len()
            )));
        }
        if cell_length.iter().any(|&dx| !dx.is_finite() || dx <= 0.0) {
            return Err(PicError::ConfigError(
                "cell_length entries must be finite and > 0".to_string(),
            ));
        }
        let metrics = (0..nd)
            .map(|axis| {
                if geometry.is_radial_axis(axis) {
                    AxisMetric::Radial { components: [1, 2] }
                } else {
                    AxisMetric::Cartesian { component: axis }
                }
            })
            .collect();
        Ok(CellKeyAssigner {
            geometry,
            metrics,
            origin: origin.to_vec(),
            cell_length: cell_length.to_vec(),
            dx_inv: cell_length.iter().map(|dx| 1.0 / dx).collect(),
            n_space: n_space.to_vec(),
            length: n_space.iter().map(|n| n + 1).collect(),
        })
    }

    pub fn from_config(cfg: &SimulationConfig) -> PicResult<Self> {
        Self::new(cfg.geometry, &cfg.origin, &cfg.cell_length, &cfg.n_space)
    }

    pub fn geometry(&self) -> GeometryKind {
        self.geometry
    }

    pub fn dims(&self) -> usize {
        self.metrics.len()
    }

    pub fn metric(&self, axis: usize) -> AxisMetric {
        self.metrics[axis]
    }

    pub fn origin(&self) -> &[f64] {
        &self.origin
    }

    pub fn cell_length(&self) -> &[f64] {
        &self.cell_length
    }

    pub fn n_space(&self) -> &[usize] {
        &self.n_space
    }

    pub fn axis_lengths(&self) -> &[usize] {
        &self.length
    }

    pub fn n_cells(&self) -> usize {
        self.length.iter().product()
    }

    /// Cells in one x-slab.
    pub fn slab_cells(&self) -> usize {
        self.length[1..].iter().product()
    }

    pub fn domain_min(&self, axis: usize) -> f64 {
        self.origin[axis]
    }

    pub fn domain_max(&self, axis: usize) -> f64 {
        self.origin[axis] + self.n_space[axis] as f64 * self.cell_length[axis]
    }

    /// Per-axis distance from the local origin.
    #[inline]
    pub fn distances(&self, position: &[f64; 3]) -> [f64; MAX_DIMS] {
        let mut d = [0.0; MAX_DIMS];
        for (axis, metric) in self.metrics.iter().enumerate() {
            d[axis] = metric.coordinate(position) - self.origin[axis];
        }
        d
    }

    /// Key of a position, or the offending `(axis, index)` when out of range.
    #[inline]
    pub fn try_key(&self, position: &[f64; 3]) -> Result<i64, (usize, i64)> {
        let d = self.distances(position);
        let mut key: i64 = 0;
        for axis in 0..self.dims() {
            let scaled = (d[axis] * self.dx_inv[axis]).round();
            let len = self.length[axis] as i64;
            if !scaled.is_finite() || scaled < 0.0 || scaled >= len as f64 {
                let index = if scaled.is_finite() { scaled as i64 } else { i64::MIN };
                return Err((axis, index));
            }
            key = key * len + scaled as i64;
        }
        Ok(key)
    }

    fn checked(&self, particle: usize, position: &[f64; 3]) -> PicResult<i64> {
        self.try_key(position)
            .map_err(|(axis, index)| PicError::CellOutOfRange {
                particle,
                axis,
                index,
                length: self.length[axis],
            })
    }

    pub fn key_for_record(&self, particle: usize, record: &ParticleRecord) -> PicResult<i64> {
        self.checked(particle, &record.position)
    }

    /// Recompute keys over `range` of a chunk, skipping exited particles.
    ///
    /// Returns the number of exited particles seen.
    pub fn assign_chunk(&self, chunk: &mut ParticleChunkMut<'_>, range: Range<usize>) -> PicResult<usize> {
        let mut exits = 0;
        for i in range {
            if !chunk.is_active(i) {
                exits += 1;
                continue;
            }
            let position = chunk.position(i);
            chunk.cell_key[i] = self.checked(chunk.offset() + i, &position)?;
        }
        Ok(exits)
    }

    /// Recompute keys over `range` of a store, skipping exited particles.
    pub fn assign_range(&self, store: &mut ParticleStore, range: Range<usize>) -> PicResult<usize> {
        let mut chunk = store.as_chunk_mut();
        self.assign_chunk(&mut chunk, range)
    }

    /// Assign keys to a freshly built store; every particle must land in range.
    pub fn assign_all(&self, store: &mut ParticleStore) -> PicResult<()> {
        let mut chunk = store.as_chunk_mut();
        for i in 0..chunk.len() {
            let position = chunk.position(i);
            chunk.cell_key[i] = self.checked(i, &position)?;
        }
        Ok(())
    }

    /// Like [`assign_range`](Self::assign_range) but marks out-of-range
    /// particles as exits instead of failing. Returns their slots.
    pub fn assign_or_exit(&self, store: &mut ParticleStore) -> Vec<usize> {
        let mut chunk = store.as_chunk_mut();
        let mut dropped = Vec::new();
        for i in 0..chunk.len() {
            if !chunk.is_active(i) {
                continue;
            }
            let position = chunk.position(i);
            match self.try_key(&position) {
                Ok(key) => chunk.cell_key[i] = key,
                Err(_) => {
                    chunk.cell_key[i] = EXIT_KEY;
                    dropped.push(i);
                }
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(x: f64, y: f64, z: f64) -> ParticleRecord {
        ParticleRecord {
            position: [x, y, z],
            weight: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_mixed_radix_is_x_major() {
        let assigner =
            CellKeyAssigner::new(GeometryKind::Cartesian2d, &[0.0, 0.0], &[1.0, 0.5], &[4, 2])
                .expect("valid assigner");
        assert_eq!(assigner.axis_lengths(), &[5, 3]);
        assert_eq!(assigner.n_cells(), 15);
        assert_eq!(assigner.slab_cells(), 3);
        // x -> round(2.2) = 2, y -> round(0.6 / 0.5) = 1
        let key = assigner.key_for_record(0, &record_at(2.2, 0.6, 0.0)).expect("in range");
        assert_eq!(key, 2 * 3 + 1);
    }

    #[test]
    fn test_origin_offset() {
        let assigner =
            CellKeyAssigner::new(GeometryKind::Cartesian1d, &[10.0], &[0.5], &[8]).expect("valid");
        assert_eq!(assigner.key_for_record(0, &record_at(10.0, 0.0, 0.0)).expect("lower edge"), 0);
        assert_eq!(assigner.key_for_record(0, &record_at(14.0, 0.0, 0.0)).expect("upper edge"), 8);
        assert_eq!(assigner.domain_max(0), 14.0);
    }

    #[test]
    fn test_radial_axis_uses_distance_from_axis() {
        let assigner =
            CellKeyAssigner::new(GeometryKind::Cylindrical, &[0.0, 0.0], &[1.0, 1.0], &[4, 4])
                .expect("valid assigner");
        assert_eq!(assigner.metric(1), AxisMetric::Radial { components: [1, 2] });
        // (1.8, 2.4) lies at r = 3
        let key = assigner
            .key_for_record(0, &record_at(1.0, 1.8, 2.4))
            .expect("r = 3 in range");
        assert_eq!(key, 5 + 3);
    }

    #[test]
    fn test_out_of_range_reports_axis() {
        let assigner =
            CellKeyAssigner::new(GeometryKind::Cartesian2d, &[0.0, 0.0], &[1.0, 1.0], &[4, 4])
                .expect("valid assigner");
        let err = assigner
            .key_for_record(7, &record_at(1.0, -0.9, 0.0))
            .expect_err("below lower bound");
        match err {
            PicError::CellOutOfRange {
                particle,
                axis,
                index,
                length,
            } => {
                assert_eq!(particle, 7);
                assert_eq!(axis, 1);
                assert_eq!(index, -1);
                assert_eq!(length, 5);
            }
            other => panic!("Unexpected error: {other:?}"),
        }
        assert!(assigner.try_key(&record_at(f64::NAN, 0.0, 0.0).position).is_err());
    }

    #[test]
    fn test_assign_range_skips_exits() {
        let assigner =
            CellKeyAssigner::new(GeometryKind::Cartesian1d, &[0.0], &[1.0], &[4]).expect("valid");
        let mut store = ParticleStore::new(1, false).expect("valid store");
        store.push(&record_at(1.2, 0.0, 0.0), 0);
        store.push(&record_at(3.0, 0.0, 0.0), EXIT_KEY);
        store.push(&record_at(3.9, 0.0, 0.0), 0);
        let exits = assigner.assign_range(&mut store, 0..3).expect("all in range");
        assert_eq!(exits, 1);
        assert_eq!(store.cell_keys(), &[1, EXIT_KEY, 4]);
    }

    #[test]
    fn test_assign_or_exit_marks_outside() {
        let assigner =
            CellKeyAssigner::new(GeometryKind::Cartesian1d, &[2.0], &[1.0], &[4]).expect("valid");
        let mut store = ParticleStore::new(1, false).expect("valid store");
        store.push(&record_at(1.0, 0.0, 0.0), 0);
        store.push(&record_at(3.0, 0.0, 0.0), 0);
        let dropped = assigner.assign_or_exit(&mut store);
        assert_eq!(dropped, vec![0]);
        assert_eq!(store.cell_keys(), &[EXIT_KEY, 1]);
    }
}
