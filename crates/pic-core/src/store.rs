// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Particle Store
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Structure-of-arrays macro-particle storage.
//!
//! The store is an index-addressed arena: nothing outside it holds a
//! reference to a particle, only slot numbers re-derived from the bin
//! index. Momentum is stored per unit species mass (gamma * beta) for
//! massive species and in electron-mass units for photons.

use pic_types::constants::{EXIT_KEY, MAX_DIMS};
use pic_types::error::{PicError, PicResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Owned copy of one particle, used for products and transport buffers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleRecord {
    /// Unused trailing components are zero.
    pub position: [f64; 3],
    pub momentum: [f64; 3],
    pub weight: f64,
    pub charge: i16,
    #[serde(default)]
    pub chi: f64,
}

/// Lorentz factor for a momentum given per unit mass.
pub fn lorentz_factor(momentum: [f64; 3]) -> f64 {
    (1.0 + dot(momentum, momentum)).sqrt()
}

/// Kinetic energy carried by a macro-particle, in electron rest-energy units.
pub fn kinetic_energy(mass: f64, momentum: [f64; 3], weight: f64) -> f64 {
    let u2 = dot(momentum, momentum);
    if mass == 0.0 {
        weight * u2.sqrt()
    } else {
        weight * mass * ((1.0 + u2).sqrt() - 1.0)
    }
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[derive(Debug, Clone)]
pub struct ParticleStore {
    position: Vec<Vec<f64>>,
    momentum: [Vec<f64>; 3],
    weight: Vec<f64>,
    charge: Vec<i16>,
    chi: Option<Vec<f64>>,
    cell_key: Vec<i64>,
}

impl ParticleStore {
    pub fn new(dims: usize, track_chi: bool) -> PicResult<Self> {
        if dims == 0 || dims > MAX_DIMS {
            return Err(PicError::ConfigError(format!(
                "particle position dimensionality must be in [1, {MAX_DIMS}], got {dims}"
            )));
        }
        Ok(ParticleStore {
            position: vec![Vec::new(); dims],
            momentum: [Vec::new(), Vec::new(), Vec::new()],
            weight: Vec::new(),
            charge: Vec::new(),
            chi: track_chi.then(Vec::new),
            cell_key: Vec::new(),
        })
    }

    /// Build a store from records; every key starts as the exit sentinel.
    pub fn from_records(
        dims: usize,
        track_chi: bool,
        records: &[ParticleRecord],
    ) -> PicResult<Self> {
        let mut store = Self::new(dims, track_chi)?;
        store.reserve(records.len());
        for record in records {
            store.push(record, EXIT_KEY);
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.cell_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_key.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.position.len()
    }

    pub fn tracks_chi(&self) -> bool {
        self.chi.is_some()
    }

    pub fn reserve(&mut self, additional: usize) {
        for p in &mut self.position {
            p.reserve(additional);
        }
        for m in &mut self.momentum {
            m.reserve(additional);
        }
        self.weight.reserve(additional);
        self.charge.reserve(additional);
        if let Some(chi) = &mut self.chi {
            chi.reserve(additional);
        }
        self.cell_key.reserve(additional);
    }

    pub fn cell_keys(&self) -> &[i64] {
        &self.cell_key
    }

    pub fn cell_keys_mut(&mut self) -> &mut [i64] {
        &mut self.cell_key
    }

    pub fn positions(&self, component: usize) -> &[f64] {
        &self.position[component]
    }

    pub fn momenta(&self, component: usize) -> &[f64] {
        &self.momentum[component]
    }

    pub fn weights(&self) -> &[f64] {
        &self.weight
    }

    pub fn charges(&self) -> &[i16] {
        &self.charge
    }

    pub fn chi(&self) -> Option<&[f64]> {
        self.chi.as_deref()
    }

    pub fn momentum(&self, i: usize) -> [f64; 3] {
        [self.momentum[0][i], self.momentum[1][i], self.momentum[2][i]]
    }

    /// Append one particle with the given key.
    pub fn push(&mut self, record: &ParticleRecord, key: i64) {
        for (axis, p) in self.position.iter_mut().enumerate() {
            p.push(record.position[axis]);
        }
        for (c, m) in self.momentum.iter_mut().enumerate() {
            m.push(record.momentum[c]);
        }
        self.weight.push(record.weight);
        self.charge.push(record.charge);
        if let Some(chi) = &mut self.chi {
            chi.push(record.chi);
        }
        self.cell_key.push(key);
    }

    pub fn record(&self, i: usize) -> ParticleRecord {
        let mut position = [0.0; 3];
        for (axis, p) in self.position.iter().enumerate() {
            position[axis] = p[i];
        }
        ParticleRecord {
            position,
            momentum: self.momentum(i),
            weight: self.weight[i],
            charge: self.charge[i],
            chi: self.chi.as_ref().map_or(0.0, |chi| chi[i]),
        }
    }

    /// Grow with exit-keyed empty slots, or shrink from the tail.
    pub fn resize(&mut self, n: usize) {
        for p in &mut self.position {
            p.resize(n, 0.0);
        }
        for m in &mut self.momentum {
            m.resize(n, 0.0);
        }
        self.weight.resize(n, 0.0);
        self.charge.resize(n, 0);
        if let Some(chi) = &mut self.chi {
            chi.resize(n, 0.0);
        }
        self.cell_key.resize(n, EXIT_KEY);
    }

    pub fn truncate(&mut self, n: usize) {
        if n < self.len() {
            self.resize(n);
        }
    }

    /// Copy slot `src` over slot `dst`, key included.
    pub fn overwrite(&mut self, src: usize, dst: usize) {
        if src == dst {
            return;
        }
        for p in &mut self.position {
            p[dst] = p[src];
        }
        for m in &mut self.momentum {
            m[dst] = m[src];
        }
        self.weight[dst] = self.weight[src];
        self.charge[dst] = self.charge[src];
        if let Some(chi) = &mut self.chi {
            chi[dst] = chi[src];
        }
        self.cell_key[dst] = self.cell_key[src];
    }

    /// Copy slot `src` of `other` over slot `dst` of `self`, key included.
    pub fn copy_from(&mut self, dst: usize, other: &ParticleStore, src: usize) {
        for (axis, p) in self.position.iter_mut().enumerate() {
            p[dst] = other.position.get(axis).map_or(0.0, |q| q[src]);
        }
        for (c, m) in self.momentum.iter_mut().enumerate() {
            m[dst] = other.momentum[c][src];
        }
        self.weight[dst] = other.weight[src];
        self.charge[dst] = other.charge[src];
        if let Some(chi) = &mut self.chi {
            chi[dst] = other.chi.as_ref().map_or(0.0, |q| q[src]);
        }
        self.cell_key[dst] = other.cell_key[src];
    }

    /// Shift every particle one link forward along `cycle`.
    ///
    /// The occupant of `cycle[i - 1]` lands in `cycle[i]`; the last slot is
    /// overwritten and `cycle[0]` is left for the caller to fill.
    pub fn translate(&mut self, cycle: &[usize]) {
        for i in (1..cycle.len()).rev() {
            self.overwrite(cycle[i - 1], cycle[i]);
        }
    }

    /// Rotate `cycle` one link forward, the last occupant wrapping to `cycle[0]`.
    pub fn rotate(&mut self, cycle: &[usize]) {
        let Some(&last) = cycle.last() else {
            return;
        };
        if cycle.len() < 2 {
            return;
        }
        let saved = self.record(last);
        let saved_key = self.cell_key[last];
        self.translate(cycle);
        let head = cycle[0];
        self.write_record(head, &saved);
        self.cell_key[head] = saved_key;
    }

    fn write_record(&mut self, i: usize, record: &ParticleRecord) {
        for (axis, p) in self.position.iter_mut().enumerate() {
            p[i] = record.position[axis];
        }
        for (c, m) in self.momentum.iter_mut().enumerate() {
            m[i] = record.momentum[c];
        }
        self.weight[i] = record.weight;
        self.charge[i] = record.charge;
        if let Some(chi) = &mut self.chi {
            chi[i] = record.chi;
        }
    }

    /// Order-preserving erase of every exit-keyed particle.
    ///
    /// Returns `(removed, moved)`.
    pub fn erase_exited(&mut self) -> (usize, usize) {
        let n = self.len();
        let mut write = 0;
        let mut moved = 0;
        for read in 0..n {
            if self.cell_key[read] == EXIT_KEY {
                continue;
            }
            if read != write {
                self.overwrite(read, write);
                moved += 1;
            }
            write += 1;
        }
        self.truncate(write);
        (n - write, moved)
    }

    /// Mutable view of the whole store.
    pub fn as_chunk_mut(&mut self) -> ParticleChunkMut<'_> {
        let n = self.len();
        let ParticleStore {
            position,
            momentum,
            weight,
            charge,
            chi,
            cell_key,
        } = self;
        let [mx, my, mz] = momentum;
        ParticleChunkMut {
            offset: 0,
            position: position.iter_mut().map(|p| &mut p[..n]).collect(),
            momentum: [&mut mx[..], &mut my[..], &mut mz[..]],
            weight: &mut weight[..],
            charge: &mut charge[..],
            chi: chi.as_deref_mut(),
            cell_key: &mut cell_key[..],
        }
    }

    /// Split into disjoint mutable views, one per range.
    ///
    /// Ranges must be sorted, non-overlapping and inside the store.
    pub fn chunks_mut(&mut self, ranges: &[Range<usize>]) -> PicResult<Vec<ParticleChunkMut<'_>>> {
        let mut cursor = 0;
        for r in ranges {
            if r.start < cursor || r.end < r.start || r.end > self.len() {
                return Err(PicError::InvariantViolation(format!(
                    "chunk range {r:?} overlaps or exceeds store of {} particles",
                    self.len()
                )));
            }
            cursor = r.end;
        }

        let ParticleStore {
            position,
            momentum,
            weight,
            charge,
            chi,
            cell_key,
        } = self;
        let [mx, my, mz] = momentum;
        let mut pos_parts: Vec<std::vec::IntoIter<&mut [f64]>> = position
            .iter_mut()
            .map(|p| split_ranges(p, ranges).into_iter())
            .collect();
        let mut mx_parts = split_ranges(mx, ranges).into_iter();
        let mut my_parts = split_ranges(my, ranges).into_iter();
        let mut mz_parts = split_ranges(mz, ranges).into_iter();
        let mut w_parts = split_ranges(weight, ranges).into_iter();
        let mut q_parts = split_ranges(charge, ranges).into_iter();
        let mut chi_parts = chi
            .as_deref_mut()
            .map(|c| split_ranges(c, ranges).into_iter());
        let mut key_parts = split_ranges(cell_key, ranges).into_iter();

        let mut chunks = Vec::with_capacity(ranges.len());
        for r in ranges {
            let missing = || PicError::InvariantViolation(format!("missing slice for {r:?}"));
            let position = pos_parts
                .iter_mut()
                .map(|it| it.next().ok_or_else(missing))
                .collect::<PicResult<Vec<_>>>()?;
            let chi = match chi_parts.as_mut() {
                Some(it) => Some(it.next().ok_or_else(missing)?),
                None => None,
            };
            chunks.push(ParticleChunkMut {
                offset: r.start,
                position,
                momentum: [
                    mx_parts.next().ok_or_else(missing)?,
                    my_parts.next().ok_or_else(missing)?,
                    mz_parts.next().ok_or_else(missing)?,
                ],
                weight: w_parts.next().ok_or_else(missing)?,
                charge: q_parts.next().ok_or_else(missing)?,
                chi,
                cell_key: key_parts.next().ok_or_else(missing)?,
            });
        }
        Ok(chunks)
    }
}

fn split_ranges<'a, T>(mut slice: &'a mut [T], ranges: &[Range<usize>]) -> Vec<&'a mut [T]> {
    let mut consumed = 0;
    let mut parts = Vec::with_capacity(ranges.len());
    for r in ranges {
        let rest = std::mem::take(&mut slice);
        let (_, rest) = rest.split_at_mut(r.start - consumed);
        let (head, tail) = rest.split_at_mut(r.end - r.start);
        parts.push(head);
        slice = tail;
        consumed = r.end;
    }
    parts
}

/// Mutable window onto a contiguous slot range of a [`ParticleStore`].
///
/// Indices are local to the chunk; `offset` gives the first global slot.
#[derive(Debug)]
pub struct ParticleChunkMut<'a> {
    offset: usize,
    pub position: Vec<&'a mut [f64]>,
    pub momentum: [&'a mut [f64]; 3],
    pub weight: &'a mut [f64],
    pub charge: &'a mut [i16],
    pub chi: Option<&'a mut [f64]>,
    pub cell_key: &'a mut [i64],
}

impl ParticleChunkMut<'_> {
    pub fn len(&self) -> usize {
        self.cell_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_key.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn dims(&self) -> usize {
        self.position.len()
    }

    pub fn is_active(&self, i: usize) -> bool {
        self.cell_key[i] != EXIT_KEY
    }

    /// Position padded to three components.
    pub fn position(&self, i: usize) -> [f64; 3] {
        let mut x = [0.0; 3];
        for (axis, p) in self.position.iter().enumerate() {
            x[axis] = p[i];
        }
        x
    }

    pub fn momentum(&self, i: usize) -> [f64; 3] {
        [self.momentum[0][i], self.momentum[1][i], self.momentum[2][i]]
    }

    pub fn set_momentum(&mut self, i: usize, u: [f64; 3]) {
        for (c, m) in self.momentum.iter_mut().enumerate() {
            m[i] = u[c];
        }
    }

    pub fn record(&self, i: usize) -> ParticleRecord {
        ParticleRecord {
            position: self.position(i),
            momentum: self.momentum(i),
            weight: self.weight[i],
            charge: self.charge[i],
            chi: self.chi.as_ref().map_or(0.0, |chi| chi[i]),
        }
    }

    pub fn mark_exit(&mut self, i: usize) {
        self.cell_key[i] = EXIT_KEY;
    }
}
