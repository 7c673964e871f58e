// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Bin Index and Layout
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-cell partition tables and the grouping of cells into bins and packs.
//!
//! Between pipeline passes the particles of cell `c` occupy exactly the
//! slots `[first_index[c], last_index[c])`, cells follow each other without
//! gaps, and the first cell starts at slot 0.

use pic_types::constants::EXIT_KEY;
use pic_types::error::{PicError, PicResult};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinIndex {
    pub first_index: Vec<usize>,
    pub last_index: Vec<usize>,
    /// Scratch for the counting pass.
    pub count: Vec<usize>,
}

impl BinIndex {
    /// Empty index over `n_cells` cells.
    pub fn new(n_cells: usize) -> Self {
        BinIndex {
            first_index: vec![0; n_cells],
            last_index: vec![0; n_cells],
            count: vec![0; n_cells],
        }
    }

    pub fn n_cells(&self) -> usize {
        self.first_index.len()
    }

    /// Number of particles covered by the cell ranges.
    pub fn total(&self) -> usize {
        self.last_index.last().copied().unwrap_or(0)
    }

    pub fn cell_range(&self, cell: usize) -> Range<usize> {
        self.first_index[cell]..self.last_index[cell]
    }

    /// Particle slots spanned by a contiguous run of cells.
    pub fn span(&self, cells: Range<usize>) -> Range<usize> {
        if cells.is_empty() {
            let at = self.first_index.get(cells.start).copied().unwrap_or(self.total());
            return at..at;
        }
        self.first_index[cells.start]..self.last_index[cells.end - 1]
    }

    /// Change the number of cells; every cell becomes empty.
    pub fn resize(&mut self, n_cells: usize) {
        self.first_index.clear();
        self.first_index.resize(n_cells, 0);
        self.last_index.clear();
        self.last_index.resize(n_cells, 0);
        self.count.clear();
        self.count.resize(n_cells, 0);
    }

    /// Turn `count` into contiguous ranges starting at slot 0.
    pub fn prefix_sum(&mut self) {
        let mut cursor = 0;
        for c in 0..self.n_cells() {
            self.first_index[c] = cursor;
            cursor += self.count[c];
            self.last_index[c] = cursor;
        }
    }

    /// Reset every `first_index` from its predecessor's `last_index`.
    pub fn restore_first_from_last(&mut self) {
        for c in 0..self.n_cells() {
            self.first_index[c] = if c == 0 { 0 } else { self.last_index[c - 1] };
        }
    }

    /// Structural invariant: ranges are contiguous, ordered and match `count`.
    pub fn check_invariant(&self) -> PicResult<()> {
        let n = self.n_cells();
        if self.last_index.len() != n || self.count.len() != n {
            return Err(PicError::InvariantViolation(format!(
                "bin table lengths differ: first={}, last={}, count={}",
                n,
                self.last_index.len(),
                self.count.len()
            )));
        }
        if n == 0 {
            return Ok(());
        }
        if self.first_index[0] != 0 {
            return Err(PicError::InvariantViolation(format!(
                "first_index[0] = {}, expected 0",
                self.first_index[0]
            )));
        }
        for c in 0..n {
            if self.first_index[c] > self.last_index[c] {
                return Err(PicError::InvariantViolation(format!(
                    "cell {c}: first_index {} > last_index {}",
                    self.first_index[c], self.last_index[c]
                )));
            }
            if c + 1 < n && self.last_index[c] != self.first_index[c + 1] {
                return Err(PicError::InvariantViolation(format!(
                    "cell {c}: last_index {} != first_index[{}] {}",
                    self.last_index[c],
                    c + 1,
                    self.first_index[c + 1]
                )));
            }
        }
        let counted: usize = self.count.iter().sum();
        if counted != self.total() {
            return Err(PicError::InvariantViolation(format!(
                "count sum {counted} != covered particles {}",
                self.total()
            )));
        }
        Ok(())
    }

    /// Structural invariant plus: every slot of cell `c` holds key `c`.
    pub fn check_layout(&self, keys: &[i64]) -> PicResult<()> {
        self.check_invariant()?;
        if keys.len() < self.total() {
            return Err(PicError::InvariantViolation(format!(
                "{} keys cannot fill {} slots",
                keys.len(),
                self.total()
            )));
        }
        for c in 0..self.n_cells() {
            for slot in self.cell_range(c) {
                if keys[slot] != c as i64 {
                    return Err(PicError::InvariantViolation(format!(
                        "slot {slot} in cell {c} holds key {}",
                        keys[slot]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether every covered slot already holds its cell's key and the store
    /// has nothing beyond the covered range except exits.
    pub fn is_layout_settled(&self, keys: &[i64]) -> bool {
        (0..self.n_cells()).all(|c| {
            self.cell_range(c)
                .all(|slot| keys.get(slot).is_some_and(|&k| k == c as i64 || k == EXIT_KEY))
        }) && keys.len() >= self.total()
            && keys[self.total()..].iter().all(|&k| k == EXIT_KEY)
    }
}

/// Split `n` items across `k` buckets as evenly as possible.
pub fn balanced_split(n: usize, k: usize) -> Vec<usize> {
    let k = k.max(1);
    let base = n / k;
    let rem = n % k;
    (0..k).map(|i| base + usize::from(i < rem)).collect()
}

fn slab_groups(n_slabs: usize, slabs_per_group: usize) -> Vec<Range<usize>> {
    let groups = (n_slabs / slabs_per_group.max(1)).max(1);
    let mut start = 0;
    balanced_split(n_slabs, groups)
        .into_iter()
        .map(|len| {
            let r = start..start + len;
            start += len;
            r
        })
        .collect()
}

/// Grouping of x-slabs into task-graph bins and flat-mode packs.
///
/// Keys are x-major, so a run of slabs is a contiguous run of cells and
/// therefore a contiguous run of particle slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinLayout {
    slab_cells: usize,
    bins: Vec<Range<usize>>,
    packs: Vec<Range<usize>>,
}

impl BinLayout {
    pub fn new(
        n_slabs: usize,
        slab_cells: usize,
        cluster_width: usize,
        pack_slabs: usize,
    ) -> PicResult<Self> {
        if n_slabs == 0 || slab_cells == 0 {
            return Err(PicError::ConfigError(format!(
                "bin layout needs at least one slab and one cell per slab, got {n_slabs}x{slab_cells}"
            )));
        }
        if cluster_width == 0 || pack_slabs == 0 {
            return Err(PicError::ConfigError(
                "cluster_width and pack_slabs must be >= 1".to_string(),
            ));
        }
        Ok(BinLayout {
            slab_cells,
            bins: slab_groups(n_slabs, cluster_width),
            packs: slab_groups(n_slabs, pack_slabs),
        })
    }

    pub fn n_slabs(&self) -> usize {
        self.bins.last().map_or(0, |r| r.end)
    }

    pub fn n_cells(&self) -> usize {
        self.n_slabs() * self.slab_cells
    }

    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn n_packs(&self) -> usize {
        self.packs.len()
    }

    pub fn bin_slabs(&self, bin: usize) -> Range<usize> {
        self.bins[bin].clone()
    }

    pub fn pack_slabs(&self, pack: usize) -> Range<usize> {
        self.packs[pack].clone()
    }

    pub fn bin_cells(&self, bin: usize) -> Range<usize> {
        self.slabs_to_cells(&self.bins[bin])
    }

    pub fn pack_cells(&self, pack: usize) -> Range<usize> {
        self.slabs_to_cells(&self.packs[pack])
    }

    fn slabs_to_cells(&self, slabs: &Range<usize>) -> Range<usize> {
        slabs.start * self.slab_cells..slabs.end * self.slab_cells
    }

    /// Particle ranges of every bin, in bin order.
    pub fn bin_spans(&self, index: &BinIndex) -> Vec<Range<usize>> {
        (0..self.n_bins())
            .map(|b| index.span(self.bin_cells(b)))
            .collect()
    }

    /// Particle ranges of every pack, in pack order.
    pub fn pack_spans(&self, index: &BinIndex) -> Vec<Range<usize>> {
        (0..self.n_packs())
            .map(|p| index.span(self.pack_cells(p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_split_covers_all() {
        let parts = balanced_split(17, 4);
        assert_eq!(parts, vec![5, 4, 4, 4]);
        assert_eq!(parts.iter().sum::<usize>(), 17);
        assert_eq!(balanced_split(3, 0), vec![3]);
    }

    #[test]
    fn test_prefix_sum_and_invariant() {
        let mut index = BinIndex::new(3);
        index.count = vec![2, 0, 3];
        index.prefix_sum();
        assert_eq!(index.first_index, vec![0, 2, 2]);
        assert_eq!(index.last_index, vec![2, 2, 5]);
        assert_eq!(index.total(), 5);
        index.check_invariant().expect("valid index");
    }

    #[test]
    fn test_invariant_detects_gap() {
        let mut index = BinIndex::new(2);
        index.count = vec![1, 1];
        index.prefix_sum();
        index.first_index[1] = 2;
        index.last_index[1] = 3;
        let err = index.check_invariant().expect_err("gap must be reported");
        match err {
            PicError::InvariantViolation(msg) => assert!(msg.contains("cell 0")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_layout_rejects_foreign_key() {
        let mut index = BinIndex::new(2);
        index.count = vec![1, 1];
        index.prefix_sum();
        index.check_layout(&[0, 1]).expect("sorted layout");
        assert!(index.check_layout(&[1, 0]).is_err());
        assert!(index.is_layout_settled(&[0, EXIT_KEY, EXIT_KEY]));
        assert!(!index.is_layout_settled(&[0, 1, 1]));
    }

    #[test]
    fn test_span_of_cell_run() {
        let mut index = BinIndex::new(4);
        index.count = vec![1, 2, 0, 3];
        index.prefix_sum();
        assert_eq!(index.span(1..3), 1..3);
        assert_eq!(index.span(2..4), 3..6);
        assert_eq!(index.span(2..2), 3..3);
    }

    #[test]
    fn test_layout_groups_slabs() {
        let layout = BinLayout::new(9, 5, 2, 4).expect("valid layout");
        assert_eq!(layout.n_bins(), 4);
        assert_eq!(layout.bin_slabs(0), 0..3);
        assert_eq!(layout.bin_slabs(3), 7..9);
        assert_eq!(layout.n_packs(), 2);
        assert_eq!(layout.pack_cells(1), 25..45);
        assert_eq!(layout.n_cells(), 45);
    }

    #[test]
    fn test_layout_wider_than_grid() {
        let layout = BinLayout::new(3, 1, 8, 8).expect("valid layout");
        assert_eq!(layout.n_bins(), 1);
        assert_eq!(layout.bin_cells(0), 0..3);
    }

    #[test]
    fn test_layout_rejects_zero_width() {
        assert!(BinLayout::new(4, 4, 0, 1).is_err());
        assert!(BinLayout::new(0, 4, 1, 1).is_err());
    }
}
