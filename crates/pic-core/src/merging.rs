// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Macro-Particle Merging
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-cell merging of macro-particles on a settled layout.
//!
//! Neighbouring slots of a crowded cell are merged pairwise. The first
//! particle keeps its position and takes the summed weight with
//! weight-averaged momentum; the second exits.
//! Total weight and total momentum of the cell are unchanged. Kinetic
//! energy is not conserved.

use crate::bins::BinIndex;
use crate::store::ParticleStore;
use pic_types::error::{PicError, PicResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Cells above the limit.
    pub crowded_cells: usize,
    /// Particles absorbed by a neighbour and marked as exits.
    pub merged: usize,
}

/// Merge every cell holding more than `max_per_cell` particles down
/// towards that limit. Only particles of equal charge state are paired.
///
/// Merged-away particles get the exit key; the caller compacts the store.
pub fn merge_cells(
    store: &mut ParticleStore,
    index: &BinIndex,
    max_per_cell: usize,
) -> PicResult<MergeStats> {
    if max_per_cell == 0 {
        return Err(PicError::ConfigError(
            "merging needs max_per_cell >= 1".to_string(),
        ));
    }
    if store.len() != index.total() || !index.is_layout_settled(store.cell_keys()) {
        return Err(PicError::InvariantViolation(
            "merging needs a sorted store".to_string(),
        ));
    }

    let mut stats = MergeStats::default();
    let mut chunk = store.as_chunk_mut();
    for cell in 0..index.n_cells() {
        let range = index.cell_range(cell);
        if range.len() <= max_per_cell {
            continue;
        }
        stats.crowded_cells += 1;
        let excess = range.len() - max_per_cell;
        let mut merged = 0;
        let mut i = range.start;
        while merged < excess && i + 1 < range.end {
            let j = i + 1;
            if chunk.charge[i] != chunk.charge[j] {
                i += 1;
                continue;
            }
            let (wi, wj) = (chunk.weight[i], chunk.weight[j]);
            let w = wi + wj;
            let (ui, uj) = (chunk.momentum(i), chunk.momentum(j));
            chunk.set_momentum(
                i,
                [
                    (wi * ui[0] + wj * uj[0]) / w,
                    (wi * ui[1] + wj * uj[1]) / w,
                    (wi * ui[2] + wj * uj[2]) / w,
                ],
            );
            if let Some(chi) = chunk.chi.as_mut() {
                chi[i] = (wi * chi[i] + wj * chi[j]) / w;
            }
            chunk.weight[i] = w;
            chunk.mark_exit(j);
            merged += 1;
            i += 2;
        }
        stats.merged += merged;
    }
    Ok(stats)
}
