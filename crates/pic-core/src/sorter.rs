// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — In-Place Cycle Sorter
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! In-place counting/cycle sort of a particle store into per-cell ranges.
//!
//! A pass runs in five phases:
//!
//! 1. counting: `count[c]` over live store keys and incoming keys, then a
//!    prefix sum gives every cell its final range and a write cursor
//!    (`first_index[c]`);
//! 2. merge: each incoming particle claims the first slot of its cell not
//!    already holding that cell's key, the displaced occupant does the same
//!    in its own cell, and so on until an exited slot closes the chain; the
//!    chain is shifted one link and the incoming particle fills the head;
//! 3. removal: live particles sitting at or above the new total are
//!    folded in with the same chain, closing holes left by exits;
//! 4. truncation to the new total;
//! 5. relocation: every misplaced particle starts a chain that closes when
//!    an occupant belongs to the starting cell, and the cycle is rotated.
//!
//! Each relocated particle is written once per cycle and no shadow copy of
//! the store is made. When nothing changed cell and nothing arrives, the
//! pass degrades to an order-preserving erase of exited particles.

use crate::bins::BinIndex;
use crate::store::ParticleStore;
use log::{debug, trace};
use pic_types::constants::EXIT_KEY;
use pic_types::error::{PicError, PicResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Particles covered by the index after the pass.
    pub total: usize,
    pub merged: usize,
    pub removed: usize,
    /// Slot writes performed.
    pub moves: usize,
    pub cycles: usize,
    /// The erase-only path was taken.
    pub compacted: bool,
}

/// Reusable cycle scratch for sorting one store at a time.
#[derive(Debug, Default)]
pub struct InPlaceSorter {
    cycle: Vec<usize>,
}

impl InPlaceSorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counting pass and prefix sum over store and incoming keys.
    ///
    /// Every non-exit key must lie in `[0, n_cells)`.
    pub fn count(
        &self,
        store: &ParticleStore,
        incoming: &ParticleStore,
        index: &mut BinIndex,
    ) -> PicResult<usize> {
        let n_cells = index.n_cells();
        index.count.iter_mut().for_each(|c| *c = 0);
        for (source, keys) in [("store", store.cell_keys()), ("incoming", incoming.cell_keys())] {
            for (i, &key) in keys.iter().enumerate() {
                if key == EXIT_KEY {
                    continue;
                }
                if key < 0 || key >= n_cells as i64 {
                    return Err(PicError::InvariantViolation(format!(
                        "{source} particle {i} has key {key} outside [0, {n_cells})"
                    )));
                }
                index.count[key as usize] += 1;
            }
        }
        index.prefix_sum();
        Ok(index.total())
    }

    /// Full sort pass, merging `incoming` (keys already assigned).
    pub fn sort(
        &mut self,
        store: &mut ParticleStore,
        index: &mut BinIndex,
        incoming: &ParticleStore,
    ) -> PicResult<SortStats> {
        if incoming.is_empty() && index.is_layout_settled(store.cell_keys()) {
            return self.compact_erased(store, index);
        }

        let npart = store.len();
        let removed = store.cell_keys().iter().filter(|&&k| k == EXIT_KEY).count();
        let total = self.count(store, incoming, index)?;
        let mut stats = SortStats {
            total,
            merged: incoming.len(),
            removed,
            ..Default::default()
        };
        if total > npart {
            store.resize(total);
        }

        for ip in 0..incoming.len() {
            let target = incoming.cell_keys()[ip];
            if target == EXIT_KEY {
                stats.merged -= 1;
                continue;
            }
            self.cycle.clear();
            let head = claim_slot(store.cell_keys(), index, target)?;
            self.cycle.push(head);
            let next = store.cell_keys()[head];
            self.extend_chain(store.cell_keys(), index, next, EXIT_KEY)?;
            store.translate(&self.cycle);
            store.copy_from(head, incoming, ip);
            stats.moves += self.cycle.len();
            stats.cycles += 1;
        }

        for ip in total..npart {
            let target = store.cell_keys()[ip];
            if target == EXIT_KEY {
                continue;
            }
            self.cycle.clear();
            self.cycle.push(ip);
            self.extend_chain(store.cell_keys(), index, target, EXIT_KEY)?;
            store.translate(&self.cycle);
            stats.moves += self.cycle.len() - 1;
            stats.cycles += 1;
        }
        store.truncate(total);

        for cell in 0..index.n_cells() {
            // write cursor: slots below it were filled by the merge and removal phases
            let start = index.first_index[cell];
            let end = index.last_index[cell];
            for ip in start..end {
                let target = store.cell_keys()[ip];
                if target == cell as i64 {
                    continue;
                }
                self.cycle.clear();
                self.cycle.push(ip);
                self.extend_chain(store.cell_keys(), index, target, cell as i64)?;
                store.rotate(&self.cycle);
                stats.moves += self.cycle.len();
                stats.cycles += 1;
            }
        }
        index.restore_first_from_last();
        index.check_invariant()?;

        debug!(
            "cycle sort: {} particles, merged {}, removed {}, {} moves in {} cycles",
            stats.total, stats.merged, stats.removed, stats.moves, stats.cycles
        );
        Ok(stats)
    }

    /// Order-preserving erase of exited particles from a settled layout.
    ///
    /// Requires every live particle to already sit inside its cell's range.
    pub fn compact_erased(
        &mut self,
        store: &mut ParticleStore,
        index: &mut BinIndex,
    ) -> PicResult<SortStats> {
        if !index.is_layout_settled(store.cell_keys()) {
            return Err(PicError::InvariantViolation(
                "erase-with-mask needs every live particle inside its cell range".to_string(),
            ));
        }
        let (removed, moves) = store.erase_exited();
        let empty = ParticleStore::new(store.dims(), false)?;
        let total = self.count(store, &empty, index)?;
        index.check_invariant()?;
        trace!("erase-with-mask: removed {removed}, {moves} moves, {total} remain");
        Ok(SortStats {
            total,
            removed,
            moves,
            compacted: true,
            ..Default::default()
        })
    }

    /// Follow displaced occupants from `target` until one holds `stop`.
    fn extend_chain(
        &mut self,
        keys: &[i64],
        index: &mut BinIndex,
        mut target: i64,
        stop: i64,
    ) -> PicResult<()> {
        while target != stop {
            if target == EXIT_KEY {
                return Err(PicError::InvariantViolation(format!(
                    "relocation chain from slot {} hit an exited slot before closing",
                    self.cycle[0]
                )));
            }
            if self.cycle.len() > keys.len() {
                return Err(PicError::InvariantViolation(format!(
                    "relocation chain from slot {} does not close",
                    self.cycle[0]
                )));
            }
            let dest = claim_slot(keys, index, target)?;
            self.cycle.push(dest);
            target = keys[dest];
        }
        Ok(())
    }
}

/// Advance the write cursor of `target` past correctly placed occupants and
/// claim the slot it lands on.
fn claim_slot(keys: &[i64], index: &mut BinIndex, target: i64) -> PicResult<usize> {
    let cell = target as usize;
    let end = index.last_index[cell];
    let mut dest = index.first_index[cell];
    while dest < end && keys[dest] == target {
        dest += 1;
    }
    if dest >= end {
        return Err(PicError::InvariantViolation(format!(
            "cell {cell} has no free slot left before {end}"
        )));
    }
    index.first_index[cell] = dest + 1;
    Ok(dest)
}
