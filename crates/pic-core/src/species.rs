// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Particle Species
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One particle species of a partition.
//!
//! A step is `advance` (pipeline pass up to the barrier) followed by
//! `finalize` (merge of inbound particles and the sort that restores the
//! bin invariant). Between the two the store may hold exited particles and
//! particles outside their cell range; after `finalize` it never does.

use crate::bins::{BinIndex, BinLayout};
use crate::fields::{DepositGrid, FieldGrid};
use crate::keys::CellKeyAssigner;
use crate::merging::{merge_cells, MergeStats};
use crate::operators::{frozen_operators, species_operators};
use crate::scheduler::{PassOutcome, PipelineScheduler};
use crate::sorter::{InPlaceSorter, SortStats};
use crate::stage::{EnergyTally, SpeciesProperties, StageContext, StageOperator};
use crate::store::{kinetic_energy, ParticleRecord, ParticleStore};
use crate::window::GeometryChange;
use log::{debug, info};
use pic_types::config::SimulationConfig;
use pic_types::error::{PicError, PicResult};

pub struct Species {
    properties: SpeciesProperties,
    store: ParticleStore,
    index: BinIndex,
    layout: BinLayout,
    assigner: CellKeyAssigner,
    sorter: InPlaceSorter,
    operators: Vec<Box<dyn StageOperator>>,
    frozen: Vec<Box<dyn StageOperator>>,
    scheduler: PipelineScheduler,
    timestep: f64,
    time_frozen: f64,
    /// Per-cell particle limit enforced by merging.
    merge_limit: Option<usize>,
    cluster_width: usize,
    pack_slabs: usize,
}

impl Species {
    /// Species `index` of `cfg` with its configured operator set.
    pub fn from_config(cfg: &SimulationConfig, index: usize) -> PicResult<Self> {
        let operators = species_operators(cfg, index)?;
        let frozen = frozen_operators(cfg, index)?;
        Self::with_operators(cfg, index, operators, frozen)
    }

    /// Species `index` of `cfg` driven by caller-supplied operators.
    pub fn with_operators(
        cfg: &SimulationConfig,
        index: usize,
        operators: Vec<Box<dyn StageOperator>>,
        frozen: Vec<Box<dyn StageOperator>>,
    ) -> PicResult<Self> {
        let sp = cfg.species.get(index).ok_or_else(|| {
            PicError::ConfigError(format!("species index {index} out of range"))
        })?;
        PipelineScheduler::stage_list(&operators)?;
        PipelineScheduler::stage_list(&frozen)?;
        let assigner = CellKeyAssigner::from_config(cfg)?;
        let layout = BinLayout::new(
            assigner.axis_lengths()[0],
            assigner.slab_cells(),
            cfg.cluster_width,
            cfg.pack_slabs,
        )?;
        Ok(Species {
            properties: SpeciesProperties {
                name: sp.name.clone(),
                index,
                mass: sp.mass,
            },
            store: ParticleStore::new(cfg.geometry.particle_dims(), sp.track_quantum_parameter)?,
            index: BinIndex::new(assigner.n_cells()),
            layout,
            assigner,
            sorter: InPlaceSorter::new(),
            operators,
            frozen,
            scheduler: PipelineScheduler::from_config(&cfg.scheduler),
            timestep: cfg.timestep,
            time_frozen: sp.time_frozen,
            merge_limit: sp.merging.as_ref().map(|m| m.max_per_cell),
            cluster_width: cfg.cluster_width,
            pack_slabs: cfg.pack_slabs,
        })
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    pub fn properties(&self) -> &SpeciesProperties {
        &self.properties
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn bin_index(&self) -> &BinIndex {
        &self.index
    }

    pub fn layout(&self) -> &BinLayout {
        &self.layout
    }

    pub fn assigner(&self) -> &CellKeyAssigner {
        &self.assigner
    }

    pub fn scheduler(&self) -> PipelineScheduler {
        self.scheduler
    }

    pub fn set_scheduler(&mut self, scheduler: PipelineScheduler) {
        self.scheduler = scheduler;
    }

    /// Particles covered by the bin index.
    pub fn live_count(&self) -> usize {
        self.index.total()
    }

    pub fn is_frozen(&self, time: f64) -> bool {
        time < self.time_frozen
    }

    /// Append particles with keys computed against the local axes.
    ///
    /// They stay outside the cell ranges until the next sort.
    pub fn inject(&mut self, records: &[ParticleRecord]) -> PicResult<usize> {
        let base = self.store.len();
        let keys = records
            .iter()
            .enumerate()
            .map(|(i, r)| self.assigner.key_for_record(base + i, r))
            .collect::<PicResult<Vec<i64>>>()?;
        self.store.reserve(records.len());
        for (record, key) in records.iter().zip(keys) {
            self.store.push(record, key);
        }
        Ok(records.len())
    }

    /// Sort if anything was injected since the last pass.
    fn settle(&mut self) -> PicResult<Option<SortStats>> {
        if self.store.len() == self.index.total() && self.index.is_layout_settled(self.store.cell_keys()) {
            return Ok(None);
        }
        let empty = ParticleStore::new(self.store.dims(), false)?;
        self.sorter
            .sort(&mut self.store, &mut self.index, &empty)
            .map(Some)
    }

    /// Run the pipeline once. Products targeting this species are injected
    /// right away; the others are returned with the outbound particles.
    pub fn advance(
        &mut self,
        fields: &FieldGrid,
        deposit: Option<&mut DepositGrid>,
        time: f64,
    ) -> PicResult<PassOutcome> {
        self.settle()?;
        let operators = if self.is_frozen(time) {
            &self.frozen
        } else {
            &self.operators
        };
        let ctx = StageContext {
            fields,
            assigner: &self.assigner,
            species: &self.properties,
            timestep: self.timestep,
            time,
        };
        let mut outcome = self
            .scheduler
            .run(&ctx, &mut self.store, &self.index, &self.layout, operators, deposit)?;

        let own = self.properties.index;
        let (mine, others): (Vec<_>, Vec<_>) =
            outcome.products.into_iter().partition(|p| p.target == own);
        outcome.products = others;
        if !mine.is_empty() {
            let records: Vec<ParticleRecord> = mine.into_iter().map(|p| p.record).collect();
            self.inject(&records)?;
        }
        Ok(outcome)
    }

    /// Merge `inbound` particles and restore the bin invariant.
    pub fn finalize(&mut self, inbound: &[ParticleRecord]) -> PicResult<SortStats> {
        let mut incoming =
            ParticleStore::from_records(self.store.dims(), self.store.tracks_chi(), inbound)?;
        self.assigner.assign_all(&mut incoming)?;
        let stats = self.sorter.sort(&mut self.store, &mut self.index, &incoming)?;
        debug!(
            "{}: {} live after sort ({} merged, {} removed)",
            self.properties.name, stats.total, stats.merged, stats.removed
        );
        Ok(stats)
    }

    /// `advance`, `finalize` with no inbound particles, then `merge`.
    pub fn step(
        &mut self,
        fields: &FieldGrid,
        deposit: Option<&mut DepositGrid>,
        time: f64,
    ) -> PicResult<(PassOutcome, SortStats)> {
        let outcome = self.advance(fields, deposit, time)?;
        let stats = self.finalize(&[])?;
        self.merge(time)?;
        Ok((outcome, stats))
    }

    /// Merge crowded cells of a sorted store and erase the merged-away
    /// particles. A no-op without a merge limit or while frozen.
    pub fn merge(&mut self, time: f64) -> PicResult<MergeStats> {
        let Some(limit) = self.merge_limit else {
            return Ok(MergeStats::default());
        };
        if self.is_frozen(time) {
            return Ok(MergeStats::default());
        }
        let stats = merge_cells(&mut self.store, &self.index, limit)?;
        if stats.merged > 0 {
            self.sorter.compact_erased(&mut self.store, &mut self.index)?;
            debug!(
                "{}: merged {} particles in {} cells",
                self.properties.name, stats.merged, stats.crowded_cells
            );
        }
        Ok(stats)
    }

    /// Re-derive keys, index and layout for a changed local domain.
    ///
    /// Particles left outside the new bounds exit and their kinetic energy
    /// is reported as boundary loss.
    pub fn apply_geometry_change(&mut self, change: &GeometryChange) -> PicResult<EnergyTally> {
        let assigner = CellKeyAssigner::new(
            self.assigner.geometry(),
            &change.origin,
            self.assigner.cell_length(),
            &change.n_space,
        )?;
        let layout = BinLayout::new(
            assigner.axis_lengths()[0],
            assigner.slab_cells(),
            self.cluster_width,
            self.pack_slabs,
        )?;

        let dropped = assigner.assign_or_exit(&mut self.store);
        let mut tally = EnergyTally::default();
        for &slot in &dropped {
            tally.lost_boundary += kinetic_energy(
                self.properties.mass,
                self.store.momentum(slot),
                self.store.weights()[slot],
            );
        }
        tally.exits = dropped.len();

        self.assigner = assigner;
        self.layout = layout;
        self.index.resize(self.assigner.n_cells());
        let empty = ParticleStore::new(self.store.dims(), false)?;
        let stats = self.sorter.sort(&mut self.store, &mut self.index, &empty)?;
        info!(
            "{}: domain now starts at {:?}, {} particles dropped, {} remain",
            self.properties.name, change.origin, tally.exits, stats.total
        );
        Ok(tally)
    }

    /// Full layout check: structural invariant plus keys inside their ranges.
    pub fn verify_layout(&self) -> PicResult<()> {
        if self.store.len() != self.index.total() {
            return Err(PicError::InvariantViolation(format!(
                "{}: store holds {} particles, index covers {}",
                self.properties.name,
                self.store.len(),
                self.index.total()
            )));
        }
        self.index.check_layout(self.store.cell_keys())
    }
}
