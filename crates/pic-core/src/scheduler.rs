// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Pipeline Scheduler
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Drives stage operators over bins, in flat or task-graph mode.
//!
//! Flat mode hands each pack of slabs to one rayon worker, which runs the
//! whole stage sequence on it. Task-graph mode releases per-bin stage
//! nodes as their predecessors finish. Both end at the same barrier:
//! `run` returns only after every node has completed, which is what the
//! sorter's counting pass requires. Per-unit scratch (deposition windows,
//! products, outbound particles, energy tallies) is reduced afterwards by
//! the calling thread.

use crate::bins::{BinIndex, BinLayout};
use crate::fields::{DepositGrid, DepositionBuffer};
use crate::graph::{GraphNode, StageGraph};
use crate::stage::{
    EnergyTally, ExchangeBuffers, SpawnedParticle, StageContext, StageKind, StageOperator,
    StageScratch,
};
use crate::store::{ParticleChunkMut, ParticleStore};
use log::debug;
use pic_types::config::{SchedulerConfig, SchedulerMode};
use pic_types::error::{PicError, PicResult};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Reduced results of one pipeline pass.
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub tally: EnergyTally,
    pub products: Vec<SpawnedParticle>,
    pub exchange: ExchangeBuffers,
    /// Packs or bins executed.
    pub units: usize,
}

#[derive(Clone, Copy)]
struct PlannedStage<'c> {
    kind: StageKind,
    operator: Option<&'c dyn StageOperator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineScheduler {
    mode: SchedulerMode,
    pair_fan_in: bool,
}

impl PipelineScheduler {
    pub fn new(mode: SchedulerMode, pair_fan_in: bool) -> Self {
        PipelineScheduler { mode, pair_fan_in }
    }

    pub fn from_config(cfg: &SchedulerConfig) -> Self {
        Self::new(cfg.mode, cfg.pair_production_fan_in)
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    /// Stage sequence for an operator set; the boundary stage is always present.
    pub fn stage_list(operators: &[Box<dyn StageOperator>]) -> PicResult<Vec<StageKind>> {
        let mut kinds: Vec<StageKind> = operators.iter().map(|op| op.kind()).collect();
        kinds.sort();
        kinds.dedup();
        if kinds.len() != operators.len() {
            return Err(PicError::ConfigError(
                "at most one operator per stage kind".to_string(),
            ));
        }
        if let Err(at) = kinds.binary_search(&StageKind::Boundary) {
            kinds.insert(at, StageKind::Boundary);
        }
        Ok(kinds)
    }

    fn plan<'c>(operators: &'c [Box<dyn StageOperator>]) -> PicResult<Vec<PlannedStage<'c>>> {
        Ok(Self::stage_list(operators)?
            .into_iter()
            .map(|kind| PlannedStage {
                kind,
                operator: operators
                    .iter()
                    .find(|op| op.kind() == kind)
                    .map(|op| op.as_ref()),
            })
            .collect())
    }

    /// Run every stage over every bin, returning after the global barrier.
    ///
    /// The store must be settled: exactly `index.total()` particles, each in
    /// its cell range.
    pub fn run(
        &self,
        ctx: &StageContext<'_>,
        store: &mut ParticleStore,
        index: &BinIndex,
        layout: &BinLayout,
        operators: &[Box<dyn StageOperator>],
        deposit: Option<&mut DepositGrid>,
    ) -> PicResult<PassOutcome> {
        if store.len() != index.total() {
            return Err(PicError::InvariantViolation(format!(
                "pipeline started with {} particles but the index covers {}",
                store.len(),
                index.total()
            )));
        }
        if layout.n_cells() != index.n_cells() {
            return Err(PicError::InvariantViolation(format!(
                "layout spans {} cells, index {}",
                layout.n_cells(),
                index.n_cells()
            )));
        }
        let plan = Self::plan(operators)?;
        let projects = plan.iter().any(|p| p.kind == StageKind::Project);

        let scratches = match self.mode {
            SchedulerMode::Flat => {
                let spans = layout.pack_spans(index);
                let buffers: Vec<Option<DepositionBuffer>> = (0..layout.n_packs())
                    .map(|p| {
                        deposit
                            .as_deref()
                            .filter(|_| projects)
                            .map(|grid| grid.buffer_for_slabs(layout.pack_slabs(p)))
                    })
                    .collect();
                let chunks = store.chunks_mut(&spans)?;
                run_flat(ctx, &plan, chunks, buffers)?
            }
            SchedulerMode::TaskGraph => {
                let spans = layout.bin_spans(index);
                let buffers: Vec<Option<DepositionBuffer>> = (0..layout.n_bins())
                    .map(|b| {
                        deposit
                            .as_deref()
                            .filter(|_| projects)
                            .map(|grid| grid.buffer_for_slabs(layout.bin_slabs(b)))
                    })
                    .collect();
                let kinds: Vec<StageKind> = plan.iter().map(|p| p.kind).collect();
                let graph = StageGraph::build(layout.n_bins(), &kinds, self.pair_fan_in)?;
                let chunks = store.chunks_mut(&spans)?;
                run_task_graph(ctx, &plan, &graph, chunks, buffers)?
            }
        };

        let mut outcome = PassOutcome {
            exchange: ExchangeBuffers::new(ctx.assigner.dims()),
            units: scratches.len(),
            ..Default::default()
        };
        let mut deposit = deposit;
        for mut scratch in scratches {
            outcome.tally += &scratch.tally;
            outcome.products.append(&mut scratch.products);
            outcome.exchange.append(&mut scratch.exchange);
            if let (Some(grid), Some(buffer)) = (deposit.as_deref_mut(), scratch.deposit.as_ref()) {
                grid.accumulate(buffer);
            }
        }
        debug!(
            "{} pass ({:?}, {} units): {} exits, {} products, {} outbound",
            ctx.species.name,
            self.mode,
            outcome.units,
            outcome.tally.exits,
            outcome.products.len(),
            outcome.exchange.len()
        );
        Ok(outcome)
    }
}

fn run_stage(
    ctx: &StageContext<'_>,
    stage: &PlannedStage<'_>,
    chunk: &mut ParticleChunkMut<'_>,
    scratch: &mut StageScratch,
    unit: usize,
) -> PicResult<()> {
    let range = 0..chunk.len();
    if let Some(op) = stage.operator {
        op.apply(ctx, chunk, range.clone(), scratch)
            .map_err(|err| PicError::StageFailure {
                stage: stage.kind.name().to_string(),
                bin: unit,
                message: err.message,
            })?;
    }
    if stage.kind == StageKind::Boundary {
        scratch.tally.exits += ctx
            .assigner
            .assign_chunk(chunk, range)
            .map_err(|err| PicError::StageFailure {
                stage: StageKind::Boundary.name().to_string(),
                bin: unit,
                message: err.to_string(),
            })?;
    }
    Ok(())
}

fn run_flat(
    ctx: &StageContext<'_>,
    plan: &[PlannedStage<'_>],
    chunks: Vec<ParticleChunkMut<'_>>,
    buffers: Vec<Option<DepositionBuffer>>,
) -> PicResult<Vec<StageScratch>> {
    let dims = ctx.assigner.dims();
    let results: Vec<PicResult<StageScratch>> = chunks
        .into_par_iter()
        .zip(buffers.into_par_iter())
        .enumerate()
        .map(|(pack, (mut chunk, buffer))| {
            let mut scratch = StageScratch::new(chunk.len(), dims, buffer);
            for stage in plan {
                run_stage(ctx, stage, &mut chunk, &mut scratch, pack)?;
            }
            Ok(scratch)
        })
        .collect();
    results.into_iter().collect()
}

struct BinTask<'c> {
    chunk: ParticleChunkMut<'c>,
    scratch: StageScratch,
}

struct TaskShared<'s, 'c> {
    ctx: &'s StageContext<'s>,
    plan: &'s [PlannedStage<'s>],
    graph: &'s StageGraph,
    bins: &'s [Mutex<BinTask<'c>>],
    remaining: Vec<AtomicUsize>,
    abort: AtomicBool,
    failure: Mutex<Option<PicError>>,
}

fn run_task_graph(
    ctx: &StageContext<'_>,
    plan: &[PlannedStage<'_>],
    graph: &StageGraph,
    chunks: Vec<ParticleChunkMut<'_>>,
    buffers: Vec<Option<DepositionBuffer>>,
) -> PicResult<Vec<StageScratch>> {
    let dims = ctx.assigner.dims();
    let bins: Vec<Mutex<BinTask<'_>>> = chunks
        .into_iter()
        .zip(buffers)
        .map(|(chunk, buffer)| {
            let scratch = StageScratch::new(chunk.len(), dims, buffer);
            Mutex::new(BinTask { chunk, scratch })
        })
        .collect();

    let failure = {
        let shared = TaskShared {
            ctx,
            plan,
            graph,
            bins: &bins,
            remaining: (0..graph.len())
                .map(|id| AtomicUsize::new(graph.predecessor_count(id)))
                .collect(),
            abort: AtomicBool::new(false),
            failure: Mutex::new(None),
        };
        rayon::scope(|s| {
            for root in graph.roots() {
                spawn_node(s, root, &shared);
            }
        });
        shared
            .failure
            .into_inner()
            .map_err(|_| PicError::InvariantViolation("failure slot poisoned".to_string()))?
    };
    if let Some(err) = failure {
        return Err(err);
    }

    bins.into_iter()
        .enumerate()
        .map(|(bin, task)| {
            task.into_inner()
                .map(|t| t.scratch)
                .map_err(|_| PicError::InvariantViolation(format!("bin {bin} state poisoned")))
        })
        .collect()
}

fn spawn_node<'scope, 'c: 'scope>(
    scope: &rayon::Scope<'scope>,
    id: usize,
    shared: &'scope TaskShared<'scope, 'c>,
) {
    scope.spawn(move |s| {
        if !shared.abort.load(Ordering::Acquire) {
            if let Err(err) = execute_node(shared, id) {
                shared.abort.store(true, Ordering::Release);
                if let Ok(mut slot) = shared.failure.lock() {
                    slot.get_or_insert(err);
                }
            }
        }
        // Successors are released even after an abort so the scope drains.
        for &next in shared.graph.successors(id) {
            if shared.remaining[next].fetch_sub(1, Ordering::AcqRel) == 1 {
                spawn_node(s, next, shared);
            }
        }
    });
}

fn execute_node(shared: &TaskShared<'_, '_>, id: usize) -> PicResult<()> {
    let GraphNode::Stage { bin, kind } = shared.graph.node(id) else {
        return Ok(());
    };
    let stage = shared
        .plan
        .iter()
        .find(|p| p.kind == kind)
        .ok_or_else(|| PicError::InvariantViolation(format!("no plan entry for {kind}")))?;
    let mut guard = shared.bins[bin]
        .lock()
        .map_err(|_| PicError::InvariantViolation(format!("bin {bin} state poisoned")))?;
    let BinTask { chunk, scratch } = &mut *guard;
    run_stage(shared.ctx, stage, chunk, scratch, bin)
}
