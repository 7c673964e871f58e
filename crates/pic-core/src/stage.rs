// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Stage Operator Contract
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Interface between the pipeline scheduler and physics collaborators.
//!
//! An operator reads particle attributes of its range and the read-only
//! field grid. It may write its own particles' attributes, set the exit
//! sentinel, or push products and outbound particles into the scratch it
//! is handed. It never resizes or reorders the store.

use crate::fields::{DepositionBuffer, FieldGrid};
use crate::keys::CellKeyAssigner;
use crate::store::{ParticleChunkMut, ParticleRecord};
use std::fmt;
use std::ops::{AddAssign, Range};

/// Pipeline stages in causal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Interpolate,
    Ionize,
    Radiate,
    PairProduce,
    Push,
    /// Boundary conditions followed by cell-key recomputation.
    Boundary,
    Project,
}

impl StageKind {
    pub const ORDER: [StageKind; 7] = [
        StageKind::Interpolate,
        StageKind::Ionize,
        StageKind::Radiate,
        StageKind::PairProduce,
        StageKind::Push,
        StageKind::Boundary,
        StageKind::Project,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Interpolate => "interpolate",
            StageKind::Ionize => "ionize",
            StageKind::Radiate => "radiate",
            StageKind::PairProduce => "pair-produce",
            StageKind::Push => "push",
            StageKind::Boundary => "boundary",
            StageKind::Project => "project",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecoverable collaborator failure; the scheduler adds stage and bin.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StageError {
    pub message: String,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        StageError {
            message: message.into(),
        }
    }
}

/// Energy bookkeeping of one bin or pack, reduced after the barrier.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyTally {
    /// Kinetic energy of particles absorbed at boundaries.
    pub lost_boundary: f64,
    /// Energy removed by radiation reaction.
    pub radiated: f64,
    /// Photon energy converted into pairs.
    pub pair_converted: f64,
    /// Particles marked as exits during the pass.
    pub exits: usize,
    /// Products spawned during the pass.
    pub created: usize,
}

impl AddAssign<&EnergyTally> for EnergyTally {
    fn add_assign(&mut self, other: &EnergyTally) {
        self.lost_boundary += other.lost_boundary;
        self.radiated += other.radiated;
        self.pair_converted += other.pair_converted;
        self.exits += other.exits;
        self.created += other.created;
    }
}

/// Product particle bound for a species (by index).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnedParticle {
    pub target: usize,
    pub record: ParticleRecord,
}

/// Outbound particles per partition face, `[axis][0 = min, 1 = max]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeBuffers {
    faces: Vec<[Vec<ParticleRecord>; 2]>,
}

impl ExchangeBuffers {
    pub fn new(dims: usize) -> Self {
        ExchangeBuffers {
            faces: (0..dims).map(|_| [Vec::new(), Vec::new()]).collect(),
        }
    }

    pub fn push(&mut self, axis: usize, upper: bool, record: ParticleRecord) {
        if self.faces.len() <= axis {
            self.faces.resize_with(axis + 1, || [Vec::new(), Vec::new()]);
        }
        self.faces[axis][usize::from(upper)].push(record);
    }

    pub fn face(&self, axis: usize, upper: bool) -> &[ParticleRecord] {
        self.faces
            .get(axis)
            .map(|f| f[usize::from(upper)].as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.faces.iter().map(|f| f[0].len() + f[1].len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&mut self, other: &mut ExchangeBuffers) {
        for (axis, f) in other.faces.iter_mut().enumerate() {
            for upper in [false, true] {
                for record in f[usize::from(upper)].drain(..) {
                    self.push(axis, upper, record);
                }
            }
        }
    }

    /// All outbound records regardless of face.
    pub fn drain_all(&mut self) -> Vec<ParticleRecord> {
        let mut out = Vec::with_capacity(self.len());
        for f in &mut self.faces {
            out.append(&mut f[0]);
            out.append(&mut f[1]);
        }
        out
    }
}

/// Interpolated fields per particle of a chunk.
#[derive(Debug, Clone, Default)]
pub struct LocalFields {
    pub e: Vec<[f64; 3]>,
    pub b: Vec<[f64; 3]>,
}

impl LocalFields {
    pub fn new(len: usize) -> Self {
        LocalFields {
            e: vec![[0.0; 3]; len],
            b: vec![[0.0; 3]; len],
        }
    }
}

/// Per-bin (or per-pack) state owned by one task for a whole pass.
#[derive(Debug)]
pub struct StageScratch {
    pub fields: LocalFields,
    pub products: Vec<SpawnedParticle>,
    pub exchange: ExchangeBuffers,
    pub deposit: Option<DepositionBuffer>,
    pub tally: EnergyTally,
}

impl StageScratch {
    pub fn new(len: usize, dims: usize, deposit: Option<DepositionBuffer>) -> Self {
        StageScratch {
            fields: LocalFields::new(len),
            products: Vec::new(),
            exchange: ExchangeBuffers::new(dims),
            deposit,
            tally: EnergyTally::default(),
        }
    }

    pub fn spawn(&mut self, target: usize, record: ParticleRecord) {
        self.products.push(SpawnedParticle { target, record });
        self.tally.created += 1;
    }
}

/// Species-level constants visible to operators.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesProperties {
    pub name: String,
    pub index: usize,
    /// Electron masses; zero for photons.
    pub mass: f64,
}

/// Read-only inputs shared by every task of a pass.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub fields: &'a FieldGrid,
    pub assigner: &'a CellKeyAssigner,
    pub species: &'a SpeciesProperties,
    pub timestep: f64,
    pub time: f64,
}

pub trait StageOperator: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Apply the stage to chunk-local slots `range`.
    fn apply(
        &self,
        ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError>;
}
