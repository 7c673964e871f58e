// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Partition Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! All species of one domain partition plus their shared grids.
//!
//! `advance` runs every species up to its barrier and routes cross-species
//! products; `finalize` merges inbound transport buffers and sorts. The
//! outbound buffers returned by `advance` belong to the transport layer.

use crate::fields::{DepositGrid, FieldGrid, GridGeometry};
use crate::sorter::SortStats;
use crate::species::Species;
use crate::stage::{EnergyTally, ExchangeBuffers, SpawnedParticle};
use crate::store::ParticleRecord;
use crate::window::MovingWindow;
use log::{debug, info};
use pic_types::config::SimulationConfig;
use pic_types::error::{PicError, PicResult};

/// Result of one partition-wide pipeline pass.
#[derive(Debug, Default)]
pub struct AdvanceReport {
    pub tally: EnergyTally,
    /// Products handed to another species of this partition.
    pub routed: usize,
    /// Outbound particles per species, indexed like the species list.
    pub outbound: Vec<ExchangeBuffers>,
}

#[derive(Debug, Default)]
pub struct StepReport {
    pub time: f64,
    pub tally: EnergyTally,
    pub routed: usize,
    pub sort: Vec<SortStats>,
    pub outbound: Vec<ExchangeBuffers>,
    /// Particles removed by per-cell merging.
    pub merged: usize,
    /// Slabs dropped by a moving-window shift this step.
    pub window_shift: Option<usize>,
}

pub struct Partition {
    fields: FieldGrid,
    deposit: DepositGrid,
    species: Vec<Species>,
    window: Option<MovingWindow>,
    cell_length: Vec<f64>,
    timestep: f64,
    time: f64,
    steps: u64,
    /// Energy accounting accumulated over all steps.
    totals: EnergyTally,
}

impl Partition {
    pub fn from_config(cfg: &SimulationConfig) -> PicResult<Self> {
        cfg.validate()?;
        let geometry = GridGeometry::new(&cfg.cell_length, &cfg.n_space, cfg.oversize)?;
        let species = (0..cfg.species.len())
            .map(|i| Species::from_config(cfg, i))
            .collect::<PicResult<Vec<_>>>()?;
        let window = cfg
            .moving_window
            .as_ref()
            .map(MovingWindow::from_config)
            .transpose()?;
        info!(
            "partition {:?} {:?}: {} species, {:?} scheduler",
            cfg.geometry,
            cfg.n_space,
            species.len(),
            cfg.scheduler.mode
        );
        Ok(Partition {
            fields: FieldGrid::new(geometry.clone()),
            deposit: DepositGrid::new(geometry),
            species,
            window,
            cell_length: cfg.cell_length.clone(),
            timestep: cfg.timestep,
            time: 0.0,
            steps: 0,
            totals: EnergyTally::default(),
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn fields(&self) -> &FieldGrid {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldGrid {
        &mut self.fields
    }

    pub fn deposit(&self) -> &DepositGrid {
        &self.deposit
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn species_mut(&mut self, index: usize) -> Option<&mut Species> {
        self.species.get_mut(index)
    }

    pub fn totals(&self) -> &EnergyTally {
        &self.totals
    }

    pub fn live_particles(&self) -> usize {
        self.species.iter().map(Species::live_count).sum()
    }

    /// Inject particles into one species through the injection interface.
    pub fn inject(&mut self, species: usize, records: &[ParticleRecord]) -> PicResult<usize> {
        let n_species = self.species.len();
        self.species
            .get_mut(species)
            .ok_or_else(|| {
                PicError::InvariantViolation(format!(
                    "injection targets species {species} of {n_species}"
                ))
            })?
            .inject(records)
    }

    /// Pipeline pass over every species, deposition grid rebuilt from zero.
    pub fn advance(&mut self) -> PicResult<AdvanceReport> {
        self.deposit.clear();
        let mut report = AdvanceReport::default();
        let mut products: Vec<SpawnedParticle> = Vec::new();
        for sp in &mut self.species {
            let mut outcome = sp.advance(&self.fields, Some(&mut self.deposit), self.time)?;
            report.tally += &outcome.tally;
            products.append(&mut outcome.products);
            report.outbound.push(outcome.exchange);
        }

        let n_species = self.species.len();
        let mut routed: Vec<Vec<ParticleRecord>> = vec![Vec::new(); n_species];
        for p in products {
            routed
                .get_mut(p.target)
                .ok_or_else(|| {
                    PicError::InvariantViolation(format!(
                        "product targets species {} of {n_species}",
                        p.target
                    ))
                })?
                .push(p.record);
        }
        for (sp, records) in self.species.iter_mut().zip(&routed) {
            if !records.is_empty() {
                report.routed += sp.inject(records)?;
                debug!("routed {} products into {}", records.len(), sp.name());
            }
        }
        Ok(report)
    }

    /// Merge inbound particles (one buffer per species, missing = none) and sort.
    pub fn finalize(&mut self, inbound: &[Vec<ParticleRecord>]) -> PicResult<Vec<SortStats>> {
        if inbound.len() > self.species.len() {
            return Err(PicError::InvariantViolation(format!(
                "{} inbound buffers for {} species",
                inbound.len(),
                self.species.len()
            )));
        }
        self.species
            .iter_mut()
            .enumerate()
            .map(|(i, sp)| sp.finalize(inbound.get(i).map(Vec::as_slice).unwrap_or(&[])))
            .collect()
    }

    /// One full step without inbound particles, merging, then the
    /// moving-window check.
    pub fn step(&mut self) -> PicResult<StepReport> {
        let advance = self.advance()?;
        let sort = self.finalize(&[])?;
        let mut merged = 0;
        for sp in &mut self.species {
            merged += sp.merge(self.time)?.merged;
        }
        let mut tally = advance.tally;

        self.time += self.timestep;
        self.steps += 1;

        let mut window_shift = None;
        if let Some(window) = self.window.as_mut() {
            let (origin, n_space) = match self.species.first() {
                Some(sp) => (sp.assigner().origin().to_vec(), sp.assigner().n_space().to_vec()),
                None => (Vec::new(), Vec::new()),
            };
            if let Some(change) = window.poll(self.time, &origin, &n_space, &self.cell_length) {
                self.fields.shift_x(change.shifted_cells);
                self.deposit.shift_x(change.shifted_cells);
                for sp in &mut self.species {
                    tally += &sp.apply_geometry_change(&change)?;
                }
                window_shift = Some(change.shifted_cells);
            }
        }
        self.totals += &tally;
        Ok(StepReport {
            time: self.time,
            tally,
            routed: advance.routed,
            sort,
            outbound: advance.outbound,
            merged,
            window_shift,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "geometry": "cartesian1d",
        "n_space": [16],
        "cell_length": [1.0],
        "timestep": 0.2,
        "species": [
            {"name": "electron", "mass": 1.0, "charge": -1,
             "boundaries": [{"min": "periodic", "max": "periodic"}]},
            {"name": "ion", "mass": 100.0, "charge": 0,
             "boundaries": [{"min": "periodic", "max": "periodic"}],
             "ionization": {"threshold_field": 0.1, "max_charge": 2,
                            "electron_species": "electron"}}
        ]
    }"#;

    fn ion(x: f64) -> ParticleRecord {
        ParticleRecord {
            position: [x, 0.0, 0.0],
            weight: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_ionization_products_reach_electron_species() {
        let cfg = SimulationConfig::from_json_str(CONFIG).expect("valid config");
        let mut partition = Partition::from_config(&cfg).expect("partition");
        for e in partition.fields_mut().e[0].iter_mut() {
            *e = 0.5;
        }
        partition.inject(1, &[ion(3.0), ion(9.0)]).expect("inject");

        let first = partition.step().expect("first step");
        assert_eq!(first.routed, 2);
        assert_eq!(partition.species()[0].live_count(), 2);
        assert_eq!(partition.species()[1].store().charges(), &[1, 1]);

        partition.step().expect("second step");
        partition.step().expect("third step");
        // charge capped at 2
        assert_eq!(partition.species()[0].live_count(), 4);
        assert_eq!(partition.live_particles(), 6);
        assert_eq!(partition.totals().created, 4);
        assert!((partition.time() - 0.6).abs() < 1e-12);
        for sp in partition.species() {
            sp.verify_layout().expect("settled");
        }
    }

    #[test]
    fn test_finalize_rejects_extra_buffers() {
        let cfg = SimulationConfig::from_json_str(CONFIG).expect("valid config");
        let mut partition = Partition::from_config(&cfg).expect("partition");
        let err = partition
            .finalize(&[Vec::new(), Vec::new(), Vec::new()])
            .expect_err("three buffers for two species");
        assert!(err.is_fatal_to_step());
    }

    #[test]
    fn test_inbound_particles_are_merged() {
        let cfg = SimulationConfig::from_json_str(CONFIG).expect("valid config");
        let mut partition = Partition::from_config(&cfg).expect("partition");
        let stats = partition
            .finalize(&[vec![ion(2.0), ion(14.5)]])
            .expect("merge");
        assert_eq!(stats[0].merged, 2);
        assert_eq!(partition.species()[0].live_count(), 2);
        assert_eq!(partition.species()[1].live_count(), 0);
    }
}
