// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — PIC Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{SCHWINGER_FIELD_DEFAULT, SHAPE_SUPPORT};
use crate::error::{PicError, PicResult};
use serde::{Deserialize, Serialize};

/// Spatial geometry of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    Cartesian1d,
    Cartesian2d,
    Cartesian3d,
    /// Azimuthal-mode cylindrical: field axes (x, r), particle positions (x, y, z).
    Cylindrical,
}

impl GeometryKind {
    /// Number of field (and cell-key) axes.
    pub fn field_dims(self) -> usize {
        match self {
            GeometryKind::Cartesian1d => 1,
            GeometryKind::Cartesian2d => 2,
            GeometryKind::Cartesian3d => 3,
            GeometryKind::Cylindrical => 2,
        }
    }

    /// Number of stored position components per particle.
    pub fn particle_dims(self) -> usize {
        match self {
            GeometryKind::Cartesian1d => 1,
            GeometryKind::Cartesian2d => 2,
            GeometryKind::Cartesian3d => 3,
            GeometryKind::Cylindrical => 3,
        }
    }

    /// Whether field axis `axis` measures distance from the symmetry axis.
    pub fn is_radial_axis(self, axis: usize) -> bool {
        self == GeometryKind::Cylindrical && axis == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerMode {
    /// Parallel loop over fixed-size packs of x-slabs.
    #[default]
    Flat,
    /// Per-bin stage DAG executed on the thread pool.
    TaskGraph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub mode: SchedulerMode,
    /// Pair production waits for every bin's interpolation (task-graph mode).
    #[serde(default = "default_true")]
    pub pair_production_fan_in: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            mode: SchedulerMode::Flat,
            pair_production_fan_in: true,
        }
    }
}

/// Particle boundary condition on one face of the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Periodic,
    Reflective,
    Absorbing,
    /// Particle leaves through the face into a transport buffer.
    Exchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisBoundary {
    pub min: BoundaryKind,
    pub max: BoundaryKind,
}

impl AxisBoundary {
    pub fn both(kind: BoundaryKind) -> Self {
        AxisBoundary {
            min: kind,
            max: kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IonizationParams {
    /// |E| above which one electron is released per step.
    pub threshold_field: f64,
    /// Charge state at which ionization stops.
    pub max_charge: i16,
    /// Species receiving the released electrons.
    pub electron_species: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiationParams {
    #[serde(default = "default_schwinger_field")]
    pub schwinger_field: f64,
    /// Scales the continuous energy loss d(gamma)/dt = coefficient * chi^2.
    pub loss_coefficient: f64,
    /// Below this quantum parameter no energy is radiated.
    #[serde(default = "default_chi_min")]
    pub chi_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairProductionParams {
    #[serde(default = "default_schwinger_field")]
    pub schwinger_field: f64,
    /// Photon quantum parameter above which the photon decays into a pair.
    pub chi_threshold: f64,
    pub electron_species: String,
    pub positron_species: String,
}

/// Per-cell merging of macro-particles after the sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergingParams {
    /// Cells holding more particles than this are merged down to it.
    pub max_per_cell: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    /// Mass in electron masses; 0 marks photons.
    pub mass: f64,
    /// Initial charge state in units of e.
    pub charge: i16,
    /// Species is only projected (not moved) while `time < time_frozen`.
    #[serde(default)]
    pub time_frozen: f64,
    /// One entry per field axis.
    pub boundaries: Vec<AxisBoundary>,
    /// Store the quantum parameter chi per particle.
    #[serde(default)]
    pub track_quantum_parameter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ionization: Option<IonizationParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radiation: Option<RadiationParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_production: Option<PairProductionParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merging: Option<MergingParams>,
}

impl SpeciesConfig {
    pub fn is_massless(&self) -> bool {
        self.mass == 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingWindowConfig {
    /// Window velocity along x (normalized, <= 1).
    pub velocity_x: f64,
    #[serde(default)]
    pub delay: f64,
    /// Number of x-slabs dropped at the lower edge per shift.
    #[serde(default = "default_cells_per_shift")]
    pub cells_per_shift: usize,
}

/// Top-level configuration of one domain partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub geometry: GeometryKind,
    /// Number of cells per field axis in this partition.
    pub n_space: Vec<usize>,
    pub cell_length: Vec<f64>,
    /// Lower corner of the local domain; zeros when omitted.
    #[serde(default)]
    pub origin: Vec<f64>,
    /// Ghost nodes on each side of the field grid.
    #[serde(default = "default_oversize")]
    pub oversize: usize,
    pub timestep: f64,
    /// x-slabs per task-graph bin.
    #[serde(default = "default_cluster_width")]
    pub cluster_width: usize,
    /// x-slabs per flat-mode pack.
    #[serde(default = "default_pack_slabs")]
    pub pack_slabs: usize,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub species: Vec<SpeciesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moving_window: Option<MovingWindowConfig>,
}

fn default_true() -> bool {
    true
}
fn default_schwinger_field() -> f64 {
    SCHWINGER_FIELD_DEFAULT
}
fn default_chi_min() -> f64 {
    1e-3
}
fn default_cells_per_shift() -> usize {
    1
}
fn default_oversize() -> usize {
    2
}
fn default_cluster_width() -> usize {
    2
}
fn default_pack_slabs() -> usize {
    1
}

impl SimulationConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &str) -> PicResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> PicResult<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        if config.origin.is_empty() {
            config.origin = vec![0.0; config.geometry.field_dims()];
        }
        config.validate()?;
        Ok(config)
    }

    /// Key cells per axis (`n_space + 1` dual cells).
    pub fn key_cells(&self) -> Vec<usize> {
        self.n_space.iter().map(|n| n + 1).collect()
    }

    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name)
    }

    pub fn validate(&self) -> PicResult<()> {
        let nd = self.geometry.field_dims();
        if self.n_space.len() != nd || self.cell_length.len() != nd || self.origin.len() != nd {
            return Err(PicError::ConfigError(format!(
                "{:?} needs {nd} entries in n_space/cell_length/origin, got {}/{}/{}",
                self.geometry,
                self.n_space.len(),
                self.cell_length.len(),
                self.origin.len()
            )));
        }
        if self.n_space.iter().any(|&n| n == 0) {
            return Err(PicError::ConfigError(
                "n_space entries must be >= 1".to_string(),
            ));
        }
        if self
            .cell_length
            .iter()
            .any(|&dx| !dx.is_finite() || dx <= 0.0)
        {
            return Err(PicError::ConfigError(
                "cell_length entries must be finite and > 0".to_string(),
            ));
        }
        if self.origin.iter().any(|o| !o.is_finite()) {
            return Err(PicError::ConfigError(
                "origin entries must be finite".to_string(),
            ));
        }
        if self.geometry == GeometryKind::Cylindrical && self.origin[1] != 0.0 {
            return Err(PicError::ConfigError(
                "cylindrical partitions must start on the symmetry axis (origin[1] = 0)".to_string(),
            ));
        }
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(PicError::ConfigError(format!(
                "timestep must be finite and > 0, got {}",
                self.timestep
            )));
        }
        if self.oversize < SHAPE_SUPPORT {
            return Err(PicError::ConfigError(format!(
                "oversize must be >= {SHAPE_SUPPORT}, got {}",
                self.oversize
            )));
        }
        if self.cluster_width == 0 || self.pack_slabs == 0 {
            return Err(PicError::ConfigError(
                "cluster_width and pack_slabs must be >= 1".to_string(),
            ));
        }
        for (i, sp) in self.species.iter().enumerate() {
            if self.species[..i].iter().any(|other| other.name == sp.name) {
                return Err(PicError::ConfigError(format!(
                    "duplicate species name '{}'",
                    sp.name
                )));
            }
            self.validate_species(sp)?;
        }
        if let Some(window) = &self.moving_window {
            if !window.velocity_x.is_finite() || window.velocity_x <= 0.0 || window.velocity_x > 1.0
            {
                return Err(PicError::ConfigError(format!(
                    "moving window velocity must be in (0, 1], got {}",
                    window.velocity_x
                )));
            }
            if window.cells_per_shift == 0 || window.cells_per_shift > self.n_space[0] {
                return Err(PicError::ConfigError(format!(
                    "moving window cells_per_shift must be in [1, {}]",
                    self.n_space[0]
                )));
            }
        }
        Ok(())
    }

    fn validate_species(&self, sp: &SpeciesConfig) -> PicResult<()> {
        let nd = self.geometry.field_dims();
        if !sp.mass.is_finite() || sp.mass < 0.0 {
            return Err(PicError::ConfigError(format!(
                "species '{}' mass must be finite and >= 0",
                sp.name
            )));
        }
        if sp.boundaries.len() != nd {
            return Err(PicError::ConfigError(format!(
                "species '{}' needs {nd} boundary entries, got {}",
                sp.name,
                sp.boundaries.len()
            )));
        }
        for (axis, bc) in sp.boundaries.iter().enumerate() {
            if self.geometry.is_radial_axis(axis)
                && (bc.min == BoundaryKind::Periodic || bc.max == BoundaryKind::Periodic)
            {
                return Err(PicError::ConfigError(format!(
                    "species '{}': radial axis cannot be periodic",
                    sp.name
                )));
            }
            if (bc.min == BoundaryKind::Periodic) != (bc.max == BoundaryKind::Periodic) {
                return Err(PicError::ConfigError(format!(
                    "species '{}': periodic boundary on axis {axis} must apply to both faces",
                    sp.name
                )));
            }
        }
        if let Some(ion) = &sp.ionization {
            if sp.is_massless() {
                return Err(PicError::ConfigError(format!(
                    "massless species '{}' cannot be ionized",
                    sp.name
                )));
            }
            if !ion.threshold_field.is_finite() || ion.threshold_field <= 0.0 {
                return Err(PicError::ConfigError(format!(
                    "species '{}' ionization threshold must be finite and > 0",
                    sp.name
                )));
            }
            self.require_species(&ion.electron_species, &sp.name)?;
        }
        if let Some(rad) = &sp.radiation {
            if sp.is_massless() {
                return Err(PicError::ConfigError(format!(
                    "massless species '{}' cannot radiate",
                    sp.name
                )));
            }
            if !rad.loss_coefficient.is_finite()
                || rad.loss_coefficient < 0.0
                || !rad.schwinger_field.is_finite()
                || rad.schwinger_field <= 0.0
            {
                return Err(PicError::ConfigError(format!(
                    "species '{}' radiation parameters must be finite and positive",
                    sp.name
                )));
            }
        }
        if let Some(pair) = &sp.pair_production {
            if !sp.is_massless() {
                return Err(PicError::ConfigError(format!(
                    "pair production requires a massless species, '{}' has mass {}",
                    sp.name, sp.mass
                )));
            }
            if !pair.chi_threshold.is_finite() || pair.chi_threshold <= 0.0 {
                return Err(PicError::ConfigError(format!(
                    "species '{}' pair-production chi_threshold must be finite and > 0",
                    sp.name
                )));
            }
            self.require_species(&pair.electron_species, &sp.name)?;
            self.require_species(&pair.positron_species, &sp.name)?;
        }
        if let Some(merge) = &sp.merging {
            if merge.max_per_cell == 0 {
                return Err(PicError::ConfigError(format!(
                    "species '{}' merging max_per_cell must be >= 1",
                    sp.name
                )));
            }
        }
        Ok(())
    }

    fn require_species(&self, target: &str, source: &str) -> PicResult<()> {
        if self.species_index(target).is_none() {
            return Err(PicError::ConfigError(format!(
                "species '{source}' routes products to unknown species '{target}'"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const MINIMAL_2D: &str = r#"{
        "geometry": "cartesian2d",
        "n_space": [16, 8],
        "cell_length": [0.5, 0.5],
        "timestep": 0.2,
        "species": [
            {
                "name": "electron",
                "mass": 1.0,
                "charge": -1,
                "boundaries": [
                    {"min": "exchange", "max": "exchange"},
                    {"min": "periodic", "max": "periodic"}
                ]
            }
        ]
    }"#;

    fn config_path(relative: &str) -> String {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(relative)
            .to_string_lossy()
            .to_string()
    }

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = SimulationConfig::from_json_str(MINIMAL_2D).unwrap();
        assert_eq!(cfg.origin, vec![0.0, 0.0]);
        assert_eq!(cfg.oversize, 2);
        assert_eq!(cfg.cluster_width, 2);
        assert_eq!(cfg.pack_slabs, 1);
        assert_eq!(cfg.scheduler.mode, SchedulerMode::Flat);
        assert!(cfg.scheduler.pair_production_fan_in);
        assert_eq!(cfg.key_cells(), vec![17, 9]);
        assert!(cfg.moving_window.is_none());
    }

    #[test]
    fn test_load_example_config() {
        let cfg = SimulationConfig::from_file(&config_path("configs/laser_plasma_2d.json")).unwrap();
        assert_eq!(cfg.geometry, GeometryKind::Cartesian2d);
        assert_eq!(cfg.scheduler.mode, SchedulerMode::TaskGraph);
        assert_eq!(cfg.species.len(), 4);
        assert_eq!(cfg.species_index("photon"), Some(3));
        assert!(cfg.species[3].pair_production.is_some());
    }

    #[test]
    fn test_load_cylindrical_config() {
        let cfg = SimulationConfig::from_file(&config_path("configs/wakefield_cyl.json")).unwrap();
        assert_eq!(cfg.geometry.field_dims(), 2);
        assert_eq!(cfg.geometry.particle_dims(), 3);
        assert!(cfg.moving_window.is_some());
    }

    #[test]
    fn test_roundtrip_serialization() {
        let cfg = SimulationConfig::from_json_str(MINIMAL_2D).unwrap();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let cfg2 = SimulationConfig::from_json_str(&json).unwrap();
        assert_eq!(cfg.n_space, cfg2.n_space);
        assert_eq!(cfg.species.len(), cfg2.species.len());
        assert_eq!(cfg.species[0].boundaries, cfg2.species[0].boundaries);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let json = MINIMAL_2D.replace("[16, 8]", "[16]");
        let err = SimulationConfig::from_json_str(&json).expect_err("must reject");
        match err {
            PicError::ConfigError(msg) => assert!(msg.contains("n_space")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_one_sided_periodic_rejected() {
        let json = MINIMAL_2D.replace(
            r#"{"min": "periodic", "max": "periodic"}"#,
            r#"{"min": "periodic", "max": "absorbing"}"#,
        );
        assert!(SimulationConfig::from_json_str(&json).is_err());
    }

    #[test]
    fn test_unknown_product_species_rejected() {
        let json = MINIMAL_2D.replace(
            r#""charge": -1,"#,
            r#""charge": -1, "ionization": {"threshold_field": 1.0, "max_charge": 2, "electron_species": "nobody"},"#,
        );
        let err = SimulationConfig::from_json_str(&json).expect_err("must reject");
        assert!(err.to_string().contains("nobody"));
    }

    #[test]
    fn test_merging_block_parsed_and_checked() {
        let with = |n: usize| {
            MINIMAL_2D.replace(
                r#""charge": -1,"#,
                &format!(r#""charge": -1, "merging": {{"max_per_cell": {n}}},"#),
            )
        };
        let cfg = SimulationConfig::from_json_str(&with(4)).unwrap();
        assert_eq!(cfg.species[0].merging.as_ref().map(|m| m.max_per_cell), Some(4));
        assert!(SimulationConfig::from_json_str(&with(0)).is_err());
    }
}
