// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — PIC Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Normalized units: c = 1, charge in units of e, momentum in units of m c
//! of the carrying species, fields in units of m_e c omega_r / e.

/// Cell key of a particle that no longer belongs to this partition.
pub const EXIT_KEY: i64 = -1;

/// Speed of light in normalized units.
pub const C_NORMALIZED: f64 = 1.0;

/// Electron mass in units of the electron mass.
pub const ELECTRON_MASS: f64 = 1.0;

/// Default Schwinger field in normalized units (lambda_r = 1 um).
pub const SCHWINGER_FIELD_DEFAULT: f64 = 4.1e5;

/// Particle position components are never more than 3.
pub const MAX_DIMS: usize = 3;

/// Half-width (in nodes) of the second-order shape function.
pub const SHAPE_SUPPORT: usize = 1;
