// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Moving Window
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Moving-window trigger along x.
//!
//! The window starts moving at `delay` with `velocity_x`. Whenever it has
//! travelled `cells_per_shift` cells further than the partition, the
//! partition drops that many x-slabs at its lower edge and gains the same
//! number of empty slabs at the upper edge.

use log::info;
use pic_types::config::MovingWindowConfig;
use pic_types::error::{PicError, PicResult};

/// New local domain handed to every species after a shift.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryChange {
    pub origin: Vec<f64>,
    pub n_space: Vec<usize>,
    /// Slabs dropped at the lower x edge.
    pub shifted_cells: usize,
}

#[derive(Debug, Clone)]
pub struct MovingWindow {
    velocity_x: f64,
    delay: f64,
    cells_per_shift: usize,
    /// Distance already applied to the partition origin.
    travelled: f64,
    shifts: usize,
}

impl MovingWindow {
    pub fn new(velocity_x: f64, delay: f64, cells_per_shift: usize) -> PicResult<Self> {
        if !velocity_x.is_finite() || velocity_x <= 0.0 || !delay.is_finite() || cells_per_shift == 0 {
            return Err(PicError::ConfigError(format!(
                "moving window needs velocity > 0 and cells_per_shift >= 1, got {velocity_x} / {cells_per_shift}"
            )));
        }
        Ok(MovingWindow {
            velocity_x,
            delay,
            cells_per_shift,
            travelled: 0.0,
            shifts: 0,
        })
    }

    pub fn from_config(cfg: &MovingWindowConfig) -> PicResult<Self> {
        Self::new(cfg.velocity_x, cfg.delay, cfg.cells_per_shift)
    }

    pub fn shifts(&self) -> usize {
        self.shifts
    }

    /// Shift due at `time`, if any. At most one shift is issued per call.
    pub fn poll(
        &mut self,
        time: f64,
        origin: &[f64],
        n_space: &[usize],
        cell_length: &[f64],
    ) -> Option<GeometryChange> {
        if time <= self.delay || origin.is_empty() {
            return None;
        }
        let step = self.cells_per_shift as f64 * cell_length[0];
        let target = self.velocity_x * (time - self.delay);
        if target - self.travelled < step {
            return None;
        }
        self.travelled += step;
        self.shifts += 1;
        let mut new_origin = origin.to_vec();
        new_origin[0] += step;
        info!(
            "moving window shift #{} at t={time:.4}: x origin {:.4} -> {:.4}",
            self.shifts, origin[0], new_origin[0]
        );
        Some(GeometryChange {
            origin: new_origin,
            n_space: n_space.to_vec(),
            shifted_cells: self.cells_per_shift,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_shift_before_delay() {
        let mut w = MovingWindow::new(1.0, 5.0, 1).expect("valid window");
        assert!(w.poll(4.0, &[0.0], &[16], &[0.5]).is_none());
        assert!(w.poll(5.25, &[0.0], &[16], &[0.5]).is_none());
    }

    #[test]
    fn test_shifts_follow_travelled_distance() {
        let mut w = MovingWindow::new(0.5, 0.0, 2).expect("valid window");
        // 2 cells of 0.5 = 1.0 of travel per shift, reached at t = 2
        assert!(w.poll(1.9, &[0.0, 0.0], &[8, 4], &[0.5, 1.0]).is_none());
        let change = w.poll(2.0, &[0.0, 0.0], &[8, 4], &[0.5, 1.0]).expect("first shift");
        assert_eq!(change.origin, vec![1.0, 0.0]);
        assert_eq!(change.n_space, vec![8, 4]);
        assert_eq!(change.shifted_cells, 2);
        assert!(w.poll(3.0, &change.origin, &[8, 4], &[0.5, 1.0]).is_none());
        assert!(w.poll(4.1, &change.origin, &[8, 4], &[0.5, 1.0]).is_some());
        assert_eq!(w.shifts(), 2);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(MovingWindow::new(0.0, 0.0, 1).is_err());
        assert!(MovingWindow::new(1.0, 0.0, 0).is_err());
    }
}
