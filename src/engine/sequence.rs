//! Position sequencer.
//!
//! Pure translation of a [`ScanConfig`] into the ordered path the stage
//! will follow: `scan_count` sweeps of the same grid, each visiting
//! `floor(|end-start|/step) + 1` positions. Positions are computed as
//! `start + k * step` from the integer index `k`, so repeated addition can
//! never accumulate floating-point drift across a long sweep.

use crate::config::ScanConfig;

/// Deterministic, restartable scan path.
///
/// Generation is a pure function of the configuration: the same config
/// always yields the same sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSequence {
    grid_mm: Vec<f64>,
    scan_count: u32,
}

impl PositionSequence {
    /// Generate the path for a validated configuration.
    pub fn generate(cfg: &ScanConfig) -> Self {
        let points = cfg.points_per_scan();
        let grid_mm = (0..points)
            .map(|k| cfg.start_mm + f64::from(k) * cfg.step_mm)
            .collect();
        Self {
            grid_mm,
            scan_count: cfg.scan_count,
        }
    }

    /// Positions of one sweep, in visit order.
    pub fn grid(&self) -> &[f64] {
        &self.grid_mm
    }

    /// Number of positions in one sweep.
    pub fn points_per_scan(&self) -> usize {
        self.grid_mm.len()
    }

    /// Total number of (scan, position) pairs.
    pub fn len(&self) -> usize {
        self.grid_mm.len() * self.scan_count as usize
    }

    /// Whether the sequence is empty (never true for a validated config).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate `(scan_index, point_index, position_mm)` in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        (0..self.scan_count).flat_map(move |scan| {
            self.grid_mm
                .iter()
                .enumerate()
                .map(move |(point, &pos)| (scan, point as u32, pos))
        })
    }
}
