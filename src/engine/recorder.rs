//! Point recorder and online averager.
//!
//! The recorder owns the two data products of a scan run:
//!
//! - the **raw log**: every sample in acquisition order, append-only,
//!   cleared when the next run starts;
//! - the **averaged series**: one running mean per scan position,
//!   accumulated across all sweeps and repeats seen so far.
//!
//! Positions are floats, so the averaged series is keyed by the integer
//! grid index `round((position - origin) / step)` instead of the float
//! itself; equal nominal positions always land in the same slot. Means are
//! updated incrementally (`mean += (value - mean) / n`), never recomputed
//! over history, keeping each update O(log points) regardless of how long
//! the run has been going.

use crate::measurement::MeasurementSample;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Running mean of all samples recorded at one grid position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AveragedPoint {
    /// Nominal grid position in mm.
    pub position_mm: f64,
    /// Number of samples in the mean.
    pub samples: u64,
    /// Mean in-phase channel, volts.
    pub x_v: f64,
    /// Mean quadrature channel, volts.
    pub y_v: f64,
    /// Mean magnitude, volts.
    pub r_v: f64,
}

#[derive(Debug, Default)]
struct RecorderInner {
    raw: Vec<MeasurementSample>,
    averaged: BTreeMap<i64, AveragedPoint>,
    grid_origin_mm: f64,
    grid_step_mm: f64,
}

impl RecorderInner {
    fn grid_index(&self, position_mm: f64) -> i64 {
        ((position_mm - self.grid_origin_mm) / self.grid_step_mm).round() as i64
    }
}

/// Exclusive owner of the raw log and averaged series.
///
/// Other components never touch the data directly; they go through the
/// snapshot queries, which copy out under the internal lock.
#[derive(Debug)]
pub struct PointRecorder {
    inner: Mutex<RecorderInner>,
}

impl PointRecorder {
    /// Create an empty recorder with a unit grid.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RecorderInner {
                grid_step_mm: 1.0,
                ..RecorderInner::default()
            }),
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, RecorderInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Clear both data products and re-anchor the position grid.
    ///
    /// Called at the start of every run. `grid_step_mm` must be nonzero
    /// (guaranteed by config validation).
    pub fn reset(&self, grid_origin_mm: f64, grid_step_mm: f64) {
        let mut inner = self.locked();
        inner.raw.clear();
        inner.averaged.clear();
        inner.grid_origin_mm = grid_origin_mm;
        inner.grid_step_mm = grid_step_mm;
    }

    /// Append a sample and fold it into the running mean for its position.
    pub fn record(&self, sample: MeasurementSample) {
        let mut inner = self.locked();
        let key = inner.grid_index(sample.position_mm);
        let nominal_mm = inner.grid_origin_mm + key as f64 * inner.grid_step_mm;

        let slot = inner.averaged.entry(key).or_insert(AveragedPoint {
            position_mm: nominal_mm,
            samples: 0,
            x_v: 0.0,
            y_v: 0.0,
            r_v: 0.0,
        });
        slot.samples += 1;
        let n = slot.samples as f64;
        slot.x_v += (sample.x_v - slot.x_v) / n;
        slot.y_v += (sample.y_v - slot.y_v) / n;
        slot.r_v += (sample.r_v - slot.r_v) / n;

        inner.raw.push(sample);
    }

    /// Number of raw samples recorded so far.
    pub fn len(&self) -> usize {
        self.locked().raw.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the raw log in acquisition order.
    pub fn raw_log(&self) -> Vec<MeasurementSample> {
        self.locked().raw.clone()
    }

    /// Copy of the averaged series ordered by grid position.
    pub fn averaged_series(&self) -> Vec<AveragedPoint> {
        self.locked().averaged.values().copied().collect()
    }
}

impl Default for PointRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(position: f64, x: f64, y: f64) -> MeasurementSample {
        MeasurementSample::new(0, 0, position, x, y)
    }

    #[test]
    fn mean_matches_naive_recomputation() {
        let recorder = PointRecorder::new();
        recorder.reset(0.0, 0.5);

        let values = [0.1, 0.4, -0.2, 0.9, 0.3, 0.3, -0.7];
        for &v in &values {
            recorder.record(sample_at(1.0, v, 2.0 * v));
        }

        let naive_x: f64 = values.iter().sum::<f64>() / values.len() as f64;
        let series = recorder.averaged_series();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].samples, values.len() as u64);
        assert!((series[0].x_v - naive_x).abs() < 1e-12);
        assert!((series[0].y_v - 2.0 * naive_x).abs() < 1e-12);
    }

    #[test]
    fn interleaved_positions_average_independently() {
        let recorder = PointRecorder::new();
        recorder.reset(0.0, 1.0);

        recorder.record(sample_at(0.0, 1.0, 0.0));
        recorder.record(sample_at(1.0, 10.0, 0.0));
        recorder.record(sample_at(0.0, 3.0, 0.0));
        recorder.record(sample_at(1.0, 20.0, 0.0));

        let series = recorder.averaged_series();
        assert_eq!(series.len(), 2);
        assert!((series[0].x_v - 2.0).abs() < 1e-12);
        assert!((series[1].x_v - 15.0).abs() < 1e-12);
    }

    #[test]
    fn near_grid_positions_share_a_slot() {
        let recorder = PointRecorder::new();
        recorder.reset(0.0, 0.1);

        // 0.30000000000000004 and 0.3 are different floats on the same grid
        // point.
        recorder.record(sample_at(0.1 + 0.2, 1.0, 0.0));
        recorder.record(sample_at(0.3, 3.0, 0.0));

        let series = recorder.averaged_series();
        assert_eq!(series.len(), 1);
        assert!((series[0].x_v - 2.0).abs() < 1e-12);
        assert!((series[0].position_mm - 0.3).abs() < 1e-12);
    }

    #[test]
    fn averaged_series_equals_full_recomputation_from_raw_log() {
        let recorder = PointRecorder::new();
        recorder.reset(0.0, 1.0);

        for k in 0..100u32 {
            let pos = f64::from(k % 7);
            let v = f64::from(k).sin();
            recorder.record(sample_at(pos, v, -v));
        }

        let raw = recorder.raw_log();
        for point in recorder.averaged_series() {
            let at_pos: Vec<&MeasurementSample> = raw
                .iter()
                .filter(|s| s.position_mm == point.position_mm)
                .collect();
            assert_eq!(at_pos.len() as u64, point.samples);
            let mean_x = at_pos.iter().map(|s| s.x_v).sum::<f64>() / at_pos.len() as f64;
            let mean_r = at_pos.iter().map(|s| s.r_v).sum::<f64>() / at_pos.len() as f64;
            assert!((point.x_v - mean_x).abs() < 1e-9);
            assert!((point.r_v - mean_r).abs() < 1e-9);
        }
    }

    #[test]
    fn reset_clears_both_products() {
        let recorder = PointRecorder::new();
        recorder.reset(0.0, 1.0);
        recorder.record(sample_at(0.0, 1.0, 1.0));
        assert_eq!(recorder.len(), 1);

        recorder.reset(0.0, 1.0);
        assert!(recorder.is_empty());
        assert!(recorder.averaged_series().is_empty());
    }

    #[test]
    fn descending_grid_keys_positions_correctly() {
        let recorder = PointRecorder::new();
        recorder.reset(2.0, -1.0);

        recorder.record(sample_at(2.0, 1.0, 0.0));
        recorder.record(sample_at(1.0, 2.0, 0.0));
        recorder.record(sample_at(0.0, 3.0, 0.0));

        let series = recorder.averaged_series();
        assert_eq!(series.len(), 3);
        let positions: Vec<f64> = series.iter().map(|p| p.position_mm).collect();
        assert_eq!(positions, vec![2.0, 1.0, 0.0]);
    }
}
