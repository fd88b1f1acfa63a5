//! Measurement value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Substituted for exact-zero channel readings.
///
/// Downstream ratio and log-scale computations divide by channel values;
/// a true 0.0 V reading (typically an unlocked input) would propagate NaN
/// or infinity through them. The substitution is deliberate and visible in
/// recorded data as 1e-9 V entries.
pub const CHANNEL_EPSILON_V: f64 = 1e-9;

/// One lock-in reading tagged with the delay-line position it was taken at.
///
/// Immutable after creation. `r_v` is derived from the two quadrature
/// channels at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSample {
    /// Wall-clock acquisition time.
    pub timestamp: DateTime<Utc>,
    /// Which sweep of the run this sample belongs to (0-based).
    pub scan_index: u32,
    /// Position index within the sweep (0-based).
    pub point_index: u32,
    /// Delay-line position in mm.
    pub position_mm: f64,
    /// In-phase channel, volts.
    pub x_v: f64,
    /// Quadrature channel, volts.
    pub y_v: f64,
    /// Magnitude sqrt(x^2 + y^2), volts.
    pub r_v: f64,
}

impl MeasurementSample {
    /// Build a sample from a raw `(x, y)` lock-in reading.
    ///
    /// Zero-valued channels are coerced to [`CHANNEL_EPSILON_V`].
    pub fn new(scan_index: u32, point_index: u32, position_mm: f64, x_v: f64, y_v: f64) -> Self {
        let x_v = coerce_nonzero(x_v);
        let y_v = coerce_nonzero(y_v);
        Self {
            timestamp: Utc::now(),
            scan_index,
            point_index,
            position_mm,
            x_v,
            y_v,
            r_v: x_v.hypot(y_v),
        }
    }
}

fn coerce_nonzero(value_v: f64) -> f64 {
    if value_v == 0.0 {
        CHANNEL_EPSILON_V
    } else {
        value_v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_channels_are_coerced_to_epsilon() {
        let sample = MeasurementSample::new(0, 0, 1.5, 0.0, 0.0);
        assert_eq!(sample.x_v, CHANNEL_EPSILON_V);
        assert_eq!(sample.y_v, CHANNEL_EPSILON_V);
        assert!(sample.r_v > 0.0);
    }

    #[test]
    fn nonzero_channels_pass_through() {
        let sample = MeasurementSample::new(0, 3, 2.0, 0.5, -1.2);
        assert_eq!(sample.x_v, 0.5);
        assert_eq!(sample.y_v, -1.2);
        assert!((sample.r_v - (0.25f64 + 1.44).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn negative_zero_counts_as_zero() {
        let sample = MeasurementSample::new(0, 0, 0.0, -0.0, 1.0);
        assert_eq!(sample.x_v, CHANNEL_EPSILON_V);
    }
}
