//! Configuration management.
//!
//! Settings are loaded from TOML files via the `config` crate and written
//! back with `toml` at shutdown, so scan bounds, step, repeat/scan counts,
//! settle time and the trace window survive restarts. Durations are
//! (de)serialized in human-readable form (`humantime-serde`), e.g.
//! `settle_time = "100ms"`.

use crate::error::{EngineError, EngineResult};
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level persisted settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Delay-line scan parameters.
    pub scan: ScanConfig,
    /// Continuous trace parameters.
    pub trace: TraceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            scan: ScanConfig::default(),
            trace: TraceSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `config/<name>.toml` (default name: `default`).
    pub fn new(config_name: Option<&str>) -> EngineResult<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path))
            .build()
            .map_err(EngineError::Config)?;

        s.try_deserialize().map_err(EngineError::Config)
    }

    /// Write the settings to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> EngineResult<()> {
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidSetting(format!("settings not serializable: {e}")))?;
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

/// Parameters of one delay-line scan run.
///
/// A run sweeps the stage from `start_mm` to `end_mm` in `step_mm`
/// increments, records `repeats_per_point` samples at each position after a
/// `settle_time` pause, and repeats the whole sweep `scan_count` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// First stage position of each sweep, in mm.
    pub start_mm: f64,
    /// Requested final stage position of each sweep, in mm.
    pub end_mm: f64,
    /// Position increment, in mm. Nonzero; its sign is normalized to the
    /// sweep direction by [`ScanConfig::validated`].
    pub step_mm: f64,
    /// Number of samples recorded at each position.
    pub repeats_per_point: u32,
    /// Number of full sweeps in the run.
    pub scan_count: u32,
    /// Pause after motion settles before each sample, letting mechanical
    /// vibrations decay.
    #[serde(with = "humantime_serde")]
    pub settle_time: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            start_mm: 0.0,
            end_mm: 10.0,
            step_mm: 0.1,
            repeats_per_point: 1,
            scan_count: 1,
            settle_time: Duration::from_millis(100),
        }
    }
}

impl ScanConfig {
    /// Validate the parameters and normalize the step sign.
    ///
    /// The step must be nonzero and the counts at least one. A step pointing
    /// against the sweep direction is rewritten to `|step| * sign(end-start)`
    /// rather than rejected.
    pub fn validated(mut self) -> EngineResult<Self> {
        if !self.step_mm.is_finite() || self.step_mm == 0.0 {
            return Err(EngineError::InvalidSetting(
                "scan step must be finite and nonzero".to_string(),
            ));
        }
        if !self.start_mm.is_finite() || !self.end_mm.is_finite() {
            return Err(EngineError::InvalidSetting(
                "scan bounds must be finite".to_string(),
            ));
        }
        if self.repeats_per_point < 1 {
            return Err(EngineError::InvalidSetting(
                "repeats_per_point must be at least 1".to_string(),
            ));
        }
        if self.scan_count < 1 {
            return Err(EngineError::InvalidSetting(
                "scan_count must be at least 1".to_string(),
            ));
        }
        let span = self.end_mm - self.start_mm;
        if span != 0.0 && self.step_mm.signum() != span.signum() {
            self.step_mm = -self.step_mm;
        }
        Ok(self)
    }

    /// Number of positions visited in one sweep.
    pub fn points_per_scan(&self) -> u32 {
        let span = (self.end_mm - self.start_mm).abs();
        let step = self.step_mm.abs();
        // Relative tolerance so a grid-aligned span is not truncated by
        // floating-point rounding (e.g. 0.3 / 0.1).
        ((span / step) + 1e-9).floor() as u32 + 1
    }

    /// Total number of (position, repeat) samples in the run.
    pub fn total_samples(&self) -> u64 {
        u64::from(self.scan_count) * u64::from(self.points_per_scan()) * u64::from(self.repeats_per_point)
    }

    /// Lower bound on the run duration: the summed settle pauses.
    /// Stage motion and lock-in read time come on top.
    pub fn estimated_duration(&self) -> Duration {
        self.settle_time * u32::try_from(self.total_samples()).unwrap_or(u32::MAX)
    }
}

/// Parameters of the continuous trace view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSettings {
    /// Lock-in sampling rate in Hz.
    pub sample_rate_hz: f64,
    /// Length of the rolling trace window in seconds.
    pub window_seconds: f64,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 10.0,
            window_seconds: 30.0,
        }
    }
}

impl TraceSettings {
    /// Validate that both parameters are positive and finite.
    pub fn validated(self) -> EngineResult<Self> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(EngineError::InvalidSetting(format!(
                "sample rate must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        if !(self.window_seconds.is_finite() && self.window_seconds > 0.0) {
            return Err(EngineError::InvalidSetting(format!(
                "trace window must be positive, got {}",
                self.window_seconds
            )));
        }
        Ok(self)
    }

    /// Trace buffer capacity in samples for these settings.
    pub fn window_samples(&self) -> usize {
        ((self.window_seconds * self.sample_rate_hz).round() as usize).max(1)
    }
}
