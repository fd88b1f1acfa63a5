//! Mock hardware implementations.
//!
//! Simulated devices for running the engine without physical hardware.
//! All mocks use async-safe waits (`tokio::time::sleep`, never
//! `std::thread::sleep`).
//!
//! # Available mocks
//!
//! - [`MockDelayLine`] - linear stage with finite travel and realistic
//!   motion timing
//! - [`MockLockIn`] - two-channel lock-in producing a noisy quadrature
//!   signal, with a sample-rate-paced stream buffer

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::hardware::capabilities::{Movable, SampleSource};

// =============================================================================
// MockDelayLine - Simulated Motion Stage
// =============================================================================

/// Mock delay-line stage.
///
/// Simulates a linear stage with:
/// - finite travel limits (default 0..100 mm)
/// - configurable motion speed (default 50 mm/s)
/// - a short settling pause after each move
pub struct MockDelayLine {
    position_mm: RwLock<f64>,
    busy: RwLock<bool>,
    bounds_mm: (f64, f64),
    speed_mm_per_s: f64,
    settle: Duration,
}

impl MockDelayLine {
    /// Create a stage at position 0.0 mm with 0..100 mm travel.
    pub fn new() -> Self {
        Self {
            position_mm: RwLock::new(0.0),
            busy: RwLock::new(false),
            bounds_mm: (0.0, 100.0),
            speed_mm_per_s: 50.0,
            settle: Duration::from_millis(5),
        }
    }

    /// Override the travel limits.
    pub fn with_bounds(mut self, min_mm: f64, max_mm: f64) -> Self {
        self.bounds_mm = (min_mm, max_mm);
        self
    }

    /// Override the motion speed.
    pub fn with_speed(mut self, speed_mm_per_s: f64) -> Self {
        self.speed_mm_per_s = speed_mm_per_s;
        self
    }

    /// Override the settling pause.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

impl Default for MockDelayLine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Movable for MockDelayLine {
    async fn move_abs(&self, target_mm: f64) -> Result<()> {
        let (min, max) = self.bounds_mm;
        if !(min..=max).contains(&target_mm) {
            bail!("target {target_mm} mm outside travel [{min}, {max}] mm");
        }

        let current = *self.position_mm.read().await;
        let travel_time =
            Duration::from_secs_f64((target_mm - current).abs() / self.speed_mm_per_s);
        debug!(from = current, to = target_mm, "mock stage moving");

        *self.busy.write().await = true;
        sleep(travel_time).await;
        *self.position_mm.write().await = target_mm;
        *self.busy.write().await = false;
        Ok(())
    }

    async fn move_rel(&self, distance_mm: f64) -> Result<()> {
        let current = *self.position_mm.read().await;
        self.move_abs(current + distance_mm).await
    }

    async fn position(&self) -> Result<f64> {
        Ok(*self.position_mm.read().await)
    }

    async fn wait_settled(&self) -> Result<()> {
        while *self.busy.read().await {
            sleep(Duration::from_millis(1)).await;
        }
        sleep(self.settle).await;
        Ok(())
    }

    fn bounds(&self) -> (f64, f64) {
        self.bounds_mm
    }

    async fn is_busy(&self) -> Result<bool> {
        Ok(*self.busy.read().await)
    }

    async fn home(&self) -> Result<()> {
        self.move_abs(self.bounds_mm.0).await
    }
}

// =============================================================================
// MockLockIn - Simulated Lock-In Amplifier
// =============================================================================

/// Stream bookkeeping for the mock lock-in.
struct StreamClock {
    running: bool,
    /// Read cursor: samples accumulate between `last_read` and now.
    last_read: Instant,
}

/// Mock lock-in amplifier.
///
/// Produces a decaying-oscillation quadrature pair with additive noise so
/// traces and averaged scans look like a real pump-probe signal. The stream
/// buffer fills at `sample_rate` and [`SampleSource::read_block`] paces the
/// caller exactly like a hardware buffer would.
pub struct MockLockIn {
    sample_rate_hz: Mutex<f64>,
    clock: Mutex<StreamClock>,
    epoch: Instant,
    amplitude_v: f64,
    noise_v: f64,
}

impl MockLockIn {
    /// Create a lock-in sampling at 10 Hz with a 1 V signal.
    pub fn new() -> Self {
        Self {
            sample_rate_hz: Mutex::new(10.0),
            clock: Mutex::new(StreamClock {
                running: false,
                last_read: Instant::now(),
            }),
            epoch: Instant::now(),
            amplitude_v: 1.0,
            noise_v: 0.02,
        }
    }

    /// Override the signal amplitude.
    pub fn with_amplitude(mut self, amplitude_v: f64) -> Self {
        self.amplitude_v = amplitude_v;
        self
    }

    /// Override the noise level.
    pub fn with_noise(mut self, noise_v: f64) -> Self {
        self.noise_v = noise_v;
        self
    }

    fn sample_at(&self, t_s: f64) -> (f64, f64) {
        let mut rng = rand::thread_rng();
        let phase = 2.0 * std::f64::consts::PI * 0.2 * t_s;
        let x = self.amplitude_v * phase.sin() + rng.gen_range(-self.noise_v..=self.noise_v);
        let y = 0.3 * self.amplitude_v * phase.cos() + rng.gen_range(-self.noise_v..=self.noise_v);
        (x, y)
    }

    fn locked_rate(&self) -> f64 {
        match self.sample_rate_hz.lock() {
            Ok(rate) => *rate,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for MockLockIn {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for MockLockIn {
    async fn read_one(&self) -> Result<(f64, f64)> {
        Ok(self.sample_at(self.epoch.elapsed().as_secs_f64()))
    }

    async fn read_block(&self, samples: usize) -> Result<Vec<(f64, f64)>> {
        if samples == 0 {
            return Ok(Vec::new());
        }
        {
            let clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
            if !clock.running {
                bail!("stream not running");
            }
        }

        // Pace the caller at the sample rate, like a blocking hardware read.
        while self.available_samples() < samples {
            sleep(Duration::from_millis(1)).await;
        }

        let rate = self.locked_rate();
        let mut block = Vec::with_capacity(samples);
        {
            let mut clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
            let t0 = clock.last_read.duration_since(self.epoch).as_secs_f64();
            for k in 0..samples {
                block.push(self.sample_at(t0 + k as f64 / rate));
            }
            clock.last_read += Duration::from_secs_f64(samples as f64 / rate);
        }
        Ok(block)
    }

    fn available_samples(&self) -> usize {
        let clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
        if !clock.running {
            return 0;
        }
        (clock.last_read.elapsed().as_secs_f64() * self.locked_rate()) as usize
    }

    fn sample_rate(&self) -> f64 {
        self.locked_rate()
    }

    async fn set_sample_rate(&self, rate_hz: f64) -> Result<()> {
        if rate_hz <= 0.0 {
            bail!("sample rate must be positive, got {rate_hz}");
        }
        {
            let clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
            if clock.running {
                bail!("cannot change sample rate while streaming");
            }
        }
        *self.sample_rate_hz.lock().unwrap_or_else(|p| p.into_inner()) = rate_hz;
        Ok(())
    }

    async fn start_stream(&self) -> Result<()> {
        let mut clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
        if clock.running {
            bail!("stream already running");
        }
        clock.running = true;
        clock.last_read = Instant::now();
        Ok(())
    }

    async fn stop_stream(&self) -> Result<()> {
        let mut clock = self.clock.lock().unwrap_or_else(|p| p.into_inner());
        clock.running = false;
        Ok(())
    }
}
