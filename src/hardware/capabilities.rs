//! Hardware capability traits.
//!
//! Fine-grained contracts the engine consumes instead of monolithic device
//! classes: the delay line implements [`Movable`], the lock-in implements
//! [`SampleSource`]. Concrete drivers (serial, VISA) live outside this
//! crate; the engine receives trait objects at construction.
//!
//! Each capability trait:
//! - Is async (uses `#[async_trait]`)
//! - Is thread-safe (requires `Send + Sync`)
//! - Uses `anyhow::Result` for errors at the hardware seam; the engine maps
//!   failures into its own taxonomy
//! - Takes `&self`; implementations use interior mutability for state

use anyhow::Result;
use async_trait::async_trait;

/// Capability: motion control for the delay-line stage.
///
/// # Contract
/// - Positions are in mm
/// - `move_abs` / `move_rel` initiate motion and may return before the
///   mechanics have settled; `wait_settled` blocks until they have
/// - `bounds` reports fixed travel limits and never touches hardware
#[async_trait]
pub trait Movable: Send + Sync {
    /// Move to an absolute position in mm.
    async fn move_abs(&self, position_mm: f64) -> Result<()>;

    /// Move relative to the current position.
    async fn move_rel(&self, distance_mm: f64) -> Result<()>;

    /// Current position in mm. May be approximate while moving.
    async fn position(&self) -> Result<f64>;

    /// Block until motion is complete. Implementations should carry an
    /// internal timeout so this cannot hang forever.
    async fn wait_settled(&self) -> Result<()>;

    /// Travel limits `(min_mm, max_mm)`.
    fn bounds(&self) -> (f64, f64);

    /// Whether a motion command is currently executing.
    async fn is_busy(&self) -> Result<bool>;

    /// Drive to the hardware reference position.
    async fn home(&self) -> Result<()>;
}

/// Capability: two-channel sampled readout of the lock-in amplifier.
///
/// # Contract
/// - `read_one` returns a single non-timing-critical `(x, y)` snapshot
/// - `read_block(n)` blocks (with an internal timeout) until `n` samples
///   are available and returns exactly `n` of them; returning fewer is a
///   protocol violation the caller treats as fatal
/// - `available_samples` estimates how many samples have accumulated in the
///   device buffer since the last read
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// One `(x, y)` snapshot in volts.
    async fn read_one(&self) -> Result<(f64, f64)>;

    /// Read exactly `samples` buffered `(x, y)` pairs.
    async fn read_block(&self, samples: usize) -> Result<Vec<(f64, f64)>>;

    /// Samples accumulated in the device buffer and ready to read.
    fn available_samples(&self) -> usize;

    /// Configured sampling rate in Hz.
    fn sample_rate(&self) -> f64;

    /// Reconfigure the sampling rate. Only valid while the stream is
    /// stopped.
    async fn set_sample_rate(&self, rate_hz: f64) -> Result<()>;

    /// Start buffered acquisition.
    async fn start_stream(&self) -> Result<()>;

    /// Stop buffered acquisition and discard the device buffer.
    async fn stop_stream(&self) -> Result<()>;
}
