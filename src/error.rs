//! Custom error types for the engine.
//!
//! This module defines the primary error type, `EngineError`, used across the
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different failure classes of a scan run:
//!
//! - **`AlreadyRunning`**: a start request arrived while an acquisition was
//!   active. Recovered locally — the request is ignored and the current state
//!   is reported unchanged.
//! - **`OutOfBounds`**: a position request outside the delay-line travel
//!   limits. Rejected before any motion is commanded.
//! - **`ActuatorFault`** / **`InstrumentFault`**: a collaborator failed
//!   mid-sequence. Fatal to the current run — the sequence is aborted, the
//!   engine returns to idle and the fault is surfaced to the caller, never
//!   silently retried.
//! - **`StreamIntegrity`**: the lock-in delivered fewer samples than
//!   requested. The streaming loop terminates rather than padding data.
//! - **`InvalidSetting`**: rejected at configuration time; prior settings
//!   are retained.
//!
//! By using `#[from]`, `EngineError` can be seamlessly created from the
//! underlying configuration and I/O error types with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the engine error type.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Error taxonomy for scan and stream operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A start request was issued while an acquisition was already active.
    #[error("Acquisition already running; request ignored")]
    AlreadyRunning,

    /// A position request outside the delay-line travel limits.
    #[error("Position {position} mm outside stage limits [{min}, {max}] mm")]
    OutOfBounds {
        /// Requested position in mm.
        position: f64,
        /// Lower travel limit in mm.
        min: f64,
        /// Upper travel limit in mm.
        max: f64,
    },

    /// The delay line failed to execute a motion command.
    #[error("Delay line fault: {0}")]
    ActuatorFault(String),

    /// The lock-in failed a read or stream-control command.
    #[error("Lock-in fault: {0}")]
    InstrumentFault(String),

    /// The lock-in delivered fewer samples than requested.
    #[error("Lock-in delivered {received} samples, {requested} requested")]
    StreamIntegrity {
        /// Number of samples requested from the device buffer.
        requested: usize,
        /// Number of samples actually delivered.
        received: usize,
    },

    /// A configuration value was rejected; prior settings are retained.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Configuration file parsing error.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// File and path I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data export errors.
    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    /// Whether the condition leaves a run aborted (as opposed to a request
    /// that was rejected up front with no state change).
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            EngineError::ActuatorFault(_)
                | EngineError::InstrumentFault(_)
                | EngineError::StreamIntegrity { .. }
        )
    }
}
