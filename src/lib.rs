//! # Pump-Probe Scan Engine Library
//!
//! This crate is the core library of the `pump_probe` application. It
//! coordinates a motorized delay line and a lock-in amplifier so that every
//! sampled measurement is attributed to a delay-line position, repeated
//! samples at the same position are incrementally averaged, and a run can
//! be started, observed mid-flight and cancelled safely from another thread
//! of control. Organizing the project as a library keeps the engine usable
//! from the bundled CLI as well as future frontends.
//!
//! ## Crate Structure
//!
//! - **`config`**: TOML-backed settings (scan parameters, trace window,
//!   log level) with validation. See `config::Settings`.
//! - **`engine`**: the scan-acquisition core — position sequencer, state
//!   guard, point recorder/averager, scan and stream tasks, and the
//!   `ScanEngine` facade that owns the injected hardware collaborators.
//! - **`hardware`**: the `Movable` and `SampleSource` capability traits the
//!   engine consumes, plus mock devices for headless operation and tests.
//! - **`data`**: the rolling trace window and the optional CSV export of
//!   recorded runs.
//! - **`measurement`**: the immutable per-repeat sample type.
//! - **`events`**: the broadcast event bus mirroring every state transition
//!   and data update to subscribers.
//! - **`error`**: the central `EngineError` enum.
//! - **`metadata`**: per-run identifying metadata.
//! - **`telemetry`**: tracing/logging initialization.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod events;
pub mod hardware;
pub mod measurement;
pub mod metadata;
pub mod telemetry;

pub use config::{ScanConfig, Settings, TraceSettings};
pub use engine::{EngineState, ScanEngine};
pub use error::{EngineError, EngineResult};
