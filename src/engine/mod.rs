//! Synchronized scan-acquisition engine.
//!
//! [`ScanEngine`] owns the two injected hardware collaborators and the two
//! independent acquisition timelines built on them:
//!
//! - the **scan path**: step the delay line through a position sequence and
//!   record one lock-in sample per (position, repeat) pair;
//! - the **stream path**: continuously roll lock-in samples into a fixed
//!   trace window.
//!
//! Both paths read from the same lock-in, so every call into it goes
//! through one shared async mutex; no component ever holds more than one
//! collaborator lock at a time. Each path has its own [`StateGuard`];
//! start/stop are check-and-set transitions under the guard's lock, and
//! the guard is released before any potentially blocking hardware call.
//!
//! All state transitions are mirrored to subscribers through the
//! [`EventBus`], one authoritative status event per transition.

pub mod recorder;
pub mod scan;
pub mod sequence;
pub mod state;
pub mod stream;

pub use recorder::{AveragedPoint, PointRecorder};
pub use sequence::PositionSequence;
pub use state::{EngineState, StateGuard};

use crate::config::{ScanConfig, TraceSettings};
use crate::data::TraceBuffer;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::hardware::{Movable, SampleSource};
use crate::metadata::RunMetadata;
use scan::ScanTask;
use std::sync::{Arc, Mutex, MutexGuard};
use stream::StreamTask;
use tokio::sync::broadcast;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Snapshot of the scan path for callers and UIs.
#[derive(Debug, Clone, Default)]
pub struct ScanStatus {
    /// Metadata of the latest run, if any was started.
    pub metadata: Option<RunMetadata>,
    /// Message of the fault that aborted the latest run, if any.
    pub last_error: Option<String>,
}

/// Publishes the combined running/recording status of both paths.
///
/// Having one reporter shared by both tasks means every transition emits
/// exactly one event that reflects both timelines at that moment.
#[derive(Clone)]
pub(crate) struct StatusReporter {
    pub scan: Arc<StateGuard>,
    pub stream: Arc<StateGuard>,
    pub events: EventBus,
}

impl StatusReporter {
    pub(crate) fn publish(&self) {
        self.events.publish(EngineEvent::StatusChanged {
            running: self.stream.is_active(),
            recording: self.scan.is_active(),
        });
    }
}

/// The scan-acquisition engine.
///
/// Construct with the two hardware collaborators, then drive via
/// [`start_scan`](Self::start_scan) / [`request_stop`](Self::request_stop)
/// and [`start_stream`](Self::start_stream) /
/// [`stop_stream`](Self::stop_stream). Thread-safe behind an `Arc`.
pub struct ScanEngine {
    stage: Arc<dyn Movable>,
    lock_in: Arc<AsyncMutex<Box<dyn SampleSource>>>,

    scan_guard: Arc<StateGuard>,
    stream_guard: Arc<StateGuard>,
    recorder: Arc<PointRecorder>,
    trace: Arc<Mutex<TraceBuffer>>,
    trace_settings: Mutex<TraceSettings>,

    events: EventBus,
    scan_status: Arc<Mutex<ScanStatus>>,
    stream_error: Arc<Mutex<Option<String>>>,
    experiment_tag: Mutex<String>,

    scan_task: Mutex<Option<JoinHandle<()>>>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl ScanEngine {
    /// Create an engine around the injected collaborators.
    ///
    /// The trace settings are validated and the trace window allocated up
    /// front, so a freshly built engine can stream immediately.
    pub fn new(
        stage: Arc<dyn Movable>,
        lock_in: Box<dyn SampleSource>,
        trace_settings: TraceSettings,
    ) -> EngineResult<Self> {
        let trace_settings = trace_settings.validated()?;
        let trace = TraceBuffer::new(
            trace_settings.sample_rate_hz,
            trace_settings.window_seconds,
        );
        Ok(Self {
            stage,
            lock_in: Arc::new(AsyncMutex::new(lock_in)),
            scan_guard: Arc::new(StateGuard::new()),
            stream_guard: Arc::new(StateGuard::new()),
            recorder: Arc::new(PointRecorder::new()),
            trace: Arc::new(Mutex::new(trace)),
            trace_settings: Mutex::new(trace_settings),
            events: EventBus::default(),
            scan_status: Arc::new(Mutex::new(ScanStatus::default())),
            stream_error: Arc::new(Mutex::new(None)),
            experiment_tag: Mutex::new(String::new()),
            scan_task: Mutex::new(None),
            stream_task: Mutex::new(None),
        })
    }

    fn reporter(&self) -> StatusReporter {
        StatusReporter {
            scan: Arc::clone(&self.scan_guard),
            stream: Arc::clone(&self.stream_guard),
            events: self.events.clone(),
        }
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Free-form tag recorded in the metadata of subsequent runs.
    pub fn set_experiment_tag(&self, tag: impl Into<String>) {
        *relock(&self.experiment_tag) = tag.into();
    }

    // =========================================================================
    // Scan path
    // =========================================================================

    /// Start a scan run.
    ///
    /// Validates the configuration, rejects positions outside the stage
    /// travel before any motion, clears the raw log and averaged series and
    /// spawns the scan task.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidSetting`] for a malformed configuration
    /// - [`EngineError::OutOfBounds`] when start or end is outside travel
    /// - [`EngineError::AlreadyRunning`] when a scan is active; the running
    ///   scan and its data are untouched
    pub fn start_scan(&self, cfg: ScanConfig) -> EngineResult<()> {
        let cfg = cfg.validated()?;

        let (min, max) = self.stage.bounds();
        for edge_mm in [cfg.start_mm, cfg.end_mm] {
            if !(min..=max).contains(&edge_mm) {
                warn!(position = edge_mm, min, max, "scan rejected: outside travel");
                return Err(EngineError::OutOfBounds {
                    position: edge_mm,
                    min,
                    max,
                });
            }
        }

        self.scan_guard.try_begin()?;

        self.recorder.reset(cfg.start_mm, cfg.step_mm);
        let metadata = RunMetadata::new(&cfg, relock(&self.experiment_tag).clone());
        let run_id = metadata.run_id.clone();
        {
            let mut status = relock(&self.scan_status);
            status.metadata = Some(metadata);
            status.last_error = None;
        }

        let sequence = PositionSequence::generate(&cfg);
        info!(
            %run_id,
            points = sequence.len(),
            repeats = cfg.repeats_per_point,
            "scan started"
        );

        let task = ScanTask {
            stage: Arc::clone(&self.stage),
            lock_in: Arc::clone(&self.lock_in),
            recorder: Arc::clone(&self.recorder),
            guard: Arc::clone(&self.scan_guard),
            status: Arc::clone(&self.scan_status),
            reporter: self.reporter(),
        };
        *relock(&self.scan_task) = Some(tokio::spawn(task.run(cfg, sequence)));

        self.reporter().publish();
        Ok(())
    }

    /// Request a cooperative stop of the running scan.
    ///
    /// Always succeeds; a no-op when no scan is active. The scan task
    /// observes the request before its next repeat.
    pub fn request_stop(&self) {
        if self.scan_guard.request_stop() {
            info!("scan stop requested");
        }
    }

    /// Wait for the scan task to finish and return to idle.
    pub async fn join_scan(&self) {
        let handle = relock(&self.scan_task).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Current state of the scan path.
    pub fn scan_state(&self) -> EngineState {
        self.scan_guard.state()
    }

    /// Snapshot of run metadata and last fault.
    pub fn scan_status(&self) -> ScanStatus {
        relock(&self.scan_status).clone()
    }

    /// Copy of the raw per-repeat log of the current/latest run.
    pub fn raw_log(&self) -> Vec<crate::measurement::MeasurementSample> {
        self.recorder.raw_log()
    }

    /// Copy of the position-averaged series of the current/latest run.
    pub fn averaged_series(&self) -> Vec<AveragedPoint> {
        self.recorder.averaged_series()
    }

    // =========================================================================
    // Stream path
    // =========================================================================

    /// Start the continuous trace stream.
    ///
    /// # Errors
    ///
    /// - [`EngineError::AlreadyRunning`] when the stream is active
    /// - [`EngineError::InstrumentFault`] when the lock-in refuses to start
    pub async fn start_stream(&self) -> EngineResult<()> {
        self.stream_guard.try_begin()?;

        {
            let lock_in = self.lock_in.lock().await;
            if let Err(err) = lock_in.start_stream().await {
                self.stream_guard.finish();
                return Err(EngineError::InstrumentFault(err.to_string()));
            }
        }
        *relock(&self.stream_error) = None;

        let frame = stream::samples_per_frame(relock(&self.trace_settings).sample_rate_hz);
        let task = StreamTask {
            lock_in: Arc::clone(&self.lock_in),
            trace: Arc::clone(&self.trace),
            guard: Arc::clone(&self.stream_guard),
            last_error: Arc::clone(&self.stream_error),
            reporter: self.reporter(),
        };
        *relock(&self.stream_task) = Some(tokio::spawn(task.run(frame)));

        info!(samples_per_frame = frame, "trace started");
        self.reporter().publish();
        Ok(())
    }

    /// Stop the trace stream and wait for the loop to drain.
    ///
    /// The stop is cooperative: the tick in flight completes, the next tick
    /// observes the flag, tears the instrument stream down and exits.
    pub async fn stop_stream(&self) {
        if self.stream_guard.request_stop() {
            info!("trace stop requested");
        }
        self.join_stream().await;
    }

    /// Wait for the stream task to finish, if one was spawned.
    pub async fn join_stream(&self) {
        let handle = relock(&self.stream_task).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Reconfigure sample rate and window length.
    ///
    /// While streaming this performs a transparent
    /// stop-drain-reconfigure-restart; otherwise the new settings apply
    /// immediately. Either way the trace window is reinitialized. On
    /// rejection the prior settings stay in effect.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidSetting`] when either argument is not a
    /// positive finite number.
    pub async fn configure_trace(
        &self,
        sample_rate_hz: f64,
        window_seconds: f64,
    ) -> EngineResult<TraceSettings> {
        let requested = TraceSettings {
            sample_rate_hz,
            window_seconds,
        }
        .validated()?;

        let was_running = self.stream_guard.is_active();
        if was_running {
            self.stop_stream().await;
        }

        {
            let lock_in = self.lock_in.lock().await;
            lock_in
                .set_sample_rate(requested.sample_rate_hz)
                .await
                .map_err(|e| EngineError::InstrumentFault(e.to_string()))?;
        }

        *relock(&self.trace_settings) = requested;
        *relock(&self.trace) = TraceBuffer::new(
            requested.sample_rate_hz,
            requested.window_seconds,
        );
        info!(
            rate_hz = requested.sample_rate_hz,
            window_s = requested.window_seconds,
            "trace settings applied"
        );
        self.events.publish(EngineEvent::SettingsChanged(requested));

        if was_running {
            self.start_stream().await?;
        }
        Ok(requested)
    }

    /// Current state of the stream path.
    pub fn stream_state(&self) -> EngineState {
        self.stream_guard.state()
    }

    /// Message of the fault that terminated the latest stream, if any.
    pub fn stream_error(&self) -> Option<String> {
        relock(&self.stream_error).clone()
    }

    /// Trace settings currently in effect.
    pub fn trace_settings(&self) -> TraceSettings {
        *relock(&self.trace_settings)
    }

    /// Copy of the trace window: `(times, x, y)`, oldest sample first.
    pub fn trace_data(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let trace = relock(&self.trace);
        let (x, y) = trace.snapshot();
        (trace.times().to_vec(), x, y)
    }

    // =========================================================================
    // Manual stage control
    // =========================================================================

    /// Jog the stage to an absolute position.
    ///
    /// Intended for idle use; during a scan the scan task owns the stage.
    /// Rejected without motion when outside travel.
    pub async fn move_to(&self, position_mm: f64) -> EngineResult<()> {
        let (min, max) = self.stage.bounds();
        if !(min..=max).contains(&position_mm) {
            warn!(position = position_mm, min, max, "move rejected: outside travel");
            return Err(EngineError::OutOfBounds {
                position: position_mm,
                min,
                max,
            });
        }
        self.stage
            .move_abs(position_mm)
            .await
            .map_err(|e| EngineError::ActuatorFault(e.to_string()))?;
        self.stage
            .wait_settled()
            .await
            .map_err(|e| EngineError::ActuatorFault(e.to_string()))?;
        self.events.publish(EngineEvent::MovementFinished);
        Ok(())
    }

    /// Jog the stage by a relative distance.
    pub async fn move_by(&self, distance_mm: f64) -> EngineResult<()> {
        let current = self.current_position().await?;
        self.move_to(current + distance_mm).await
    }

    /// Drive the stage to its reference position.
    pub async fn home(&self) -> EngineResult<()> {
        self.stage
            .home()
            .await
            .map_err(|e| EngineError::ActuatorFault(e.to_string()))?;
        self.events.publish(EngineEvent::MovementFinished);
        Ok(())
    }

    /// Current stage position in mm.
    pub async fn current_position(&self) -> EngineResult<f64> {
        self.stage
            .position()
            .await
            .map_err(|e| EngineError::ActuatorFault(e.to_string()))
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Write the recorded raw log and averaged series to CSV files.
    #[cfg(feature = "storage_csv")]
    pub fn export_recorded<P: AsRef<std::path::Path>>(&self, path: P) -> EngineResult<()> {
        let metadata = relock(&self.scan_status)
            .metadata
            .clone()
            .ok_or_else(|| EngineError::InvalidSetting("no recorded run to export".to_string()))?;
        crate::data::storage::export_run(
            path,
            &metadata,
            &self.recorder.raw_log(),
            &self.recorder.averaged_series(),
        )
    }
}
