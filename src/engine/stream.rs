//! Continuous trace acquisition task.
//!
//! An explicit cooperative loop (not a re-posted callback, not a dedicated
//! OS thread): each tick takes the shared lock-in lock once, reads
//! `max(available_samples, samples_per_frame)` samples, rolls them into
//! the trace window and publishes an update. The yield point between ticks
//! keeps the loop preemptible by its own runtime and makes the stop flag
//! checkable once per tick.
//!
//! A short read is a protocol violation ([`EngineError::StreamIntegrity`]):
//! the loop terminates instead of padding the window with fabricated data.

use crate::data::TraceBuffer;
use crate::engine::state::StateGuard;
use crate::engine::StatusReporter;
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::hardware::SampleSource;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, warn};

/// Upper bound on trace refreshes per second; at high sample rates several
/// samples are batched into one frame instead of spinning per sample.
pub(crate) const MAX_REFRESH_HZ: f64 = 20.0;

/// Samples to read per tick at the given rate, at least one.
pub(crate) fn samples_per_frame(sample_rate_hz: f64) -> usize {
    ((sample_rate_hz / MAX_REFRESH_HZ).round() as usize).max(1)
}

/// Everything the spawned streaming task owns.
pub(crate) struct StreamTask {
    pub lock_in: Arc<AsyncMutex<Box<dyn SampleSource>>>,
    pub trace: Arc<Mutex<TraceBuffer>>,
    pub guard: Arc<StateGuard>,
    pub last_error: Arc<Mutex<Option<String>>>,
    pub reporter: StatusReporter,
}

impl StreamTask {
    /// Run ticks until stop or fault, then tear the instrument stream down
    /// and publish the closing status event.
    pub(crate) async fn run(self, samples_per_frame: usize) {
        let result = self.drive(samples_per_frame).await;

        // Teardown is attempted on every exit path.
        {
            let lock_in = self.lock_in.lock().await;
            if let Err(err) = lock_in.stop_stream().await {
                warn!(%err, "lock-in stream teardown failed");
            }
        }

        if let Err(err) = result {
            error!(%err, "trace streaming aborted");
            *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(err.to_string());
        }
        self.guard.finish();
        self.reporter.publish();
    }

    async fn drive(&self, samples_per_frame: usize) -> EngineResult<()> {
        // The time axis only changes on reconfiguration, which restarts
        // this task; share one copy across all updates.
        let times = Arc::new(
            self.trace
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .times()
                .to_vec(),
        );

        loop {
            if self.guard.stop_requested() {
                return Ok(());
            }

            let block = {
                let lock_in = self.lock_in.lock().await;
                let wanted = lock_in.available_samples().max(samples_per_frame);
                let block = lock_in
                    .read_block(wanted)
                    .await
                    .map_err(|e| EngineError::InstrumentFault(e.to_string()))?;
                if block.len() != wanted {
                    return Err(EngineError::StreamIntegrity {
                        requested: wanted,
                        received: block.len(),
                    });
                }
                block
            };

            let (x, y) = {
                let mut trace = self.trace.lock().unwrap_or_else(|p| p.into_inner());
                trace.push_block(&block);
                trace.snapshot()
            };
            self.reporter.events.publish(EngineEvent::TraceUpdated {
                times: Arc::clone(&times),
                x: Arc::new(x),
                y: Arc::new(y),
            });

            tokio::task::yield_now().await;
        }
    }
}
