//! Scan execution task.
//!
//! Drives the position sequence against the stage and records one sample
//! per (position, repeat) pair. Runs as a spawned cooperative task; the
//! stop flag is checked before every repeat (the innermost loop boundary),
//! so a requested stop takes effect within one settle-plus-read period.
//!
//! Collaborator failures abort the remaining sequence: the fault is logged,
//! stored in the scan status and the engine returns to idle with a single
//! closing status event. Faults are never retried.

use crate::config::ScanConfig;
use crate::engine::recorder::PointRecorder;
use crate::engine::sequence::PositionSequence;
use crate::engine::state::StateGuard;
use crate::engine::{ScanStatus, StatusReporter};
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::hardware::{Movable, SampleSource};
use crate::measurement::MeasurementSample;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;
use tracing::{error, info};

/// Everything the spawned scan task owns.
pub(crate) struct ScanTask {
    pub stage: Arc<dyn Movable>,
    pub lock_in: Arc<AsyncMutex<Box<dyn SampleSource>>>,
    pub recorder: Arc<PointRecorder>,
    pub guard: Arc<StateGuard>,
    pub status: Arc<Mutex<ScanStatus>>,
    pub reporter: StatusReporter,
}

impl ScanTask {
    /// Execute the run to completion, stop request or fault, then return
    /// the path to idle and publish the closing status event.
    pub(crate) async fn run(self, cfg: ScanConfig, sequence: PositionSequence) {
        match self.drive(&cfg, &sequence).await {
            Ok(true) => info!(samples = self.recorder.len(), "scan completed"),
            Ok(false) => info!(samples = self.recorder.len(), "scan stopped on request"),
            Err(err) => {
                error!(%err, "scan aborted");
                let mut status = self.status.lock().unwrap_or_else(|p| p.into_inner());
                status.last_error = Some(err.to_string());
            }
        }
        self.guard.finish();
        self.reporter.publish();
    }

    async fn drive(&self, cfg: &ScanConfig, sequence: &PositionSequence) -> EngineResult<bool> {
        for (scan_index, point_index, position_mm) in sequence.iter() {
            if self.guard.stop_requested() {
                return Ok(false);
            }

            self.stage
                .move_abs(position_mm)
                .await
                .map_err(|e| EngineError::ActuatorFault(e.to_string()))?;
            self.stage
                .wait_settled()
                .await
                .map_err(|e| EngineError::ActuatorFault(e.to_string()))?;

            for _repeat in 0..cfg.repeats_per_point {
                // Innermost checkpoint: bounds cancellation latency to one
                // settle + one read.
                if self.guard.stop_requested() {
                    return Ok(false);
                }
                sleep(cfg.settle_time).await;

                let (x_v, y_v) = {
                    let lock_in = self.lock_in.lock().await;
                    lock_in
                        .read_one()
                        .await
                        .map_err(|e| EngineError::InstrumentFault(e.to_string()))?
                };

                self.recorder.record(MeasurementSample::new(
                    scan_index,
                    point_index,
                    position_mm,
                    x_v,
                    y_v,
                ));
                self.reporter.events.publish(EngineEvent::PointAcquired);
            }
        }
        Ok(true)
    }
}
