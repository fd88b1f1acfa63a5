//! Engine event bus.
//!
//! Consumers (a GUI, a logger, a persistence task) subscribe to a
//! `tokio::sync::broadcast` channel and receive every state transition and
//! data update in FIFO order. Publishing never blocks the engine: with no
//! subscribers the event is dropped.
//!
//! Each state transition of the scan or stream path is paired with exactly
//! one [`EngineEvent::StatusChanged`], so observers always see a single
//! authoritative state.

use crate::config::TraceSettings;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events published by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The run/idle state of an acquisition path changed.
    StatusChanged {
        /// Whether the trace streaming loop is active.
        running: bool,
        /// Whether a point-by-point scan recording is active.
        recording: bool,
    },
    /// One (position, repeat) sample was recorded.
    PointAcquired,
    /// A stage motion command completed.
    MovementFinished,
    /// The rolling trace advanced. Arcs keep re-broadcast cheap.
    TraceUpdated {
        /// Time axis in seconds, oldest sample first.
        times: Arc<Vec<f64>>,
        /// X channel window, aligned with `times`.
        x: Arc<Vec<f64>>,
        /// Y channel window, aligned with `times`.
        y: Arc<Vec<f64>>,
    },
    /// Trace settings were (re)applied.
    SettingsChanged(TraceSettings),
}

/// Cloneable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: EngineEvent) {
        // A send error only means nobody is listening right now.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
