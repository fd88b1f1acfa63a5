//! Acquisition state machine and its concurrency guard.
//!
//! # State machine
//!
//! ```text
//! Idle ──start──> Running ──request_stop──> StopRequested
//!   ▲                │                           │
//!   └──── finish ────┴─────────── finish ────────┘
//! ```
//!
//! A stop request is cooperative: it never forces the transition to `Idle`
//! itself. The running loop observes the flag at its next checkpoint and
//! calls [`StateGuard::finish`].
//!
//! # Locking
//!
//! Transitions take a mutex only for the check-and-set; the current state is
//! mirrored into an atomic, so queries from the running loop and from other
//! threads are lock-free. The mutex is never held across collaborator I/O.

use crate::error::{EngineError, EngineResult};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

/// Lifecycle state of one acquisition path (scan or stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    /// No acquisition active.
    Idle = 0,
    /// Acquisition loop executing.
    Running = 1,
    /// Stop requested; the loop finishes its current step and exits.
    StopRequested = 2,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Running => write!(f, "Running"),
            EngineState::StopRequested => write!(f, "StopRequested"),
        }
    }
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Running,
            2 => EngineState::StopRequested,
            _ => EngineState::Idle,
        }
    }
}

/// Exclusive-transition wrapper around [`EngineState`].
#[derive(Debug)]
pub struct StateGuard {
    state: Mutex<EngineState>,
    snapshot: AtomicU8,
}

impl StateGuard {
    /// Create a guard in the `Idle` state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::Idle),
            snapshot: AtomicU8::new(EngineState::Idle as u8),
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Attempt the `Idle -> Running` transition.
    pub fn try_begin(&self) -> EngineResult<()> {
        let mut state = self.locked();
        if *state != EngineState::Idle {
            return Err(EngineError::AlreadyRunning);
        }
        *state = EngineState::Running;
        self.snapshot
            .store(EngineState::Running as u8, Ordering::Release);
        Ok(())
    }

    /// Request a cooperative stop.
    ///
    /// Returns `true` if the `Running -> StopRequested` transition happened;
    /// `false` when the path was not running (the request is a no-op then).
    pub fn request_stop(&self) -> bool {
        let mut state = self.locked();
        if *state != EngineState::Running {
            return false;
        }
        *state = EngineState::StopRequested;
        self.snapshot
            .store(EngineState::StopRequested as u8, Ordering::Release);
        true
    }

    /// Transition back to `Idle` from any state.
    pub fn finish(&self) {
        let mut state = self.locked();
        *state = EngineState::Idle;
        self.snapshot
            .store(EngineState::Idle as u8, Ordering::Release);
    }

    /// Current state; lock-free.
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.snapshot.load(Ordering::Acquire))
    }

    /// Whether a stop has been requested; lock-free, checked at loop
    /// checkpoints.
    pub fn stop_requested(&self) -> bool {
        self.state() == EngineState::StopRequested
    }

    /// Whether the path is active (`Running` or `StopRequested`).
    pub fn is_active(&self) -> bool {
        self.state() != EngineState::Idle
    }
}

impl Default for StateGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_only_from_idle() {
        let guard = StateGuard::new();
        assert!(guard.try_begin().is_ok());
        assert!(matches!(
            guard.try_begin(),
            Err(EngineError::AlreadyRunning)
        ));
        guard.finish();
        assert!(guard.try_begin().is_ok());
    }

    #[test]
    fn stop_request_is_noop_when_idle() {
        let guard = StateGuard::new();
        assert!(!guard.request_stop());
        assert_eq!(guard.state(), EngineState::Idle);
    }

    #[test]
    fn stop_request_does_not_reach_idle_by_itself() {
        let guard = StateGuard::new();
        guard.try_begin().unwrap();
        assert!(guard.request_stop());
        assert_eq!(guard.state(), EngineState::StopRequested);
        assert!(guard.is_active());
        guard.finish();
        assert_eq!(guard.state(), EngineState::Idle);
    }

    #[test]
    fn second_stop_request_is_noop() {
        let guard = StateGuard::new();
        guard.try_begin().unwrap();
        assert!(guard.request_stop());
        assert!(!guard.request_stop());
    }
}
