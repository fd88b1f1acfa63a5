//! Integration tests for the continuous trace path: configuration,
//! hot reconfiguration, stream integrity and concurrent operation with a
//! scan.

use anyhow::Result;
use async_trait::async_trait;
use pump_probe::config::{ScanConfig, TraceSettings};
use pump_probe::engine::{EngineState, ScanEngine};
use pump_probe::events::EngineEvent;
use pump_probe::hardware::mock::{MockDelayLine, MockLockIn};
use pump_probe::hardware::SampleSource;
use pump_probe::EngineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_test::assert_ok;

const JOIN_LIMIT: Duration = Duration::from_secs(5);

fn fast_stage() -> Arc<MockDelayLine> {
    Arc::new(
        MockDelayLine::new()
            .with_speed(100_000.0)
            .with_settle(Duration::ZERO),
    )
}

fn engine_with(lock_in: Box<dyn SampleSource>, trace: TraceSettings) -> ScanEngine {
    ScanEngine::new(fast_stage(), lock_in, trace).unwrap()
}

/// Lock-in that delivers one sample less than requested.
struct ShortReadLockIn;

#[async_trait]
impl SampleSource for ShortReadLockIn {
    async fn read_one(&self) -> Result<(f64, f64)> {
        Ok((0.1, 0.2))
    }

    async fn read_block(&self, samples: usize) -> Result<Vec<(f64, f64)>> {
        Ok(vec![(0.1, 0.2); samples.saturating_sub(1)])
    }

    fn available_samples(&self) -> usize {
        4
    }

    fn sample_rate(&self) -> f64 {
        10.0
    }

    async fn set_sample_rate(&self, _rate_hz: f64) -> Result<()> {
        Ok(())
    }

    async fn start_stream(&self) -> Result<()> {
        Ok(())
    }

    async fn stop_stream(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn configure_is_idempotent_while_idle() {
    let engine = engine_with(Box::new(MockLockIn::new()), TraceSettings::default());

    let first = engine.configure_trace(10.0, 30.0).await.unwrap();
    let len_first = engine.trace_data().0.len();

    let second = engine.configure_trace(10.0, 30.0).await.unwrap();
    let len_second = engine.trace_data().0.len();

    assert_eq!(first, second);
    assert_eq!(len_first, 300);
    assert_eq!(len_second, 300);
}

#[tokio::test]
async fn invalid_settings_are_rejected_and_prior_kept() {
    let engine = engine_with(Box::new(MockLockIn::new()), TraceSettings::default());
    let before = engine.trace_settings();

    assert!(matches!(
        engine.configure_trace(0.0, 30.0).await,
        Err(EngineError::InvalidSetting(_))
    ));
    assert!(matches!(
        engine.configure_trace(10.0, -1.0).await,
        Err(EngineError::InvalidSetting(_))
    ));

    assert_eq!(engine.trace_settings(), before);
}

#[tokio::test]
async fn stream_fills_the_window_and_stops_cleanly() {
    let engine = engine_with(Box::new(MockLockIn::new()), TraceSettings::default());
    engine.configure_trace(200.0, 0.5).await.unwrap();

    assert_ok!(engine.start_stream().await);
    assert_eq!(engine.stream_state(), EngineState::Running);

    // A second start while running is rejected.
    assert!(matches!(
        engine.start_stream().await,
        Err(EngineError::AlreadyRunning)
    ));

    tokio::time::sleep(Duration::from_millis(300)).await;
    timeout(JOIN_LIMIT, engine.stop_stream()).await.unwrap();

    assert_eq!(engine.stream_state(), EngineState::Idle);
    assert!(engine.stream_error().is_none());

    let (times, x, y) = engine.trace_data();
    assert_eq!(times.len(), 100);
    assert_eq!(x.len(), 100);
    assert_eq!(y.len(), 100);
    assert!(x.iter().any(|v| *v != 0.0), "window stayed empty");
}

#[tokio::test]
async fn trace_updates_are_published() {
    let engine = engine_with(Box::new(MockLockIn::new()), TraceSettings::default());
    engine.configure_trace(200.0, 0.5).await.unwrap();
    let mut events = engine.subscribe();

    engine.start_stream().await.unwrap();

    let update = timeout(JOIN_LIMIT, async {
        loop {
            if let Ok(EngineEvent::TraceUpdated { times, x, .. }) = events.recv().await {
                return (times, x);
            }
        }
    })
    .await
    .unwrap();

    timeout(JOIN_LIMIT, engine.stop_stream()).await.unwrap();

    let (times, x) = update;
    assert_eq!(times.len(), 100);
    assert_eq!(x.len(), 100);
    // Time axis is arange(len)/rate.
    assert!((times[1] - 0.005).abs() < 1e-12);
}

#[tokio::test]
async fn short_read_terminates_the_stream() {
    let engine = engine_with(Box::new(ShortReadLockIn), TraceSettings::default());

    engine.start_stream().await.unwrap();
    timeout(JOIN_LIMIT, engine.join_stream()).await.unwrap();

    assert_eq!(engine.stream_state(), EngineState::Idle);
    let error = engine.stream_error().expect("integrity fault must surface");
    assert!(error.contains("samples"), "unexpected error: {error}");
}

#[tokio::test]
async fn hot_reconfiguration_restarts_the_stream() {
    let engine = engine_with(Box::new(MockLockIn::new()), TraceSettings::default());
    engine.configure_trace(100.0, 1.0).await.unwrap();

    engine.start_stream().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Reconfigure mid-stream: stop, drain, apply, restart.
    let applied = timeout(JOIN_LIMIT, engine.configure_trace(20.0, 2.5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.sample_rate_hz, 20.0);
    assert_eq!(engine.stream_state(), EngineState::Running);
    assert_eq!(engine.trace_data().0.len(), 50);

    timeout(JOIN_LIMIT, engine.stop_stream()).await.unwrap();
    assert_eq!(engine.stream_state(), EngineState::Idle);
}

#[tokio::test]
async fn scan_and_stream_share_the_lock_in_safely() {
    let engine = Arc::new(engine_with(
        Box::new(MockLockIn::new()),
        TraceSettings::default(),
    ));
    engine.configure_trace(100.0, 1.0).await.unwrap();

    engine.start_stream().await.unwrap();
    engine
        .start_scan(ScanConfig {
            start_mm: 0.0,
            end_mm: 2.0,
            step_mm: 1.0,
            repeats_per_point: 1,
            scan_count: 1,
            settle_time: Duration::from_millis(1),
        })
        .unwrap();

    timeout(JOIN_LIMIT, engine.join_scan()).await.unwrap();
    assert_eq!(engine.raw_log().len(), 3);
    assert!(engine.scan_status().last_error.is_none());

    timeout(JOIN_LIMIT, engine.stop_stream()).await.unwrap();
    assert!(engine.stream_error().is_none());
}
