//! CLI entry point for pump_probe.
//!
//! Headless front end for the scan engine, wired to mock hardware:
//!
//! - `pump_probe scan` runs a delay-line scan and prints the averaged
//!   series (Ctrl-C requests a cooperative stop)
//! - `pump_probe trace` runs the continuous trace stream for a few seconds
//!
//! Settings come from `config/<name>.toml` and can be overridden per run
//! on the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use pump_probe::engine::ScanEngine;
use pump_probe::events::EngineEvent;
use pump_probe::hardware::mock::{MockDelayLine, MockLockIn};
use pump_probe::{telemetry, ScanConfig, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "pump_probe")]
#[command(about = "Delay-line scan and lock-in acquisition engine", long_about = None)]
struct Cli {
    /// Configuration name under config/ (without extension)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a delay-line scan against mock hardware
    Scan {
        /// Scan start position in mm
        #[arg(long)]
        start: Option<f64>,

        /// Scan end position in mm
        #[arg(long)]
        end: Option<f64>,

        /// Step size in mm
        #[arg(long)]
        step: Option<f64>,

        /// Samples per position
        #[arg(long)]
        repeats: Option<u32>,

        /// Number of full sweeps
        #[arg(long)]
        scans: Option<u32>,

        /// Free-form experiment tag for the data files
        #[arg(long)]
        tag: Option<String>,

        /// Write raw and averaged CSV files here after the run
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Stream the continuous lock-in trace for a few seconds
    Trace {
        /// How long to stream
        #[arg(long, default_value = "5")]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = match Settings::new(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            let settings = Settings::default();
            telemetry::init(&settings.log_level);
            warn!(%err, "no configuration file loaded; using defaults");
            settings
        }
    };
    telemetry::init(&settings.log_level);

    match cli.command {
        Commands::Scan {
            start,
            end,
            step,
            repeats,
            scans,
            tag,
            output,
        } => {
            let mut cfg = settings.scan.clone();
            if let Some(v) = start {
                cfg.start_mm = v;
            }
            if let Some(v) = end {
                cfg.end_mm = v;
            }
            if let Some(v) = step {
                cfg.step_mm = v;
            }
            if let Some(v) = repeats {
                cfg.repeats_per_point = v;
            }
            if let Some(v) = scans {
                cfg.scan_count = v;
            }
            run_scan(&settings, cfg, tag, output).await
        }
        Commands::Trace { seconds } => run_trace(&settings, seconds).await,
    }
}

fn build_engine(settings: &Settings) -> Result<ScanEngine> {
    let stage = Arc::new(MockDelayLine::new().with_speed(500.0));
    let lock_in = Box::new(MockLockIn::new());
    let engine = ScanEngine::new(stage, lock_in, settings.trace)?;
    Ok(engine)
}

async fn run_scan(
    settings: &Settings,
    cfg: ScanConfig,
    tag: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let engine = Arc::new(build_engine(settings)?);
    if let Some(tag) = tag {
        engine.set_experiment_tag(tag);
    }

    // Progress reporter on the event stream.
    let mut events = BroadcastStream::new(engine.subscribe());
    let progress = tokio::spawn(async move {
        let mut points = 0u64;
        while let Some(Ok(event)) = events.next().await {
            if matches!(event, EngineEvent::PointAcquired) {
                points += 1;
                if points % 10 == 0 {
                    info!(points, "scan progress");
                }
            }
        }
    });

    engine.start_scan(cfg)?;

    // Ctrl-C requests a cooperative stop; the repeat in flight completes.
    let canceller = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine.request_stop();
            }
        })
    };

    engine.join_scan().await;
    canceller.abort();
    progress.abort();

    let status = engine.scan_status();
    if let Some(err) = status.last_error {
        anyhow::bail!("scan aborted: {err}");
    }

    let averaged = engine.averaged_series();
    println!("position_mm  samples  x_v          y_v          r_v");
    for point in &averaged {
        println!(
            "{:>11.4}  {:>7}  {:>11.4e}  {:>11.4e}  {:>11.4e}",
            point.position_mm, point.samples, point.x_v, point.y_v, point.r_v
        );
    }
    println!(
        "{} raw samples over {} positions",
        engine.raw_log().len(),
        averaged.len()
    );

    if let Some(path) = output {
        #[cfg(feature = "storage_csv")]
        {
            engine.export_recorded(&path)?;
            println!("data written to {}", path.display());
        }
        #[cfg(not(feature = "storage_csv"))]
        warn!(
            path = %path.display(),
            "built without storage_csv; --output ignored"
        );
    }

    Ok(())
}

async fn run_trace(settings: &Settings, seconds: u64) -> Result<()> {
    let engine = Arc::new(build_engine(settings)?);

    let mut events = BroadcastStream::new(engine.subscribe());
    let reporter = tokio::spawn(async move {
        let mut frames = 0u64;
        while let Some(Ok(event)) = events.next().await {
            if let EngineEvent::TraceUpdated { x, .. } = event {
                frames += 1;
                if frames % 20 == 0 {
                    if let Some(last) = x.last() {
                        info!(frames, last_x_v = last, "trace running");
                    }
                }
            }
        }
    });

    engine.start_stream().await?;
    sleep(Duration::from_secs(seconds)).await;
    engine.stop_stream().await;
    reporter.abort();

    if let Some(err) = engine.stream_error() {
        anyhow::bail!("trace aborted: {err}");
    }

    let (times, x, _y) = engine.trace_data();
    println!(
        "trace window: {} samples over {:.1} s",
        x.len(),
        times.last().copied().unwrap_or(0.0)
    );
    Ok(())
}
