//! serial-spectrum - live spectrum analyzer for serial displacement sensors
//!
//! # Usage
//!
//! ```bash
//! # Sensor on the default port, Ctrl+C to stop
//! serial-spectrum --port /dev/ttyACM0 --baud 921600
//!
//! # Synthetic data through stdin
//! simulate --freq 12.5 --freq 40 --sample-rate 3000 | serial-spectrum --stdin --arrival-times
//!
//! # Replay a capture and write the outputs
//! serial-spectrum --replay capture.txt --export samples.csv --report report.json
//! ```
//!
//! # Environment Variables
//!
//! - `SPECTRUM_CONFIG`: path to a TOML config file
//! - `SPECTRUM_PORT`: serial port (same as `--port`)
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use serial_spectrum::config::{self, defaults, AnalyzerConfig};
use serial_spectrum::export;
use serial_spectrum::pipeline::{LiveFeed, SessionController};
use serial_spectrum::{ReaderSource, SampleSource, SerialSource, SessionState, TimeBase};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "serial-spectrum")]
#[command(about = "Live amplitude spectrum and peak tracking for serial displacement sensors")]
#[command(version)]
struct CliArgs {
    /// Serial port of the sensor (overrides acquisition.port)
    #[arg(long, env = "SPECTRUM_PORT")]
    port: Option<String>,

    /// Serial baud rate (overrides acquisition.baud_rate)
    #[arg(long)]
    baud: Option<u32>,

    /// Read one sample per line from stdin instead of a serial port
    #[arg(long, conflicts_with = "replay")]
    stdin: bool,

    /// Replay samples from a text file, one per line
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Timestamp stdin/replay samples by arrival instead of by sequence
    /// (only meaningful when the producer is paced, e.g. `simulate`)
    #[arg(long)]
    arrival_times: bool,

    /// Path to a TOML config file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop the session after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<f64>,

    /// Console refresh period
    #[arg(long, value_name = "MS", default_value_t = defaults::CONSOLE_REFRESH_MS)]
    refresh_ms: u64,

    /// Write accepted samples as CSV (timestamp = index / sample rate)
    #[arg(long, value_name = "CSV")]
    export: Option<PathBuf>,

    /// Write the resampled batch series as CSV, when resampling ran
    #[arg(long, value_name = "CSV")]
    export_resampled: Option<PathBuf>,

    /// Write the full session report as JSON
    #[arg(long, value_name = "JSON")]
    report: Option<PathBuf>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

// ============================================================================
// Startup
// ============================================================================

fn load_config(args: &CliArgs) -> AnalyzerConfig {
    let mut cfg = AnalyzerConfig::load(args.config.as_deref());
    if let Some(port) = &args.port {
        cfg.acquisition.port = port.clone();
    }
    if let Some(baud) = args.baud {
        cfg.acquisition.baud_rate = baud;
    }
    cfg
}

fn open_source(args: &CliArgs, cfg: &AnalyzerConfig) -> Result<Box<dyn SampleSource>> {
    let timeout = Duration::from_millis(cfg.acquisition.read_timeout_ms);

    let time_base = if args.arrival_times {
        TimeBase::Arrival
    } else {
        TimeBase::Nominal
    };

    let source: Box<dyn SampleSource> = if args.stdin {
        Box::new(
            ReaderSource::stdin(timeout)
                .context("Failed to attach to stdin")?
                .with_time_base(time_base),
        )
    } else if let Some(path) = &args.replay {
        Box::new(
            ReaderSource::open_file(path, timeout)
                .with_context(|| format!("Failed to open replay file {}", path.display()))?
                .with_time_base(time_base),
        )
    } else {
        Box::new(
            SerialSource::open(&cfg.acquisition.port, cfg.acquisition.baud_rate, timeout)
                .with_context(|| {
                    format!(
                        "Failed to open serial port {} (try --list-ports)",
                        cfg.acquisition.port
                    )
                })?,
        )
    };
    Ok(source)
}

fn capture_limit(duration: Option<f64>) -> Result<Option<Duration>> {
    match duration {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => bail!("--duration must be a positive number of seconds, got {secs}"),
    }
}

async fn wait_for(limit: Option<Duration>) {
    match limit {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

// ============================================================================
// Console consumer
// ============================================================================

/// Periodically log the latest live snapshot. Never blocks acquisition: a
/// slow tick just reads a newer snapshot next time.
fn spawn_console_consumer(
    live: LiveFeed,
    period: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_seen = 0u64;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = interval.tick() => {
                    let snap = live.load();
                    if snap.state != SessionState::Sampling || snap.accepted_samples == last_seen {
                        continue;
                    }
                    last_seen = snap.accepted_samples;

                    let peaks = snap
                        .peaks
                        .peaks
                        .iter()
                        .map(|p| format!("{:.2} Hz ({:.3})", p.frequency, p.magnitude))
                        .collect::<Vec<_>>()
                        .join(", ");
                    info!(
                        samples = snap.accepted_samples,
                        last = ?snap.last_value,
                        "Peaks: {}",
                        if peaks.is_empty() { "none yet" } else { peaks.as_str() }
                    );
                }
            }
        }
    })
}

// ============================================================================
// Outputs
// ============================================================================

fn write_report_json(path: &Path, report: &serial_spectrum::SessionReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!(path = %path.display(), "Wrote session report");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    if args.list_ports {
        let ports = SerialSource::available_ports();
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{port}");
        }
        return Ok(());
    }

    let cfg = load_config(&args);
    cfg.validate().context("Invalid configuration")?;
    if args.print_config {
        print!("{}", cfg.to_toml_string()?);
        return Ok(());
    }
    config::init(cfg);
    let cfg = config::get();

    let limit = capture_limit(args.duration)?;
    if args.refresh_ms == 0 {
        bail!("--refresh-ms must be at least 1");
    }

    info!(
        sample_rate = cfg.live.sample_rate,
        window = cfg.live.window_size,
        fft_size = cfg.live.fft_size,
        cadence = cfg.live.recompute_cadence,
        "Analyzer settings"
    );

    let source = open_source(&args, cfg)?;
    let mut controller = SessionController::new(cfg.clone(), source);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, stopping session...");
        shutdown_token.cancel();
    });

    controller.start()?;
    let finished = controller
        .acquisition_finished()
        .context("Acquisition worker did not start")?;

    let console = spawn_console_consumer(
        controller.live(),
        Duration::from_millis(args.refresh_ms),
        cancel_token.clone(),
    );

    tokio::select! {
        _ = cancel_token.cancelled() => {}
        _ = finished.cancelled() => info!("Acquisition ended"),
        _ = wait_for(limit) => info!("Capture duration reached"),
    }

    let report = controller.stop().await?;
    cancel_token.cancel();
    if let Err(e) = console.await {
        warn!(error = %e, "Console task ended abnormally");
    }

    println!("{}", report.summary());

    if let Some(path) = &args.export {
        export::export_samples(path, &report.raw_values(), cfg.live.sample_rate)
            .with_context(|| format!("Failed to export samples to {}", path.display()))?;
    }
    if let Some(path) = &args.export_resampled {
        match &report.resampled {
            Some(series) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                export::write_series_csv(file, &series.times, &series.values)
                    .with_context(|| format!("Failed to export series to {}", path.display()))?;
                info!(path = %path.display(), rows = series.len(), "Exported resampled series");
            }
            None => warn!("No resampled series this session, skipping --export-resampled"),
        }
    }
    if let Some(path) = &args.report {
        write_report_json(path, &report)?;
    }

    Ok(())
}
