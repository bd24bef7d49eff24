//! ingestd - Command-line driver for the event ingest engine.
//!
//! Polls `<root>/Input` for `<id>.dat` / `<id>.md5` pairs and runs them
//! through the engine until interrupted, or once with `--once`.

use clap::Parser;
use ingest_engine::{
    run_once, run_service, ChecksumAlgorithm, CycleObserver, CycleReport, DedupPolicy,
    EngineConfig, FileHandle, FileStatus, Orchestrator, StopSignal,
};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ingestd - Validate and normalize event files dropped into a folder
#[derive(Parser, Debug)]
#[command(name = "ingestd")]
#[command(version = "0.1.0")]
#[command(about = "Validate paired event files and route them to Done or Errors")]
struct Args {
    /// Root directory holding Input, Output, Errors and Done
    #[arg(long, value_name = "PATH", env = "INGEST_ROOT")]
    root: PathBuf,

    /// Seconds between two poll cycles
    #[arg(long, value_name = "SECS", env = "INGEST_INTERVAL_SECS", default_value_t = 60)]
    interval_secs: u64,

    /// Files processed in parallel (defaults to the number of CPUs)
    #[arg(long, value_name = "N", env = "INGEST_WORKERS")]
    workers: Option<usize>,

    /// Checksum algorithm: md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM", env = "INGEST_DIGEST", default_value = "md5")]
    digest: String,

    /// Which duplicate event row survives: first or last
    #[arg(long, value_name = "POLICY", env = "INGEST_DEDUP", default_value = "last")]
    dedup: String,

    /// Body rows to skip in every file
    #[arg(long, value_name = "N", env = "INGEST_STARTING_ROW", default_value_t = 0)]
    starting_row: usize,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: String,
}

/// Logs per-file results and cycle summaries.
struct LogObserver;

impl CycleObserver for LogObserver {
    fn on_cycle_started(&self, cycle_id: uuid::Uuid, files: &[FileHandle]) {
        if !files.is_empty() {
            tracing::info!(%cycle_id, files = files.len(), "Processing files");
        }
    }

    fn on_file_completed(&self, file: &FileHandle, status: FileStatus) {
        match status {
            FileStatus::Accepted { records } => {
                tracing::info!(file_id = %file.file_id, records, "Accepted")
            }
            FileStatus::Rejected { errors } => {
                tracing::warn!(file_id = %file.file_id, errors, "Rejected")
            }
            FileStatus::IoFailed => {
                tracing::warn!(file_id = %file.file_id, "Left in Input after an I/O failure")
            }
        }
    }

    fn on_cycle_completed(&self, report: &CycleReport) {
        let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();
        tracing::debug!(cycle_id = %report.cycle_id, elapsed_ms, "Cycle finished");
    }
}

fn init_logging(level: &str, format: &str) -> Result<(), String> {
    let directive: tracing_subscriber::filter::Directive = level
        .parse()
        .map_err(|_| format!("Invalid log level '{}'", level))?;
    let filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true);

    let result = match format.to_lowercase().as_str() {
        "text" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init(),
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init(),
        _ => {
            return Err(format!(
                "Invalid log format '{}'. Must be 'text' or 'json'",
                format
            ))
        }
    };
    result.map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Request a stop on Ctrl-C. The helper thread lives until the process ends.
fn install_ctrl_c_handler(stop: StopSignal) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to build signal runtime: {}", e))?;

    thread::Builder::new()
        .name("ingest-signal".to_string())
        .spawn(move || {
            match runtime.block_on(tokio::signal::ctrl_c()) {
                Ok(()) => {
                    tracing::info!("Interrupt received; finishing the current cycle");
                    stop.request_stop();
                }
                Err(e) => tracing::error!(error = %e, "Could not listen for Ctrl-C"),
            }
        })
        .map_err(|e| format!("Failed to spawn signal thread: {}", e))?;
    Ok(())
}

/// Parse and validate command-line arguments, then run the engine
fn main() {
    let args = Args::parse();

    let exit_code = match init_logging(&args.log_level, &args.log_format).and_then(|()| run_cli(&args)) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let config = build_config(args)?;

    if !config.root.is_dir() {
        return Err(format!("Root directory does not exist: {}", config.root.display()));
    }

    let orchestrator =
        Orchestrator::with_local_store(config).map_err(|e| format!("Engine start failed: {}", e))?;

    if args.once {
        run_once(&orchestrator, &LogObserver).map_err(|e| format!("Cycle failed: {}", e))?;
    } else {
        let stop = StopSignal::new();
        install_ctrl_c_handler(stop.clone())?;
        run_service(&orchestrator, &stop, &LogObserver);
    }

    let sinks = orchestrator.shutdown();
    tracing::info!(
        done = sinks.success.finalized,
        rejected = sinks.failure.finalized,
        "Sinks drained"
    );

    let failed = sinks.success.failed + sinks.failure.failed;
    if failed > 0 {
        Err(format!("{} file(s) could not be finalized", failed))
    } else {
        Ok(())
    }
}

fn build_config(args: &Args) -> Result<EngineConfig, String> {
    let algorithm = ChecksumAlgorithm::from_str(&args.digest).ok_or_else(|| {
        format!(
            "Invalid digest '{}'. Must be 'md5', 'sha256', or 'blake3'",
            args.digest
        )
    })?;

    let dedup = DedupPolicy::from_str(&args.dedup).ok_or_else(|| {
        format!("Invalid dedup policy '{}'. Must be 'first' or 'last'", args.dedup)
    })?;

    let mut config = EngineConfig::new(&args.root)
        .with_algorithm(algorithm)
        .with_dedup(dedup)
        .with_starting_at_row(args.starting_row)
        .with_poll_interval(Duration::from_secs(args.interval_secs));
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
