//! fanout CLI
//!
//! Runs each positional argument as one work item on a fixed-size pool.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fanout::config::{CliOverrides, DispatchConfig};
use fanout::{ConsoleSink, Dispatcher, SleepProcessor};

#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Process work items in parallel on a fixed-size worker pool")]
#[command(version)]
struct Cli {
    /// Work items, one task per item
    items: Vec<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Number of parallel worker slots (default: 4)
    #[arg(long)]
    pool_size: Option<usize>,

    /// Simulated work per item in milliseconds (default: 2000)
    #[arg(long)]
    latency_ms: Option<u64>,

    /// Stop starting new items after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Path to config file (default: <config dir>/fanout/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "fanout=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let overrides = CliOverrides {
        pool_size: cli.pool_size,
        task_latency_ms: cli.latency_ms,
        fail_fast: cli.fail_fast,
    };
    let config = DispatchConfig::load(cli.config.as_deref(), &overrides)?;
    let processor = SleepProcessor::new(config.task_latency);
    let dispatcher = Dispatcher::new(
        config.pool_size,
        processor,
        ConsoleSink::for_sleep(&processor),
    )
    .with_failure_policy(config.failure_policy);
    info!(
        pool_size = dispatcher.pool_size(),
        latency = ?processor.latency(),
        policy = ?config.failure_policy,
        "loaded config"
    );

    let report = dispatcher.run(cli.items).await?;

    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("Failures:");
    for line in report.failure_summary() {
        eprintln!("{}", line);
    }
    Ok(ExitCode::FAILURE)
}
