//! OracBench CLI Library
//!
//! This module provides the CLI infrastructure for benchmark suite binaries.
//! Build a [`CategoryRegistry`] in your main function and hand it to
//! `oracbench::run()` (or `oracbench_cli::run()`) to get the full CLI.
//!
//! # Example
//!
//! ```ignore
//! use oracbench::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = CategoryRegistry::new();
//!     registry.register(
//!         CategoryDef::new("latency").parallel_safe(true),
//!         FnProbe::new(|_ctx| async { Ok(ProbeResult::new("rtt_ms", 4.2)) }),
//!     )?;
//!     oracbench_cli::run(&registry)
//! }
//! ```

mod config;
mod executor;
mod planner;

pub use config::*;
pub use executor::{
    DEFAULT_TIMEOUT, ExecutionConfig, Executor, GradingConfig, PersistenceError, ResultStore,
    RunContext, RunOptions, SharedStore, SnapshotWriter, StoreError, Terminal, build_run_metadata,
    collect_host_info, derive_insights, finalize, format_human_output, score_categories,
};
pub use planner::{build_plan, format_plan};

use clap::{Parser, Subcommand};
use oracbench_core::{CancellationToken, CategoryRegistry};
use oracbench_report::{OutputFormat, OverlapPolicy};
use std::path::PathBuf;

/// OracBench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "oracbench")]
#[command(author, version, about = "OracBench - dependency-aware benchmark orchestration")]
pub struct Cli {
    /// Optional subcommand (Run, Plan); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Category to run (plus its dependencies), or "all"
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Snapshot destination (default: civitas_report.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run parallel-safe categories of a wave concurrently
    #[arg(long, overrides_with = "no_parallel")]
    pub parallel: bool,

    /// Run every category one at a time, even when orac.toml enables parallel
    #[arg(long, overrides_with = "parallel")]
    pub no_parallel: bool,

    /// Rewrite the snapshot after every category outcome
    #[arg(long, overrides_with = "no_watch")]
    pub watch: bool,

    /// Write the snapshot only at the end, even when orac.toml enables streaming
    #[arg(long, overrides_with = "watch")]
    pub no_watch: bool,

    /// Timeout for a single category (e.g. "30s", "5m")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Ordering within a wave: serial-first, concurrent-first, overlap
    #[arg(long)]
    pub overlap: Option<String>,

    /// Terminal output format: human, json
    #[arg(long)]
    pub format: Option<String>,

    /// Configuration file (default: discover orac.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the suite (default)
    Run,
    /// Print the wave plan without executing anything
    Plan,
}

/// Run the OracBench CLI against a registry.
/// This is the main entry point for suite binaries.
///
/// # Returns
/// Returns an error only when the run could not be planned (unknown category,
/// missing dependency, cycle) or the configuration is invalid. Probe failures
/// are part of the report, not errors.
pub fn run(registry: &CategoryRegistry) -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli, registry)
}

/// Run the OracBench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli, registry: &CategoryRegistry) -> anyhow::Result<()> {
    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("oracbench=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("oracbench=info")
            .with_writer(std::io::stderr)
            .init();
    }

    // Explicit --config wins; otherwise discover orac.toml (CLI flags override)
    let config = match &cli.config {
        Some(path) => OracConfig::load(path)?,
        None => OracConfig::discover().unwrap_or_default(),
    };

    let options = build_run_options(&cli, &config)?;
    let format = match &cli.format {
        Some(f) => f
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => config.output.format,
    };

    match cli.command {
        Some(Commands::Plan) => {
            let schedule = build_plan(registry, &options.mode, options.parallel)?;
            print!("{}", format_plan(&schedule, options.execution.overlap));
        }
        Some(Commands::Run) | None => {
            run_suite(registry, options, format)?;
        }
    }

    Ok(())
}

/// Layer configuration: orac.toml values, then CLI overrides.
fn build_run_options(cli: &Cli, config: &OracConfig) -> anyhow::Result<RunOptions> {
    let (mut default_timeout, timeouts) = config.timeouts()?;
    if let Some(timeout) = &cli.timeout {
        default_timeout = OracConfig::parse_duration(timeout)?;
    }

    let overlap = match &cli.overlap {
        Some(policy) => policy
            .parse::<OverlapPolicy>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => config.runner.overlap,
    };

    Ok(RunOptions {
        mode: cli.mode.clone().unwrap_or_else(|| "all".to_string()),
        parallel: toggle(cli.parallel, cli.no_parallel, config.runner.parallel),
        streaming: toggle(cli.watch, cli.no_watch, config.output.streaming),
        output: Some(
            cli.output
                .clone()
                .unwrap_or_else(|| config.output.path.clone()),
        ),
        execution: ExecutionConfig {
            default_timeout,
            timeouts,
            overlap,
            show_progress: config.runner.progress,
            probe_options: config.probes.clone(),
        },
        grading: GradingConfig {
            policy: config.grading,
            thresholds: config.thresholds.clone(),
        },
    })
}

/// Resolve an `--x`/`--no-x` flag pair against the configured value
fn toggle(on: bool, off: bool, configured: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        configured
    }
}

fn run_suite(
    registry: &CategoryRegistry,
    options: RunOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let output_path = options.output.clone();

    // Single-threaded runtime: category tasks interleave cooperatively
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let store = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn(cancel_on_interrupt(cancel.clone()));

        let result = RunContext::new(registry, options)
            .with_cancellation(cancel)
            .run()
            .await;

        interrupt.abort();
        result
    })?;

    let output = match format {
        OutputFormat::Json => store.to_json()?,
        OutputFormat::Human => format_human_output(&store),
    };
    print!("{}", output);

    if let Some(path) = output_path {
        if store.persistence_failures() == 0 {
            eprintln!("Report written to: {}", path.display());
        } else {
            eprintln!(
                "Warning: report at {} may be stale ({} failed write(s))",
                path.display(),
                store.persistence_failures()
            );
        }
    }

    Ok(())
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupt received, cancelling run");
        cancel.cancel();
    }
}
