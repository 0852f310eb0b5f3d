#![warn(missing_docs)]
//! # OracBench
//!
//! Dependency-aware orchestration for heterogeneous benchmark suites.
//!
//! OracBench runs a set of named benchmark categories (latency, memory,
//! security, ...) as one graded run:
//! - **Dependency Waves**: categories declare prerequisites and run in topological waves
//! - **Concurrency Groups**: parallel-safe categories of a wave overlap, the rest run one at a time
//! - **Failure Isolation**: a failing, panicking or timed-out probe never aborts the run
//! - **Live Snapshots**: the report file is atomically rewritten after every outcome
//! - **Grading**: threshold scoring, a letter grade and ordered insights
//!
//! ## Quick Start
//!
//! ```ignore
//! use oracbench::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = CategoryRegistry::new();
//!     registry
//!         .register(
//!             CategoryDef::new("latency").parallel_safe(true),
//!             FnProbe::new(|_ctx| async { Ok(ProbeResult::new("rtt_ms", 4.2).with_unit("ms")) }),
//!         )?
//!         .register(
//!             CategoryDef::new("scaling").depends_on(["latency"]),
//!             FnProbe::new(|_ctx| async { Ok(ProbeResult::new("throughput", 910.0)) }),
//!         )?;
//!
//!     oracbench::run(&registry)
//! }
//! ```
//!
//! ## Embedding
//!
//! ```ignore
//! let store = RunContext::new(&registry, RunOptions::default()).run().await?;
//! println!("{}", store.to_json()?);
//! ```

// Re-export core types
pub use oracbench_core::{
    CancellationToken, CategoryDef, CategoryRegistry, FnProbe, Metric, Probe, ProbeContext,
    ProbeError, ProbeFuture, ProbeMetadata, ProbeResult, RESERVED_NAMES, RegisteredCategory,
    RegistryError,
};

// Re-export logic types
pub use oracbench_logic::{
    CategoryScore, Direction, Grade, GradingPolicy, MetricContext, Schedule, SchedulePolicy,
    SchedulingError, ScoreStatus, Selection, ThresholdDef, Wave, build_schedule,
};

// Re-export report types
pub use oracbench_report::{
    CategoryOutcome, ErrorInfo, ErrorKind, ExecutionPolicy, HostInfo, OutcomeStatus,
    OutputFormat, OverlapPolicy, RunCompletion, RunMetadata, SkipReason, Snapshot, Summary,
};

// Re-export the orchestration engine
pub use oracbench_cli::{
    ExecutionConfig, GradingConfig, OracConfig, PersistenceError, ResultStore, RunContext,
    RunOptions, SnapshotWriter, StoreError, finalize,
};

/// Internal re-exports for probe authors
#[doc(hidden)]
pub mod internal {
    pub use tokio;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CancellationToken, CategoryDef, CategoryRegistry, FnProbe, Probe, ProbeContext,
        ProbeError, ProbeFuture, ProbeResult, RunContext, RunOptions,
    };
}

/// Run the OracBench CLI harness.
///
/// Call this from your suite binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     let registry = build_registry()?;
///     oracbench::run(&registry)
/// }
/// ```
pub use oracbench_cli::run;
