//! Orchestration Engine
//!
//! Executes a wave schedule, records outcomes, and grades the run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Schedule (from planner)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Run waves: serial / concurrent groups, timeouts, cancellation
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │    store    │  Terminal outcomes + atomic streaming snapshots
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  insights   │  Scores, grade, insights (finalize)
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Wave execution and the per-invocation [`RunContext`]
//! - [`store`] - Result store, shared store and snapshot writer
//! - [`insights`] - Grading and insight derivation
//! - [`formatting`] - Human-readable output formatting
//! - [`metadata`] - Host metadata collection

mod execution;
mod formatting;
mod insights;
mod metadata;
mod store;

// Re-export public API
pub use execution::{DEFAULT_TIMEOUT, ExecutionConfig, Executor, RunContext, RunOptions};
pub use formatting::format_human_output;
pub use insights::{GradingConfig, derive_insights, finalize, score_categories};
pub use metadata::{build_run_metadata, collect_host_info};
pub use store::{
    PersistenceError, ResultStore, SharedStore, SnapshotWriter, StoreError, Terminal,
};
