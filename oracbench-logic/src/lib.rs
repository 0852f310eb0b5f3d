#![warn(missing_docs)]
//! OracBench Logic - Scheduling and Grading
//!
//! Pure, synchronous building blocks of the orchestrator:
//! - Dependency graph validation (unknown prerequisites, cycles) and wave scheduling
//! - Metric expressions evaluated against probe results
//! - Threshold scoring, penalty policy and letter-grade banding

mod context;
mod grade;
mod graph;
mod schedule;
mod threshold;

pub use context::{ContextError, MetricContext};
pub use grade::Grade;
pub use graph::{DependencyGraph, SchedulingError};
pub use schedule::{Schedule, SchedulePolicy, Selection, Wave, build_schedule};
pub use threshold::{
    CategoryScore, Direction, GradingPolicy, MAX_SCORE, ScoreStatus, ThresholdDef,
    aggregate_score, score_result,
};
