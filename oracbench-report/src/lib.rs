//! OracBench Report - Run Data Model and Snapshot Encoding
//!
//! Holds everything that ends up in the persisted report:
//! - Run metadata and host descriptor
//! - Per-category outcomes with their lifecycle transitions
//! - The graded summary
//! - The JSON snapshot document

mod json;
mod report;

use serde::{Deserialize, Serialize};

pub use json::{Snapshot, generate_json_report};
pub use report::{
    CategoryOutcome, ErrorInfo, ErrorKind, ExecutionPolicy, HostInfo, OutcomeCounts,
    OutcomeStatus, OverlapPolicy, RunCompletion, RunMetadata, SkipReason, Summary,
    TransitionError,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// The final snapshot document on stdout
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Render a millisecond duration with a readable unit
pub fn format_duration(ms: f64) -> String {
    if ms < 1_000.0 {
        format!("{:.2} ms", ms)
    } else if ms < 60_000.0 {
        format!("{:.2} s", ms / 1_000.0)
    } else {
        let total_secs = (ms / 1_000.0).floor() as u64;
        format!("{}m {:02}s", total_secs / 60, total_secs % 60)
    }
}
