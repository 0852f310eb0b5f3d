//! Report Data Structures

use chrono::{DateTime, Utc};
use oracbench_core::ProbeResult;
use oracbench_logic::Grade;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Host descriptor captured once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    pub platform: String,
    pub cpu_count: u32,
    pub memory_gb: f64,
}

/// Whether serial categories may overlap the concurrent group of their wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Serial group finishes before the concurrent group starts
    #[default]
    SerialFirst,
    /// Concurrent group finishes before the serial group starts
    ConcurrentFirst,
    /// Serial chain runs alongside the concurrent group
    Overlap,
}

impl std::str::FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "serial-first" | "isolated" => Ok(OverlapPolicy::SerialFirst),
            "concurrent-first" => Ok(OverlapPolicy::ConcurrentFirst),
            "overlap" => Ok(OverlapPolicy::Overlap),
            other => Err(format!("Unknown overlap policy: {}", other)),
        }
    }
}

/// Execution policy flags recorded with the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    pub parallel: bool,
    pub streaming: bool,
    pub overlap: OverlapPolicy,
}

/// Metadata created once per orchestration invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub start_time: DateTime<Utc>,
    pub version: String,
    pub system_info: HostInfo,
    /// `"all"` or the requested category name
    pub mode: String,
    #[serde(flatten)]
    pub policy: ExecutionPolicy,
}

/// Fields added to the metadata by the final write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCompletion {
    pub end_time: DateTime<Utc>,
    pub total_duration: String,
    pub total_duration_ms: f64,
}

impl RunCompletion {
    /// Completion record for a run that started at `start`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let total_duration_ms = (end - start).num_microseconds().unwrap_or(0) as f64 / 1000.0;
        Self {
            end_time: end,
            total_duration: crate::format_duration(total_duration_ms),
            total_duration_ms,
        }
    }
}

/// Lifecycle state of one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl OutcomeStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OutcomeStatus::Completed | OutcomeStatus::Failed | OutcomeStatus::Skipped
        )
    }

    /// Failed or skipped: dependents of this category must not run
    pub fn is_unsuccessful(self) -> bool {
        matches!(self, OutcomeStatus::Failed | OutcomeStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Pending => "pending",
            OutcomeStatus::Running => "running",
            OutcomeStatus::Completed => "completed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a category failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Exceeded its execution budget
    Timeout,
    /// The probe returned an error or panicked
    ModuleError,
}

/// Failure information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn timeout(limit_ms: u128) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: format!("exceeded time budget of {} ms", limit_ms),
        }
    }

    pub fn module(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ModuleError,
            message: message.into(),
        }
    }
}

/// Why a category was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A prerequisite failed or was itself skipped
    DependencyFailed { dependency: String },
    /// The run was cancelled before the category finished
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DependencyFailed { dependency } => {
                write!(f, "dependency '{}' did not complete", dependency)
            }
            SkipReason::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// Rejected status change
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid transition for '{category}': {from} -> {to}")]
pub struct TransitionError {
    pub category: String,
    pub from: OutcomeStatus,
    pub to: OutcomeStatus,
}

/// State of one category within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub category: String,
    pub status: OutcomeStatus,
    pub result: Option<ProbeResult>,
    pub error: Option<ErrorInfo>,
    pub skip_reason: Option<SkipReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CategoryOutcome {
    /// Fresh outcome in the `pending` state
    pub fn pending(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            status: OutcomeStatus::Pending,
            result: None,
            error: None,
            skip_reason: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn check(&self, allowed_from: &[OutcomeStatus], to: OutcomeStatus) -> Result<(), TransitionError> {
        if allowed_from.contains(&self.status) {
            Ok(())
        } else {
            Err(TransitionError {
                category: self.category.clone(),
                from: self.status,
                to,
            })
        }
    }

    /// pending -> running
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.check(&[OutcomeStatus::Pending], OutcomeStatus::Running)?;
        self.status = OutcomeStatus::Running;
        self.started_at = Some(at);
        Ok(())
    }

    /// running -> completed
    pub fn complete(&mut self, result: ProbeResult, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.check(&[OutcomeStatus::Running], OutcomeStatus::Completed)?;
        self.status = OutcomeStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(at);
        Ok(())
    }

    /// running -> failed
    pub fn fail(&mut self, error: ErrorInfo, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.check(&[OutcomeStatus::Running], OutcomeStatus::Failed)?;
        self.status = OutcomeStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(at);
        Ok(())
    }

    /// pending -> skipped, or running -> skipped on cancellation
    pub fn skip(&mut self, reason: SkipReason, at: DateTime<Utc>) -> Result<(), TransitionError> {
        match reason {
            SkipReason::Cancelled => self.check(
                &[OutcomeStatus::Pending, OutcomeStatus::Running],
                OutcomeStatus::Skipped,
            )?,
            SkipReason::DependencyFailed { .. } => {
                self.check(&[OutcomeStatus::Pending], OutcomeStatus::Skipped)?
            }
        }
        self.status = OutcomeStatus::Skipped;
        self.skip_reason = Some(reason);
        self.finished_at = Some(at);
        Ok(())
    }
}

/// Derived once after every scheduled category is terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub performance_grade: Grade,
    pub key_insights: Vec<String>,
    pub benchmark_count: usize,
    pub aggregate_score: f64,
    pub category_scores: BTreeMap<String, f64>,
}

/// Outcome counts for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
}

impl OutcomeCounts {
    pub fn tally<'a>(outcomes: impl IntoIterator<Item = &'a CategoryOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Completed => counts.completed += 1,
                OutcomeStatus::Failed => counts.failed += 1,
                OutcomeStatus::Skipped => counts.skipped += 1,
                OutcomeStatus::Pending | OutcomeStatus::Running => counts.pending += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let now = Utc::now();
        let mut outcome = CategoryOutcome::pending("latency");

        outcome.start(now).unwrap();
        outcome
            .complete(ProbeResult::new("rtt_ms", 3.0), now)
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert!(outcome.result.is_some());
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_no_regression_from_terminal() {
        let now = Utc::now();
        let mut outcome = CategoryOutcome::pending("security");
        outcome.start(now).unwrap();
        outcome.fail(ErrorInfo::module("boom"), now).unwrap();

        let err = outcome.start(now).unwrap_err();
        assert_eq!(err.from, OutcomeStatus::Failed);
        assert!(outcome.skip(SkipReason::Cancelled, now).is_err());
        assert_eq!(outcome.status, OutcomeStatus::Failed);
    }

    #[test]
    fn test_dependency_skip_requires_pending() {
        let now = Utc::now();
        let mut outcome = CategoryOutcome::pending("energy");
        outcome.start(now).unwrap();

        let reason = SkipReason::DependencyFailed {
            dependency: "memory".to_string(),
        };
        assert!(outcome.skip(reason, now).is_err());
        assert!(outcome.skip(SkipReason::Cancelled, now).is_ok());
    }

    #[test]
    fn test_overlap_policy_parse() {
        assert_eq!("serial-first".parse::<OverlapPolicy>(), Ok(OverlapPolicy::SerialFirst));
        assert_eq!("Overlap".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Overlap));
        assert!("sideways".parse::<OverlapPolicy>().is_err());
    }
}
