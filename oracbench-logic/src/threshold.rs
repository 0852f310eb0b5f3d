//! Threshold Scoring
//!
//! Scores a completed category on a 0-100 scale by comparing one metric
//! expression against a target. Thresholds come from configuration; a
//! category without one earns full marks for completing.
//!
//! Failed and skipped categories are never excluded from grading: they carry
//! a fixed penalty score from [`GradingPolicy`] so that coverage always
//! affects the grade.

use crate::MetricContext;
use oracbench_core::ProbeResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Maximum score a category can earn
pub const MAX_SCORE: f64 = 100.0;

/// Which side of the target is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Smaller values are better (latency, memory)
    #[default]
    Lower,
    /// Larger values are better (throughput)
    Higher,
}

/// Target for a single category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDef {
    /// Metric expression, e.g. `"primary"` or `"p99_ms / p50_ms"`
    #[serde(default = "default_metric")]
    pub metric: String,
    /// Target value
    pub target: f64,
    /// Whether lower or higher values are better
    #[serde(default)]
    pub direction: Direction,
    /// Relative weight in the aggregate score
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_metric() -> String {
    "primary".to_string()
}
fn default_weight() -> f64 {
    1.0
}

impl ThresholdDef {
    /// Threshold on the primary metric with unit weight
    pub fn new(target: f64, direction: Direction) -> Self {
        Self {
            metric: default_metric(),
            target,
            direction,
            weight: default_weight(),
        }
    }
}

/// Penalty scores for categories that produced no result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradingPolicy {
    /// Score assigned to a failed category
    #[serde(default)]
    pub failed_score: f64,
    /// Score assigned to a skipped category
    #[serde(default)]
    pub skipped_score: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            failed_score: 0.0,
            skipped_score: 0.0,
        }
    }
}

/// How a category's score was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreStatus {
    /// No threshold configured; full marks for completing
    Unscored,
    /// Threshold met
    Met {
        /// Evaluated metric
        value: f64,
        /// Configured target
        target: f64,
    },
    /// Threshold missed
    Below {
        /// Evaluated metric
        value: f64,
        /// Configured target
        target: f64,
    },
    /// Metric expression could not be evaluated
    Error {
        /// Evaluation error
        message: String,
    },
    /// Category failed; penalty applied
    Failed,
    /// Category skipped; penalty applied
    Skipped,
}

/// Score of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Category name
    pub category: String,
    /// Score in `[0, MAX_SCORE]`
    pub score: f64,
    /// Weight in the aggregate
    pub weight: f64,
    /// How the score was derived
    pub status: ScoreStatus,
}

impl CategoryScore {
    /// Penalty score for a failed category
    pub fn failed(category: impl Into<String>, policy: &GradingPolicy, weight: f64) -> Self {
        Self {
            category: category.into(),
            score: policy.failed_score.clamp(0.0, MAX_SCORE),
            weight,
            status: ScoreStatus::Failed,
        }
    }

    /// Penalty score for a skipped category
    pub fn skipped(category: impl Into<String>, policy: &GradingPolicy, weight: f64) -> Self {
        Self {
            category: category.into(),
            score: policy.skipped_score.clamp(0.0, MAX_SCORE),
            weight,
            status: ScoreStatus::Skipped,
        }
    }

    /// Whether the category counts as degraded for insights
    pub fn is_degraded(&self) -> bool {
        !matches!(self.status, ScoreStatus::Unscored | ScoreStatus::Met { .. })
    }
}

/// Score a completed category's result against its threshold.
pub fn score_result(
    category: &str,
    result: &ProbeResult,
    threshold: Option<&ThresholdDef>,
) -> CategoryScore {
    let Some(threshold) = threshold else {
        return CategoryScore {
            category: category.to_string(),
            score: MAX_SCORE,
            weight: default_weight(),
            status: ScoreStatus::Unscored,
        };
    };

    let weight = threshold.weight.max(0.0);
    let ctx = MetricContext::from_result(result);

    let value = match ctx.evaluate(&threshold.metric) {
        Ok(v) => v,
        Err(e) => {
            return CategoryScore {
                category: category.to_string(),
                score: 0.0,
                weight,
                status: ScoreStatus::Error {
                    message: e.to_string(),
                },
            };
        }
    };

    let target = threshold.target;
    let met = match threshold.direction {
        Direction::Lower => value <= target,
        Direction::Higher => value >= target,
    };

    if met {
        return CategoryScore {
            category: category.to_string(),
            score: MAX_SCORE,
            weight,
            status: ScoreStatus::Met { value, target },
        };
    }

    // Proportional credit for a miss: how close the value came to the target.
    let ratio = match threshold.direction {
        Direction::Lower if value > 0.0 && target > 0.0 => target / value,
        Direction::Higher if target > 0.0 => value / target,
        _ => 0.0,
    };

    CategoryScore {
        category: category.to_string(),
        score: (ratio * MAX_SCORE).clamp(0.0, MAX_SCORE),
        weight,
        status: ScoreStatus::Below { value, target },
    }
}

/// Weighted mean of category scores; 0 when nothing carries weight.
pub fn aggregate_score(scores: &[CategoryScore]) -> f64 {
    let total_weight: f64 = scores.iter().map(|s| s.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = scores.iter().map(|s| s.score * s.weight).sum();
    (weighted / total_weight).clamp(0.0, MAX_SCORE)
}

/// Extract variable names from an evalexpr expression
pub(crate) fn extract_variables(expression: &str) -> Vec<String> {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = IDENT_RE.get_or_init(|| {
        Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\b").expect("identifier regex is valid")
    });

    let mut seen = Vec::new();
    for cap in re.captures_iter(expression) {
        let name = cap[1].to_string();
        if !is_builtin(&name) && !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "min" | "max" | "abs" | "floor" | "ceil" | "round" | "sqrt" | "if" | "true" | "false"
    ) || name.starts_with("math")
}
