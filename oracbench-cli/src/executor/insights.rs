//! Insight and Grading
//!
//! Reduces a settled [`ResultStore`] into a [`Summary`]. Every scheduled
//! category is scored: completed ones against their configured threshold,
//! failed and skipped ones with the configured penalty. The weighted aggregate
//! is banded into a letter grade.
//!
//! Insights are emitted in fixed groups (failures, threshold misses, skips,
//! cross-category observations), each sorted by category name, so the same
//! store always yields the same summary.

use super::store::ResultStore;
use oracbench_logic::{
    CategoryScore, Grade, GradingPolicy, ScoreStatus, ThresholdDef, aggregate_score, score_result,
};
use oracbench_report::{CategoryOutcome, ErrorKind, OutcomeStatus, Summary};
use std::collections::BTreeMap;

/// Thresholds and penalties used to grade a run
#[derive(Debug, Clone, Default)]
pub struct GradingConfig {
    pub policy: GradingPolicy,
    pub thresholds: BTreeMap<String, ThresholdDef>,
}

impl GradingConfig {
    fn weight(&self, category: &str) -> f64 {
        self.thresholds
            .get(category)
            .map(|t| t.weight.max(0.0))
            .unwrap_or(1.0)
    }
}

/// Derive the summary of a settled store
pub fn finalize(store: &ResultStore, grading: &GradingConfig) -> Summary {
    let scores = score_categories(store, grading);
    let aggregate = aggregate_score(&scores);
    let key_insights = derive_insights(store, &scores);

    Summary {
        performance_grade: Grade::from_score(aggregate),
        key_insights,
        benchmark_count: store.scheduled().len(),
        aggregate_score: aggregate,
        category_scores: scores
            .iter()
            .map(|s| (s.category.clone(), s.score))
            .collect(),
    }
}

/// One score per scheduled category, sorted by name
pub fn score_categories(store: &ResultStore, grading: &GradingConfig) -> Vec<CategoryScore> {
    let mut names: Vec<&str> = store.scheduled().iter().map(String::as_str).collect();
    names.sort_unstable();

    names
        .into_iter()
        .map(|name| {
            let weight = grading.weight(name);
            match store.outcome(name) {
                Some(CategoryOutcome {
                    status: OutcomeStatus::Completed,
                    result: Some(result),
                    ..
                }) => score_result(name, result, grading.thresholds.get(name)),
                Some(CategoryOutcome {
                    status: OutcomeStatus::Failed,
                    ..
                }) => CategoryScore::failed(name, &grading.policy, weight),
                // Anything that never produced a result is penalized as skipped
                _ => CategoryScore::skipped(name, &grading.policy, weight),
            }
        })
        .collect()
}

/// Ordered, human-readable observations about a run
pub fn derive_insights(store: &ResultStore, scores: &[CategoryScore]) -> Vec<String> {
    let mut insights = Vec::new();

    // Failures
    for score in scores.iter().filter(|s| s.status == ScoreStatus::Failed) {
        let Some(error) = store
            .outcome(&score.category)
            .and_then(|o| o.error.as_ref())
        else {
            insights.push(format!("{} failed", score.category));
            continue;
        };
        match error.kind {
            ErrorKind::Timeout => {
                insights.push(format!("{} timed out: {}", score.category, error.message))
            }
            ErrorKind::ModuleError => {
                insights.push(format!("{} failed: {}", score.category, error.message))
            }
        }
    }

    // Threshold misses and unscorable results
    for score in scores {
        match &score.status {
            ScoreStatus::Below { value, target } => insights.push(format!(
                "{} below threshold: {:.2} against target {:.2} (score {:.0}/100)",
                score.category, value, target, score.score
            )),
            ScoreStatus::Error { message } => insights.push(format!(
                "{} could not be scored: {}",
                score.category, message
            )),
            _ => {}
        }
    }

    // Skips
    for score in scores.iter().filter(|s| s.status == ScoreStatus::Skipped) {
        match store
            .outcome(&score.category)
            .and_then(|o| o.skip_reason.as_ref())
        {
            Some(reason) => insights.push(format!("{} skipped: {}", score.category, reason)),
            None => insights.push(format!("{} did not run", score.category)),
        }
    }

    // Cross-category observations
    let degraded: Vec<&str> = scores
        .iter()
        .filter(|s| s.is_degraded())
        .map(|s| s.category.as_str())
        .collect();

    match degraded.as_slice() {
        [] if !scores.is_empty() => {
            if scores
                .iter()
                .any(|s| matches!(s.status, ScoreStatus::Met { .. }))
            {
                insights.push(format!("All {} categories met their thresholds", scores.len()));
            } else {
                insights.push(format!(
                    "All {} categories completed without errors",
                    scores.len()
                ));
            }
        }
        [first, second] => insights.push(format!(
            "{} and {} both degraded: possible resource contention",
            first, second
        )),
        [init @ .., last] if init.len() >= 2 => insights.push(format!(
            "{} and {} all degraded: possible resource contention",
            init.join(", "),
            last
        )),
        _ => {}
    }

    let completed = |name: &str| store.status(name) == Some(OutcomeStatus::Completed);
    if completed("latency") && completed("scaling") {
        insights.push(
            "Cross-benchmark analysis reveals performance correlation patterns".to_string(),
        );
    }
    if completed("energy") {
        insights.push(
            "Energy efficiency metrics captured for sustainability assessment".to_string(),
        );
    }

    insights
}
