//! Output Formatting
//!
//! Human-readable output for a finished run: one line per category in
//! completion order with a status icon, followed by the grade and insights.

use super::store::ResultStore;
use oracbench_report::{OutcomeCounts, OutcomeStatus, format_duration};

/// Format a finished run for terminal display
pub fn format_human_output(store: &ResultStore) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("OracBench Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    let meta = store.metadata();
    output.push_str(&format!(
        "Host: {} ({} CPUs, {:.1} GB)  mode: {}\n",
        meta.system_info.platform, meta.system_info.cpu_count, meta.system_info.memory_gb, meta.mode
    ));
    output.push_str(&"-".repeat(60));
    output.push('\n');

    for outcome in store.outcomes() {
        let status_icon = match outcome.status {
            OutcomeStatus::Completed => "✓",
            OutcomeStatus::Failed => "✗",
            OutcomeStatus::Skipped => "⊘",
            OutcomeStatus::Pending | OutcomeStatus::Running => "…",
        };

        output.push_str(&format!("  {} {}\n", status_icon, outcome.category));

        if let Some(result) = &outcome.result {
            let unit = result.primary.unit.as_deref().unwrap_or("");
            output.push_str(&format!(
                "      {}: {:.2} {}  ({})\n",
                result.primary.name,
                result.primary.value,
                unit,
                format_duration(result.metadata.duration_ms)
            ));
            for (name, value) in &result.secondary {
                output.push_str(&format!("      {}: {:.2}\n", name, value));
            }
        }

        if let Some(error) = &outcome.error {
            output.push_str(&format!("      error: {}\n", error.message));
        }

        if let Some(reason) = &outcome.skip_reason {
            output.push_str(&format!("      skipped: {}\n", reason));
        }
    }

    let counts = OutcomeCounts::tally(store.outcomes());
    output.push('\n');
    output.push_str(&format!(
        "{} completed, {} failed, {} skipped",
        counts.completed, counts.failed, counts.skipped
    ));
    if let Some(completion) = store.completion() {
        output.push_str(&format!(" in {}", completion.total_duration));
    }
    output.push('\n');

    if let Some(summary) = store.summary() {
        output.push_str(&format!(
            "\nGrade: {} ({:.1}/100)\n",
            summary.performance_grade, summary.aggregate_score
        ));
        if !summary.key_insights.is_empty() {
            output.push_str("\nInsights:\n");
            for insight in &summary.key_insights {
                output.push_str(&format!("  - {}\n", insight));
            }
        }
    }

    if store.persistence_failures() > 0 {
        output.push_str(&format!(
            "\nWarning: {} snapshot write(s) failed\n",
            store.persistence_failures()
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::insights::{GradingConfig, finalize};
    use crate::executor::store::Terminal;
    use chrono::Utc;
    use oracbench_core::ProbeResult;
    use oracbench_report::{ErrorInfo, ExecutionPolicy, HostInfo, OverlapPolicy, RunMetadata};

    #[test]
    fn test_human_output() {
        let metadata = RunMetadata {
            start_time: Utc::now(),
            version: "0.1.0".to_string(),
            system_info: HostInfo {
                platform: "linux-x86_64".to_string(),
                cpu_count: 4,
                memory_gb: 8.0,
            },
            mode: "all".to_string(),
            policy: ExecutionPolicy {
                parallel: false,
                streaming: false,
                overlap: OverlapPolicy::SerialFirst,
            },
        };
        let mut store = ResultStore::new(metadata, ["latency", "security"]);
        store.mark_running("latency").unwrap();
        store
            .record_outcome(
                "latency",
                Terminal::Completed(ProbeResult::new("rtt_ms", 4.5).with_unit("ms")),
            )
            .unwrap();
        store.mark_running("security").unwrap();
        store
            .record_outcome("security", Terminal::Failed(ErrorInfo::module("no scanner")))
            .unwrap();
        let summary = finalize(&store, &GradingConfig::default());
        store.set_summary(summary).unwrap();

        let text = format_human_output(&store);

        assert!(text.contains("✓ latency"));
        assert!(text.contains("rtt_ms: 4.50 ms"));
        assert!(text.contains("✗ security"));
        assert!(text.contains("error: no scanner"));
        assert!(text.contains("1 completed, 1 failed, 0 skipped"));
        assert!(text.contains("Grade: F (50.0/100)"));
        assert!(text.contains("- security failed: no scanner"));
    }
}
