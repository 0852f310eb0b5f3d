//! JSON Output
//!
//! The persisted document is a single object: `metadata` first, then one key
//! per terminal category in completion order, then `summary` once the run has
//! been finalized.

use crate::report::{
    CategoryOutcome, ErrorInfo, OutcomeStatus, RunCompletion, RunMetadata, Summary,
};
use chrono::{DateTime, Utc};
use oracbench_core::ProbeResult;
use serde::Serialize;
use serde::ser::SerializeMap;

/// Borrowed view of a run, serialized as the snapshot document
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub metadata: &'a RunMetadata,
    /// Present only in the final write
    pub completion: Option<&'a RunCompletion>,
    /// Terminal outcomes in completion order
    pub outcomes: &'a [CategoryOutcome],
    /// Present only in the final write
    pub summary: Option<&'a Summary>,
}

#[derive(Serialize)]
struct MetadataEntry<'a> {
    #[serde(flatten)]
    metadata: &'a RunMetadata,
    #[serde(flatten)]
    completion: Option<&'a RunCompletion>,
}

#[derive(Serialize)]
struct OutcomeEntry<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ProbeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped_at: Option<DateTime<Utc>>,
}

impl<'a> OutcomeEntry<'a> {
    fn from_outcome(outcome: &'a CategoryOutcome) -> Self {
        let mut entry = OutcomeEntry {
            result: None,
            completed_at: None,
            error: None,
            failed_at: None,
            skipped: None,
            skipped_at: None,
        };
        match outcome.status {
            OutcomeStatus::Completed => {
                entry.result = outcome.result.as_ref();
                entry.completed_at = outcome.finished_at;
            }
            OutcomeStatus::Failed => {
                entry.error = outcome.error.as_ref();
                entry.failed_at = outcome.finished_at;
            }
            OutcomeStatus::Skipped => {
                entry.skipped = outcome.skip_reason.as_ref().map(ToString::to_string);
                entry.skipped_at = outcome.finished_at;
            }
            OutcomeStatus::Pending | OutcomeStatus::Running => {}
        }
        entry
    }
}

impl Serialize for Snapshot<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let terminal: Vec<&CategoryOutcome> = self
            .outcomes
            .iter()
            .filter(|o| o.status.is_terminal())
            .collect();

        let len = 1 + terminal.len() + usize::from(self.summary.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(
            "metadata",
            &MetadataEntry {
                metadata: self.metadata,
                completion: self.completion,
            },
        )?;
        for outcome in terminal {
            map.serialize_entry(&outcome.category, &OutcomeEntry::from_outcome(outcome))?;
        }
        if let Some(summary) = self.summary {
            map.serialize_entry("summary", summary)?;
        }
        map.end()
    }
}

/// Generate the prettified snapshot document.
pub fn generate_json_report(snapshot: &Snapshot<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ExecutionPolicy, HostInfo, OverlapPolicy, SkipReason};
    use oracbench_logic::Grade;
    use std::collections::BTreeMap;

    fn metadata() -> RunMetadata {
        RunMetadata {
            start_time: Utc::now(),
            version: "0.1.0".to_string(),
            system_info: HostInfo {
                platform: "linux".to_string(),
                cpu_count: 8,
                memory_gb: 16.0,
            },
            mode: "all".to_string(),
            policy: ExecutionPolicy {
                parallel: true,
                streaming: true,
                overlap: OverlapPolicy::SerialFirst,
            },
        }
    }

    fn outcomes() -> Vec<CategoryOutcome> {
        let now = Utc::now();

        let mut latency = CategoryOutcome::pending("latency");
        latency.start(now).unwrap();
        latency
            .complete(ProbeResult::new("rtt_ms", 12.5), now)
            .unwrap();

        let mut security = CategoryOutcome::pending("security");
        security.start(now).unwrap();
        security
            .fail(ErrorInfo::module("scanner crashed"), now)
            .unwrap();

        let mut energy = CategoryOutcome::pending("energy");
        energy
            .skip(
                SkipReason::DependencyFailed {
                    dependency: "memory".to_string(),
                },
                now,
            )
            .unwrap();

        let mut scaling = CategoryOutcome::pending("scaling");
        scaling.start(now).unwrap();

        vec![latency, security, energy, scaling]
    }

    #[test]
    fn test_streaming_snapshot_layout() {
        let meta = metadata();
        let outcomes = outcomes();
        let snapshot = Snapshot {
            metadata: &meta,
            completion: None,
            outcomes: &outcomes,
            summary: None,
        };

        let json: serde_json::Value =
            serde_json::from_str(&generate_json_report(&snapshot).unwrap()).unwrap();

        assert_eq!(json["metadata"]["mode"], "all");
        assert_eq!(json["metadata"]["overlap"], "serial-first");
        assert!(json["metadata"].get("end_time").is_none());
        assert_eq!(json["latency"]["result"]["primary"]["value"], 12.5);
        assert!(json["latency"]["completed_at"].is_string());
        assert_eq!(json["security"]["error"]["kind"], "module_error");
        assert!(json["security"]["failed_at"].is_string());
        assert!(
            json["energy"]["skipped"]
                .as_str()
                .unwrap()
                .contains("memory")
        );
        // running categories are not persisted
        assert!(json.get("scaling").is_none());
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn test_final_snapshot_has_summary() {
        let meta = metadata();
        let completion = RunCompletion::new(meta.start_time, meta.start_time);
        let summary = Summary {
            performance_grade: Grade::B,
            key_insights: vec!["security failed: scanner crashed".to_string()],
            benchmark_count: 3,
            aggregate_score: 84.0,
            category_scores: BTreeMap::new(),
        };
        let snapshot = Snapshot {
            metadata: &meta,
            completion: Some(&completion),
            outcomes: &[],
            summary: Some(&summary),
        };

        let json: serde_json::Value = serde_json::to_value(snapshot).unwrap();

        assert!(json["metadata"]["end_time"].is_string());
        assert_eq!(json["metadata"]["total_duration"], "0.00 ms");
        assert_eq!(json["summary"]["performance_grade"], "B");
        assert_eq!(json["summary"]["benchmark_count"], 3);
    }

    #[test]
    fn test_key_order() {
        let meta = metadata();
        let outcomes = outcomes();
        let summary = Summary {
            performance_grade: Grade::F,
            key_insights: Vec::new(),
            benchmark_count: 3,
            aggregate_score: 33.0,
            category_scores: BTreeMap::new(),
        };
        let snapshot = Snapshot {
            metadata: &meta,
            completion: None,
            outcomes: &outcomes,
            summary: Some(&summary),
        };

        let text = generate_json_report(&snapshot).unwrap();
        let positions: Vec<usize> = ["\"metadata\"", "\"latency\"", "\"security\"", "\"energy\"", "\"summary\""]
            .iter()
            .map(|key| text.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
