//! Result Store and Streaming Writer
//!
//! [`ResultStore`] owns the run's metadata and every category outcome.
//! [`SharedStore`] puts it behind a single `tokio::sync::Mutex`: outcome
//! transitions and streaming snapshot writes happen inside the same critical
//! section, so the file on disk always reflects a prefix of the completion
//! order.
//!
//! [`SnapshotWriter`] stages each document into a temp file next to the
//! destination and renames it into place. A reader sees either the previous
//! document or the new one.

use chrono::Utc;
use fxhash::FxHashMap;
use oracbench_core::ProbeResult;
use oracbench_logic::Schedule;
use oracbench_report::{
    CategoryOutcome, ErrorInfo, OutcomeStatus, RunCompletion, RunMetadata, SkipReason, Snapshot,
    Summary, TransitionError, generate_json_report,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Invariant violations inside the store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Category '{0}' is not part of this run")]
    UnknownCategory(String),

    #[error("Summary has already been written")]
    SummaryAlreadySet,
}

/// Snapshot write failures; logged and counted, never fatal
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to move snapshot into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Snapshot writer task failed: {0}")]
    Join(String),
}

/// Terminal state to record for a category
#[derive(Debug, Clone)]
pub enum Terminal {
    Completed(ProbeResult),
    Failed(ErrorInfo),
    Skipped(SkipReason),
}

/// Metadata plus every outcome of one run
#[derive(Debug, Clone)]
pub struct ResultStore {
    metadata: RunMetadata,
    /// Scheduled categories in schedule order
    scheduled: Vec<String>,
    /// Pending and running outcomes
    slots: FxHashMap<String, CategoryOutcome>,
    /// Terminal outcomes in completion order
    outcomes: Vec<CategoryOutcome>,
    completion: Option<RunCompletion>,
    summary: Option<Summary>,
    persistence_failures: usize,
}

impl ResultStore {
    /// Store with a pending slot for every scheduled category
    pub fn new<'a>(metadata: RunMetadata, categories: impl IntoIterator<Item = &'a str>) -> Self {
        let scheduled: Vec<String> = categories.into_iter().map(str::to_string).collect();
        let slots = scheduled
            .iter()
            .map(|name| (name.clone(), CategoryOutcome::pending(name.clone())))
            .collect();
        Self {
            metadata,
            scheduled,
            slots,
            outcomes: Vec::new(),
            completion: None,
            summary: None,
            persistence_failures: 0,
        }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    /// Scheduled categories in schedule order
    pub fn scheduled(&self) -> &[String] {
        &self.scheduled
    }

    /// Terminal outcomes in completion order
    pub fn outcomes(&self) -> &[CategoryOutcome] {
        &self.outcomes
    }

    /// Current outcome of a category, terminal or not
    pub fn outcome(&self, category: &str) -> Option<&CategoryOutcome> {
        self.slots
            .get(category)
            .or_else(|| self.outcomes.iter().find(|o| o.category == category))
    }

    pub fn status(&self, category: &str) -> Option<OutcomeStatus> {
        self.outcome(category).map(|o| o.status)
    }

    /// Whether the category ended failed or skipped
    pub fn is_unsuccessful(&self, category: &str) -> bool {
        self.status(category)
            .is_some_and(OutcomeStatus::is_unsuccessful)
    }

    /// Whether every scheduled category is terminal
    pub fn is_settled(&self) -> bool {
        self.slots.is_empty()
    }

    /// Categories not yet terminal, in schedule order
    pub fn unsettled(&self) -> Vec<String> {
        self.scheduled
            .iter()
            .filter(|name| self.slots.contains_key(*name))
            .cloned()
            .collect()
    }

    /// pending -> running
    pub fn mark_running(&mut self, category: &str) -> Result<(), StoreError> {
        let Some(slot) = self.slots.get_mut(category) else {
            return Err(self.unknown_or_terminal(category, OutcomeStatus::Running));
        };
        slot.start(Utc::now())?;
        Ok(())
    }

    /// Apply a terminal transition and move the outcome to the completion log
    pub fn record_outcome(
        &mut self,
        category: &str,
        terminal: Terminal,
    ) -> Result<&CategoryOutcome, StoreError> {
        let to = match &terminal {
            Terminal::Completed(_) => OutcomeStatus::Completed,
            Terminal::Failed(_) => OutcomeStatus::Failed,
            Terminal::Skipped(_) => OutcomeStatus::Skipped,
        };
        let Some(slot) = self.slots.get_mut(category) else {
            return Err(self.unknown_or_terminal(category, to));
        };

        let now = Utc::now();
        match terminal {
            Terminal::Completed(result) => slot.complete(result, now)?,
            Terminal::Failed(error) => slot.fail(error, now)?,
            Terminal::Skipped(reason) => slot.skip(reason, now)?,
        }

        let Some(outcome) = self.slots.remove(category) else {
            return Err(StoreError::UnknownCategory(category.to_string()));
        };
        self.outcomes.push(outcome);
        Ok(&self.outcomes[self.outcomes.len() - 1])
    }

    fn unknown_or_terminal(&self, category: &str, to: OutcomeStatus) -> StoreError {
        match self.outcomes.iter().find(|o| o.category == category) {
            Some(done) => StoreError::InvalidTransition(TransitionError {
                category: category.to_string(),
                from: done.status,
                to,
            }),
            None => StoreError::UnknownCategory(category.to_string()),
        }
    }

    /// Record the summary; only the first call succeeds
    pub fn set_summary(&mut self, summary: Summary) -> Result<(), StoreError> {
        if self.summary.is_some() {
            return Err(StoreError::SummaryAlreadySet);
        }
        self.summary = Some(summary);
        Ok(())
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Stamp `end_time` and `total_duration`
    pub fn complete_run(&mut self) {
        if self.completion.is_none() {
            self.completion = Some(RunCompletion::new(self.metadata.start_time, Utc::now()));
        }
    }

    pub fn completion(&self) -> Option<&RunCompletion> {
        self.completion.as_ref()
    }

    pub fn persistence_failures(&self) -> usize {
        self.persistence_failures
    }

    /// Borrowed snapshot view of the current state
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            metadata: &self.metadata,
            completion: self.completion.as_ref(),
            outcomes: &self.outcomes,
            summary: self.summary.as_ref(),
        }
    }

    /// Serialize the current state as the snapshot document
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        generate_json_report(&self.snapshot())
    }
}

/// Atomic snapshot writer
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to a temp file in the destination directory, fsync,
    /// then rename over the destination
    pub fn write_blocking(&self, contents: &str) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(contents.as_bytes())?;
        staged.flush()?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path)?;
        Ok(())
    }

    /// [`write_blocking`](Self::write_blocking) on the blocking pool
    pub async fn write(&self, contents: String) -> Result<(), PersistenceError> {
        let writer = self.clone();
        tokio::task::spawn_blocking(move || writer.write_blocking(&contents))
            .await
            .map_err(|e| PersistenceError::Join(e.to_string()))?
    }
}

/// [`ResultStore`] shared between category tasks
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<ResultStore>>,
    writer: Option<SnapshotWriter>,
    streaming: bool,
}

impl SharedStore {
    /// Wrap a store. With `streaming`, every recorded outcome rewrites the
    /// snapshot through `writer`.
    pub fn new(store: ResultStore, writer: Option<SnapshotWriter>, streaming: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
            writer,
            streaming,
        }
    }

    /// Enter the critical section
    pub async fn lock(&self) -> MutexGuard<'_, ResultStore> {
        self.inner.lock().await
    }

    pub async fn mark_running(&self, category: &str) -> Result<(), StoreError> {
        self.inner.lock().await.mark_running(category)
    }

    /// Record a terminal outcome and, when streaming, persist the snapshot
    /// before releasing the lock
    pub async fn record_outcome(
        &self,
        category: &str,
        terminal: Terminal,
    ) -> Result<OutcomeStatus, StoreError> {
        let mut store = self.inner.lock().await;
        let status = store.record_outcome(category, terminal)?.status;

        if self.streaming {
            if let Some(writer) = &self.writer {
                Self::persist(&mut store, writer).await;
            }
        }
        Ok(status)
    }

    /// First prerequisite of `category` that failed or was skipped
    pub async fn blocking_dependency(&self, schedule: &Schedule, category: &str) -> Option<String> {
        let store = self.inner.lock().await;
        schedule
            .blocking_dependency(category, |dep| store.is_unsuccessful(dep))
            .map(str::to_string)
    }

    /// Skip every category that is not yet terminal
    pub async fn skip_unsettled(&self, reason: SkipReason) -> Vec<String> {
        let mut store = self.inner.lock().await;
        let mut skipped = Vec::new();
        for category in store.unsettled() {
            match store.record_outcome(&category, Terminal::Skipped(reason.clone())) {
                Ok(_) => skipped.push(category),
                Err(e) => tracing::warn!("Could not skip '{}': {}", category, e),
            }
        }
        if self.streaming && !skipped.is_empty() {
            if let Some(writer) = &self.writer {
                Self::persist(&mut store, writer).await;
            }
        }
        skipped
    }

    /// Write the current state regardless of the streaming flag
    pub async fn write_final(&self) -> Result<(), PersistenceError> {
        let mut store = self.inner.lock().await;
        store.complete_run();
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        let document = store.to_json()?;
        let result = writer.write(document).await;
        if let Err(e) = &result {
            store.persistence_failures += 1;
            tracing::warn!("Final snapshot write to {} failed: {}", writer.path().display(), e);
        }
        result
    }

    async fn persist(store: &mut ResultStore, writer: &SnapshotWriter) {
        let result = match store.to_json() {
            Ok(document) => writer.write(document).await,
            Err(e) => Err(PersistenceError::from(e)),
        };
        if let Err(e) = result {
            store.persistence_failures += 1;
            tracing::warn!("Snapshot write to {} failed: {}", writer.path().display(), e);
        }
    }

    /// Clone of the current store contents
    pub async fn to_store(&self) -> ResultStore {
        self.inner.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracbench_logic::Grade;
    use oracbench_report::{ExecutionPolicy, HostInfo, OverlapPolicy};
    use std::collections::BTreeMap;

    fn metadata() -> RunMetadata {
        RunMetadata {
            start_time: Utc::now(),
            version: "0.1.0".to_string(),
            system_info: HostInfo {
                platform: "test".to_string(),
                cpu_count: 1,
                memory_gb: 0.0,
            },
            mode: "all".to_string(),
            policy: ExecutionPolicy {
                parallel: true,
                streaming: true,
                overlap: OverlapPolicy::SerialFirst,
            },
        }
    }

    fn summary() -> Summary {
        Summary {
            performance_grade: Grade::A,
            key_insights: Vec::new(),
            benchmark_count: 1,
            aggregate_score: 95.0,
            category_scores: BTreeMap::new(),
        }
    }

    #[test]
    fn test_completion_order_preserved() {
        let mut store = ResultStore::new(metadata(), ["a", "b", "c"]);
        store.mark_running("b").unwrap();
        store.mark_running("a").unwrap();
        store
            .record_outcome("b", Terminal::Completed(ProbeResult::new("v", 1.0)))
            .unwrap();
        store
            .record_outcome("a", Terminal::Failed(ErrorInfo::module("boom")))
            .unwrap();

        let order: Vec<_> = store.outcomes().iter().map(|o| o.category.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(store.unsettled(), vec!["c".to_string()]);
        assert!(store.is_unsuccessful("a"));
        assert!(!store.is_unsuccessful("b"));
    }

    #[test]
    fn test_rejects_regression_and_unknown() {
        let mut store = ResultStore::new(metadata(), ["a"]);
        store.mark_running("a").unwrap();
        store
            .record_outcome("a", Terminal::Completed(ProbeResult::new("v", 1.0)))
            .unwrap();

        assert!(matches!(
            store.mark_running("a"),
            Err(StoreError::InvalidTransition(_))
        ));
        assert_eq!(
            store.mark_running("zzz"),
            Err(StoreError::UnknownCategory("zzz".to_string()))
        );
        assert_eq!(store.status("a"), Some(OutcomeStatus::Completed));
    }

    #[test]
    fn test_complete_requires_running() {
        let mut store = ResultStore::new(metadata(), ["a"]);
        let err = store
            .record_outcome("a", Terminal::Completed(ProbeResult::new("v", 1.0)))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)));
        assert_eq!(store.status("a"), Some(OutcomeStatus::Pending));
    }

    #[test]
    fn test_summary_written_once() {
        let mut store = ResultStore::new(metadata(), ["a"]);
        store.set_summary(summary()).unwrap();
        assert_eq!(store.set_summary(summary()), Err(StoreError::SummaryAlreadySet));
    }

    #[test]
    fn test_writer_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let writer = SnapshotWriter::new(&path);

        writer.write_blocking("{\"a\": 1}").unwrap();
        writer.write_blocking("{\"a\": 2}").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\"a\": 2}");
        // no stray temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_writer_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("missing").join("report.json"));
        assert!(matches!(
            writer.write_blocking("{}"),
            Err(PersistenceError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_streaming_writes_each_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let store = ResultStore::new(metadata(), ["a", "b"]);
        let shared = SharedStore::new(store, Some(SnapshotWriter::new(&path)), true);

        shared.mark_running("a").await.unwrap();
        shared
            .record_outcome("a", Terminal::Completed(ProbeResult::new("v", 1.0)))
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json["a"]["result"].is_object());
        assert!(json.get("b").is_none());
        assert!(json.get("summary").is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");
        let store = ResultStore::new(metadata(), ["a"]);
        let shared = SharedStore::new(store, Some(SnapshotWriter::new(path)), true);

        shared.mark_running("a").await.unwrap();
        let status = shared
            .record_outcome("a", Terminal::Failed(ErrorInfo::module("boom")))
            .await
            .unwrap();

        assert_eq!(status, OutcomeStatus::Failed);
        assert!(shared.write_final().await.is_err());
        assert_eq!(shared.lock().await.persistence_failures(), 2);
    }

    #[tokio::test]
    async fn test_skip_unsettled_in_schedule_order() {
        let store = ResultStore::new(metadata(), ["a", "b", "c"]);
        let shared = SharedStore::new(store, None, false);
        shared.mark_running("b").await.unwrap();

        let skipped = shared.skip_unsettled(SkipReason::Cancelled).await;

        assert_eq!(skipped, vec!["a", "b", "c"]);
        assert!(shared.lock().await.is_settled());
    }
}
