//! Category Execution
//!
//! Runs a validated [`Schedule`] wave by wave on the caller's tokio runtime.
//!
//! ## Execution Model
//!
//! - **Concurrent group**: every member is spawned into a `JoinSet`; the
//!   wave's concurrent group is done once every task is terminal. A failing
//!   sibling never cancels the others.
//! - **Serial group**: members run one at a time in declaration order.
//! - **Overlap policy**: decides whether the serial group runs before, after
//!   or alongside the concurrent group.
//!
//! Each probe invocation is spawned as its own task, so a panic surfaces as a
//! `JoinError` at the task boundary and is recorded like any other probe error.
//!
//! ## Data Flow
//!
//! ```text
//!   Schedule (waves)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │    Executor      │  dependency check → running → probe (timeout, cancel)
//! └────────┬─────────┘
//!          │
//!          ▼
//!    SharedStore  (terminal outcome + streaming snapshot)
//! ```

use super::insights::{GradingConfig, finalize};
use super::metadata::build_run_metadata;
use super::store::{ResultStore, SharedStore, SnapshotWriter, Terminal};
use crate::planner::build_plan;
use indicatif::{ProgressBar, ProgressStyle};
use oracbench_core::{CancellationToken, CategoryRegistry, Probe, ProbeContext, ProbeError};
use oracbench_logic::{Schedule, SchedulingError, Wave};
use oracbench_report::{ErrorInfo, ExecutionPolicy, OverlapPolicy, SkipReason};
use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Budget for a single probe when nothing else is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Configuration for category execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Timeout applied to every probe without an override
    pub default_timeout: Duration,
    /// Per-category timeout overrides
    pub timeouts: BTreeMap<String, Duration>,
    /// Ordering of serial and concurrent groups within a wave
    pub overlap: OverlapPolicy,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
    /// Options handed to each category's probe through its context
    pub probe_options: BTreeMap<String, BTreeMap<String, String>>,
}

impl ExecutionConfig {
    /// Timeout for one category
    pub fn timeout_for(&self, category: &str) -> Duration {
        self.timeouts
            .get(category)
            .copied()
            .unwrap_or(self.default_timeout)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            timeouts: BTreeMap::new(),
            overlap: OverlapPolicy::default(),
            show_progress: false,
            probe_options: BTreeMap::new(),
        }
    }
}

/// Everything one invocation needs besides the registry
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// `"all"` or a single category name
    pub mode: String,
    /// Allow concurrent groups
    pub parallel: bool,
    /// Rewrite the snapshot after every outcome
    pub streaming: bool,
    /// Snapshot destination; `None` keeps results in memory only
    pub output: Option<PathBuf>,
    pub execution: ExecutionConfig,
    pub grading: GradingConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: "all".to_string(),
            parallel: false,
            streaming: false,
            output: None,
            execution: ExecutionConfig::default(),
            grading: GradingConfig::default(),
        }
    }
}

/// One orchestration invocation: registry, options and cancellation token
pub struct RunContext<'a> {
    registry: &'a CategoryRegistry,
    options: RunOptions,
    cancel: CancellationToken,
}

impl<'a> RunContext<'a> {
    pub fn new(registry: &'a CategoryRegistry, options: RunOptions) -> Self {
        Self {
            registry,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (e.g. one wired to Ctrl-C)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Plan, execute, grade and persist.
    ///
    /// Scheduling errors are returned before any probe runs. Everything after
    /// that is recorded in the returned store instead of failing the call.
    pub async fn run(self) -> Result<ResultStore, SchedulingError> {
        let options = &self.options;
        let schedule = build_plan(self.registry, &options.mode, options.parallel)?;

        let metadata = build_run_metadata(
            &options.mode,
            ExecutionPolicy {
                parallel: options.parallel,
                streaming: options.streaming,
                overlap: options.execution.overlap,
            },
        );
        let store = ResultStore::new(metadata, schedule.categories());
        let writer = options.output.clone().map(SnapshotWriter::new);
        let shared = SharedStore::new(store, writer, options.streaming);

        tracing::info!(
            "Running {} categories in {} waves (mode: {}, parallel: {})",
            schedule.len(),
            schedule.waves().len(),
            options.mode,
            options.parallel
        );

        let executor = Executor::new(
            self.registry,
            Arc::new(schedule),
            shared.clone(),
            options.execution.clone(),
            self.cancel.clone(),
        );
        executor.execute().await;

        {
            let mut store = shared.lock().await;
            let summary = finalize(&store, &options.grading);
            tracing::info!(
                "Grade {} ({:.1}/100)",
                summary.performance_grade,
                summary.aggregate_score
            );
            if let Err(e) = store.set_summary(summary) {
                tracing::error!("{}", e);
            }
        }

        // Failures are logged and counted by the store
        let _ = shared.write_final().await;

        Ok(shared.to_store().await)
    }
}

/// Executes the waves of a schedule against a shared store
pub struct Executor<'r> {
    registry: &'r CategoryRegistry,
    schedule: Arc<Schedule>,
    store: SharedStore,
    config: ExecutionConfig,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl<'r> Executor<'r> {
    pub fn new(
        registry: &'r CategoryRegistry,
        schedule: Arc<Schedule>,
        store: SharedStore,
        config: ExecutionConfig,
        cancel: CancellationToken,
    ) -> Self {
        let progress = if config.show_progress {
            let pb = ProgressBar::new(schedule.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        Self {
            registry,
            schedule,
            store,
            config,
            cancel,
            progress,
        }
    }

    /// Run every wave in order; stops scheduling new waves once cancelled
    pub async fn execute(&self) {
        for wave in self.schedule.waves() {
            if self.cancel.is_cancelled() {
                break;
            }
            tracing::debug!(
                "Wave {}: serial {:?}, concurrent {:?}",
                wave.index + 1,
                wave.serial_group,
                wave.concurrent_group
            );
            self.run_wave(wave).await;
        }

        if self.cancel.is_cancelled() {
            let skipped = self.store.skip_unsettled(SkipReason::Cancelled).await;
            if !skipped.is_empty() {
                tracing::warn!("Run cancelled; skipped {}", skipped.join(", "));
                self.progress.inc(skipped.len() as u64);
            }
            self.progress.abandon_with_message("Cancelled");
        } else {
            self.progress.finish_with_message("Complete");
        }
    }

    async fn run_wave(&self, wave: &Wave) {
        match self.config.overlap {
            OverlapPolicy::SerialFirst => {
                self.run_serial(&wave.serial_group).await;
                self.run_concurrent(&wave.concurrent_group).await;
            }
            OverlapPolicy::ConcurrentFirst => {
                self.run_concurrent(&wave.concurrent_group).await;
                self.run_serial(&wave.serial_group).await;
            }
            OverlapPolicy::Overlap => {
                tokio::join!(
                    self.run_serial(&wave.serial_group),
                    self.run_concurrent(&wave.concurrent_group)
                );
            }
        }
    }

    async fn run_serial(&self, group: &[String]) {
        for name in group {
            if let Some(task) = self.task(name) {
                task.run().await;
            }
        }
    }

    async fn run_concurrent(&self, group: &[String]) {
        let mut set = JoinSet::new();
        for name in group {
            if let Some(task) = self.task(name) {
                set.spawn(task.run());
            }
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Category task did not finish: {}", e);
            }
        }
    }

    fn task(&self, name: &str) -> Option<CategoryTask> {
        let Some(entry) = self.registry.get(name) else {
            tracing::error!("Scheduled category '{}' is not registered", name);
            return None;
        };
        Some(CategoryTask {
            name: name.to_string(),
            probe: Arc::clone(&entry.probe),
            timeout: self.config.timeout_for(name),
            options: self
                .config
                .probe_options
                .get(name)
                .cloned()
                .unwrap_or_default(),
            schedule: Arc::clone(&self.schedule),
            store: self.store.clone(),
            cancel: self.cancel.clone(),
            progress: self.progress.clone(),
        })
    }
}

/// One category's lifecycle, owned so it can be spawned
struct CategoryTask {
    name: String,
    probe: Arc<dyn Probe>,
    timeout: Duration,
    options: BTreeMap<String, String>,
    schedule: Arc<Schedule>,
    store: SharedStore,
    cancel: CancellationToken,
    progress: ProgressBar,
}

impl CategoryTask {
    async fn run(self) {
        if let Some(dependency) = self
            .store
            .blocking_dependency(&self.schedule, &self.name)
            .await
        {
            tracing::warn!(
                "Skipping '{}': dependency '{}' did not complete",
                self.name,
                dependency
            );
            self.record(Terminal::Skipped(SkipReason::DependencyFailed { dependency }))
                .await;
            return;
        }

        // Left pending; the executor skips it once the wave drains
        if self.cancel.is_cancelled() {
            return;
        }

        if let Err(e) = self.store.mark_running(&self.name).await {
            tracing::error!("{}", e);
            return;
        }
        tracing::info!("Running '{}'", self.name);
        self.progress.set_message(self.name.clone());

        let start = Instant::now();
        let terminal = self.invoke().await;
        let elapsed = start.elapsed();

        match &terminal {
            Terminal::Completed(result) => tracing::info!(
                "'{}' completed in {:.2?}: {} = {}",
                self.name,
                elapsed,
                result.primary.name,
                result.primary.value
            ),
            Terminal::Failed(error) => tracing::warn!(
                "'{}' failed after {:.2?} ({:?}): {}",
                self.name,
                elapsed,
                error.kind,
                error.message
            ),
            Terminal::Skipped(reason) => tracing::warn!("'{}' skipped: {}", self.name, reason),
        }

        self.record(terminal).await;
    }

    /// Run the probe in its own task, bounded by the timeout and the run's
    /// cancellation token. The probe's token fires on either.
    async fn invoke(&self) -> Terminal {
        let token = self.cancel.child_token();
        let ctx = ProbeContext::new(self.name.clone(), token.clone())
            .with_options(self.options.clone());
        let probe = Arc::clone(&self.probe);
        let mut handle = tokio::spawn(async move { probe.run(&ctx).await });

        let joined = tokio::select! {
            _ = self.cancel.cancelled() => None,
            joined = tokio::time::timeout(self.timeout, &mut handle) => Some(joined),
        };

        match joined {
            None => {
                token.cancel();
                handle.abort();
                Terminal::Skipped(SkipReason::Cancelled)
            }
            Some(Err(_elapsed)) => {
                token.cancel();
                handle.abort();
                Terminal::Failed(ErrorInfo::timeout(self.timeout.as_millis()))
            }
            Some(Ok(Ok(Ok(result)))) => Terminal::Completed(result),
            Some(Ok(Ok(Err(ProbeError::Cancelled)))) if self.cancel.is_cancelled() => {
                Terminal::Skipped(SkipReason::Cancelled)
            }
            Some(Ok(Ok(Err(e)))) => Terminal::Failed(ErrorInfo::module(e.to_string())),
            Some(Ok(Err(e))) if e.is_panic() => {
                Terminal::Failed(ErrorInfo::module(panic_message(e.into_panic())))
            }
            Some(Ok(Err(e))) => Terminal::Failed(ErrorInfo::module(e.to_string())),
        }
    }

    async fn record(&self, terminal: Terminal) {
        match self.store.record_outcome(&self.name, terminal).await {
            Ok(_) => self.progress.inc(1),
            Err(e) => tracing::error!("Could not record outcome of '{}': {}", self.name, e),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };
    format!("panicked: {}", message)
}
