//! Probe Contract
//!
//! A probe is the unit of work behind a category. The orchestrator only ever
//! calls `run()` and inspects the returned `ProbeResult` shape; everything
//! measured inside a probe is opaque to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`Probe::run`]
pub type ProbeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProbeResult, ProbeError>> + Send + 'a>>;

/// Async capability implemented by every benchmark category
pub trait Probe: Send + Sync {
    /// Execute the probe once and produce its measurements.
    fn run<'a>(&'a self, ctx: &'a ProbeContext) -> ProbeFuture<'a>;
}

/// Failure reported by a probe
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The probe could not complete its measurement.
    #[error("{0}")]
    Failed(String),

    /// The probe stopped early because its cancellation token fired.
    #[error("probe stopped after cancellation")]
    Cancelled,

    /// I/O failure while probing the host.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Convenience constructor for `ProbeError::Failed`
    pub fn failed(message: impl Into<String>) -> Self {
        ProbeError::Failed(message.into())
    }
}

/// Per-invocation context handed to a probe
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// Category being executed
    pub category: String,
    /// Fires when the run is cancelled or the category times out
    pub cancel: CancellationToken,
    /// Probe-specific options from the `[probes.<category>]` config table
    pub options: BTreeMap<String, String>,
}

impl ProbeContext {
    /// Create a context with no options
    pub fn new(category: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            category: category.into(),
            cancel,
            options: BTreeMap::new(),
        }
    }

    /// Attach probe-specific options
    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.options = options;
        self
    }

    /// Look up a single option
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Whether the probe has been asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Primary numeric measurement of a probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Metric name (e.g. "p99_latency_ms")
    pub name: String,
    /// Measured value
    pub value: f64,
    /// Unit label, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Execution metadata attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeMetadata {
    /// Wall-clock duration of the measurement in milliseconds
    pub duration_ms: f64,
    /// Iterations performed
    pub iterations: u64,
    /// When the measurement finished
    pub timestamp: DateTime<Utc>,
}

/// Structured result produced by a successful probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Primary metric used for scoring
    pub primary: Metric,
    /// Secondary metrics keyed by name
    #[serde(default)]
    pub secondary: BTreeMap<String, f64>,
    /// Duration, iteration count and timestamp
    pub metadata: ProbeMetadata,
}

impl ProbeResult {
    /// Build a result with just a primary metric
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            primary: Metric {
                name: name.into(),
                value,
                unit: None,
            },
            secondary: BTreeMap::new(),
            metadata: ProbeMetadata {
                duration_ms: 0.0,
                iterations: 1,
                timestamp: Utc::now(),
            },
        }
    }

    /// Set the unit of the primary metric
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.primary.unit = Some(unit.into());
        self
    }

    /// Add a secondary metric
    pub fn with_secondary(mut self, name: impl Into<String>, value: f64) -> Self {
        self.secondary.insert(name.into(), value);
        self
    }

    /// Record duration and iteration count
    pub fn with_timing(mut self, duration_ms: f64, iterations: u64) -> Self {
        self.metadata.duration_ms = duration_ms;
        self.metadata.iterations = iterations;
        self
    }

    /// Every numeric value a threshold expression may reference.
    ///
    /// `primary` always resolves to the primary metric; the primary metric's own
    /// name, each secondary metric and the numeric metadata fields are also bound.
    pub fn metric_bindings(&self) -> Vec<(String, f64)> {
        let mut bindings = Vec::with_capacity(self.secondary.len() + 4);
        bindings.push(("primary".to_string(), self.primary.value));
        if self.primary.name != "primary" {
            bindings.push((self.primary.name.clone(), self.primary.value));
        }
        for (name, value) in &self.secondary {
            bindings.push((name.clone(), *value));
        }
        bindings.push(("duration_ms".to_string(), self.metadata.duration_ms));
        bindings.push(("iterations".to_string(), self.metadata.iterations as f64));
        bindings
    }
}

/// Adapts an async closure into a [`Probe`]
///
/// ```ignore
/// let probe = FnProbe::new(|_ctx| async { Ok(ProbeResult::new("rtt_ms", 4.2)) });
/// ```
pub struct FnProbe<F> {
    f: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeResult, ProbeError>> + Send + 'static,
{
    /// Wrap a closure
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeResult, ProbeError>> + Send + 'static,
{
    fn run<'a>(&'a self, ctx: &'a ProbeContext) -> ProbeFuture<'a> {
        Box::pin((self.f)(ctx.clone()))
    }
}
