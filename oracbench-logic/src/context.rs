//! Metric Context
//!
//! Binds a probe result's numeric values to names so threshold expressions
//! such as `p99_ms / primary` can be evaluated.

use evalexpr::{
    ContextWithMutableVariables, EvalexprError, HashMapContext, Value, eval_with_context,
};
use fxhash::FxHashMap;
use oracbench_core::ProbeResult;
use thiserror::Error;

/// Errors from metric evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContextError {
    /// Expression references names that are not bound.
    #[error("Unknown metric(s) {unknown:?}; available: {available:?}")]
    UnknownMetric {
        /// Names that could not be resolved
        unknown: Vec<String>,
        /// Names that are bound, sorted
        available: Vec<String>,
    },

    /// Expression failed to parse or evaluate.
    #[error("Evaluation error: {0}")]
    EvalError(String),

    /// Expression evaluated to NaN or infinity.
    #[error("Expression produced a non-finite value")]
    NonFinite,
}

/// Named numeric values available to threshold expressions
#[derive(Debug, Clone, Default)]
pub struct MetricContext {
    metrics: FxHashMap<String, f64>,
}

impl MetricContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every metric of a probe result
    pub fn from_result(result: &ProbeResult) -> Self {
        let mut ctx = Self::new();
        for (name, value) in result.metric_bindings() {
            ctx.set(name, value);
        }
        ctx
    }

    /// Add a metric value
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.insert(name.into(), value);
    }

    /// Get a metric value
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// Whether a name is bound
    pub fn has(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Evaluate an expression in this context
    pub fn evaluate(&self, expression: &str) -> Result<f64, ContextError> {
        let unknown: Vec<String> = crate::threshold::extract_variables(expression)
            .into_iter()
            .filter(|v| !self.has(v))
            .collect();
        if !unknown.is_empty() {
            let mut available: Vec<String> = self.metric_names().cloned().collect();
            available.sort();
            return Err(ContextError::UnknownMetric { unknown, available });
        }

        let mut ctx = HashMapContext::new();
        for (name, value) in &self.metrics {
            ctx.set_value(name.clone(), Value::Float(*value))
                .map_err(|e: EvalexprError| ContextError::EvalError(e.to_string()))?;
        }

        let result = eval_with_context(expression, &ctx)
            .map_err(|e| ContextError::EvalError(e.to_string()))?;

        let value = match result {
            Value::Float(f) => f,
            Value::Int(i) => i as f64,
            Value::Boolean(b) => f64::from(u8::from(b)),
            other => {
                return Err(ContextError::EvalError(format!(
                    "Expected numeric result, got {:?}",
                    other
                )));
            }
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(ContextError::NonFinite)
        }
    }

    /// List all metric names
    pub fn metric_names(&self) -> impl Iterator<Item = &String> {
        self.metrics.keys()
    }
}
