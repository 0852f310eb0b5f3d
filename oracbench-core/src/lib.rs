#![warn(missing_docs)]
//! OracBench Core - Probe Contract
//!
//! This crate defines what the orchestrator knows about a benchmark category:
//! - `Probe` trait: the single async `run()` capability every category exposes
//! - `ProbeResult`: primary metric, secondary metrics and run metadata
//! - `CategoryDef`: name, concurrency-safety flag and prerequisites
//! - `CategoryRegistry`: declaration-ordered set of categories with their probes

mod probe;
mod registry;

pub use probe::{
    FnProbe, Metric, Probe, ProbeContext, ProbeError, ProbeFuture, ProbeMetadata, ProbeResult,
};
pub use registry::{CategoryRegistry, RegisteredCategory, RegistryError};

/// Re-exported so probe authors can observe cancellation without a direct dependency.
pub use tokio_util::sync::CancellationToken;

/// Top-level snapshot field names that categories may not use.
pub const RESERVED_NAMES: &[&str] = &["metadata", "summary"];

/// Static declaration of a benchmark category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDef {
    /// Unique category name (e.g. "latency")
    pub name: String,
    /// Whether the category may overlap with other parallel-safe categories
    pub parallel_safe: bool,
    /// Categories that must reach a terminal state before this one starts
    pub depends_on: Vec<String>,
}

impl CategoryDef {
    /// Declare a category that is not parallel-safe and has no prerequisites
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parallel_safe: false,
            depends_on: Vec::new(),
        }
    }

    /// Set the concurrency-safety flag
    pub fn parallel_safe(mut self, safe: bool) -> Self {
        self.parallel_safe = safe;
        self
    }

    /// Add prerequisites. Duplicates are collapsed, first occurrence wins.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if !self.depends_on.contains(&dep) {
                self.depends_on.push(dep);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_dedupes_dependencies() {
        let def = CategoryDef::new("scaling")
            .parallel_safe(false)
            .depends_on(["latency", "memory", "latency"]);

        assert_eq!(def.depends_on, vec!["latency", "memory"]);
        assert!(!def.parallel_safe);
    }
}
