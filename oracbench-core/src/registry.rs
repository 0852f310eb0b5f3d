//! Category Registry
//!
//! Holds every known category in declaration order together with the probe
//! that implements it. Declaration order is the tie-break used by the
//! scheduler, so two runs over the same registry execute identically.
//!
//! Prerequisites are not resolved here: a category may name a dependency that
//! is registered later. Resolution and cycle checks happen when a schedule is
//! built.

use crate::{CategoryDef, Probe, RESERVED_NAMES};
use fxhash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while declaring categories
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A category with this name is already registered.
    #[error("Duplicate category: {0}")]
    DuplicateCategory(String),

    /// The name collides with a top-level snapshot field.
    #[error("Reserved category name: {0}")]
    ReservedName(String),

    /// Category names must be non-empty.
    #[error("Category name must not be empty")]
    EmptyName,
}

/// A category declaration paired with its probe
#[derive(Clone)]
pub struct RegisteredCategory {
    /// Static declaration
    pub def: CategoryDef,
    /// Probe invoked when the category runs
    pub probe: Arc<dyn Probe>,
}

impl std::fmt::Debug for RegisteredCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCategory")
            .field("def", &self.def)
            .finish_non_exhaustive()
    }
}

/// Declaration-ordered set of categories
#[derive(Debug, Default, Clone)]
pub struct CategoryRegistry {
    entries: Vec<RegisteredCategory>,
    index: FxHashMap<String, usize>,
}

impl CategoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category with its probe
    pub fn register(
        &mut self,
        def: CategoryDef,
        probe: impl Probe + 'static,
    ) -> Result<&mut Self, RegistryError> {
        self.register_shared(def, Arc::new(probe))
    }

    /// Register a category with an already shared probe
    pub fn register_shared(
        &mut self,
        def: CategoryDef,
        probe: Arc<dyn Probe>,
    ) -> Result<&mut Self, RegistryError> {
        if def.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if RESERVED_NAMES.contains(&def.name.as_str()) {
            return Err(RegistryError::ReservedName(def.name));
        }
        if self.index.contains_key(&def.name) {
            return Err(RegistryError::DuplicateCategory(def.name));
        }

        self.index.insert(def.name.clone(), self.entries.len());
        self.entries.push(RegisteredCategory { def, probe });
        Ok(self)
    }

    /// Look up a category by name
    pub fn get(&self, name: &str) -> Option<&RegisteredCategory> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Declaration index of a category
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Category at a declaration index
    pub fn at(&self, index: usize) -> Option<&RegisteredCategory> {
        self.entries.get(index)
    }

    /// Categories in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredCategory> {
        self.entries.iter()
    }

    /// Category names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.def.name.as_str())
    }

    /// Number of registered categories
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnProbe, ProbeContext, ProbeError, ProbeResult};

    fn noop() -> impl Probe {
        FnProbe::new(|_: ProbeContext| async {
            Ok::<_, ProbeError>(ProbeResult::new("value", 1.0))
        })
    }

    #[test]
    fn test_declaration_order_preserved() {
        let mut registry = CategoryRegistry::new();
        registry
            .register(CategoryDef::new("memory"), noop())
            .unwrap()
            .register(CategoryDef::new("latency"), noop())
            .unwrap()
            .register(CategoryDef::new("security"), noop())
            .unwrap();

        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["memory", "latency", "security"]);
        assert_eq!(registry.position("security"), Some(2));
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut registry = CategoryRegistry::new();
        registry.register(CategoryDef::new("memory"), noop()).unwrap();

        let err = registry
            .register(CategoryDef::new("memory"), noop())
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateCategory("memory".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rejects_reserved_and_empty_names() {
        let mut registry = CategoryRegistry::new();

        assert!(matches!(
            registry.register(CategoryDef::new("summary"), noop()),
            Err(RegistryError::ReservedName(_))
        ));
        assert!(matches!(
            registry.register(CategoryDef::new("  "), noop()),
            Err(RegistryError::EmptyName)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_forward_dependency_allowed() {
        let mut registry = CategoryRegistry::new();
        registry
            .register(CategoryDef::new("energy").depends_on(["memory"]), noop())
            .unwrap();
        registry.register(CategoryDef::new("memory"), noop()).unwrap();

        assert_eq!(registry.get("energy").unwrap().def.depends_on, vec!["memory"]);
    }
}
