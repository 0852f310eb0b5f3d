//! Dependency Graph
//!
//! Arena-indexed view of the category registry: node `i` is the category at
//! declaration index `i`, and each node stores the indices of its
//! prerequisites. Working with indices instead of names keeps cycle detection
//! and layering allocation-light and makes declaration order the natural
//! tie-break.

use fxhash::FxHashMap;
use oracbench_core::CategoryRegistry;
use thiserror::Error;

/// Errors raised while validating or ordering the dependency graph.
///
/// All of these are configuration defects detected before any probe runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchedulingError {
    /// A cycle was detected among the requested categories.
    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// Categories on the cycle, first element repeated at the end
        cycle: Vec<String>,
    },

    /// A category names a prerequisite that is not registered.
    #[error("Unknown dependency: '{category}' depends on unregistered '{dependency}'")]
    UnknownDependency {
        /// Declaring category
        category: String,
        /// Missing prerequisite
        dependency: String,
    },

    /// The requested category is not registered.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Directed graph of categories and their prerequisites
#[derive(Debug, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
    /// Node -> prerequisite nodes, in declaration order of the prerequisite list
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph from a registry, resolving every prerequisite name.
    pub fn from_registry(registry: &CategoryRegistry) -> Result<Self, SchedulingError> {
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        let index: FxHashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        let mut edges = Vec::with_capacity(names.len());
        for entry in registry.iter() {
            let mut deps = Vec::with_capacity(entry.def.depends_on.len());
            for dep in &entry.def.depends_on {
                let Some(&dep_idx) = index.get(dep) else {
                    return Err(SchedulingError::UnknownDependency {
                        category: entry.def.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                deps.push(dep_idx);
            }
            edges.push(deps);
        }

        Ok(Self {
            names,
            index,
            edges,
        })
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Arena index of a category
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Category name at an arena index
    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    /// Prerequisites of a node
    pub fn dependencies(&self, idx: usize) -> &[usize] {
        &self.edges[idx]
    }

    /// Mark `roots` and everything they transitively depend on.
    pub fn closure(&self, roots: &[usize]) -> Vec<bool> {
        let mut selected = vec![false; self.len()];
        let mut stack: Vec<usize> = roots.to_vec();

        while let Some(node) = stack.pop() {
            if selected[node] {
                continue;
            }
            selected[node] = true;
            stack.extend(self.edges[node].iter().copied().filter(|&d| !selected[d]));
        }

        selected
    }

    /// Find a cycle among the selected nodes using three-colour DFS.
    ///
    /// Returns the cycle as a path of names with the first node repeated at the end.
    pub fn find_cycle(&self, selected: &[bool]) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut path = Vec::new();

        for node in 0..self.len() {
            if selected[node] && marks[node] == Mark::Unvisited {
                if let Some(cycle) = self.visit(node, selected, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn visit(
        &self,
        node: usize,
        selected: &[bool],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        marks[node] = Mark::InProgress;
        path.push(node);

        for &dep in &self.edges[node] {
            if !selected[dep] {
                continue;
            }
            match marks[dep] {
                Mark::InProgress => {
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|&n| self.names[n].clone()).collect();
                    cycle.push(self.names[dep].clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = self.visit(dep, selected, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        None
    }

    /// Partition the selected nodes into dependency layers (Kahn's algorithm).
    ///
    /// Layer `n` holds every node whose prerequisites all sit in layers `< n`.
    /// Nodes within a layer are in ascending arena (declaration) order.
    pub fn layers(&self, selected: &[bool]) -> Result<Vec<Vec<usize>>, SchedulingError> {
        if let Some(cycle) = self.find_cycle(selected) {
            return Err(SchedulingError::CyclicDependency { cycle });
        }

        let mut remaining: Vec<usize> = vec![0; self.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.len()];
        for node in (0..self.len()).filter(|&n| selected[n]) {
            for &dep in &self.edges[node] {
                remaining[node] += 1;
                dependents[dep].push(node);
            }
        }

        let mut current: Vec<usize> = (0..self.len())
            .filter(|&n| selected[n] && remaining[n] == 0)
            .collect();
        let mut layers = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for &node in &current {
                for &dependent in &dependents[node] {
                    remaining[dependent] -= 1;
                    if remaining[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_unstable();
            layers.push(std::mem::replace(&mut current, next));
        }

        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracbench_core::{CategoryDef, FnProbe, ProbeContext, ProbeError, ProbeResult};

    fn registry(defs: Vec<CategoryDef>) -> CategoryRegistry {
        let mut registry = CategoryRegistry::new();
        for def in defs {
            registry
                .register(
                    def,
                    FnProbe::new(|_: ProbeContext| async {
                        Ok::<_, ProbeError>(ProbeResult::new("value", 1.0))
                    }),
                )
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_layers_respect_dependencies() {
        let reg = registry(vec![
            CategoryDef::new("scaling").depends_on(["latency", "memory"]),
            CategoryDef::new("memory"),
            CategoryDef::new("latency"),
            CategoryDef::new("energy").depends_on(["memory"]),
        ]);
        let graph = DependencyGraph::from_registry(&reg).unwrap();
        let all = vec![true; graph.len()];

        let layers = graph.layers(&all).unwrap();
        let named: Vec<Vec<&str>> = layers
            .iter()
            .map(|l| l.iter().map(|&i| graph.name(i)).collect())
            .collect();

        assert_eq!(named, vec![vec!["memory", "latency"], vec!["scaling", "energy"]]);
    }

    #[test]
    fn test_cycle_detection() {
        let reg = registry(vec![
            CategoryDef::new("a").depends_on(["b"]),
            CategoryDef::new("b").depends_on(["c"]),
            CategoryDef::new("c").depends_on(["a"]),
        ]);
        let graph = DependencyGraph::from_registry(&reg).unwrap();
        let all = vec![true; graph.len()];

        let result = graph.layers(&all);
        match result {
            Err(SchedulingError::CyclicDependency { cycle }) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_outside_selection_ignored() {
        let reg = registry(vec![
            CategoryDef::new("a").depends_on(["b"]),
            CategoryDef::new("b").depends_on(["a"]),
            CategoryDef::new("memory"),
        ]);
        let graph = DependencyGraph::from_registry(&reg).unwrap();
        let selected = graph.closure(&[graph.index_of("memory").unwrap()]);

        assert_eq!(graph.layers(&selected).unwrap(), vec![vec![2]]);
    }

    #[test]
    fn test_unknown_dependency() {
        let reg = registry(vec![CategoryDef::new("energy").depends_on(["power"])]);

        let err = DependencyGraph::from_registry(&reg).unwrap_err();
        assert_eq!(
            err,
            SchedulingError::UnknownDependency {
                category: "energy".to_string(),
                dependency: "power".to_string(),
            }
        );
    }

    #[test]
    fn test_closure_is_transitive() {
        let reg = registry(vec![
            CategoryDef::new("memory"),
            CategoryDef::new("latency"),
            CategoryDef::new("energy").depends_on(["memory"]),
            CategoryDef::new("report").depends_on(["energy"]),
        ]);
        let graph = DependencyGraph::from_registry(&reg).unwrap();

        let selected = graph.closure(&[graph.index_of("report").unwrap()]);
        assert_eq!(selected, vec![true, false, true, true]);
    }
}
