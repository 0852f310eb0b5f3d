//! Wave Scheduling
//!
//! Turns a registry and a selection into an ordered list of waves. Every
//! category in a wave has all of its prerequisites in earlier waves. Each wave
//! is split into a concurrent group (parallel-safe categories) and a serial
//! group (everything else), both in declaration order so that measurement
//! order is reproducible across runs.

use crate::graph::{DependencyGraph, SchedulingError};
use fxhash::FxHashMap;
use oracbench_core::CategoryRegistry;

/// Which categories a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every registered category
    All,
    /// One category plus its transitive prerequisites
    Category(String),
}

impl Selection {
    /// Parse a mode string: `"all"` or a category name
    pub fn from_mode(mode: &str) -> Self {
        if mode.eq_ignore_ascii_case("all") {
            Selection::All
        } else {
            Selection::Category(mode.to_string())
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Category(name) => f.write_str(name),
        }
    }
}

/// Knobs that change how waves are split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Allow parallel-safe categories to share a concurrent group
    pub parallel: bool,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// A set of categories whose prerequisites are all in earlier waves
///
/// The concurrent group is only populated when parallel execution is enabled
/// and the wave holds more than one category. A parallel-safe category that is
/// alone in its wave, or any category when parallel is off, is listed in the
/// serial group; `plan` output shows it there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    /// Position of this wave in the schedule
    pub index: usize,
    /// Parallel-safe categories, run as interleaved tasks
    pub concurrent_group: Vec<String>,
    /// Categories that run strictly one at a time (including a lone
    /// parallel-safe category)
    pub serial_group: Vec<String>,
}

impl Wave {
    /// All categories in this wave
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.serial_group
            .iter()
            .chain(&self.concurrent_group)
            .map(String::as_str)
    }

    /// Number of categories in this wave
    pub fn len(&self) -> usize {
        self.concurrent_group.len() + self.serial_group.len()
    }

    /// Whether the wave is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated, ordered execution plan
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    waves: Vec<Wave>,
    dependencies: FxHashMap<String, Vec<String>>,
}

impl Schedule {
    /// Waves in execution order
    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    /// Every scheduled category, wave by wave
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.waves.iter().flat_map(|w| w.categories())
    }

    /// Total number of scheduled categories
    pub fn len(&self) -> usize {
        self.waves.iter().map(Wave::len).sum()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Whether a category is part of this schedule
    pub fn contains(&self, category: &str) -> bool {
        self.dependencies.contains_key(category)
    }

    /// Declared prerequisites of a scheduled category
    pub fn dependencies(&self, category: &str) -> &[String] {
        self.dependencies
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First prerequisite (declaration order) that did not succeed.
    ///
    /// `is_unsuccessful` reports whether a prerequisite ended failed or skipped.
    /// Because skipped categories count as unsuccessful, a failure propagates
    /// transitively through the remaining waves.
    pub fn blocking_dependency<F>(&self, category: &str, is_unsuccessful: F) -> Option<&str>
    where
        F: Fn(&str) -> bool,
    {
        self.dependencies(category)
            .iter()
            .map(String::as_str)
            .find(|dep| is_unsuccessful(dep))
    }
}

/// Build a validated schedule.
///
/// Fails before anything runs if the selection names an unknown category, a
/// prerequisite is not registered, or the selected subgraph contains a cycle.
pub fn build_schedule(
    registry: &CategoryRegistry,
    selection: &Selection,
    policy: SchedulePolicy,
) -> Result<Schedule, SchedulingError> {
    let graph = DependencyGraph::from_registry(registry)?;

    let selected = match selection {
        Selection::All => vec![true; graph.len()],
        Selection::Category(name) => {
            let root = graph
                .index_of(name)
                .ok_or_else(|| SchedulingError::UnknownCategory(name.clone()))?;
            graph.closure(&[root])
        }
    };

    let layers = graph.layers(&selected)?;

    let mut dependencies = FxHashMap::default();
    let mut waves = Vec::with_capacity(layers.len());

    for (index, layer) in layers.into_iter().enumerate() {
        let concurrent_allowed = policy.parallel && layer.len() > 1;
        let mut wave = Wave {
            index,
            concurrent_group: Vec::new(),
            serial_group: Vec::new(),
        };

        for node in layer {
            let name = graph.name(node).to_string();
            let deps = graph
                .dependencies(node)
                .iter()
                .map(|&d| graph.name(d).to_string())
                .collect();
            dependencies.insert(name.clone(), deps);

            let parallel_safe = registry
                .at(node)
                .map(|entry| entry.def.parallel_safe)
                .unwrap_or(false);

            if concurrent_allowed && parallel_safe {
                wave.concurrent_group.push(name);
            } else {
                wave.serial_group.push(name);
            }
        }

        waves.push(wave);
    }

    Ok(Schedule {
        waves,
        dependencies,
    })
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

    fn suite() -> CategoryRegistry {
        registry(vec![
            CategoryDef::new("memory").parallel_safe(true),
            CategoryDef::new("latency").parallel_safe(true),
            CategoryDef::new("security"),
            CategoryDef::new("energy").depends_on(["memory"]),
            CategoryDef::new("scaling").depends_on(["latency", "memory"]),
        ])
    }

    #[test]
    fn test_single_wave_split() {
        let reg = registry(vec![
            CategoryDef::new("latency").parallel_safe(true),
            CategoryDef::new("memory").parallel_safe(true),
            CategoryDef::new("security"),
        ]);

        let schedule = build_schedule(&reg, &Selection::All, SchedulePolicy::default()).unwrap();

        assert_eq!(schedule.waves().len(), 1);
        let wave = &schedule.waves()[0];
        assert_eq!(wave.concurrent_group, vec!["latency", "memory"]);
        assert_eq!(wave.serial_group, vec!["security"]);
    }

    #[test]
    fn test_every_category_after_its_dependencies() {
        let reg = suite();
        let schedule = build_schedule(&reg, &Selection::All, SchedulePolicy::default()).unwrap();

        let wave_of = |name: &str| {
            schedule
                .waves()
                .iter()
                .position(|w| w.categories().any(|c| c == name))
                .unwrap()
        };

        for entry in reg.iter() {
            for dep in &entry.def.depends_on {
                assert!(wave_of(dep) < wave_of(&entry.def.name));
            }
        }
        assert_eq!(schedule.len(), 5);
    }

    #[test]
    fn test_serial_only_when_parallel_disabled() {
        let schedule =
            build_schedule(&suite(), &Selection::All, SchedulePolicy { parallel: false }).unwrap();

        for wave in schedule.waves() {
            assert!(wave.concurrent_group.is_empty());
        }
        assert_eq!(
            schedule.waves()[0].serial_group,
            vec!["memory", "latency", "security"]
        );
    }

    #[test]
    fn test_lone_parallel_safe_category_is_serial() {
        let reg = registry(vec![
            CategoryDef::new("latency").parallel_safe(true),
            CategoryDef::new("scaling")
                .parallel_safe(true)
                .depends_on(["latency"]),
        ]);

        let schedule = build_schedule(&reg, &Selection::All, SchedulePolicy::default()).unwrap();

        for wave in schedule.waves() {
            assert!(wave.concurrent_group.is_empty());
            assert_eq!(wave.serial_group.len(), 1);
        }
    }

    #[test]
    fn test_category_selection_pulls_dependencies() {
        let schedule = build_schedule(
            &suite(),
            &Selection::Category("scaling".to_string()),
            SchedulePolicy::default(),
        )
        .unwrap();

        let names: Vec<_> = schedule.categories().collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"memory"));
        assert!(names.contains(&"latency"));
        assert!(!schedule.contains("security"));
        assert_eq!(schedule.waves()[1].serial_group, vec!["scaling"]);
    }

    #[test]
    fn test_unknown_selection() {
        let err = build_schedule(
            &suite(),
            &Selection::Category("gpu".to_string()),
            SchedulePolicy::default(),
        )
        .unwrap_err();

        assert_eq!(err, SchedulingError::UnknownCategory("gpu".to_string()));
    }

    #[test]
    fn test_blocking_dependency() {
        let schedule = build_schedule(&suite(), &Selection::All, SchedulePolicy::default()).unwrap();

        let blocked = schedule.blocking_dependency("scaling", |dep| dep == "memory");
        assert_eq!(blocked, Some("memory"));
        assert_eq!(schedule.blocking_dependency("security", |_| true), None);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(Selection::from_mode("ALL"), Selection::All);
        assert_eq!(
            Selection::from_mode("latency"),
            Selection::Category("latency".to_string())
        );
    }
}
