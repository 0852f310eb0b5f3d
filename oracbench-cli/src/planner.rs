//! Run Planner
//!
//! Resolves a `--mode` value into a validated wave schedule and renders it for
//! the `plan` subcommand.
//!
//! Ordering: waves follow dependency depth; inside a wave both groups keep
//! registry declaration order for deterministic execution.

use oracbench_core::CategoryRegistry;
use oracbench_logic::{Schedule, SchedulePolicy, SchedulingError, Selection, build_schedule};
use oracbench_report::OverlapPolicy;

/// Build the execution plan for a mode string (`"all"` or a category name)
pub fn build_plan(
    registry: &CategoryRegistry,
    mode: &str,
    parallel: bool,
) -> Result<Schedule, SchedulingError> {
    let selection = Selection::from_mode(mode);
    let schedule = build_schedule(registry, &selection, SchedulePolicy { parallel })?;
    tracing::debug!(
        "Planned {} categories in {} waves for mode '{}'",
        schedule.len(),
        schedule.waves().len(),
        selection
    );
    Ok(schedule)
}

/// Render a schedule as an indented wave listing
pub fn format_plan(schedule: &Schedule, overlap: OverlapPolicy) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Execution plan: {} categories in {} waves\n",
        schedule.len(),
        schedule.waves().len()
    ));

    for wave in schedule.waves() {
        output.push_str(&format!("\nWave {}\n", wave.index + 1));

        let groups: [(&str, &[String]); 2] = match overlap {
            OverlapPolicy::ConcurrentFirst => [
                ("concurrent", wave.concurrent_group.as_slice()),
                ("serial", wave.serial_group.as_slice()),
            ],
            OverlapPolicy::SerialFirst | OverlapPolicy::Overlap => [
                ("serial", wave.serial_group.as_slice()),
                ("concurrent", wave.concurrent_group.as_slice()),
            ],
        };

        for (label, members) in groups {
            if members.is_empty() {
                continue;
            }
            output.push_str(&format!("  {}:\n", label));
            for name in members {
                let deps = schedule.dependencies(name);
                if deps.is_empty() {
                    output.push_str(&format!("    - {}\n", name));
                } else {
                    output.push_str(&format!("    - {} (after {})\n", name, deps.join(", ")));
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracbench_core::{CategoryDef, FnProbe, ProbeContext, ProbeError, ProbeResult};

    fn registry() -> CategoryRegistry {
        let mut registry = CategoryRegistry::new();
        let defs = [
            CategoryDef::new("memory").parallel_safe(true),
            CategoryDef::new("latency").parallel_safe(true),
            CategoryDef::new("security"),
            CategoryDef::new("energy").depends_on(["memory"]),
        ];
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
    fn test_plan_all() {
        let schedule = build_plan(&registry(), "all", true).unwrap();
        assert_eq!(schedule.len(), 4);
        assert_eq!(schedule.waves().len(), 2);
    }

    #[test]
    fn test_plan_single_category() {
        let schedule = build_plan(&registry(), "energy", true).unwrap();
        let names: Vec<_> = schedule.categories().collect();
        assert_eq!(names, vec!["memory", "energy"]);
    }

    #[test]
    fn test_format_plan_lists_waves() {
        let schedule = build_plan(&registry(), "all", true).unwrap();
        let text = format_plan(&schedule, OverlapPolicy::SerialFirst);

        assert!(text.contains("4 categories in 2 waves"));
        assert!(text.contains("Wave 1"));
        assert!(text.contains("- energy (after memory)"));
        let serial = text.find("serial:").unwrap();
        let concurrent = text.find("concurrent:").unwrap();
        assert!(serial < concurrent);
    }
}
