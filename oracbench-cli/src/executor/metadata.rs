//! System Metadata Collection
//!
//! Collects the host descriptor recorded once per run: platform, logical CPU
//! count and total memory. Memory is read from `/proc/meminfo` and degrades to
//! 0 on other platforms.

use chrono::Utc;
use oracbench_report::{ExecutionPolicy, HostInfo, RunMetadata};

/// Build run metadata for a new invocation
pub fn build_run_metadata(mode: &str, policy: ExecutionPolicy) -> RunMetadata {
    RunMetadata {
        start_time: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        system_info: collect_host_info(),
        mode: mode.to_string(),
        policy,
    }
}

/// Describe the current host
pub fn collect_host_info() -> HostInfo {
    HostInfo {
        platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        cpu_count: num_cpus(),
        memory_gb: get_memory_gb().unwrap_or(0.0),
    }
}

/// Get number of available CPU cores
fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// Get total system memory in GB (Linux only)
fn get_memory_gb() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|content| parse_mem_total_gb(&content))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Total memory from `/proc/meminfo` contents, rounded to two decimals
fn parse_mem_total_gb(content: &str) -> Option<f64> {
    content
        .lines()
        .find(|l| l.starts_with("MemTotal"))
        .and_then(|l| {
            l.split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<u64>().ok())
        })
        .map(|kb| (kb as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracbench_report::OverlapPolicy;

    #[test]
    fn test_parse_mem_total() {
        let content = "MemTotal:       16777216 kB\nMemFree:         1024 kB\n";
        assert_eq!(parse_mem_total_gb(content), Some(16.0));
        assert_eq!(parse_mem_total_gb("MemFree: 12 kB"), None);
    }

    #[test]
    fn test_run_metadata() {
        let meta = build_run_metadata(
            "latency",
            ExecutionPolicy {
                parallel: false,
                streaming: true,
                overlap: OverlapPolicy::Overlap,
            },
        );
        assert_eq!(meta.mode, "latency");
        assert!(meta.system_info.cpu_count >= 1);
        assert!(meta.system_info.platform.contains(std::env::consts::OS));
        assert!(meta.policy.streaming);
    }
}
