//! Configuration loading from orac.toml
//!
//! OracBench configuration can be specified in an `orac.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.
//! Command-line flags override anything set here.

use oracbench_logic::{GradingPolicy, ThresholdDef};
use oracbench_report::{OutputFormat, OverlapPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up by [`OracConfig::discover`]
pub const CONFIG_FILE: &str = "orac.toml";

/// OracBench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OracConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
    /// Penalties for categories without a result
    #[serde(default)]
    pub grading: GradingPolicy,
    /// Per-category score thresholds
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdDef>,
    /// Free-form string options handed to each category's probe
    #[serde(default)]
    pub probes: BTreeMap<String, BTreeMap<String, String>>,
}

/// Runner configuration for category execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Timeout for a single category (e.g., "60s", "5m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Per-category timeout overrides
    #[serde(default)]
    pub timeouts: BTreeMap<String, String>,
    /// Run parallel-safe categories of a wave concurrently
    #[serde(default)]
    pub parallel: bool,
    /// Ordering of serial and concurrent groups within a wave
    #[serde(default)]
    pub overlap: OverlapPolicy,
    /// Show a progress bar on stderr
    #[serde(default = "default_progress")]
    pub progress: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            timeouts: BTreeMap::new(),
            parallel: false,
            overlap: OverlapPolicy::default(),
            progress: default_progress(),
        }
    }
}

fn default_timeout() -> String {
    "5m".to_string()
}
fn default_progress() -> bool {
    true
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Snapshot destination
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    /// Rewrite the snapshot after every category outcome
    #[serde(default)]
    pub streaming: bool,
    /// Terminal output format: "human" or "json"
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            streaming: false,
            format: OutputFormat::default(),
        }
    }
}

fn default_output_path() -> PathBuf {
    PathBuf::from("civitas_report.json")
}

impl OracConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Default timeout plus per-category overrides, parsed
    pub fn timeouts(&self) -> anyhow::Result<(Duration, BTreeMap<String, Duration>)> {
        let default = Self::parse_duration(&self.runner.timeout)?;
        let overrides = self
            .runner
            .timeouts
            .iter()
            .map(|(name, value)| Ok((name.clone(), Self::parse_duration(value)?)))
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
        Ok((default, overrides))
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# OracBench Configuration

[runner]
# Timeout for a single category
timeout = "5m"
# Run parallel-safe categories of the same wave concurrently
parallel = false
# Ordering within a wave: "serial-first", "concurrent-first" or "overlap"
overlap = "serial-first"
# Show a progress bar
progress = true

[runner.timeouts]
# Per-category overrides (uncomment to enable)
# scaling = "10m"

[output]
# Snapshot destination
path = "civitas_report.json"
# Rewrite the snapshot after every category outcome
streaming = false
# Terminal output: human or json
format = "human"

[grading]
# Score given to failed and skipped categories
failed_score = 0.0
skipped_score = 0.0

# [thresholds.latency]
# metric = "primary"
# target = 50.0
# direction = "lower"
# weight = 1.0

# [probes.latency]
# Options passed verbatim to the latency probe
# host = "127.0.0.1"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m")
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let millis_per_unit = match unit_part.to_lowercase().as_str() {
            "ms" => 1.0,
            "s" | "" => 1_000.0,
            "m" | "min" => 60_000.0,
            "h" => 3_600_000.0,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Duration::try_from_secs_f64(value * millis_per_unit / 1_000.0)
            .map_err(|e| anyhow::anyhow!("Duration out of range: {} ({})", s, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracbench_logic::Direction;

    #[test]
    fn test_default_config() {
        let config = OracConfig::default();
        assert_eq!(config.runner.timeout, "5m");
        assert!(!config.runner.parallel);
        assert_eq!(config.runner.overlap, OverlapPolicy::SerialFirst);
        assert_eq!(config.output.path, PathBuf::from("civitas_report.json"));
        assert_eq!(config.grading.failed_score, 0.0);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            OracConfig::parse_duration("3s").unwrap(),
            Duration::from_secs(3)
        );
        assert_eq!(
            OracConfig::parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            OracConfig::parse_duration("2m").unwrap(),
            Duration::from_secs(120)
        );
        assert_eq!(
            OracConfig::parse_duration("1.5s").unwrap(),
            Duration::from_millis(1500)
        );
        assert!(OracConfig::parse_duration("").is_err());
        assert!(OracConfig::parse_duration("3 fortnights").is_err());
        assert!(OracConfig::parse_duration("100000000000000000000h").is_err());
        assert!(OracConfig::parse_duration("1e400s").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            timeout = "30s"
            parallel = true
            overlap = "overlap"

            [runner.timeouts]
            scaling = "2m"

            [thresholds.latency]
            target = 50.0

            [thresholds.scaling]
            metric = "ops_per_sec"
            target = 1000.0
            direction = "higher"
            weight = 2.0

            [probes.latency]
            host = "10.0.0.7"
            port = "8443"
        "#;

        let config: OracConfig = toml::from_str(toml_str).unwrap();
        assert!(config.runner.parallel);
        assert_eq!(config.runner.overlap, OverlapPolicy::Overlap);
        assert_eq!(config.thresholds["latency"].metric, "primary");
        assert_eq!(config.thresholds["scaling"].direction, Direction::Higher);

        let (default, overrides) = config.timeouts().unwrap();
        assert_eq!(default, Duration::from_secs(30));
        assert_eq!(overrides["scaling"], Duration::from_secs(120));

        assert_eq!(config.probes["latency"]["port"], "8443");
        assert!(!config.probes.contains_key("scaling"));

        // Defaults should still apply
        assert_eq!(config.output.format, OutputFormat::Human);
        assert!(config.runner.progress);
    }

    #[test]
    fn test_default_toml_parses() {
        let config: OracConfig = toml::from_str(&OracConfig::default_toml()).unwrap();
        assert_eq!(config.runner.timeout, "5m");
        assert!(config.runner.timeouts.is_empty());
        assert!(config.thresholds.is_empty());
    }
}
