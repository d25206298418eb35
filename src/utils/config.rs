//! Configuration and constants for the CLI.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default number of hot nodes listed in the text summary
pub const DEFAULT_TOP_N: usize = 20;
pub const MAX_TOP_N: usize = 1000;

// Attribute layout written by the call stack recorder:
// Processes/<pid>/Threads/<tid>/CallStack/<depth>
pub const PROCESSES_ATTRIBUTE: &str = "Processes";
pub const THREADS_ATTRIBUTE: &str = "Threads";
pub const CALLSTACK_ATTRIBUTE: &str = "CallStack";

/// Scope key used to group aggregated trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// One aggregated tree per process, threads merged
    #[default]
    Process,
    /// One aggregated tree per thread
    Thread,
}

impl GroupBy {
    /// Id of the scope a call of `process_id`/`thread_id` belongs to
    pub fn scope_key(self, process_id: i32, thread_id: i32) -> i32 {
        match self {
            GroupBy::Process => process_id,
            GroupBy::Thread => thread_id,
        }
    }
}

impl std::str::FromStr for GroupBy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" | "pid" => Ok(Self::Process),
            "thread" | "tid" => Ok(Self::Thread),
            other => Err(ConfigError::Invalid(format!("unknown grouping '{}'", other))),
        }
    }
}

/// Analysis settings
///
/// **Public** - loaded from TOML and/or filled from CLI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// How call stacks are grouped into aggregated trees
    pub group_by: GroupBy,

    /// Fold roots that were interrupted by cancellation
    pub accept_partial: bool,

    /// Start of the analysis window (defaults to the start of the state)
    pub window_start: Option<i64>,

    /// End of the analysis window (defaults to the end of the state)
    pub window_end: Option<i64>,

    /// Number of nodes listed in the text summary
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            group_by: GroupBy::Process,
            accept_partial: false,
            window_start: None,
            window_end: None,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl AnalysisConfig {
    /// Reject settings that cannot produce a meaningful analysis
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(start), Some(end)) = (self.window_start, self.window_end) {
            if start > end {
                return Err(ConfigError::Invalid(format!(
                    "window start {} is after window end {}",
                    start, end
                )));
            }
        }

        if self.top_n == 0 || self.top_n > MAX_TOP_N {
            return Err(ConfigError::Invalid(format!(
                "top_n must be between 1 and {}",
                MAX_TOP_N
            )));
        }

        Ok(())
    }
}

/// Load analysis settings from a TOML file
///
/// # Errors
/// * `ConfigError::IoError` - If file cannot be read
/// * `ConfigError::ParseFailed` - If TOML is invalid
/// * `ConfigError::Invalid` - If the values are inconsistent
pub fn load_config(path: impl AsRef<Path>) -> Result<AnalysisConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_toml() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            group_by = "thread"
            window_end = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.group_by, GroupBy::Thread);
        assert_eq!(config.window_end, Some(500));
        assert_eq!(config.window_start, None);
        assert_eq!(config.top_n, DEFAULT_TOP_N);
        assert!(!config.accept_partial);
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let config = AnalysisConfig {
            window_start: Some(10),
            window_end: Some(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_group_by_from_str() {
        assert_eq!("PID".parse::<GroupBy>().unwrap(), GroupBy::Process);
        assert_eq!("thread".parse::<GroupBy>().unwrap(), GroupBy::Thread);
        assert!("core".parse::<GroupBy>().is_err());
    }
}
