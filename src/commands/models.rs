use crate::utils::config::GroupBy;
use std::path::PathBuf;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// JSON event file to analyse
    pub input: PathBuf,

    /// Output path for the JSON report (None = no file written)
    pub output: Option<PathBuf>,

    /// TOML analysis config; flags below override its values
    pub config: Option<PathBuf>,

    /// Start of the analysis window
    pub start: Option<i64>,

    /// End of the analysis window
    pub end: Option<i64>,

    pub group_by: Option<GroupBy>,

    /// Fold roots interrupted by cancellation
    pub accept_partial: bool,

    /// Print text summary to stdout
    pub print_summary: bool,

    /// Number of hot nodes listed per scope
    pub top_n: Option<usize>,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("events.json"),
            output: Some(PathBuf::from("callgraph.json")),
            config: None,
            start: None,
            end: None,
            group_by: None,
            accept_partial: false,
            print_summary: false,
            top_n: None,
        }
    }
}
