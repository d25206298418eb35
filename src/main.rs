//! Callgraph Studio CLI
//!
//! Builds aggregated call graphs from function entry/exit events.

use anyhow::Result;
use callgraph_studio::commands::{
    display_schema, display_version, execute_analyze, validate_args, validate_report_file,
    AnalyzeArgs,
};
use callgraph_studio::utils::config::GroupBy;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

/// Callgraph Studio - call tree aggregation for traced programs
#[derive(Parser, Debug)]
#[command(name = "callgraph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the aggregated call graph of an event file
    Analyze {
        /// JSON file of entry/exit events
        #[arg(short, long, env = "CALLGRAPH_INPUT")]
        input: PathBuf,

        /// Output path for the JSON report
        #[arg(short, long, default_value = "callgraph.json")]
        output: PathBuf,

        /// Skip writing the JSON report
        #[arg(long, conflicts_with = "output")]
        no_output: bool,

        /// TOML analysis config
        #[arg(short, long, env = "CALLGRAPH_CONFIG")]
        config: Option<PathBuf>,

        /// Start of the analysis window
        #[arg(long, allow_hyphen_values = true)]
        start: Option<i64>,

        /// End of the analysis window
        #[arg(long, allow_hyphen_values = true)]
        end: Option<i64>,

        /// Group aggregated trees by process or thread
        #[arg(long)]
        by: Option<GroupBy>,

        /// Fold call trees interrupted before completion
        #[arg(long)]
        accept_partial: bool,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,

        /// Number of hot nodes listed per scope
        #[arg(long)]
        top: Option<usize>,
    },

    /// Validate a report JSON file
    Validate {
        /// Path to report JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            no_output,
            config,
            start,
            end,
            by,
            accept_partial,
            summary,
            top,
        } => {
            let args = AnalyzeArgs {
                input,
                output: (!no_output).then_some(output),
                config,
                start,
                end,
                group_by: by,
                accept_partial,
                print_summary: summary,
                top_n: top,
            };

            validate_args(&args)?;
            execute_analyze(args)?;
        }

        Commands::Validate { file } => {
            validate_report_file(&file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
