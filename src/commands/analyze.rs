//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Resolves the analysis config (file, then CLI overrides)
//! 2. Replays the event file into call stack state
//! 3. Discovers the call stacks to analyse
//! 4. Builds and aggregates the call trees
//! 5. Writes the report and prints the summary

use super::models::AnalyzeArgs;
use crate::aggregator::{calculate_call_distribution, collect_call_paths, CallGraph};
use crate::callstack::{discover_call_stacks, CancellationToken};
use crate::oracle::TimeRange;
use crate::output::{build_report, generate_text_summary, write_report};
use crate::parser::{load_state, read_events, CallGraphReport};
use crate::utils::config::{load_config, AnalysisConfig, MAX_TOP_N};
use anyhow::{Context, Result};
use log::{debug, info};
use std::time::Instant;

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Analyze command arguments
///
/// # Returns
/// The report that was written (or would have been, without `--output`)
///
/// # Errors
/// * Config load or validation failures
/// * Event file read or replay errors
/// * Report write errors
///
/// # Example
/// ```ignore
/// let args = AnalyzeArgs {
///     input: PathBuf::from("events.json"),
///     print_summary: true,
///     ..Default::default()
/// };
///
/// execute_analyze(args)?;
/// ```
pub fn execute_analyze(args: AnalyzeArgs) -> Result<CallGraphReport> {
    execute_analyze_with(args, &CancellationToken::new())
}

/// Execute the analyze command, stopping early when `cancel` fires
pub fn execute_analyze_with(
    args: AnalyzeArgs,
    cancel: &CancellationToken,
) -> Result<CallGraphReport> {
    let start_time = Instant::now();

    info!("Starting analysis of: {}", args.input.display());

    info!("Step 1/5: Resolving configuration...");
    let config = resolve_config(&args)?;
    debug!("Analysis config: {:?}", config);

    info!("Step 2/5: Loading call events...");
    let events = read_events(&args.input)
        .with_context(|| format!("Failed to read events from {}", args.input.display()))?;
    let state = load_state(&events).context("Failed to replay call events")?;

    info!("Step 3/5: Discovering call stacks...");
    let scopes = discover_call_stacks(&state).context("Failed to discover call stacks")?;

    let window = TimeRange::new(
        config.window_start.unwrap_or_else(|| state.start_time()),
        config.window_end.unwrap_or_else(|| state.end_time()),
    );

    info!(
        "Step 4/5: Aggregating {} call stacks over [{}, {}]...",
        scopes.len(),
        window.start,
        window.end
    );
    let graph = CallGraph::new(config.group_by);
    let summary = graph.analyze(&state, &scopes, window, config.accept_partial, cancel);

    for scope in graph.snapshots() {
        let paths = collect_call_paths(&scope.roots());
        debug!(
            "Scope {} distribution: {}",
            scope.id(),
            calculate_call_distribution(&paths).summary()
        );
    }

    info!("Step 5/5: Writing output...");
    let report = build_report(&graph, &summary, window, config.top_n);

    if let Some(output) = &args.output {
        write_report(&report, output).context("Failed to write report JSON")?;
        info!("✓ Report written to: {}", output.display());
    }

    if args.print_summary {
        println!("\n{}", "=".repeat(80));
        println!("CALL GRAPH SUMMARY");
        println!("{}", "=".repeat(80));
        println!("Input:       {}", args.input.display());
        println!("Call stacks: {}", summary.scopes_analyzed);
        println!("Roots:       {} built, {} folded", summary.roots_built, summary.roots_folded);
        println!("\n{}", generate_text_summary(&report, config.top_n));
        println!("{}", "=".repeat(80));
    }

    let elapsed = start_time.elapsed();
    info!("Analysis completed in {:.2}s", elapsed.as_secs_f64());

    Ok(report)
}

/// Merge the config file (if any) with CLI overrides
///
/// **Public** - exposed so callers can inspect the effective settings
pub fn resolve_config(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    if let Some(start) = args.start {
        config.window_start = Some(start);
    }
    if let Some(end) = args.end {
        config.window_end = Some(end);
    }
    if let Some(group_by) = args.group_by {
        config.group_by = group_by;
    }
    if args.accept_partial {
        config.accept_partial = true;
    }
    if let Some(top_n) = args.top_n {
        config.top_n = top_n;
    }

    config.validate().context("Invalid analysis settings")?;
    Ok(config)
}

/// Validate analyze arguments
///
/// **Public** - can be called before execute_analyze for early validation
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    if let Some(top_n) = args.top_n {
        if top_n == 0 {
            anyhow::bail!("top must be greater than 0");
        }
        if top_n > MAX_TOP_N {
            anyhow::bail!("top is too large (max {})", MAX_TOP_N);
        }
    }

    if let (Some(start), Some(end)) = (args.start, args.end) {
        if start > end {
            anyhow::bail!("start {} is after end {}", start, end);
        }
    }

    Ok(())
}
