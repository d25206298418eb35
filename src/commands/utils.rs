use crate::output::read_report;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::Path;

/// Validate a report JSON file
pub fn validate_report_file(file_path: &Path) -> Result<()> {
    println!("Validating report: {}", file_path.display());

    let report = read_report(file_path)
        .with_context(|| format!("Failed to read report {}", file_path.display()))?;

    if report.version != SCHEMA_VERSION {
        anyhow::bail!(
            "Unsupported report version {} (expected {})",
            report.version,
            SCHEMA_VERSION
        );
    }

    let roots: usize = report.scopes.iter().map(|s| s.roots.len()).sum();

    println!("✓ Valid report JSON");
    println!("  Version: {}", report.version);
    println!("  Window: [{}, {}]", report.window.start, report.window.end);
    println!("  Grouped by: {}", report.group_by);
    println!("  Scopes: {}", report.scopes.len());
    println!("  Top-level functions: {}", roots);
    println!("  Failures: {}", report.failures.len());

    Ok(())
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Call Graph Report Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string          - Schema version (e.g., '1.0.0')");
        println!("  generated_at: string     - RFC 3339 timestamp");
        println!("  window: object           - Analysed time window {{start, end}}");
        println!("  group_by: string         - 'process' or 'thread'");
        println!("  complete: bool           - False if the analysis was cancelled");
        println!("  scopes: array            - One aggregated forest per scope");
        println!("    id: number             - Process or thread id");
        println!("    total_time: number     - Summed duration of top-level calls");
        println!("    max_depth: number      - Depth slots of the deepest call stack");
        println!("    roots: array           - Aggregated nodes (recursive)");
        println!("      symbol: object       - {{kind: int|long|name, value}}");
        println!("      duration: number     - Summed duration");
        println!("      self_time: number    - Summed exclusive time");
        println!("      call_count: number   - Occurrences merged");
        println!("      duration_stats: object - count/min/max/mean/std_dev");
        println!("      self_time_stats: object - count/min/max/mean/std_dev");
        println!("      children: array      - Callees, by descending duration");
        println!("    hot_nodes: array       - Call paths with the highest self time");
        println!("  failures: array?         - Call stacks or roots that failed");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("Callgraph Studio v{}", env!("CARGO_PKG_VERSION"));
    println!("Report Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Per-occurrence and aggregated call trees from call stack state.");
}
