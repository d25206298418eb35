//! Plain-text summary of a call graph report.

use crate::parser::schema::{CallGraphReport, NodeReport, ScopeReport};

const MAX_TREE_DEPTH: u32 = 6;

/// Render hot nodes and the top of each aggregated tree
///
/// **Public** - printed by `analyze --summary`
///
/// # Arguments
/// * `report` - Report to summarise
/// * `max_lines` - Hot nodes shown per scope
pub fn generate_text_summary(report: &CallGraphReport, max_lines: usize) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "  Window [{}, {}] | grouped by {} | {}",
        report.window.start,
        report.window.end,
        report.group_by,
        if report.complete { "complete" } else { "INCOMPLETE" }
    ));

    for scope in &report.scopes {
        lines.push(String::new());
        scope_summary(scope, max_lines, &mut lines);
    }

    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push(format!("  {} failures:", report.failures.len()));
        for failure in &report.failures {
            let at = failure
                .start
                .map(|s| format!(" at {}", s))
                .unwrap_or_default();
            lines.push(format!(
                "   - thread {}/{}{}: {}",
                failure.process_id, failure.thread_id, at, failure.message
            ));
        }
    }

    lines.join("\n")
}

fn scope_summary(scope: &ScopeReport, max_lines: usize, lines: &mut Vec<String>) {
    lines.push(format!(
        "  SCOPE {} (total {}, depth {})",
        scope.id, scope.total_time, scope.max_depth
    ));
    lines.push(format!(
        "  ┏{}┳{}┳{}┳{}┓",
        "━".repeat(44),
        "━".repeat(14),
        "━".repeat(9),
        "━".repeat(9)
    ));
    lines.push(format!(
        "  ┃ {:<42} ┃ {:^12} ┃ {:^7} ┃ {:^7} ┃",
        "Call Path (Hottest First)", "SELF", "CALLS", "%"
    ));
    lines.push(format!(
        "  ┣{}╋{}╋{}╋{}┫",
        "━".repeat(44),
        "━".repeat(14),
        "━".repeat(9),
        "━".repeat(9)
    ));

    for hot in scope.hot_nodes.iter().take(max_lines) {
        lines.push(format!(
            "  ┃ {:<42} ┃ {:>12} ┃ {:>7} ┃ {:>6.1}% ┃",
            truncate_path(&hot.path, 42),
            hot.self_time,
            hot.call_count,
            hot.percentage
        ));
    }

    lines.push(format!(
        "  ┗{}┻{}┻{}┻{}┛",
        "━".repeat(44),
        "━".repeat(14),
        "━".repeat(9),
        "━".repeat(9)
    ));

    for root in &scope.roots {
        tree_lines(root, 0, lines);
    }
}

fn tree_lines(node: &NodeReport, indent: u32, lines: &mut Vec<String>) {
    let mean = node.duration_stats.mean;
    lines.push(format!(
        "  {}{} x{} total {} self {} mean {:.1}",
        "  ".repeat(indent as usize),
        node.symbol,
        node.call_count,
        node.duration,
        node.self_time,
        mean
    ));

    if indent + 1 >= MAX_TREE_DEPTH {
        if !node.children.is_empty() {
            lines.push(format!("  {}...", "  ".repeat(indent as usize + 1)));
        }
        return;
    }

    for child in &node.children {
        tree_lines(child, indent + 1, lines);
    }
}

/// Keep the tail of long paths, where the hot leaf is
fn truncate_path(path: &str, width: usize) -> String {
    let count = path.chars().count();
    if count <= width {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (width - 3)).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::TimeRange;
    use crate::parser::schema::{FailureRecord, HotNode};

    #[test]
    fn test_truncate_path() {
        assert_eq!(truncate_path("main;work", 42), "main;work");
        let long = "a;".repeat(40);
        let short = truncate_path(&long, 42);
        assert_eq!(short.chars().count(), 42);
        assert!(short.starts_with("..."));
    }

    #[test]
    fn test_summary_lists_hot_nodes_and_failures() {
        let report = CallGraphReport {
            version: "1.0.0".to_string(),
            generated_at: String::new(),
            window: TimeRange::new(0, 10),
            group_by: "process".to_string(),
            complete: false,
            scopes: vec![ScopeReport {
                id: 3,
                total_time: 10,
                max_depth: 1,
                roots: Vec::new(),
                hot_nodes: vec![HotNode {
                    path: "main".to_string(),
                    self_time: 10,
                    call_count: 1,
                    percentage: 100.0,
                }],
            }],
            failures: vec![FailureRecord {
                process_id: 3,
                thread_id: 4,
                start: Some(7),
                message: "boom".to_string(),
            }],
        };

        let text = generate_text_summary(&report, 10);
        assert!(text.contains("INCOMPLETE"));
        assert!(text.contains("SCOPE 3"));
        assert!(text.contains("main"));
        assert!(text.contains("thread 3/4 at 7: boom"));
    }
}
