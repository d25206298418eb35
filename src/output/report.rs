//! Convert aggregated call graphs into the report schema.

use crate::aggregator::{
    calculate_hot_nodes, collect_call_paths, AggregatedNode, AnalysisSummary, CallGraph,
    ScopeNode, Statistics,
};
use crate::callstack::BuildStatus;
use crate::oracle::TimeRange;
use crate::parser::schema::{
    CallGraphReport, FailureRecord, NodeReport, ScopeReport, StatsSummary,
};
use crate::utils::config::{GroupBy, SCHEMA_VERSION};
use chrono::Utc;

/// Build a report from a call graph and the summary of its analysis
///
/// **Public** - the CLI writes the result with `write_report`
///
/// # Arguments
/// * `graph` - Aggregated call graph; each scope is snapshotted once
/// * `summary` - Outcome of `CallGraph::analyze`
/// * `window` - Window the analysis ran over
/// * `top_n` - Number of hot nodes listed per scope
pub fn build_report(
    graph: &CallGraph,
    summary: &AnalysisSummary,
    window: TimeRange,
    top_n: usize,
) -> CallGraphReport {
    let scopes = graph
        .snapshots()
        .iter()
        .map(|scope| scope_report(scope, top_n))
        .collect();

    let failures = summary
        .failures
        .iter()
        .map(|f| FailureRecord {
            process_id: f.process_id,
            thread_id: f.thread_id,
            start: f.start,
            message: f.message.clone(),
        })
        .collect();

    CallGraphReport {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        window,
        group_by: match graph.group_by() {
            GroupBy::Process => "process".to_string(),
            GroupBy::Thread => "thread".to_string(),
        },
        complete: summary.status == BuildStatus::Completed,
        scopes,
        failures,
    }
}

/// Report of one aggregated forest
pub fn scope_report(scope: &ScopeNode, top_n: usize) -> ScopeReport {
    let roots = scope.roots();
    let total_time = scope.total_duration();
    let paths = collect_call_paths(&roots);

    ScopeReport {
        id: scope.id(),
        total_time,
        max_depth: scope.max_depth(),
        roots: sorted_reports(&roots),
        hot_nodes: calculate_hot_nodes(&paths, total_time, top_n),
    }
}

/// Report of one aggregated node and its subtree
pub fn node_report(node: &AggregatedNode) -> NodeReport {
    NodeReport {
        symbol: node.symbol().clone(),
        depth: node.depth(),
        duration: node.duration(),
        self_time: node.self_time(),
        call_count: node.call_count(),
        duration_stats: stats_summary(node.statistics().duration()),
        self_time_stats: stats_summary(node.statistics().self_time()),
        children: sorted_reports(&node.children()),
    }
}

/// Reports by descending duration, ties by symbol
fn sorted_reports(nodes: &[AggregatedNode]) -> Vec<NodeReport> {
    let mut reports: Vec<NodeReport> = nodes.iter().map(node_report).collect();
    reports.sort_by(|a, b| {
        b.duration
            .cmp(&a.duration)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    reports
}

fn stats_summary(stats: &Statistics) -> StatsSummary {
    StatsSummary {
        count: stats.count(),
        min: stats.min(),
        max: stats.max(),
        mean: stats.mean(),
        std_dev: stats.std_dev(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callstack::{OccurrenceNode, Symbol};

    #[test]
    fn test_children_sorted_by_duration() {
        let mut root =
            OccurrenceNode::new(Symbol::from("main"), 0, 100, 0, 1, 1, None).unwrap();
        let short = OccurrenceNode::new(Symbol::from("a"), 0, 10, 1, 1, 1, Some(&root)).unwrap();
        let long = OccurrenceNode::new(Symbol::from("b"), 20, 80, 1, 1, 1, Some(&root)).unwrap();
        root.add_child(short).unwrap();
        root.add_child(long).unwrap();

        let scope = ScopeNode::new(1, 2);
        scope.fold(&root).unwrap();

        let report = scope_report(&scope, 5);
        assert_eq!(report.total_time, 100);
        let main = &report.roots[0];
        assert_eq!(main.self_time, 30);
        assert_eq!(main.children[0].symbol, Symbol::from("b"));
        assert_eq!(main.children[1].symbol, Symbol::from("a"));
        assert_eq!(main.duration_stats.count, 1);
        assert_eq!(report.hot_nodes[0].path, "main;b");
    }
}
