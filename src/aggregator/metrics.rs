//! Hot call paths and self-time distribution of aggregated trees.
//!
//! Hot paths are the call paths that spend the most time in their own code.
//! These are the primary targets for optimization.

use super::aggregated::AggregatedNode;
use crate::parser::schema::HotNode;
use log::debug;

/// One aggregated node flattened to its full call path
///
/// **Public** - input of the hot path and distribution calculations
#[derive(Debug, Clone, PartialEq)]
pub struct CallPath {
    /// Call path as semicolon-separated symbols, root first
    pub path: String,

    /// Summed self time of the node
    pub self_time: i64,

    pub call_count: u64,
}

/// Flatten aggregated trees into call paths, by descending self time
///
/// **Public** - ties go to the lexically smaller path so output is stable
pub fn collect_call_paths(roots: &[AggregatedNode]) -> Vec<CallPath> {
    let mut paths = Vec::new();
    for root in roots {
        collect_into(root, &root.symbol().to_string(), &mut paths);
    }

    paths.sort_by(|a, b| b.self_time.cmp(&a.self_time).then_with(|| a.path.cmp(&b.path)));
    paths
}

fn collect_into(node: &AggregatedNode, path: &str, paths: &mut Vec<CallPath>) {
    paths.push(CallPath {
        path: path.to_string(),
        self_time: node.self_time(),
        call_count: node.call_count(),
    });

    for child in node.children() {
        let child_path = format!("{};{}", path, child.symbol());
        collect_into(&child, &child_path, paths);
    }
}

/// Calculate hot paths from call paths
///
/// **Public** - main entry point for metrics calculation
///
/// # Arguments
/// * `paths` - Call paths from `collect_call_paths`
/// * `total_time` - Total time of the scope (sum of its root durations)
/// * `top_n` - Number of top paths to return (e.g., 10)
///
/// # Returns
/// Vector of hot nodes, sorted by self time (descending)
pub fn calculate_hot_nodes(paths: &[CallPath], total_time: i64, top_n: usize) -> Vec<HotNode> {
    debug!("Calculating top {} hot nodes from {} paths", top_n, paths.len());

    paths
        .iter()
        .take(top_n)
        .map(|path| create_hot_node(path, total_time))
        .collect()
}

fn create_hot_node(path: &CallPath, total_time: i64) -> HotNode {
    let percentage = if total_time > 0 {
        (path.self_time as f64 / total_time as f64) * 100.0
    } else {
        0.0
    };

    HotNode {
        path: path.path.clone(),
        self_time: path.self_time,
        call_count: path.call_count,
        percentage,
    }
}

/// Calculate self-time distribution statistics
///
/// **Public** - provides summary statistics
///
/// # Arguments
/// * `paths` - Call paths, sorted by descending self time
pub fn calculate_call_distribution(paths: &[CallPath]) -> CallDistribution {
    if paths.is_empty() {
        return CallDistribution::default();
    }

    let total: i64 = paths.iter().map(|p| p.self_time).sum();
    let count = paths.len();
    let mean = total / count as i64;

    let mut times: Vec<i64> = paths.iter().map(|p| p.self_time).collect();
    times.sort_unstable();
    let median = times[times.len() / 2];

    let top_10_percent_count = (count as f64 * 0.1).ceil() as usize;
    let top_10_percent_time: i64 = paths
        .iter()
        .take(top_10_percent_count)
        .map(|p| p.self_time)
        .sum();

    CallDistribution {
        total_self_time: total,
        path_count: count,
        mean_self_time: mean,
        median_self_time: median,
        top_10_percent_time,
        top_10_percent_percentage: if total > 0 {
            (top_10_percent_time as f64 / total as f64) * 100.0
        } else {
            0.0
        },
    }
}

/// Self-time distribution over call paths
///
/// **Public** - returned from calculate_call_distribution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallDistribution {
    /// Self time summed over every path; equals the scope's total time
    pub total_self_time: i64,

    /// Number of distinct call paths
    pub path_count: usize,

    pub mean_self_time: i64,
    pub median_self_time: i64,

    /// Self time of the top 10% of paths
    pub top_10_percent_time: i64,

    /// Percentage of total self time in the top 10%
    pub top_10_percent_percentage: f64,
}

impl CallDistribution {
    /// Get human-readable summary
    ///
    /// **Public** - for logging and debugging
    pub fn summary(&self) -> String {
        format!(
            "Total: {} | Paths: {} | Mean: {} | Median: {} | Top 10%: {:.1}%",
            self.total_self_time,
            self.path_count,
            self.mean_self_time,
            self.median_self_time,
            self.top_10_percent_percentage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str, self_time: i64) -> CallPath {
        CallPath {
            path: p.to_string(),
            self_time,
            call_count: 1,
        }
    }

    #[test]
    fn test_calculate_hot_nodes() {
        let paths = vec![
            path("main;execute", 5000),
            path("main;storage", 3000),
            path("main", 2000),
        ];

        let hot = calculate_hot_nodes(&paths, 10000, 2);

        assert_eq!(hot.len(), 2);
        assert_eq!(hot[0].path, "main;execute");
        assert_eq!(hot[0].self_time, 5000);
        assert_eq!(hot[0].percentage, 50.0);
    }

    #[test]
    fn test_calculate_call_distribution() {
        let paths = vec![
            path("a", 8000),
            path("a;b", 1000),
            path("a;c", 500),
            path("a;d", 500),
        ];

        let dist = calculate_call_distribution(&paths);

        assert_eq!(dist.total_self_time, 10000);
        assert_eq!(dist.path_count, 4);
        assert_eq!(dist.mean_self_time, 2500);
        assert_eq!(dist.median_self_time, 1000);
        assert_eq!(dist.top_10_percent_time, 8000);
        assert!((dist.top_10_percent_percentage - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_call_distribution_empty() {
        let dist = calculate_call_distribution(&[]);
        assert_eq!(dist, CallDistribution::default());
    }

    #[test]
    fn test_hot_node_zero_total() {
        let hot = create_hot_node(&path("idle", 0), 0);
        assert_eq!(hot.percentage, 0.0);
    }
}
