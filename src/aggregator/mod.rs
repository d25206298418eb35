//! Aggregation of occurrence trees into per-symbol call graphs.
//!
//! This module transforms per-occurrence call trees into:
//! - Aggregated trees keyed by symbol at each call path
//! - Running duration and self-time statistics per node
//! - Hot path analysis and self-time distribution

pub mod aggregated;
pub mod call_graph;
pub mod metrics;
pub mod statistics;

// Re-export main types and functions
pub use aggregated::{AggregatedNode, ScopeNode};
pub use call_graph::{AnalysisSummary, CallGraph, ScopeFailure};
pub use metrics::{
    calculate_call_distribution, calculate_hot_nodes, collect_call_paths, CallDistribution,
    CallPath,
};
pub use statistics::{CallStatistics, SampleField, Statistics};
