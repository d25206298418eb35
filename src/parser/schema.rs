//! Output JSON schema definitions for call graph reports.
//!
//! This module defines the structure of JSON files we write to disk.
//! Schema is versioned to allow future evolution.

use crate::callstack::Symbol;
use crate::oracle::TimeRange;
use serde::{Deserialize, Serialize};

/// Top-level report structure written to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallGraphReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the report was generated
    pub generated_at: String,

    /// Time window the call stacks were analysed over
    pub window: TimeRange,

    /// `process` or `thread`
    pub group_by: String,

    /// Whether the analysis ran to completion
    pub complete: bool,

    /// One aggregated forest per process (or thread)
    pub scopes: Vec<ScopeReport>,

    /// Call stacks and roots that could not be analysed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailureRecord>,
}

/// Aggregated forest of one process or thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub id: i32,

    /// Summed duration of every top-level call
    pub total_time: i64,

    pub max_depth: u32,

    /// Top-level calls, by descending duration
    pub roots: Vec<NodeReport>,

    /// Call paths with the highest self time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hot_nodes: Vec<HotNode>,
}

/// One aggregated node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub symbol: Symbol,
    pub depth: u32,
    pub duration: i64,
    pub self_time: i64,
    pub call_count: u64,
    pub duration_stats: StatsSummary,
    pub self_time_stats: StatsSummary,

    /// Callees, by descending duration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeReport>,
}

/// Flattened statistics accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub count: u64,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub mean: f64,
    pub std_dev: f64,
}

/// A hot call path (semicolon-separated symbols with its self time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotNode {
    /// Collapsed call path (e.g., "main;parse;read")
    pub path: String,

    pub self_time: i64,
    pub call_count: u64,

    /// Percentage of the scope's total time
    pub percentage: f64,
}

/// A failure recorded during analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub process_id: i32,
    pub thread_id: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    pub message: String,
}
