//! Event input and report schema definitions.
//!
//! This module handles:
//! - Parsing JSON entry/exit event files
//! - Replaying events into call stack state
//! - Defining the output report schema

pub mod events;
pub mod schema;

// Re-export main types
pub use events::{load_state, parse_events, read_events, symbol_value, CallEvent, EventKind, TraceEvents};
pub use schema::{CallGraphReport, FailureRecord, HotNode, NodeReport, ScopeReport, StatsSummary};
