//! Per-occurrence call trees.
//!
//! This module turns call stack state into trees of real invocations:
//! - Symbol decoding of call stack values
//! - Occurrence nodes with self time
//! - Depth-by-depth tree construction bounded by each caller's lifetime
//! - Discovery of the call stacks present in a state system

pub mod builder;
pub mod occurrence;
pub mod scope;
pub mod symbol;

// Re-export main types and functions
pub use builder::{
    build_occurrence_tree, BuildOutcome, BuildStatus, CancellationToken, RootFailure,
};
pub use occurrence::{NodeId, OccurrenceNode};
pub use scope::{discover_call_stacks, CallStackScope};
pub use symbol::Symbol;
