//! Callgraph Studio
//!
//! Per-occurrence and symbol-aggregated call trees built from call stack
//! state held in an interval-indexed attribute store.
//!
//! This crate provides the core implementation for the
//! `callgraph` CLI tool.
//!
//! ## Getting Started
//!
//! ```bash
//! callgraph analyze --input events.json --output callgraph.json --summary
//! callgraph --help
//! ```
//!
//! As a library, build occurrence trees with
//! [`callstack::build_occurrence_tree`] against any [`oracle::StateOracle`]
//! and fold them into an [`aggregator::CallGraph`].

pub mod aggregator;
pub mod callstack;
pub mod commands;
pub mod oracle;
pub mod output;
pub mod parser;
pub mod utils;
