//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use crate::oracle::AttributeId;
use thiserror::Error;

/// Errors raised while constructing occurrence nodes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Invalid interval: start {start} is after end {end}")]
    InvalidInterval { start: i64, end: i64 },

    #[error("Unsupported state value for a call stack symbol: {0}")]
    UnsupportedValue(String),

    #[error("Child node declares a different parent")]
    ParentMismatch,

    #[error("Child node is already attached to this parent")]
    DuplicateChild,
}

/// Errors reported by a state oracle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Timestamp {timestamp} is outside the queryable range [{start}, {end}]")]
    TimeRange { timestamp: i64, start: i64, end: i64 },

    #[error("State system has been disposed")]
    Disposed,

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(AttributeId),

    #[error("Invalid state interval: start {start} is after end {end}")]
    InvalidInterval { start: i64, end: i64 },

    #[error("State starting at {start} overlaps existing state of attribute {attribute}")]
    Overlap { attribute: AttributeId, start: i64 },
}

/// Errors that abort the build of one call stack root (or a whole scope)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Node construction failed: {0}")]
    Construction(#[from] NodeError),

    #[error("State query failed: {0}")]
    Oracle(#[from] OracleError),
}

/// Errors raised while folding occurrences into the aggregated tree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("Cannot merge node {source_symbol} into node {destination_symbol}")]
    SymbolMismatch {
        destination_symbol: String,
        source_symbol: String,
    },

    #[error("Cannot merge nodes from different scopes ({destination} vs {source_scope})")]
    ScopeMismatch { destination: i32, source_scope: i32 },

    #[error("Occurrence at depth {depth} exceeds the tree depth bound {max_depth}")]
    DepthExceeded { depth: u32, max_depth: u32 },
}

/// Errors that can occur while reading event input files
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid event stream: {0}")]
    InvalidFormat(String),

    #[error("Failed to record call stack state: {0}")]
    State(#[from] OracleError),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors that can occur while loading analysis configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config TOML parse error: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
