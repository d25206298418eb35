//! Interval-indexed attribute store interface.
//!
//! The call tree builder never looks at raw trace events. It asks a state
//! oracle which value an attribute holds at a timestamp and gets back the
//! whole interval during which that value stays unchanged.
//!
//! This module provides:
//! - The `StateOracle` trait consumed by the builder
//! - The `StateValue` tagged union returned by queries
//! - An in-memory implementation (`memory`) and a call stack recorder
//!   (`recorder`) that fills it from entry/exit events

pub mod memory;
pub mod recorder;

pub use memory::MemoryStateSystem;
pub use recorder::CallStackRecorder;

use crate::utils::error::OracleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one attribute (one node of the attribute tree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeId(pub usize);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value held by an attribute during an interval
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    /// No active call at this depth
    #[default]
    Null,
    Int(i32),
    Long(i64),
    Str(String),
    Double(f64),
    /// Structured value the call stack has no use for
    Custom(String),
}

impl StateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    /// Short name of the value kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            StateValue::Null => "null",
            StateValue::Int(_) => "int",
            StateValue::Long(_) => "long",
            StateValue::Str(_) => "string",
            StateValue::Double(_) => "double",
            StateValue::Custom(_) => "custom",
        }
    }
}

/// One query result: `value` holds for every tick in `[start, end]`
///
/// Both bounds are inclusive; `end` is the last tick the value holds.
#[derive(Debug, Clone, PartialEq)]
pub struct StateInterval {
    pub start: i64,
    pub end: i64,
    pub attribute: AttributeId,
    pub value: StateValue,
}

impl StateInterval {
    pub fn new(start: i64, end: i64, attribute: AttributeId, value: StateValue) -> Self {
        Self {
            start,
            end,
            attribute,
            value,
        }
    }
}

/// Inclusive time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window covering every representable timestamp
    pub fn unbounded() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// Overlap of two windows, `None` when they are disjoint
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(TimeRange { start, end })
    }
}

/// Time-interval query engine the call tree builder reads from
///
/// Implementations must report `OracleError::TimeRange` for timestamps
/// outside `query_range` and `OracleError::Disposed` once torn down. The
/// builder propagates both and never retries.
pub trait StateOracle {
    /// Interval holding `timestamp` for `attribute`
    fn query(&self, timestamp: i64, attribute: AttributeId) -> Result<StateInterval, OracleError>;

    /// Direct children of `scope`, in creation order
    fn child_attributes(&self, scope: AttributeId) -> Result<Vec<AttributeId>, OracleError>;

    /// Window in which `attribute` may be queried
    fn query_range(&self, attribute: AttributeId) -> Result<TimeRange, OracleError>;

    /// Top-level attributes
    fn root_attributes(&self) -> Result<Vec<AttributeId>, OracleError>;

    /// Name of `attribute` relative to its parent
    fn attribute_name(&self, attribute: AttributeId) -> Result<String, OracleError>;

    /// Child of `parent` (or top-level attribute when `parent` is `None`) called `name`
    fn child_named(
        &self,
        parent: Option<AttributeId>,
        name: &str,
    ) -> Result<Option<AttributeId>, OracleError> {
        let candidates = match parent {
            Some(parent) => self.child_attributes(parent)?,
            None => self.root_attributes()?,
        };

        for attribute in candidates {
            if self.attribute_name(attribute)? == name {
                return Ok(Some(attribute));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_intersect() {
        let a = TimeRange::new(0, 100);
        assert_eq!(a.intersect(&TimeRange::new(50, 200)), Some(TimeRange::new(50, 100)));
        assert_eq!(a.intersect(&TimeRange::new(101, 200)), None);
        assert_eq!(a.intersect(&TimeRange::unbounded()), Some(a));
    }

    #[test]
    fn test_state_value_kind() {
        assert!(StateValue::Null.is_null());
        assert!(!StateValue::Int(0).is_null());
        assert_eq!(StateValue::Double(1.5).kind(), "double");
    }
}
