//! In-memory state system.
//!
//! Attributes form a tree addressed by slash-separated paths. Every attribute
//! keeps its intervals sorted by start time; ticks not covered by a stored
//! interval read back as `StateValue::Null`.

use super::{AttributeId, StateInterval, StateOracle, StateValue, TimeRange};
use crate::utils::error::OracleError;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};

/// One node of the attribute tree
#[derive(Debug)]
struct AttributeEntry {
    name: String,
    parent: Option<AttributeId>,
    children: Vec<AttributeId>,
    intervals: Vec<StateInterval>,
}

/// Attribute store answering `StateOracle` queries from memory
///
/// **Public** - used by the CLI and by tests as the query backend
#[derive(Debug)]
pub struct MemoryStateSystem {
    attributes: Vec<AttributeEntry>,
    roots: Vec<AttributeId>,
    start: i64,
    end: i64,
    disposed: AtomicBool,
}

impl MemoryStateSystem {
    /// Create an empty state system starting at `start`
    pub fn new(start: i64) -> Self {
        Self {
            attributes: Vec::new(),
            roots: Vec::new(),
            start,
            end: start,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn start_time(&self) -> i64 {
        self.start
    }

    pub fn end_time(&self) -> i64 {
        self.end
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Get the attribute at `path`, creating missing path elements
    pub fn attribute_for_path(&mut self, path: &[&str]) -> AttributeId {
        let mut parent: Option<AttributeId> = None;

        for name in path {
            let existing = self
                .siblings(parent)
                .iter()
                .copied()
                .find(|id| self.attributes[id.0].name == *name);

            let id = match existing {
                Some(id) => id,
                None => self.push_attribute(name, parent),
            };
            parent = Some(id);
        }

        // An empty path maps to an unnamed top-level attribute
        match parent {
            Some(id) => id,
            None => self.push_attribute("", None),
        }
    }

    /// Look up the attribute at `path` without creating it
    pub fn find_attribute(&self, path: &[&str]) -> Option<AttributeId> {
        let mut parent: Option<AttributeId> = None;

        for name in path {
            let id = self
                .siblings(parent)
                .iter()
                .copied()
                .find(|id| self.attributes[id.0].name == *name)?;
            parent = Some(id);
        }

        parent
    }

    /// Full slash-separated path of `attribute`
    pub fn attribute_path(&self, attribute: AttributeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(attribute);

        while let Some(id) = current {
            let entry = self.attributes.get(id.0)?;
            names.push(entry.name.as_str());
            current = entry.parent;
        }

        names.reverse();
        Some(names.join("/"))
    }

    /// Store `value` for `attribute` over `[start, end]` (inclusive)
    ///
    /// Intervals of one attribute must be appended in time order and must not
    /// overlap.
    ///
    /// # Errors
    /// * `OracleError::UnknownAttribute` - attribute was never created
    /// * `OracleError::InvalidInterval` - `start > end`
    /// * `OracleError::Overlap` - interval starts before the previous one ended
    pub fn add_interval(
        &mut self,
        attribute: AttributeId,
        start: i64,
        end: i64,
        value: StateValue,
    ) -> Result<(), OracleError> {
        if start > end {
            return Err(OracleError::InvalidInterval { start, end });
        }

        if start < self.start {
            return Err(OracleError::TimeRange {
                timestamp: start,
                start: self.start,
                end: self.end,
            });
        }

        let entry = self
            .attributes
            .get_mut(attribute.0)
            .ok_or(OracleError::UnknownAttribute(attribute))?;

        if let Some(last) = entry.intervals.last() {
            if start <= last.end {
                return Err(OracleError::Overlap { attribute, start });
            }
        }

        entry
            .intervals
            .push(StateInterval::new(start, end, attribute, value));
        self.end = self.end.max(end);

        Ok(())
    }

    /// Extend the queryable range up to `end`
    pub fn close(&mut self, end: i64) {
        self.end = self.end.max(end);
        debug!(
            "State system closed: [{}, {}] with {} attributes",
            self.start,
            self.end,
            self.attributes.len()
        );
    }

    /// Tear the store down; every later query fails with `OracleError::Disposed`
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn siblings(&self, parent: Option<AttributeId>) -> &[AttributeId] {
        match parent {
            Some(id) => &self.attributes[id.0].children,
            None => &self.roots,
        }
    }

    fn push_attribute(&mut self, name: &str, parent: Option<AttributeId>) -> AttributeId {
        let id = AttributeId(self.attributes.len());
        self.attributes.push(AttributeEntry {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            intervals: Vec::new(),
        });

        match parent {
            Some(parent) => self.attributes[parent.0].children.push(id),
            None => self.roots.push(id),
        }

        id
    }

    fn entry(&self, attribute: AttributeId) -> Result<&AttributeEntry, OracleError> {
        if self.is_disposed() {
            return Err(OracleError::Disposed);
        }

        self.attributes
            .get(attribute.0)
            .ok_or(OracleError::UnknownAttribute(attribute))
    }
}

impl StateOracle for MemoryStateSystem {
    fn query(&self, timestamp: i64, attribute: AttributeId) -> Result<StateInterval, OracleError> {
        let entry = self.entry(attribute)?;

        if !TimeRange::new(self.start, self.end).contains(timestamp) {
            return Err(OracleError::TimeRange {
                timestamp,
                start: self.start,
                end: self.end,
            });
        }

        // First interval that has not ended before `timestamp`
        let idx = entry.intervals.partition_point(|i| i.end < timestamp);

        if let Some(interval) = entry.intervals.get(idx) {
            if interval.start <= timestamp {
                return Ok(interval.clone());
            }
        }

        // Gap between stored intervals
        let gap_start = idx
            .checked_sub(1)
            .map(|prev| entry.intervals[prev].end + 1)
            .unwrap_or(self.start);
        let gap_end = entry
            .intervals
            .get(idx)
            .map(|next| next.start - 1)
            .unwrap_or(self.end);

        Ok(StateInterval::new(
            gap_start,
            gap_end,
            attribute,
            StateValue::Null,
        ))
    }

    fn child_attributes(&self, scope: AttributeId) -> Result<Vec<AttributeId>, OracleError> {
        Ok(self.entry(scope)?.children.clone())
    }

    fn query_range(&self, attribute: AttributeId) -> Result<TimeRange, OracleError> {
        self.entry(attribute)?;
        Ok(TimeRange::new(self.start, self.end))
    }

    fn root_attributes(&self) -> Result<Vec<AttributeId>, OracleError> {
        if self.is_disposed() {
            return Err(OracleError::Disposed);
        }
        Ok(self.roots.clone())
    }

    fn attribute_name(&self, attribute: AttributeId) -> Result<String, OracleError> {
        Ok(self.entry(attribute)?.name.clone())
    }
}
