//! Build per-occurrence call trees from call stack state.
//!
//! # Algorithm
//! 1. Scan depth `0` over the requested window; every non-null interval is
//!    the root of one call tree
//! 2. For each node, scan the next depth attribute inside the node's bounds
//! 3. Build each child's own subtree before attaching it, so the parent only
//!    subtracts the child's span from its self time
//! 4. Stop descending when the call stack has no deeper depth attribute

use super::occurrence::OccurrenceNode;
use super::scope::CallStackScope;
use super::symbol::Symbol;
use crate::oracle::{AttributeId, StateInterval, StateOracle, TimeRange};
use crate::utils::error::{BuildError, OracleError};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared with the orchestrator
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Whether a build ran to the end of its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Completed,
    Cancelled,
}

/// A call stack root whose tree could not be built
#[derive(Debug, Clone, PartialEq)]
pub struct RootFailure {
    /// Start of the failing root call, or the scan position if the root
    /// interval itself could not be read
    pub start: i64,
    pub error: BuildError,
}

/// Result of building every root of one call stack
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Call trees found, in time order
    pub roots: Vec<OccurrenceNode>,

    /// Roots abandoned because of construction or query errors
    pub failures: Vec<RootFailure>,

    pub status: BuildStatus,

    /// Number of depth slots of the call stack
    pub max_depth: u32,

    /// The last root was interrupted by cancellation and is incomplete
    pub partial_root: bool,
}

impl BuildOutcome {
    fn empty(max_depth: u32) -> Self {
        Self {
            roots: Vec::new(),
            failures: Vec::new(),
            status: BuildStatus::Completed,
            max_depth,
            partial_root: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == BuildStatus::Completed
    }

    /// Roots whose whole tree was built
    pub fn complete_roots(&self) -> &[OccurrenceNode] {
        if self.partial_root {
            &self.roots[..self.roots.len() - 1]
        } else {
            &self.roots
        }
    }
}

/// Build the occurrence trees of one call stack within `window`
///
/// **Public** - main entry point of call tree construction
///
/// # Arguments
/// * `oracle` - State to read the call stack from
/// * `scope` - Call stack attribute and its process/thread ids
/// * `window` - Inclusive time window; clamped to the oracle's query range
/// * `cancel` - Polled before every query and every descent
///
/// # Returns
/// Roots built so far, failed roots and whether the scan finished
///
/// # Errors
/// Only when the scope itself cannot be read (depth slots or query range);
/// per-root failures are reported inside the outcome.
pub fn build_occurrence_tree<O: StateOracle + ?Sized>(
    oracle: &O,
    scope: &CallStackScope,
    window: TimeRange,
    cancel: &CancellationToken,
) -> Result<BuildOutcome, BuildError> {
    let depth_attributes = oracle.child_attributes(scope.attribute)?;
    let mut outcome = BuildOutcome::empty(depth_attributes.len() as u32);

    let Some(&root_attribute) = depth_attributes.first() else {
        debug!(
            "Call stack of thread {}/{} has no depth attributes",
            scope.process_id, scope.thread_id
        );
        return Ok(outcome);
    };

    let range = oracle.query_range(root_attribute)?;
    let Some(window) = window.intersect(&range) else {
        debug!(
            "Window does not overlap state range [{}, {}]",
            range.start, range.end
        );
        return Ok(outcome);
    };

    debug!(
        "Building call trees for thread {}/{} over [{}, {}] ({} depth slots)",
        scope.process_id,
        scope.thread_id,
        window.start,
        window.end,
        depth_attributes.len()
    );

    let mut current = window.start;
    while current <= window.end {
        if cancel.is_cancelled() {
            outcome.status = BuildStatus::Cancelled;
            break;
        }

        let interval = match oracle.query(current, root_attribute) {
            Ok(interval) => interval,
            Err(error) => {
                warn!("Root scan stopped at {}: {}", current, error);
                outcome.failures.push(RootFailure {
                    start: current,
                    error: error.into(),
                });
                break;
            }
        };

        if !interval.value.is_null() {
            match build_root(oracle, scope, &interval, &depth_attributes, cancel) {
                Ok((root, completed)) => {
                    outcome.roots.push(root);
                    if !completed {
                        outcome.status = BuildStatus::Cancelled;
                        outcome.partial_root = true;
                        break;
                    }
                }
                Err(error) => {
                    warn!("Dropping call tree rooted at {}: {}", interval.start, error);
                    let disposed = error == BuildError::Oracle(OracleError::Disposed);
                    outcome.failures.push(RootFailure {
                        start: interval.start,
                        error,
                    });
                    if disposed {
                        break;
                    }
                }
            }
        }

        match interval.end.checked_add(1) {
            Some(next) => current = next,
            None => break,
        }
    }

    debug!(
        "Built {} roots ({} failed, {:?})",
        outcome.roots.len(),
        outcome.failures.len(),
        outcome.status
    );

    Ok(outcome)
}

/// Build one root and its whole subtree
///
/// Returns the root and whether its subtree is complete.
fn build_root<O: StateOracle + ?Sized>(
    oracle: &O,
    scope: &CallStackScope,
    interval: &StateInterval,
    depth_attributes: &[AttributeId],
    cancel: &CancellationToken,
) -> Result<(OccurrenceNode, bool), BuildError> {
    let symbol = Symbol::try_from(&interval.value)?;
    let mut root = OccurrenceNode::new(
        symbol,
        interval.start,
        interval.end.saturating_add(1),
        0,
        scope.process_id,
        scope.thread_id,
        None,
    )?;

    let completed = fill_children(oracle, &mut root, depth_attributes, cancel)?;
    Ok((root, completed))
}

/// Attach every call found one depth below `parent` within its bounds
///
/// Returns `Ok(false)` when cancelled; children attached so far stay valid.
fn fill_children<O: StateOracle + ?Sized>(
    oracle: &O,
    parent: &mut OccurrenceNode,
    depth_attributes: &[AttributeId],
    cancel: &CancellationToken,
) -> Result<bool, BuildError> {
    if cancel.is_cancelled() {
        return Ok(false);
    }

    let child_depth = parent.depth() + 1;
    let Some(&attribute) = depth_attributes.get(child_depth as usize) else {
        return Ok(true);
    };

    let mut current = parent.start();
    while current < parent.end() {
        if cancel.is_cancelled() {
            return Ok(false);
        }

        let interval = oracle.query(current, attribute)?;
        let next = interval.end.saturating_add(1);

        if interval.value.is_null() {
            current = next;
            continue;
        }

        // A callee outliving its caller means inconsistent state; keep what we have
        if interval.start < parent.start() || next > parent.end() {
            debug!(
                "Call [{}, {}] at depth {} not nested in [{}, {}); truncating branch",
                interval.start,
                interval.end,
                child_depth,
                parent.start(),
                parent.end()
            );
            break;
        }

        let symbol = Symbol::try_from(&interval.value)?;
        let mut child = OccurrenceNode::new(
            symbol,
            interval.start,
            next,
            child_depth,
            parent.process_id(),
            parent.thread_id(),
            Some(&*parent),
        )?;

        let completed = fill_children(oracle, &mut child, depth_attributes, cancel)?;
        parent.add_child(child)?;

        if !completed {
            return Ok(false);
        }
        current = next;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{MemoryStateSystem, StateValue};

    fn state_with_depths(depths: usize) -> (MemoryStateSystem, CallStackScope, Vec<AttributeId>) {
        let mut ss = MemoryStateSystem::new(0);
        let callstack = ss.attribute_for_path(&["Processes", "1", "Threads", "2", "CallStack"]);
        let attributes = (1..=depths)
            .map(|d| {
                let name = d.to_string();
                ss.attribute_for_path(&["Processes", "1", "Threads", "2", "CallStack", &name])
            })
            .collect();
        let scope = CallStackScope {
            process_id: 1,
            thread_id: 2,
            attribute: callstack,
        };
        (ss, scope, attributes)
    }

    fn name(s: &str) -> StateValue {
        StateValue::Str(s.to_string())
    }

    #[test]
    fn test_child_outliving_parent_truncates_branch() {
        let (mut ss, scope, attrs) = state_with_depths(2);
        ss.add_interval(attrs[0], 0, 49, name("A")).unwrap();
        ss.add_interval(attrs[1], 10, 19, name("B")).unwrap();
        ss.add_interval(attrs[1], 40, 59, name("C")).unwrap();
        ss.close(100);

        let outcome =
            build_occurrence_tree(&ss, &scope, TimeRange::unbounded(), &CancellationToken::new())
                .unwrap();

        assert_eq!(outcome.roots.len(), 1);
        let root = &outcome.roots[0];
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].symbol(), &Symbol::from("B"));
        assert_eq!(root.self_time(), 40);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_callee_on_caller_boundary_ticks_is_nested() {
        let (mut ss, scope, attrs) = state_with_depths(2);
        ss.add_interval(attrs[0], 0, 49, name("A")).unwrap();
        // B starts on A's first tick, C ends on A's last one
        ss.add_interval(attrs[1], 0, 9, name("B")).unwrap();
        ss.add_interval(attrs[1], 40, 49, name("C")).unwrap();
        ss.close(100);

        let outcome =
            build_occurrence_tree(&ss, &scope, TimeRange::unbounded(), &CancellationToken::new())
                .unwrap();

        let root = &outcome.roots[0];
        assert_eq!((root.start(), root.end()), (0, 50));
        let spans: Vec<(i64, i64)> = root.children().iter().map(|c| (c.start(), c.end())).collect();
        assert_eq!(spans, vec![(0, 10), (40, 50)]);
        assert_eq!(root.self_time(), 30);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_pre_cancelled_build_is_empty() {
        let (mut ss, scope, attrs) = state_with_depths(1);
        ss.add_interval(attrs[0], 0, 9, name("A")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = build_occurrence_tree(&ss, &scope, TimeRange::unbounded(), &cancel).unwrap();
        assert!(outcome.roots.is_empty());
        assert_eq!(outcome.status, BuildStatus::Cancelled);
        assert!(!outcome.partial_root);
    }

    #[test]
    fn test_scope_without_depths() {
        let (ss, scope, _) = state_with_depths(0);
        let outcome =
            build_occurrence_tree(&ss, &scope, TimeRange::unbounded(), &CancellationToken::new())
                .unwrap();
        assert!(outcome.roots.is_empty());
        assert_eq!(outcome.max_depth, 0);
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_window_outside_state_range() {
        let (mut ss, scope, attrs) = state_with_depths(1);
        ss.add_interval(attrs[0], 0, 9, name("A")).unwrap();

        let outcome = build_occurrence_tree(
            &ss,
            &scope,
            TimeRange::new(500, 600),
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(outcome.roots.is_empty());
        assert!(outcome.failures.is_empty());
    }
}
