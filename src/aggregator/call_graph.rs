//! Drive call tree construction and aggregation over many call stacks.
//!
//! For every call stack scope the builder produces occurrence trees, and each
//! completed root is folded into the aggregated forest of the scope's process
//! (or thread, depending on `GroupBy`).

use super::aggregated::ScopeNode;
use crate::callstack::{build_occurrence_tree, BuildOutcome, BuildStatus, CallStackScope, CancellationToken};
use crate::oracle::{StateOracle, TimeRange};
use crate::utils::config::GroupBy;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call stack (or one of its roots) that could not be analysed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeFailure {
    pub process_id: i32,
    pub thread_id: i32,

    /// Start of the failing root; `None` when the whole call stack failed
    pub start: Option<i64>,

    pub message: String,
}

/// What one `CallGraph::analyze` run did
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub scopes_analyzed: usize,
    pub roots_built: usize,
    pub roots_folded: usize,
    pub failures: Vec<ScopeFailure>,
    pub status: BuildStatus,
}

impl Default for AnalysisSummary {
    fn default() -> Self {
        Self {
            scopes_analyzed: 0,
            roots_built: 0,
            roots_folded: 0,
            failures: Vec::new(),
            status: BuildStatus::Completed,
        }
    }
}

/// Aggregated call graph of a whole state system, one forest per scope id
///
/// **Public** - owner of every `ScopeNode`
#[derive(Debug, Default)]
pub struct CallGraph {
    group_by: GroupBy,
    scopes: Mutex<BTreeMap<i32, Arc<ScopeNode>>>,
}

impl CallGraph {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            scopes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// Key of the forest `scope` is folded into
    pub fn scope_key(&self, scope: &CallStackScope) -> i32 {
        self.group_by.scope_key(scope.process_id, scope.thread_id)
    }

    fn lock_scopes(&self) -> MutexGuard<'_, BTreeMap<i32, Arc<ScopeNode>>> {
        self.scopes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forest for `id`, created on first use
    ///
    /// An existing forest has its depth bound raised to `max_depth` if needed.
    pub fn scope(&self, id: i32, max_depth: u32) -> Arc<ScopeNode> {
        let node = {
            let mut scopes = self.lock_scopes();
            Arc::clone(
                scopes
                    .entry(id)
                    .or_insert_with(|| Arc::new(ScopeNode::grouped(id, self.group_by, max_depth))),
            )
        };
        node.raise_max_depth(max_depth);
        node
    }

    /// Fold the roots of one build into `scope`
    ///
    /// A root interrupted by cancellation is folded only with `accept_partial`.
    /// Returns the number of roots folded; rejected roots are logged and
    /// reported as failures.
    pub fn fold_outcome(
        &self,
        scope: &CallStackScope,
        outcome: &BuildOutcome,
        accept_partial: bool,
    ) -> (usize, Vec<ScopeFailure>) {
        let roots = if accept_partial {
            &outcome.roots[..]
        } else {
            outcome.complete_roots()
        };

        if outcome.partial_root && !accept_partial {
            debug!(
                "Skipping partial root of thread {}/{}",
                scope.process_id, scope.thread_id
            );
        }

        // Scopes with nothing to fold get no forest
        if roots.is_empty() {
            return (0, Vec::new());
        }

        let node = self.scope(self.scope_key(scope), outcome.max_depth);
        let mut folded = 0;
        let mut failures = Vec::new();

        for root in roots {
            match node.fold(root) {
                Ok(()) => folded += 1,
                Err(e) => {
                    warn!("Could not fold root at {}: {}", root.start(), e);
                    failures.push(ScopeFailure {
                        process_id: scope.process_id,
                        thread_id: scope.thread_id,
                        start: Some(root.start()),
                        message: e.to_string(),
                    });
                }
            }
        }

        (folded, failures)
    }

    /// Build and fold every call stack in `scopes`
    ///
    /// **Public** - main entry point of the aggregation driver
    ///
    /// # Arguments
    /// * `oracle` - State the call stacks are read from
    /// * `scopes` - Call stacks to analyse
    /// * `window` - Time window, clamped per call stack to the oracle's range
    /// * `accept_partial` - Fold roots interrupted by cancellation
    /// * `cancel` - Stops the run between and inside call stacks
    ///
    /// # Returns
    /// Counters and failures of the run. Failures never abort the run.
    pub fn analyze<O: StateOracle + ?Sized>(
        &self,
        oracle: &O,
        scopes: &[CallStackScope],
        window: TimeRange,
        accept_partial: bool,
        cancel: &CancellationToken,
    ) -> AnalysisSummary {
        let mut summary = AnalysisSummary::default();

        info!(
            "Analysing {} call stacks over [{}, {}]",
            scopes.len(),
            window.start,
            window.end
        );

        for scope in scopes {
            if cancel.is_cancelled() {
                summary.status = BuildStatus::Cancelled;
                break;
            }

            let outcome = match build_occurrence_tree(oracle, scope, window, cancel) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        "Call stack of thread {}/{} unreadable: {}",
                        scope.process_id, scope.thread_id, e
                    );
                    summary.failures.push(ScopeFailure {
                        process_id: scope.process_id,
                        thread_id: scope.thread_id,
                        start: None,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            summary.scopes_analyzed += 1;
            summary.roots_built += outcome.roots.len();
            summary
                .failures
                .extend(outcome.failures.iter().map(|failure| ScopeFailure {
                    process_id: scope.process_id,
                    thread_id: scope.thread_id,
                    start: Some(failure.start),
                    message: failure.error.to_string(),
                }));

            let (folded, failures) = self.fold_outcome(scope, &outcome, accept_partial);
            summary.roots_folded += folded;
            summary.failures.extend(failures);

            if !outcome.is_complete() {
                summary.status = BuildStatus::Cancelled;
                break;
            }
        }

        info!(
            "Folded {} of {} roots from {} call stacks ({} failures, {:?})",
            summary.roots_folded,
            summary.roots_built,
            summary.scopes_analyzed,
            summary.failures.len(),
            summary.status
        );

        summary
    }

    /// Deep copy of the forest for `id`
    pub fn snapshot(&self, id: i32) -> Option<ScopeNode> {
        let node = self.lock_scopes().get(&id).cloned()?;
        // The map lock is released before the forest is copied
        Some(ScopeNode::clone(&node))
    }

    /// Deep copies of every forest, by ascending id
    pub fn snapshots(&self) -> Vec<ScopeNode> {
        let nodes: Vec<Arc<ScopeNode>> = self.lock_scopes().values().cloned().collect();
        nodes.iter().map(|node| ScopeNode::clone(node)).collect()
    }

    pub fn scope_ids(&self) -> Vec<i32> {
        self.lock_scopes().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callstack::Symbol;
    use crate::oracle::{CallStackRecorder, StateValue};

    fn name(s: &str) -> StateValue {
        StateValue::Str(s.to_string())
    }

    #[test]
    fn test_scope_reused_and_depth_raised() {
        let graph = CallGraph::new(GroupBy::Process);
        let a = graph.scope(7, 2);
        let b = graph.scope(7, 5);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.max_depth(), 5);
        assert_eq!(graph.scope_ids(), vec![7]);
    }

    #[test]
    fn test_threads_grouped_by_process() {
        let mut recorder = CallStackRecorder::new(0);
        recorder.enter(0, 1, 10, name("main")).unwrap();
        recorder.enter(0, 1, 11, name("main")).unwrap();
        recorder.exit(40, 1, 10).unwrap();
        recorder.exit(60, 1, 11).unwrap();
        let ss = recorder.finish(100).unwrap();
        let scopes = crate::callstack::discover_call_stacks(&ss).unwrap();

        let graph = CallGraph::new(GroupBy::Process);
        let summary = graph.analyze(
            &ss,
            &scopes,
            TimeRange::unbounded(),
            false,
            &CancellationToken::new(),
        );

        assert_eq!(summary.scopes_analyzed, 2);
        assert_eq!(summary.roots_folded, 2);
        let forest = graph.snapshot(1).unwrap();
        let main = forest.root(&Symbol::from("main")).unwrap();
        assert_eq!(main.call_count(), 2);
        assert_eq!(main.duration(), 100);

        let by_thread = CallGraph::new(GroupBy::Thread);
        by_thread.analyze(
            &ss,
            &scopes,
            TimeRange::unbounded(),
            false,
            &CancellationToken::new(),
        );
        assert_eq!(by_thread.scope_ids(), vec![10, 11]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let graph = CallGraph::new(GroupBy::Process);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let scope = CallStackScope {
            process_id: 1,
            thread_id: 1,
            attribute: crate::oracle::AttributeId(0),
        };
        let ss = crate::oracle::MemoryStateSystem::new(0);
        let summary = graph.analyze(&ss, &[scope], TimeRange::unbounded(), false, &cancel);

        assert_eq!(summary.status, BuildStatus::Cancelled);
        assert_eq!(summary.scopes_analyzed, 0);
        assert!(graph.scope_ids().is_empty());
    }
}
