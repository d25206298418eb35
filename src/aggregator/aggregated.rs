//! Symbol-aggregated call tree.
//!
//! Every call of the same function at the same call path is folded into one
//! `AggregatedNode`. A node keeps the summed duration and self time of all
//! its occurrences plus running statistics, so that after every fold
//! `duration == sum(child durations) + self_time` holds.
//!
//! Children live behind a per-node mutex. Readers never walk a live tree:
//! they clone the subtree they need (taking each node's lock in turn, top
//! down) and read the copy.

use super::statistics::CallStatistics;
use crate::callstack::{OccurrenceNode, Symbol};
use crate::utils::config::GroupBy;
use crate::utils::error::AggregateError;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

type ChildMap = HashMap<Symbol, AggregatedNode>;

fn lock(children: &Mutex<ChildMap>) -> MutexGuard<'_, ChildMap> {
    // A panic mid-fold leaves sums the way the last completed fold left them
    children.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One function at one call path, merged across all its occurrences
///
/// **Public** - the aggregated call graph handed to consumers
#[derive(Debug)]
pub struct AggregatedNode {
    symbol: Symbol,
    depth: u32,
    max_depth: u32,
    /// Process id or thread id, per `group_by`
    scope_id: i32,
    group_by: GroupBy,
    duration: i64,
    self_time: i64,
    statistics: CallStatistics,
    children: Mutex<ChildMap>,
}

impl AggregatedNode {
    /// Node holding a single occurrence, without its callees
    ///
    /// The occurrence's statistics are recorded here, once. The node's scope
    /// is the occurrence's process or thread, per `group_by`.
    pub fn from_occurrence(occurrence: &OccurrenceNode, group_by: GroupBy, max_depth: u32) -> Self {
        let mut statistics = CallStatistics::new();
        statistics.update(occurrence);

        Self {
            symbol: occurrence.symbol().clone(),
            depth: occurrence.depth(),
            max_depth,
            scope_id: scope_of(occurrence, group_by),
            group_by,
            duration: occurrence.duration(),
            self_time: occurrence.self_time(),
            statistics,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Fold `occurrence` (and its whole subtree) in as a callee of this node
    ///
    /// # Errors
    /// * `AggregateError::ScopeMismatch` - a node of the subtree belongs to
    ///   another process (or thread); nothing is folded
    /// * `AggregateError::DepthExceeded` - the subtree goes deeper than this
    ///   tree's depth bound; nothing is folded
    pub fn fold(&self, occurrence: &OccurrenceNode) -> Result<(), AggregateError> {
        check_subtree(occurrence, self.scope_id, self.group_by, self.max_depth)?;
        fold_into(&self.children, occurrence, self.group_by, self.max_depth);
        Ok(())
    }

    /// Merge another node of the same symbol and scope into this one
    ///
    /// Sums duration and self time, merges statistics and recursively merges
    /// the children maps key by key.
    ///
    /// # Errors
    /// * `AggregateError::SymbolMismatch` - nodes stand for different functions
    /// * `AggregateError::ScopeMismatch` - nodes come from different scopes
    pub fn merge(&mut self, source: AggregatedNode) -> Result<(), AggregateError> {
        if self.symbol != source.symbol {
            return Err(AggregateError::SymbolMismatch {
                destination_symbol: self.symbol.to_string(),
                source_symbol: source.symbol.to_string(),
            });
        }
        if self.group_by != source.group_by || self.scope_id != source.scope_id {
            return Err(AggregateError::ScopeMismatch {
                destination: self.scope_id,
                source_scope: source.scope_id,
            });
        }

        self.absorb(source);
        Ok(())
    }

    /// Merge without checks; callers guarantee symbol and scope match
    fn absorb(&mut self, source: AggregatedNode) {
        self.duration += source.duration;
        self.self_time += source.self_time;
        self.max_depth = self.max_depth.max(source.max_depth);
        self.statistics.merge(&source.statistics);

        let incoming = source
            .children
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        merge_children(self.children.get_mut().unwrap_or_else(PoisonError::into_inner), incoming);
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Process id or thread id of the scope this node belongs to
    pub fn scope_id(&self) -> i32 {
        self.scope_id
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// Summed duration of every merged occurrence
    pub fn duration(&self) -> i64 {
        self.duration
    }

    /// Summed self time of every merged occurrence
    pub fn self_time(&self) -> i64 {
        self.self_time
    }

    pub fn call_count(&self) -> u64 {
        self.statistics.call_count()
    }

    pub fn statistics(&self) -> &CallStatistics {
        &self.statistics
    }

    /// Snapshot of the callees, sorted by symbol
    pub fn children(&self) -> Vec<AggregatedNode> {
        snapshot_sorted(&self.children)
    }

    /// Snapshot of the callee for `symbol`
    pub fn child(&self, symbol: &Symbol) -> Option<AggregatedNode> {
        lock(&self.children).get(symbol).cloned()
    }

    pub fn child_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = lock(&self.children).keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn child_count(&self) -> usize {
        lock(&self.children).len()
    }

    fn snapshot_children(&self) -> ChildMap {
        lock(&self.children).clone()
    }
}

/// Deep copy: the whole subtree is duplicated and statistics are
/// re-aggregated into fresh accumulators
impl Clone for AggregatedNode {
    fn clone(&self) -> Self {
        let mut statistics = CallStatistics::new();
        statistics.merge(&self.statistics);

        Self {
            symbol: self.symbol.clone(),
            depth: self.depth,
            max_depth: self.max_depth,
            scope_id: self.scope_id,
            group_by: self.group_by,
            duration: self.duration,
            self_time: self.self_time,
            statistics,
            children: Mutex::new(self.snapshot_children()),
        }
    }
}

impl PartialEq for AggregatedNode {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }

        self.symbol == other.symbol
            && self.depth == other.depth
            && self.max_depth == other.max_depth
            && self.scope_id == other.scope_id
            && self.group_by == other.group_by
            && self.duration == other.duration
            && self.self_time == other.self_time
            && self.statistics == other.statistics
            // Compare copies so two nodes are never locked at once
            && self.snapshot_children() == other.snapshot_children()
    }
}

/// Forest root of one process (or thread) scope
///
/// Plays the part of the missing parent for top-level calls.
#[derive(Debug)]
pub struct ScopeNode {
    id: i32,
    group_by: GroupBy,
    max_depth: AtomicU32,
    roots: Mutex<ChildMap>,
}

impl ScopeNode {
    /// Forest of process `id`
    pub fn new(id: i32, max_depth: u32) -> Self {
        Self::grouped(id, GroupBy::Process, max_depth)
    }

    /// Forest of the process or thread `id`, per `group_by`
    pub fn grouped(id: i32, group_by: GroupBy, max_depth: u32) -> Self {
        Self {
            id,
            group_by,
            max_depth: AtomicU32::new(max_depth),
            roots: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// Depth bound of the trees in this scope
    pub fn max_depth(&self) -> u32 {
        self.max_depth.load(Ordering::Acquire)
    }

    /// Widen the depth bound when a deeper call stack joins the scope
    pub fn raise_max_depth(&self, max_depth: u32) {
        self.max_depth.fetch_max(max_depth, Ordering::AcqRel);
    }

    /// Fold a top-level occurrence tree into this scope
    ///
    /// # Errors
    /// * `AggregateError::ScopeMismatch` - the tree was recorded by another
    ///   process (or thread) than this scope's; nothing is folded
    /// * `AggregateError::DepthExceeded` - the tree goes deeper than the
    ///   scope's depth bound; nothing is folded
    pub fn fold(&self, root: &OccurrenceNode) -> Result<(), AggregateError> {
        let max_depth = self.max_depth();
        check_subtree(root, self.id, self.group_by, max_depth)?;
        fold_into(&self.roots, root, self.group_by, max_depth);
        Ok(())
    }

    /// Snapshot of the top-level nodes, sorted by symbol
    pub fn roots(&self) -> Vec<AggregatedNode> {
        snapshot_sorted(&self.roots)
    }

    /// Snapshot of the top-level node for `symbol`
    pub fn root(&self, symbol: &Symbol) -> Option<AggregatedNode> {
        lock(&self.roots).get(symbol).cloned()
    }

    pub fn root_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = lock(&self.roots).keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Time covered by every top-level call of the scope
    pub fn total_duration(&self) -> i64 {
        lock(&self.roots).values().map(AggregatedNode::duration).sum()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.roots).is_empty()
    }
}

impl Clone for ScopeNode {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            group_by: self.group_by,
            max_depth: AtomicU32::new(self.max_depth()),
            roots: Mutex::new(lock(&self.roots).clone()),
        }
    }
}

fn scope_of(occurrence: &OccurrenceNode, group_by: GroupBy) -> i32 {
    group_by.scope_key(occurrence.process_id(), occurrence.thread_id())
}

/// Every node of the subtree must belong to `scope_id` and fit the depth bound
fn check_subtree(
    occurrence: &OccurrenceNode,
    scope_id: i32,
    group_by: GroupBy,
    max_depth: u32,
) -> Result<(), AggregateError> {
    for node in occurrence.walk() {
        let source_scope = scope_of(node, group_by);
        if source_scope != scope_id {
            return Err(AggregateError::ScopeMismatch {
                destination: scope_id,
                source_scope,
            });
        }
        if node.depth() >= max_depth {
            return Err(AggregateError::DepthExceeded {
                depth: node.depth(),
                max_depth,
            });
        }
    }
    Ok(())
}

/// Merge-or-insert `occurrence` under `children`, then recurse into its callees
fn fold_into(
    children: &Mutex<ChildMap>,
    occurrence: &OccurrenceNode,
    group_by: GroupBy,
    max_depth: u32,
) {
    let minted = AggregatedNode::from_occurrence(occurrence, group_by, max_depth);

    let mut guard = lock(children);
    let node = match guard.entry(occurrence.symbol().clone()) {
        Entry::Vacant(slot) => slot.insert(minted),
        Entry::Occupied(slot) => {
            let node = slot.into_mut();
            node.absorb(minted);
            node
        }
    };

    for callee in occurrence.children() {
        fold_into(&node.children, callee, group_by, max_depth);
    }
}

fn merge_children(destination: &mut ChildMap, source: ChildMap) {
    for (symbol, child) in source {
        match destination.entry(symbol) {
            Entry::Vacant(slot) => {
                slot.insert(child);
            }
            Entry::Occupied(slot) => slot.into_mut().absorb(child),
        }
    }
}

fn snapshot_sorted(children: &Mutex<ChildMap>) -> Vec<AggregatedNode> {
    let mut nodes: Vec<AggregatedNode> = lock(children).values().cloned().collect();
    nodes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    nodes
}
