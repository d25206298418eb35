//! Per-invocation call tree nodes.
//!
//! An `OccurrenceNode` stands for one real function call. Its `self_time`
//! starts at the full call duration and shrinks by each child's duration as
//! the child is attached, so a finished tree always satisfies
//! `self_time == duration - sum(child durations)`.

use super::symbol::Symbol;
use crate::utils::error::NodeError;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identity of an occurrence node
///
/// Used as the non-owning parent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One function invocation with its callees
///
/// **Public** - produced by the builder, consumed by the aggregator
#[derive(Debug, Clone)]
pub struct OccurrenceNode {
    id: NodeId,
    parent: Option<NodeId>,
    symbol: Symbol,
    /// First tick of the call
    start: i64,
    /// One past the last tick of the call
    end: i64,
    depth: u32,
    process_id: i32,
    thread_id: i32,
    self_time: i64,
    children: Vec<OccurrenceNode>,
}

impl OccurrenceNode {
    /// Create a node for `[start, end)` at `depth`
    ///
    /// `parent` is only recorded as a link; the node still has to be handed
    /// to `parent.add_child` to become part of the tree.
    ///
    /// # Errors
    /// * `NodeError::InvalidInterval` - `start > end`
    pub fn new(
        symbol: Symbol,
        start: i64,
        end: i64,
        depth: u32,
        process_id: i32,
        thread_id: i32,
        parent: Option<&OccurrenceNode>,
    ) -> Result<Self, NodeError> {
        if start > end {
            return Err(NodeError::InvalidInterval { start, end });
        }

        Ok(Self {
            id: NodeId::next(),
            parent: parent.map(|p| p.id),
            symbol,
            start,
            end,
            depth,
            process_id,
            thread_id,
            self_time: end - start,
            children: Vec::new(),
        })
    }

    /// Attach a fully built child and subtract its duration from self time
    ///
    /// # Errors
    /// * `NodeError::ParentMismatch` - the child was created for another parent
    /// * `NodeError::DuplicateChild` - a node with the same id (a clone of the
    ///   child) is already attached
    pub fn add_child(&mut self, child: OccurrenceNode) -> Result<(), NodeError> {
        if child.parent != Some(self.id) {
            return Err(NodeError::ParentMismatch);
        }
        if self.children.iter().any(|attached| attached.id == child.id) {
            return Err(NodeError::DuplicateChild);
        }

        self.self_time -= child.duration();
        self.children.push(child);
        Ok(())
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    pub fn thread_id(&self) -> i32 {
        self.thread_id
    }

    pub fn self_time(&self) -> i64 {
        self.self_time
    }

    pub fn children(&self) -> &[OccurrenceNode] {
        &self.children
    }

    /// Pre-order traversal of this node and all its descendants
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Find a node of this subtree by id (resolves parent links)
    pub fn find(&self, id: NodeId) -> Option<&OccurrenceNode> {
        self.walk().find(|node| node.id == id)
    }

    /// Deepest depth reached in this subtree
    pub fn max_depth(&self) -> u32 {
        self.walk().map(|node| node.depth).max().unwrap_or(self.depth)
    }
}

/// Structural equality; identity and parent links are ignored
impl PartialEq for OccurrenceNode {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
            && self.start == other.start
            && self.end == other.end
            && self.depth == other.depth
            && self.self_time == other.self_time
    }
}

impl Eq for OccurrenceNode {}

/// Iterator returned by `OccurrenceNode::walk`
pub struct Walk<'a> {
    stack: Vec<&'a OccurrenceNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a OccurrenceNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, start: i64, end: i64, depth: u32, parent: Option<&OccurrenceNode>) -> OccurrenceNode {
        OccurrenceNode::new(Symbol::from(name), start, end, depth, 1, 1, parent).unwrap()
    }

    #[test]
    fn test_self_time_shrinks_with_children() {
        let mut a = node("A", 0, 100, 0, None);
        let b1 = node("B", 10, 30, 1, Some(&a));
        let b2 = node("B", 50, 60, 1, Some(&a));
        a.add_child(b1).unwrap();
        a.add_child(b2).unwrap();

        assert_eq!(a.duration(), 100);
        assert_eq!(a.self_time(), 70);
        assert_eq!(a.children().len(), 2);
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let result = OccurrenceNode::new(Symbol::Int(1), 10, 5, 0, 1, 1, None);
        assert_eq!(result, Err(NodeError::InvalidInterval { start: 10, end: 5 }));
    }

    #[test]
    fn test_add_child_checks_parent() {
        let mut a = node("A", 0, 100, 0, None);
        let other = node("X", 0, 100, 0, None);
        let stray = node("B", 10, 20, 1, Some(&other));
        let orphan = node("C", 10, 20, 1, None);

        assert_eq!(a.add_child(stray), Err(NodeError::ParentMismatch));
        assert_eq!(a.add_child(orphan), Err(NodeError::ParentMismatch));
        assert_eq!(a.self_time(), 100);
    }

    #[test]
    fn test_cloned_child_attached_once() {
        let mut a = node("A", 0, 100, 0, None);
        let b = node("B", 10, 30, 1, Some(&a));

        a.add_child(b.clone()).unwrap();
        assert_eq!(a.add_child(b), Err(NodeError::DuplicateChild));
        assert_eq!(a.children().len(), 1);
        assert_eq!(a.self_time(), 80);
    }

    #[test]
    fn test_equality_ignores_identity() {
        let a = node("A", 0, 10, 0, None);
        let b = node("A", 0, 10, 0, None);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_walk_and_find() {
        let mut a = node("A", 0, 100, 0, None);
        let mut b = node("B", 10, 50, 1, Some(&a));
        let c = node("C", 20, 30, 2, Some(&b));
        let c_id = c.id();
        b.add_child(c).unwrap();
        let b_id = b.id();
        a.add_child(b).unwrap();

        let names: Vec<String> = a.walk().map(|n| n.symbol().to_string()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        let c = a.find(c_id).unwrap();
        assert_eq!(c.parent(), Some(b_id));
        assert_eq!(a.find(c.parent().unwrap()).unwrap().symbol(), &Symbol::from("B"));
        assert_eq!(a.max_depth(), 2);
    }
}
