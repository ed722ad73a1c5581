//! Trace nodes.
//!
//! A [`TraceNode`] represents one execution context. It owns the frames
//! captured when the context was created and an accumulated map of frames
//! contributed by its causal ancestors. Edges point from a node to its
//! descendants and hold them by `Arc`, so a destroyed context stays alive
//! (detached) while an ancestor may still forward history through it.
//!
//! Each node also keeps weak handles to the ancestors that linked to it, so
//! destroying a context can revisit detached ancestors whose only route to
//! an active context went through it.
//!
//! Mutable state sits behind one `parking_lot::Mutex` per node. Callers
//! never hold two node locks at once: they snapshot what they need and
//! release before touching another node.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tether_core::{ContextId, FrameDescriptor, Frames};

/// Frames contributed per context, ordered by context ID.
pub type ContributionMap = BTreeMap<ContextId, Frames>;

/// Identity of a node allocation, used for visited sets.
///
/// Context IDs are not enough: a host may reuse an ID while the detached
/// node that carried it is still referenced.
pub(crate) type NodeKey = usize;

/// One execution context in the causal graph.
pub struct TraceNode {
    id: ContextId,
    frames: Frames,
    state: Mutex<NodeState>,
}

pub(crate) struct NodeState {
    pub(crate) accumulated: ContributionMap,
    pub(crate) edges: Vec<Arc<TraceNode>>,
    pub(crate) parents: Vec<Weak<TraceNode>>,
    pub(crate) descendant_count: usize,
    pub(crate) disabled: bool,
    pub(crate) detached: bool,
}

impl TraceNode {
    /// Create a node whose accumulated map starts as `{id: frames}`.
    pub fn new(id: ContextId, frames: impl Into<Frames>) -> Arc<Self> {
        let frames: Frames = frames.into();
        let mut accumulated = ContributionMap::new();
        let _ = accumulated.insert(id, Arc::clone(&frames));
        Arc::new(Self {
            id,
            frames,
            state: Mutex::new(NodeState {
                accumulated,
                edges: Vec::new(),
                parents: Vec::new(),
                descendant_count: 0,
                disabled: false,
                detached: false,
            }),
        })
    }

    /// The context ID.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Frames captured at creation. Never changes.
    pub fn frames(&self) -> &[FrameDescriptor] {
        &self.frames
    }

    /// Whether the fan-out guard disabled this node.
    pub fn is_disabled(&self) -> bool {
        self.state.lock().disabled
    }

    /// Whether the context was destroyed (removed from the registry).
    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    /// Current number of descendant edges.
    pub fn edge_count(&self) -> usize {
        self.state.lock().edges.len()
    }

    /// Number of descendant edges ever accepted.
    pub fn descendant_count(&self) -> usize {
        self.state.lock().descendant_count
    }

    /// Snapshot of the accumulated map. Frame sequences are shared, not copied.
    pub fn accumulated(&self) -> ContributionMap {
        self.state.lock().accumulated.clone()
    }

    /// IDs present in the accumulated map, ascending.
    pub fn contributors(&self) -> Vec<ContextId> {
        self.state.lock().accumulated.keys().copied().collect()
    }

    /// Snapshot of the descendant edges.
    pub fn descendants(&self) -> Vec<Arc<TraceNode>> {
        self.state.lock().edges.clone()
    }

    /// Whether `other` is a direct descendant, by node identity.
    pub fn has_descendant(&self, other: &Arc<TraceNode>) -> bool {
        self.state
            .lock()
            .edges
            .iter()
            .any(|e| Arc::ptr_eq(e, other))
    }

    /// Ancestors that linked to this node and are still alive. The edge
    /// back to this node may since have been released.
    pub(crate) fn parents(&self) -> Vec<Arc<TraceNode>> {
        self.state
            .lock()
            .parents
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Remember `parent` as an ancestor, dropping handles to freed ones.
    pub(crate) fn add_parent(&self, parent: &Arc<TraceNode>) {
        let weak = Arc::downgrade(parent);
        let mut state = self.state.lock();
        state.parents.retain(|p| p.strong_count() > 0);
        if !state.parents.iter().any(|p| p.ptr_eq(&weak)) {
            state.parents.push(weak);
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock()
    }

    pub(crate) fn key(&self) -> NodeKey {
        std::ptr::from_ref(self).addr()
    }

    pub(crate) fn mark_detached(&self) {
        self.state.lock().detached = true;
    }

    /// A node forwards history if it can still be rendered (active) or has
    /// descendants to pass it on to.
    pub(crate) fn is_forwarding(&self) -> bool {
        let state = self.state.lock();
        !state.detached || !state.edges.is_empty()
    }

    /// Take the edge set out of the node.
    ///
    /// The returned handles should be dropped after the lock is released.
    pub(crate) fn take_edges(&self) -> Vec<Arc<TraceNode>> {
        std::mem::take(&mut self.state.lock().edges)
    }
}

impl Drop for TraceNode {
    // Unlinks descendants iteratively so a long detached chain cannot
    // overflow the stack through nested `Arc` drops.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.state.get_mut().edges);
        while let Some(child) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(child) {
                pending.append(&mut node.state.get_mut().edges);
            }
        }
    }
}

impl fmt::Debug for TraceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TraceNode")
            .field("id", &self.id)
            .field("frames", &self.frames.len())
            .field("contributors", &state.accumulated.len())
            .field("edges", &state.edges.len())
            .field("disabled", &state.disabled)
            .field("detached", &state.detached)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::SourceLocation;

    fn cid(n: u64) -> ContextId {
        ContextId::new(n).unwrap()
    }

    fn frames(name: &str) -> Vec<FrameDescriptor> {
        vec![FrameDescriptor::call(name, SourceLocation::new("src/jobs.rs", 4, 1))]
    }

    #[test]
    fn new_node_accumulates_itself() {
        let node = TraceNode::new(cid(3), frames("spawn"));
        assert_eq!(node.id(), cid(3));
        assert_eq!(node.frames().len(), 1);
        assert_eq!(node.contributors(), vec![cid(3)]);
        assert_eq!(node.accumulated()[&cid(3)][0].text, "spawn");
        assert!(!node.is_disabled());
        assert!(!node.is_detached());
        assert_eq!(node.edge_count(), 0);
    }

    #[test]
    fn accumulated_snapshot_shares_frames() {
        let node = TraceNode::new(cid(1), frames("a"));
        let snapshot = node.accumulated();
        assert!(Arc::ptr_eq(&snapshot[&cid(1)], &node.frames));
    }

    #[test]
    fn forwarding_rules() {
        let parent = TraceNode::new(cid(1), frames("p"));
        let child = TraceNode::new(cid(2), frames("c"));
        assert!(child.is_forwarding());

        child.mark_detached();
        assert!(!child.is_forwarding());

        parent.mark_detached();
        parent.state().edges.push(Arc::clone(&child));
        assert!(parent.is_forwarding());
        assert!(parent.has_descendant(&child));
    }

    #[test]
    fn keys_distinguish_reused_ids() {
        let a = TraceNode::new(cid(7), frames("a"));
        let b = TraceNode::new(cid(7), frames("b"));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn parents_are_weak_and_deduplicated() {
        let child = TraceNode::new(cid(2), frames("c"));
        let parent = TraceNode::new(cid(1), frames("p"));
        child.add_parent(&parent);
        child.add_parent(&parent);
        assert_eq!(child.parents().len(), 1);
        assert_eq!(Arc::strong_count(&parent), 1);

        drop(parent);
        assert!(child.parents().is_empty());
        // the freed parent is pruned when the next one is added
        child.add_parent(&TraceNode::new(cid(3), frames("q")));
        assert_eq!(child.state().parents.len(), 1);
        assert!(child.parents().is_empty());
    }

    #[test]
    fn take_edges_empties_the_set() {
        let parent = TraceNode::new(cid(1), frames("p"));
        parent.state().edges.push(TraceNode::new(cid(2), frames("c")));
        let taken = parent.take_edges();
        assert_eq!(taken.len(), 1);
        assert_eq!(parent.edge_count(), 0);
    }

    #[test]
    fn dropping_a_long_chain_does_not_recurse() {
        let root = TraceNode::new(cid(1), frames("root"));
        let mut tail = Arc::clone(&root);
        for n in 2..200_000 {
            let next = TraceNode::new(cid(n), Vec::<FrameDescriptor>::new());
            tail.state().edges.push(Arc::clone(&next));
            tail = next;
        }
        drop(tail);
        drop(root);
    }

    #[test]
    fn debug_lists_counts() {
        let node = TraceNode::new(cid(5), frames("x"));
        let debug = format!("{node:?}");
        assert!(debug.contains("TraceNode"));
        assert!(debug.contains("contributors: 1"));
    }
}
