//! Trace registry.
//!
//! Maps live context IDs to their [`TraceNode`]s. Lifecycle events land
//! here first: `create` inserts and links to the trigger, `destroy` removes,
//! and `settle` adds a late causal link. Every lookup miss is a no-op, since
//! hosts deliver these notifications in no guaranteed order.
//!
//! Removal detaches a node but does not free it. An ancestor's edge keeps it
//! alive for as long as history may still flow through it. Each removal
//! re-checks the removed node and its detached ancestors, and any of them
//! that can no longer reach an active node drops its edges. Detached cycles
//! are broken that way.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tether_core::{ContextId, Frames};
use tracing::{debug, trace};

use crate::node::{NodeKey, TraceNode};
use crate::recorder::{EdgeOutcome, Recorder};

/// Live nodes keyed by context ID.
pub struct Registry {
    nodes: RwLock<HashMap<ContextId, Arc<TraceNode>>>,
    recorder: Recorder,
}

impl Registry {
    /// Create an empty registry that links nodes with `recorder`.
    #[must_use]
    pub fn new(recorder: Recorder) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            recorder,
        }
    }

    /// The recorder used for edge insertion.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Look up an active node.
    #[must_use]
    pub fn get(&self, id: ContextId) -> Option<Arc<TraceNode>> {
        self.nodes.read().get(&id).cloned()
    }

    /// Whether `id` is active.
    #[must_use]
    pub fn contains(&self, id: ContextId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    /// Number of active nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether no node is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// All active nodes, ascending by ID.
    #[must_use]
    pub fn active_nodes(&self) -> Vec<Arc<TraceNode>> {
        let mut nodes: Vec<_> = self.nodes.read().values().cloned().collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }

    /// Insert a node for `id` with the given creation frames.
    ///
    /// A node already registered under `id` is detached first. If `trigger`
    /// is active, records the edge `trigger -> id` and returns its outcome.
    pub fn create(
        &self,
        id: ContextId,
        trigger: Option<ContextId>,
        frames: impl Into<Frames>,
    ) -> Option<EdgeOutcome> {
        let node = TraceNode::new(id, frames);
        let replaced = self.nodes.write().insert(id, Arc::clone(&node));
        if let Some(previous) = replaced {
            debug!(id = %id, "context id reused, detaching previous node");
            self.detach(&previous);
        }

        let ancestor = trigger.and_then(|t| self.get(t))?;
        Some(self.recorder.record_edge(&ancestor, &node))
    }

    /// Remove `id`. Returns `false` if it was not active.
    pub fn destroy(&self, id: ContextId) -> bool {
        let removed = self.nodes.write().remove(&id);
        match removed {
            Some(node) => {
                self.detach(&node);
                true
            }
            None => false,
        }
    }

    /// Record the edge `trigger -> id` if both are active.
    pub fn settle(&self, id: ContextId, trigger: Option<ContextId>) -> Option<EdgeOutcome> {
        let (ancestor, descendant) = {
            let nodes = self.nodes.read();
            (Arc::clone(nodes.get(&trigger?)?), Arc::clone(nodes.get(&id)?))
        };
        Some(self.recorder.record_edge(&ancestor, &descendant))
    }

    /// Remove every node. Returns how many were active.
    pub fn clear(&self) -> usize {
        let drained: Vec<_> = self.nodes.write().drain().map(|(_, node)| node).collect();
        for node in &drained {
            node.mark_detached();
        }
        for node in &drained {
            drop(node.take_edges());
        }
        drained.len()
    }

    /// Mark `node` detached, then release the edges of it and of every
    /// detached ancestor that no longer reaches an active node.
    fn detach(&self, node: &Arc<TraceNode>) {
        node.mark_detached();
        for candidate in self.detached_ancestry(node) {
            if self.reaches_active(&candidate) {
                continue;
            }
            let released = candidate.take_edges();
            if !released.is_empty() {
                trace!(
                    id = %candidate.id(),
                    released = released.len(),
                    "released edges of detached node"
                );
            }
        }
    }

    /// `node` followed by its detached ancestors within the depth cap,
    /// nearest first. The walk stops at active ancestors, which stay
    /// reachable for everything above them.
    fn detached_ancestry(&self, node: &Arc<TraceNode>) -> Vec<Arc<TraceNode>> {
        let mut visited: HashSet<NodeKey> = HashSet::new();
        let _ = visited.insert(node.key());
        let mut found = vec![Arc::clone(node)];
        let mut frontier = vec![Arc::clone(node)];
        let mut depth = 0;
        while !frontier.is_empty() && depth < self.recorder.depth_cap() {
            let mut next = Vec::new();
            for current in &frontier {
                for parent in current.parents() {
                    if parent.is_detached() && visited.insert(parent.key()) {
                        next.push(parent);
                    }
                }
            }
            found.extend(next.iter().cloned());
            frontier = next;
            depth += 1;
        }
        found
    }

    /// Whether any active node is reachable from `root` within the depth cap.
    fn reaches_active(&self, root: &Arc<TraceNode>) -> bool {
        let mut visited: HashSet<NodeKey> = HashSet::new();
        let _ = visited.insert(root.key());
        let mut frontier = root.descendants();
        let mut depth = 1;
        while !frontier.is_empty() && depth <= self.recorder.depth_cap() {
            let mut next = Vec::new();
            for node in frontier {
                if !visited.insert(node.key()) {
                    continue;
                }
                if !node.is_detached() {
                    return true;
                }
                next.extend(node.descendants());
            }
            frontier = next;
            depth += 1;
        }
        false
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("active", &self.len())
            .field("recorder", &self.recorder)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
