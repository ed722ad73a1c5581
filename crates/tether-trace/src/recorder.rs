//! Causality recorder.
//!
//! Records "ancestor caused descendant" edges and pushes the ancestor's
//! accumulated history down into everything reachable from the descendant.
//!
//! ## Bounds
//!
//! - **Fan-out**: a node that would accept more than `fan_out_cap`
//!   descendants is disabled for good. Its edges are dropped and it never
//!   forwards history again. A loop spawning thousands of short-lived tasks
//!   from one context therefore costs at most `fan_out_cap` edges.
//! - **Depth**: propagation stops `depth_cap` hops below the ancestor.
//! - **Join**: every map that receives history is trimmed by the
//!   [`BoundEnforcer`].
//!
//! Work per edge depends only on these caps, never on the size of the
//! whole graph. The graph may contain cycles (hosts can report conflicting
//! triggers), so every traversal carries a visited set.

use std::collections::HashSet;
use std::sync::Arc;

use tether_settings::TraceSettings;
use tracing::{debug, trace};

use crate::bound::BoundEnforcer;
use crate::node::{ContributionMap, NodeKey, TraceNode};

/// Result of [`Recorder::record_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// The edge was added and history reached `reached` nodes.
    Inserted {
        /// Nodes that received the ancestor's history.
        reached: usize,
    },
    /// The edge already existed.
    Duplicate,
    /// Ancestor and descendant are the same node.
    SelfLink,
    /// The ancestor is disabled and accepts no edges.
    Rejected,
    /// This edge tripped the fan-out guard; the ancestor is now disabled.
    FanOutExceeded,
}

/// Records causal edges under fan-out, depth, and join bounds.
#[derive(Clone, Debug)]
pub struct Recorder {
    fan_out_cap: usize,
    depth_cap: usize,
    bound: BoundEnforcer,
}

impl Recorder {
    /// Create a recorder with explicit caps.
    pub fn new(fan_out_cap: usize, depth_cap: usize, bound: BoundEnforcer) -> Self {
        Self {
            fan_out_cap,
            depth_cap,
            bound,
        }
    }

    /// Create a recorder from trace settings.
    pub fn from_settings(settings: &TraceSettings) -> Self {
        Self::new(
            settings.fan_out_cap,
            settings.depth_cap,
            BoundEnforcer::new(settings.join_cap),
        )
    }

    /// Traversal depth cap.
    pub fn depth_cap(&self) -> usize {
        self.depth_cap
    }

    /// Record that `ancestor` caused `descendant`.
    pub fn record_edge(
        &self,
        ancestor: &Arc<TraceNode>,
        descendant: &Arc<TraceNode>,
    ) -> EdgeOutcome {
        if Arc::ptr_eq(ancestor, descendant) {
            return EdgeOutcome::SelfLink;
        }

        {
            let mut state = ancestor.state();
            if state.disabled {
                return EdgeOutcome::Rejected;
            }
            if state.edges.iter().any(|e| Arc::ptr_eq(e, descendant)) {
                return EdgeOutcome::Duplicate;
            }
            if state.descendant_count >= self.fan_out_cap {
                state.disabled = true;
                let released = std::mem::take(&mut state.edges);
                drop(state);
                debug!(
                    ancestor = %ancestor.id(),
                    descendant = %descendant.id(),
                    released = released.len(),
                    cap = self.fan_out_cap,
                    "fan-out cap exceeded, disabling node"
                );
                return EdgeOutcome::FanOutExceeded;
            }
            state.descendant_count += 1;
            state.edges.push(Arc::clone(descendant));
        }
        descendant.add_parent(ancestor);

        let history = ancestor.accumulated();
        let mut visited = HashSet::new();
        let _ = visited.insert(ancestor.key());
        let mut reached = 0;
        self.visit(descendant, 1, &history, &mut visited, &mut reached);

        trace!(
            ancestor = %ancestor.id(),
            descendant = %descendant.id(),
            reached,
            "edge recorded"
        );
        EdgeOutcome::Inserted { reached }
    }

    fn visit(
        &self,
        node: &Arc<TraceNode>,
        depth: usize,
        history: &ContributionMap,
        visited: &mut HashSet<NodeKey>,
        reached: &mut usize,
    ) {
        if !visited.insert(node.key()) {
            return;
        }

        let children = {
            let mut state = node.state();
            for (id, frames) in history {
                let _ = state.accumulated.insert(*id, Arc::clone(frames));
            }
            let _ = self.bound.trim(&mut state.accumulated);
            state.edges.clone()
        };
        *reached += 1;

        if depth < self.depth_cap {
            for child in &children {
                self.visit(child, depth + 1, history, visited, reached);
            }
        }
        prune_dead_edges(node, &children);
    }
}

/// Drop edges to detached descendants that have no descendants themselves.
///
/// Such a node can neither be rendered nor forward history.
pub(crate) fn prune_dead_edges(node: &TraceNode, children: &[Arc<TraceNode>]) {
    let dead: Vec<NodeKey> = children
        .iter()
        .filter(|child| !child.is_forwarding())
        .map(|child| child.key())
        .collect();
    if dead.is_empty() {
        return;
    }

    let removed: Vec<Arc<TraceNode>> = {
        let mut state = node.state();
        let (gone, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut state.edges)
            .into_iter()
            .partition(|e| dead.contains(&e.key()));
        state.edges = keep;
        gone
    };
    trace!(node = %node.id(), pruned = removed.len(), "pruned dead edges");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
