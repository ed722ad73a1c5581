//! Diagnostic forest dump.
//!
//! Draws the causal graph over active contexts as a set of trees. Roots are
//! active nodes that no reachable node lists as a descendant. Nodes caught
//! in cycles with no such root are promoted to roots, lowest ID first, so
//! every active context shows up somewhere.
//!
//! Nothing in the engine depends on this module for correctness.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tether_core::ContextId;

use crate::node::{NodeKey, TraceNode};
use crate::registry::Registry;

/// One node in the dump.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForestNode {
    /// Context ID.
    pub id: ContextId,
    /// Frames captured at creation.
    pub frames: usize,
    /// Contexts in the accumulated map, including this one.
    pub contributors: usize,
    /// Destroyed, but still referenced.
    pub detached: bool,
    /// Tripped the fan-out guard.
    pub disabled: bool,
    /// Edge back onto the path from the root. Not expanded.
    pub cycle: bool,
    /// Already drawn elsewhere in the forest. Not expanded.
    pub repeated: bool,
    /// Has descendants below the depth cap. Not expanded.
    pub truncated: bool,
    /// Descendants, ascending by ID.
    pub children: Vec<ForestNode>,
}

impl ForestNode {
    fn leaf(node: &TraceNode) -> Self {
        Self {
            id: node.id(),
            frames: node.frames().len(),
            contributors: node.contributors().len(),
            detached: node.is_detached(),
            disabled: node.is_disabled(),
            cycle: false,
            repeated: false,
            truncated: false,
            children: Vec::new(),
        }
    }

    fn tags(&self) -> Vec<&'static str> {
        [
            (self.detached, "detached"),
            (self.disabled, "disabled"),
            (self.cycle, "cycle"),
            (self.repeated, "repeated"),
            (self.truncated, "truncated"),
        ]
        .into_iter()
        .filter_map(|(set, tag)| set.then_some(tag))
        .collect()
    }

    fn write_tree(
        &self,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        last: bool,
        root: bool,
    ) -> fmt::Result {
        let (branch, indent) = match (root, last) {
            (true, _) => ("", ""),
            (false, true) => ("└── ", "    "),
            (false, false) => ("├── ", "│   "),
        };
        write!(
            f,
            "{prefix}{branch}{} (frames: {}, contributors: {})",
            self.id, self.frames, self.contributors
        )?;
        let tags = self.tags();
        if !tags.is_empty() {
            write!(f, " [{}]", tags.join(", "))?;
        }
        writeln!(f)?;

        let child_prefix = format!("{prefix}{indent}");
        for (i, child) in self.children.iter().enumerate() {
            child.write_tree(f, &child_prefix, i + 1 == self.children.len(), false)?;
        }
        Ok(())
    }
}

/// Snapshot of the causal graph over active contexts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Forest {
    /// Trees, ascending by root ID.
    pub roots: Vec<ForestNode>,
}

impl Forest {
    /// Build the forest for everything active in `registry`.
    pub fn build(registry: &Registry) -> Self {
        let depth_cap = registry.recorder().depth_cap();
        let active = registry.active_nodes();
        let referenced = referenced_keys(&active, depth_cap);

        let mut shown: HashSet<NodeKey> = HashSet::new();
        let mut roots = Vec::new();
        for node in active.iter().filter(|n| !referenced.contains(&n.key())) {
            roots.push(expand(node, 0, depth_cap, &mut HashSet::new(), &mut shown));
        }
        // Nodes only reachable through cycles. `active` is sorted by ID.
        for node in &active {
            if !shown.contains(&node.key()) {
                roots.push(expand(node, 0, depth_cap, &mut HashSet::new(), &mut shown));
            }
        }
        Self { roots }
    }

    /// Whether no context is active.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of entries drawn, including repeated and cyclic ones.
    pub fn node_count(&self) -> usize {
        fn count(node: &ForestNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }

    /// Find the first drawn entry for `id`, depth first.
    pub fn find(&self, id: ContextId) -> Option<&ForestNode> {
        fn search(node: &ForestNode, id: ContextId) -> Option<&ForestNode> {
            if node.id == id {
                return Some(node);
            }
            node.children.iter().find_map(|c| search(c, id))
        }
        self.roots.iter().find_map(|r| search(r, id))
    }
}

impl fmt::Display for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.roots.is_empty() {
            return writeln!(f, "(no active contexts)");
        }
        for root in &self.roots {
            root.write_tree(f, "", true, true)?;
        }
        Ok(())
    }
}

/// Keys of every node listed as a descendant by a node reachable from
/// `active` within `depth_cap` hops.
fn referenced_keys(active: &[Arc<TraceNode>], depth_cap: usize) -> HashSet<NodeKey> {
    let mut referenced = HashSet::new();
    let mut visited: HashSet<NodeKey> = HashSet::new();
    let mut frontier: Vec<(Arc<TraceNode>, usize)> =
        active.iter().map(|n| (Arc::clone(n), 0)).collect();

    while let Some((node, depth)) = frontier.pop() {
        if !visited.insert(node.key()) {
            continue;
        }
        for child in node.descendants() {
            let _ = referenced.insert(child.key());
            if depth + 1 < depth_cap {
                frontier.push((child, depth + 1));
            }
        }
    }
    referenced
}

fn expand(
    node: &Arc<TraceNode>,
    depth: usize,
    depth_cap: usize,
    path: &mut HashSet<NodeKey>,
    shown: &mut HashSet<NodeKey>,
) -> ForestNode {
    let mut out = ForestNode::leaf(node);
    let _ = shown.insert(node.key());

    let mut children = node.descendants();
    if children.is_empty() {
        return out;
    }
    if depth + 1 >= depth_cap {
        out.truncated = true;
        return out;
    }
    children.sort_by_key(|c| c.id());

    let _ = path.insert(node.key());
    for child in &children {
        let entry = if path.contains(&child.key()) {
            ForestNode {
                cycle: true,
                ..ForestNode::leaf(child)
            }
        } else if shown.contains(&child.key()) {
            ForestNode {
                repeated: true,
                ..ForestNode::leaf(child)
            }
        } else {
            expand(child, depth + 1, depth_cap, path, shown)
        };
        out.children.push(entry);
    }
    let _ = path.remove(&node.key());
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
