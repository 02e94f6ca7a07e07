//! Dependency tree used to level artifacts before modularization.
//!
//! The tree is a rose tree with a dataless root. Nodes live in an arena and
//! are addressed by [`NodeId`]; structural operations (detach, reattach,
//! ancestry) work on ids, never on artifact equality.
//!
//! # Leveling
//!
//! [`DependencyTree::build`] places every artifact so that each intra-descriptor
//! dependency sits strictly deeper than the artifacts requiring it:
//!
//! 1. An artifact whose module is not in the tree yet becomes a child of the
//!    root.
//! 2. A required module that has no node yet is attached under the requiring
//!    artifact.
//! 3. A required module whose node is at the same level or shallower than the
//!    requiring artifact is detached, together with its subtree, and
//!    reattached under the requiring artifact.
//!
//! Sweeps over the artifact set repeat until nothing moves. Every move pushes
//! a whole subtree deeper and depth is bounded by the node count, so the loop
//! terminates. Moving a node under its own descendant means the requires
//! graph is cyclic and is reported as [`OrderError::Cycle`].

use std::collections::VecDeque;
use tracing::{debug, trace};

use super::OrderError;
use crate::model::{Artifact, ArtifactSet};

/// Handle to a node inside a [`DependencyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node {
    /// `None` only for the root
    artifact: Option<Artifact>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct DependencyTree {
    nodes: Vec<Node>,
}

impl Default for DependencyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyTree {
    const ROOT: NodeId = NodeId(0);

    /// Creates a tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                artifact: None,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Builds and levels the tree for every artifact in `artifacts`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Cycle`] when the declared modules require each
    /// other in a loop (including a module requiring itself).
    pub fn build(artifacts: &ArtifactSet) -> Result<Self, OrderError> {
        let mut tree = Self::new();
        let mut sweep = 0usize;

        loop {
            sweep += 1;
            let mut moved = 0usize;

            for artifact in artifacts {
                let node = match tree.find_by_module(artifact.module_name()) {
                    Some(node) => node,
                    None => tree.add_child(Self::ROOT, artifact.clone()),
                };

                for required in artifact.module.requires() {
                    // Modules outside the descriptor do not affect ordering
                    let Some(dependency) = artifacts.defining(required) else {
                        continue;
                    };

                    match tree.find_by_module(dependency.module_name()) {
                        None => {
                            tree.add_child(node, dependency.clone());
                        }
                        Some(dep_node) => {
                            if tree.level(dep_node) <= tree.level(node) {
                                tree.reattach(dep_node, node)?;
                                moved += 1;
                            }
                        }
                    }
                }
            }

            trace!(sweep, moved, "Dependency tree sweep finished");
            if moved == 0 {
                break;
            }
        }

        debug!(
            sweeps = sweep,
            nodes = tree.len(),
            depth = tree.max_level(),
            "Dependency tree built"
        );
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Number of artifact nodes reachable from the root.
    pub fn len(&self) -> usize {
        self.breadth_first().len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[Self::ROOT.0].children.is_empty()
    }

    /// Artifact stored at `id`; `None` for the root.
    pub fn artifact(&self, id: NodeId) -> Option<&Artifact> {
        self.nodes[id.0].artifact.as_ref()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Appends a new node holding `artifact` under `parent`.
    pub fn add_child(&mut self, parent: NodeId, artifact: Artifact) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            artifact: Some(artifact),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Number of edges between `id` and the root.
    pub fn level(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            level += 1;
            current = parent;
        }
        level
    }

    /// Deepest level present in the tree (0 for an empty tree).
    pub fn max_level(&self) -> usize {
        self.leveled().into_iter().map(|(_, l)| l).max().unwrap_or(0)
    }

    /// Nodes at `level`, in breadth-first order.
    pub fn nodes_at_level(&self, level: usize) -> Vec<NodeId> {
        self.leveled()
            .into_iter()
            .filter(|(_, l)| *l == level)
            .map(|(id, _)| id)
            .collect()
    }

    /// Reachable nodes in breadth-first order, root first.
    pub fn breadth_first(&self) -> Vec<NodeId> {
        self.leveled().into_iter().map(|(id, _)| id).collect()
    }

    /// Reachable nodes with their levels, in breadth-first order.
    pub(crate) fn leveled(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::from([(Self::ROOT, 0usize)]);
        while let Some((id, level)) = queue.pop_front() {
            out.push((id, level));
            for &child in &self.nodes[id.0].children {
                queue.push_back((child, level + 1));
            }
        }
        out
    }

    /// First node, in breadth-first order, whose artifact satisfies `predicate`.
    pub fn find<P>(&self, mut predicate: P) -> Option<NodeId>
    where
        P: FnMut(&Artifact) -> bool,
    {
        self.breadth_first()
            .into_iter()
            .find(|&id| self.artifact(id).is_some_and(&mut predicate))
    }

    /// Node of the artifact defining `module_name`.
    pub fn find_by_module(&self, module_name: &str) -> Option<NodeId> {
        self.find(|a| a.module_name() == module_name)
    }

    /// `true` if `ancestor` is `node` or lies on the path from `node` to the root.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// Removes the subtree rooted at `id` from its parent.
    ///
    /// The subtree stays in the arena and can be reattached with
    /// `attach`. Detaching the root is a no-op.
    pub(crate) fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Attaches the subtree rooted at `id` under `parent`, unlinking it from
    /// its current parent first. Callers must rule out cycles.
    pub(crate) fn attach(&mut self, id: NodeId, parent: NodeId) {
        self.detach(id);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
    }

    /// Moves the subtree rooted at `id` under `new_parent`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Cycle`] if `id` is `new_parent` or one of its
    /// ancestors; the tree is left untouched in that case.
    pub fn reattach(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), OrderError> {
        if self.is_ancestor(id, new_parent) {
            return Err(OrderError::Cycle {
                modules: self.cycle_path(id, new_parent),
            });
        }
        self.attach(id, new_parent);
        Ok(())
    }

    /// Module names from `ancestor` down to `node`, closed back on `ancestor`.
    fn cycle_path(&self, ancestor: NodeId, node: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(artifact) = self.artifact(id) {
                path.push(artifact.module_name().to_string());
            }
            if id == ancestor {
                break;
            }
            current = self.nodes[id.0].parent;
        }
        path.reverse();
        if let Some(first) = path.first().cloned() {
            path.push(first);
        }
        path
    }
}
