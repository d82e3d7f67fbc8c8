use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    /// Ordered child pair; `None` for leaves.
    pub children: Option<[NodeId; 2]>,
    /// Cell-type name, leaves only.
    pub name: Option<String>,
    /// Member leaves in ascending id order.
    pub leaves: Vec<NodeId>,
    pub n_cells: usize,
    /// Linkage distance at which this node was formed; 0 for leaves.
    pub height: f32,
    pub profile: Vec<f32>,
}

impl TaxonomyNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Binary tree over reference cell types. Leaves occupy ids `0..n_leaves` in profile-store
/// order; internal nodes follow in merge order and the root is the last node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    nodes: Vec<TaxonomyNode>,
    root: NodeId,
}

impl Taxonomy {
    pub fn from_nodes(nodes: Vec<TaxonomyNode>, root: NodeId) -> Result<Self, ReferenceError> {
        let taxonomy = Self { nodes, root };
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn nodes(&self) -> &[TaxonomyNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &TaxonomyNode {
        &self.nodes[id.index()]
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn internal_nodes(&self) -> impl Iterator<Item = &TaxonomyNode> {
        self.nodes.iter().filter(|n| !n.is_leaf())
    }

    /// Number of edges between the root and `id`.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }

    pub fn find_leaf(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.name.as_deref() == Some(name))
            .map(|n| n.id)
    }

    pub fn validate(&self) -> Result<(), ReferenceError> {
        let invalid = |msg: String| Err(ReferenceError::InvalidTaxonomy(msg));

        if self.nodes.is_empty() {
            return invalid("taxonomy has no nodes".to_string());
        }
        if self.root.index() >= self.nodes.len() {
            return invalid(format!("root {} out of range", self.root));
        }
        let n_genes = self.nodes[0].profile.len();

        let mut roots = 0usize;
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.id.index() != idx {
                return invalid(format!("node at position {idx} carries id {}", node.id));
            }
            if node.profile.len() != n_genes {
                return invalid(format!("{} profile length differs", node.id));
            }
            match node.parent {
                None => roots += 1,
                Some(parent) => {
                    let Some(p) = self.nodes.get(parent.index()) else {
                        return invalid(format!("{} has unknown parent {parent}", node.id));
                    };
                    if !p.children.is_some_and(|c| c.contains(&node.id)) {
                        return invalid(format!("{parent} does not list child {}", node.id));
                    }
                }
            }
            match node.children {
                None => {
                    if node.name.is_none() {
                        return invalid(format!("leaf {} has no cell-type name", node.id));
                    }
                    if node.leaves != [node.id] {
                        return invalid(format!("leaf {} must be its own only member", node.id));
                    }
                }
                Some([a, b]) => {
                    if node.name.is_some() {
                        return invalid(format!("internal {} carries a leaf name", node.id));
                    }
                    if a == b {
                        return invalid(format!("{} lists the same child twice", node.id));
                    }
                    for child in [a, b] {
                        let Some(c) = self.nodes.get(child.index()) else {
                            return invalid(format!("{} has unknown child {child}", node.id));
                        };
                        if c.parent != Some(node.id) {
                            return invalid(format!("{child} does not point back to {}", node.id));
                        }
                    }
                }
            }
        }
        if roots != 1 || self.nodes[self.root.index()].parent.is_some() {
            return invalid(format!("expected exactly one root, found {roots}"));
        }

        // Every node reachable exactly once from the root: connected and acyclic.
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if seen[id.index()] {
                return invalid(format!("{id} reached twice"));
            }
            seen[id.index()] = true;
            if let Some([a, b]) = self.node(id).children {
                stack.push(b);
                stack.push(a);
            }
        }
        if let Some(idx) = seen.iter().position(|s| !s) {
            return invalid(format!("{} is not connected to the root", NodeId(idx)));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/taxonomy.rs"]
mod tests;
