use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CellError;
use crate::model::taxonomy::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Label {
    /// Fully resolved leaf cell type.
    Type(String),
    /// Descent stopped at an internal node.
    Intermediate(NodeId),
    Unassigned,
}

impl Label {
    pub fn kind(&self) -> &'static str {
        match self {
            Label::Type(_) => "type",
            Label::Intermediate(_) => "intermediate",
            Label::Unassigned => "unassigned",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Type(name) => f.write_str(name),
            Label::Intermediate(node) => write!(f, "{node}"),
            Label::Unassigned => f.write_str("Unassigned"),
        }
    }
}

/// Hierarchical outcome for one query cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Visited nodes, root first, ending at the stop node.
    pub path: Vec<NodeId>,
    /// Confidence at the last internal node visited; `None` when no decision was made.
    pub confidence: Option<f32>,
    pub error: Option<CellError>,
}

impl ClassificationResult {
    pub fn failed(error: CellError) -> Self {
        Self {
            label: Label::Unassigned,
            path: Vec::new(),
            confidence: None,
            error: Some(error),
        }
    }

    pub fn stop_node(&self) -> Option<NodeId> {
        self.path.last().copied()
    }
}

/// Threshold-independent scores of one query cell at one internal node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub node: NodeId,
    /// Signed: positive favours the first child, negative the second.
    pub confidence: f32,
    pub profile_scores: [f32; 2],
    /// Child taken when descent continues past this node.
    pub chosen: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellScores {
    pub cell: String,
    pub error: Option<CellError>,
    /// One entry per internal node, ascending node id.
    pub nodes: Vec<NodeScore>,
}

impl CellScores {
    pub fn get(&self, node: NodeId) -> Option<&NodeScore> {
        self.nodes
            .binary_search_by_key(&node, |s| s.node)
            .ok()
            .map(|idx| &self.nodes[idx])
    }
}

/// Per-cell, per-node score cache consumed by the threshold controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub n_nodes: usize,
    pub root: NodeId,
    pub cells: Vec<CellScores>,
}

/// Discriminating genes at one node that the query does not measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneLoss {
    pub node: NodeId,
    pub selected: usize,
    pub missing: usize,
    pub flagged: bool,
}

impl GeneLoss {
    pub fn fraction(&self) -> f32 {
        if self.selected == 0 {
            0.0
        } else {
            self.missing as f32 / self.selected as f32
        }
    }
}

/// Flat nearest-reference call for one query cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatCall {
    pub label: String,
    pub score: f32,
    pub fine_tuned: Option<String>,
    /// Score per reference profile, profile-store order.
    pub scores: Vec<f32>,
}
