use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal: the reference cannot be turned into a usable profile store or taxonomy.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference label '{label}' has no member cells")]
    EmptyGroup { label: String },

    #[error("no reference cell carries a label")]
    NoLabelledCells,

    #[error("reference gene universe is empty")]
    EmptyGeneUniverse,

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error("profile '{name}' has {got} values, expected {expected}")]
    LengthMismatch {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("invalid taxonomy: {0}")]
    InvalidTaxonomy(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("reference bundle IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("reference bundle is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("duplicate gene identifier: {0}")]
    DuplicateGene(String),

    #[error("duplicate cell identifier: {0}")]
    DuplicateCell(String),

    #[error("{expected} cells declared but {got} columns supplied")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("cell {cell}: gene index {gene} outside of {n_genes} genes")]
    GeneOutOfRange { cell: String, gene: u32, n_genes: usize },

    #[error("cell {cell}: gene index {gene} listed twice or out of order")]
    UnsortedColumn { cell: String, gene: u32 },

    #[error("cell {cell}: expression value {value} is negative or not finite")]
    InvalidValue { cell: String, value: f32 },
}

/// Recoverable: a single query cell cannot be classified. Recorded with the cell, never
/// propagated as a run failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellError {
    #[error("only {shared} genes shared with the reference (need {required})")]
    InsufficientOverlap { shared: usize, required: usize },
}

/// Whole-run failures unrelated to reference quality.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("classification run was cancelled")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("query and score table disagree: {0}")]
    Mismatch(String),
}
