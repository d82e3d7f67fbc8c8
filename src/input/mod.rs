use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::MatrixError;
use crate::model::matrix::ExpressionMatrix;

pub mod barcodes;
pub mod features;
pub mod labels;
pub mod mtx;
pub mod normalize;
pub mod reader;

use barcodes::parse_barcodes;
use features::{Feature, parse_features};
use mtx::{find_matrix_path, read_mtx_columns};
use reader::find_first;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Feature row to gene id mapping; rows sharing a symbol share an id.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneIndex {
    pub gene_by_feature: Vec<Option<usize>>,
    pub symbols: Vec<String>,
}

pub fn build_gene_index(features: &[Feature]) -> GeneIndex {
    let mut symbols: Vec<String> = Vec::new();
    let mut by_symbol: HashMap<&str, usize> = HashMap::new();
    let mut gene_by_feature = Vec::with_capacity(features.len());
    let mut duplicates = 0usize;

    for (idx, feature) in features.iter().enumerate() {
        if feature.symbol.is_empty() || !feature.is_gene_expression() {
            gene_by_feature.push(None);
            continue;
        }
        if let Some(&existing) = by_symbol.get(feature.symbol.as_str()) {
            tracing::debug!(
                feature = idx,
                symbol = %feature.symbol,
                "duplicate gene symbol; summing into first occurrence"
            );
            duplicates += 1;
            gene_by_feature.push(Some(existing));
            continue;
        }
        let gene = symbols.len();
        symbols.push(feature.symbol.clone());
        by_symbol.insert(feature.symbol.as_str(), gene);
        gene_by_feature.push(Some(gene));
    }

    if duplicates > 0 {
        tracing::warn!(duplicates, "duplicate gene symbols were summed");
    }
    GeneIndex {
        gene_by_feature,
        symbols,
    }
}

/// Loads a 10x-style directory (`matrix.mtx`, `features.tsv`/`genes.tsv`, `barcodes.tsv`,
/// each optionally gzipped) as a genes x cells matrix keyed by gene symbol.
pub fn load_tenx(input_dir: &Path) -> Result<ExpressionMatrix, InputError> {
    let mtx_path = find_matrix_path(input_dir)?;
    let features_path = find_features_path(input_dir)?;
    let barcodes_path = find_barcodes_path(input_dir)?;

    tracing::info!(
        mtx = %mtx_path.display(),
        features = %features_path.display(),
        barcodes = %barcodes_path.display(),
        "discovered input files"
    );

    let features = parse_features(&features_path)?;
    let gene_index = build_gene_index(&features);
    let barcodes = parse_barcodes(&barcodes_path)?;
    let columns = read_mtx_columns(&mtx_path, features.len(), barcodes.len(), &gene_index)?;

    let matrix = ExpressionMatrix::from_columns(gene_index.symbols, barcodes, columns)?;
    tracing::info!(
        genes = matrix.n_genes(),
        cells = matrix.n_cells(),
        features = features.len(),
        "loaded expression matrix"
    );
    Ok(matrix)
}

fn find_features_path(input_dir: &Path) -> Result<PathBuf, InputError> {
    find_first(
        input_dir,
        &["features.tsv", "features.tsv.gz", "genes.tsv", "genes.tsv.gz"],
    )
    .ok_or_else(|| {
        InputError::MissingInput(format!(
            "{}: missing features.tsv(.gz) or genes.tsv(.gz)",
            input_dir.display()
        ))
    })
}

fn find_barcodes_path(input_dir: &Path) -> Result<PathBuf, InputError> {
    find_first(input_dir, &["barcodes.tsv", "barcodes.tsv.gz"]).ok_or_else(|| {
        InputError::MissingInput(format!(
            "{}: missing barcodes.tsv or barcodes.tsv.gz",
            input_dir.display()
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
