use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::input::reader::{find_first, open_maybe_gz};
use crate::input::{GeneIndex, InputError};

pub fn find_matrix_path(input_dir: &Path) -> Result<PathBuf, InputError> {
    find_first(input_dir, &["matrix.mtx", "matrix.mtx.gz"]).ok_or_else(|| {
        InputError::MissingInput(format!(
            "{}: missing matrix.mtx or matrix.mtx.gz",
            input_dir.display()
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueField {
    Integer,
    Real,
    Pattern,
}

/// Column-wise (per cell) sparse values keyed by gene id.
pub type Columns = Vec<Vec<(u32, f32)>>;

/// Reads a MatrixMarket coordinate file (features x barcodes) into per-cell columns.
///
/// Features that map to the same gene id are summed; features without a gene id are dropped.
pub fn read_mtx_columns(
    path: &Path,
    n_features_raw: usize,
    n_cells: usize,
    gene_index: &GeneIndex,
) -> Result<Columns, InputError> {
    let mut reader = open_maybe_gz(path)?;
    let mut buf = String::new();

    if reader.read_line(&mut buf)? == 0 {
        return Err(InputError::Parse(format!("{} is empty", path.display())));
    }
    let field = parse_header(buf.trim_end())?;

    let (rows, cols) = loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            return Err(InputError::Parse("missing matrix size line".to_string()));
        }
        let line = buf.trim_end();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let rows = parse_usize(parts.next(), "row count")?;
        let cols = parse_usize(parts.next(), "column count")?;
        parse_usize(parts.next(), "entry count")?;
        break (rows, cols);
    };

    if rows != n_features_raw {
        return Err(InputError::InvalidInput(format!(
            "matrix row count {rows} does not match {n_features_raw} features"
        )));
    }
    if cols != n_cells {
        return Err(InputError::InvalidInput(format!(
            "matrix column count {cols} does not match {n_cells} barcodes"
        )));
    }

    let mut per_col: Vec<BTreeMap<u32, f64>> = vec![BTreeMap::new(); cols];
    let mut line_no = 0usize;
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_end();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let row = parse_usize(parts.next(), "row index")?;
        let col = parse_usize(parts.next(), "column index")?;
        let value = match field {
            ValueField::Pattern => 1.0,
            ValueField::Integer | ValueField::Real => {
                let raw = parts.next().ok_or_else(|| {
                    InputError::Parse(format!("matrix entry {line_no} has no value"))
                })?;
                raw.parse::<f64>()
                    .map_err(|_| InputError::Parse(format!("invalid value '{raw}'")))?
            }
        };
        if row == 0 || row > rows || col == 0 || col > cols {
            return Err(InputError::Parse(format!(
                "matrix entry {line_no} out of bounds ({row}, {col})"
            )));
        }
        if !value.is_finite() || value < 0.0 {
            return Err(InputError::InvalidInput(format!(
                "matrix entry {line_no} holds {value}; expression must be non-negative"
            )));
        }
        if value == 0.0 {
            continue;
        }
        if let Some(gene) = gene_index.gene_by_feature.get(row - 1).copied().flatten() {
            *per_col[col - 1].entry(gene as u32).or_insert(0.0) += value;
        }
    }

    Ok(per_col
        .into_iter()
        .map(|col| col.into_iter().map(|(g, v)| (g, v as f32)).collect())
        .collect())
}

fn parse_header(header: &str) -> Result<ValueField, InputError> {
    let lower = header.to_ascii_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();
    if tokens.first() != Some(&"%%matrixmarket") {
        return Err(InputError::Parse("missing MatrixMarket header".to_string()));
    }
    if tokens.get(2) != Some(&"coordinate") {
        return Err(InputError::InvalidInput(
            "only coordinate MatrixMarket files are supported".to_string(),
        ));
    }
    if tokens.get(4).is_some_and(|s| *s != "general") {
        return Err(InputError::InvalidInput(
            "only general (non-symmetric) MatrixMarket files are supported".to_string(),
        ));
    }
    match tokens.get(3).copied() {
        Some("integer") => Ok(ValueField::Integer),
        Some("real") | Some("double") => Ok(ValueField::Real),
        Some("pattern") => Ok(ValueField::Pattern),
        other => Err(InputError::InvalidInput(format!(
            "unsupported MatrixMarket field {}",
            other.unwrap_or("<none>")
        ))),
    }
}

fn parse_usize(raw: Option<&str>, what: &str) -> Result<usize, InputError> {
    let raw = raw.ok_or_else(|| InputError::Parse(format!("missing {what}")))?;
    raw.parse()
        .map_err(|_| InputError::Parse(format!("invalid {what} '{raw}'")))
}
