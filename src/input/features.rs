use std::io::BufRead;
use std::path::Path;

use crate::input::InputError;
use crate::input::reader::open_maybe_gz;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    /// Normalised gene symbol; empty when the row carries none.
    pub symbol: String,
    pub feature_type: Option<String>,
}

impl Feature {
    /// Only gene-expression rows (or rows of a v2 file, which has no type column) enter the
    /// gene universe; antibody capture and CRISPR guides do not.
    pub fn is_gene_expression(&self) -> bool {
        self.feature_type
            .as_deref()
            .is_none_or(|t| t.eq_ignore_ascii_case("Gene Expression"))
    }
}

/// Parses a 10x `features.tsv` (v3, three columns) or `genes.tsv` (v2, two columns).
pub fn parse_features(path: &Path) -> Result<Vec<Feature>, InputError> {
    let mut reader = open_maybe_gz(path)?;
    let mut buf = String::new();
    let mut features = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_end();
        if line.is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 2 {
            return Err(InputError::Parse(format!(
                "{} line {line_no} has fewer than 2 columns",
                path.display()
            )));
        }
        features.push(Feature {
            id: cols[0].trim().to_string(),
            symbol: normalize_symbol(cols[1]),
            feature_type: cols.get(2).map(|t| t.trim().to_string()),
        });
    }

    if features.is_empty() {
        return Err(InputError::Parse(format!("{} is empty", path.display())));
    }
    Ok(features)
}

/// Trims and upper-cases a symbol, dropping the version suffix of Ensembl identifiers.
pub fn normalize_symbol(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let upper = trimmed.to_ascii_uppercase();
    if let Some((left, right)) = upper.rsplit_once('.') {
        if left.starts_with("ENS") && !right.is_empty() && right.chars().all(|c| c.is_ascii_digit())
        {
            return left.to_string();
        }
    }
    upper
}
