use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use crate::input::InputError;
use crate::input::reader::open_maybe_gz;

const CELL_COLUMNS: &[&str] = &["barcode", "barcodes", "cell", "cell_id"];
const LABEL_COLUMNS: &[&str] = &["label", "cell_type", "celltype"];

/// Reads a tab-separated label table with a header row into `(cell, label)` pairs.
///
/// The cell column is the first header named `barcode`/`cell` (falling back to column 0). The
/// label column is `label_column` when given, otherwise the first of `label`/`cell_type`.
/// Duplicate cells keep their first row.
pub fn load_labels(
    path: &Path,
    label_column: Option<&str>,
) -> Result<Vec<(String, String)>, InputError> {
    let mut reader = open_maybe_gz(path)?;
    let mut buf = String::new();

    if reader.read_line(&mut buf)? == 0 {
        return Err(InputError::Parse(format!("{} is empty", path.display())));
    }
    let header: Vec<String> = buf
        .trim_end()
        .split('\t')
        .map(|s| s.trim().to_ascii_lowercase())
        .collect();

    let cell_col = header
        .iter()
        .position(|h| CELL_COLUMNS.contains(&h.as_str()))
        .unwrap_or(0);
    let label_col = match label_column {
        Some(name) => {
            let name = name.to_ascii_lowercase();
            header.iter().position(|h| *h == name)
        }
        None => header
            .iter()
            .position(|h| LABEL_COLUMNS.contains(&h.as_str())),
    }
    .ok_or_else(|| {
        InputError::MissingInput(format!(
            "{}: no label column ({})",
            path.display(),
            label_column.unwrap_or("label / cell_type")
        ))
    })?;
    if label_col == cell_col {
        return Err(InputError::InvalidInput(
            "label column and cell column are the same".to_string(),
        ));
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut labels = Vec::new();
    let mut line_no = 1usize;
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
        let fields: Vec<&str> = line.split('\t').collect();
        let cell = fields.get(cell_col).map_or("", |s| s.trim());
        if cell.is_empty() {
            tracing::warn!(line = line_no, "label row has no cell identifier; skipping");
            continue;
        }
        if !seen.insert(cell.to_string()) {
            tracing::warn!(line = line_no, cell, "duplicate cell in label table; keeping first");
            continue;
        }
        let label = fields.get(label_col).map_or("", |s| s.trim());
        labels.push((cell.to_string(), label.to_string()));
    }

    tracing::info!(rows = labels.len(), "loaded labels from {}", path.display());
    Ok(labels)
}
