use crate::error::RunError;
use crate::model::result::{CellScores, ClassificationResult, Label, ScoreTable};
use crate::model::taxonomy::Taxonomy;

/// A node stops descent when its confidence magnitude does not exceed the threshold.
/// A threshold of zero (or below) never stops: every cell reaches a leaf.
#[inline]
pub fn stops_at(confidence: f32, threshold: f32) -> bool {
    threshold > 0.0 && confidence.abs() <= threshold
}

/// Re-derives one cell's label from cached scores: follows the cached branch choices from the
/// root and stops at the first node failing the threshold.
pub fn walk(taxonomy: &Taxonomy, scores: &CellScores, threshold: f32) -> ClassificationResult {
    if let Some(err) = &scores.error {
        return ClassificationResult::failed(err.clone());
    }

    let root = taxonomy.root();
    let mut node = root;
    let mut path = vec![root];
    let mut confidence = None;

    loop {
        let current = taxonomy.node(node);
        if let Some(name) = &current.name {
            return ClassificationResult {
                label: Label::Type(name.clone()),
                path,
                confidence,
                error: None,
            };
        }

        let score = scores.get(node);
        confidence = score.map(|s| s.confidence);
        let next = match score {
            Some(s) if !stops_at(s.confidence, threshold) => current
                .children
                .and_then(|c| c.contains(&s.chosen).then_some(s.chosen)),
            _ => None,
        };
        let Some(next) = next else {
            let label = if node == root {
                Label::Unassigned
            } else {
                Label::Intermediate(node)
            };
            return ClassificationResult {
                label,
                path,
                confidence,
                error: None,
            };
        };
        node = next;
        path.push(node);
    }
}

/// Applies `threshold` to a whole score table without recomputing any score.
pub fn relabel(
    taxonomy: &Taxonomy,
    table: &ScoreTable,
    threshold: f32,
) -> Result<Vec<ClassificationResult>, RunError> {
    check_table(taxonomy, table)?;
    Ok(table
        .cells
        .iter()
        .map(|cell| walk(taxonomy, cell, threshold))
        .collect())
}

/// A table is only usable with the taxonomy it was computed against.
pub fn check_table(taxonomy: &Taxonomy, table: &ScoreTable) -> Result<(), RunError> {
    if table.n_nodes != taxonomy.len() || table.root != taxonomy.root() {
        return Err(RunError::Mismatch(format!(
            "score table covers {} nodes rooted at {}, taxonomy has {} rooted at {}",
            table.n_nodes,
            table.root,
            taxonomy.len(),
            taxonomy.root()
        )));
    }
    for cell in &table.cells {
        if cell.error.is_some() {
            continue;
        }
        for pair in cell.nodes.windows(2) {
            if pair[0].node >= pair[1].node {
                return Err(RunError::Mismatch(format!(
                    "cell {}: node scores are not in ascending node order",
                    cell.cell
                )));
            }
        }
        for score in &cell.nodes {
            let valid = score.node.index() < taxonomy.len()
                && taxonomy
                    .node(score.node)
                    .children
                    .is_some_and(|c| c.contains(&score.chosen));
            if !valid {
                return Err(RunError::Mismatch(format!(
                    "cell {}: {} is not a decision node with child {}",
                    cell.cell, score.node, score.chosen
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage6_threshold.rs"]
mod tests;
