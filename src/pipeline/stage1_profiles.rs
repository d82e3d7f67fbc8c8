use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::ReferenceError;
use crate::model::config::ProfileScale;
use crate::model::matrix::ExpressionMatrix;
use crate::model::profile::{Profile, ProfileStore};

/// One labelled reference matrix. `labels` maps cell identifier to cell-type label.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSet<'a> {
    pub matrix: &'a ExpressionMatrix,
    pub labels: &'a [(String, String)],
}

struct GroupAccumulator {
    sums: Vec<f64>,
    n_cells: usize,
}

/// Aggregates labelled reference cells into one mean profile per label.
///
/// The gene universe is the union over all sets; a gene a set does not measure contributes
/// zero for that set's cells.
pub fn build_profile_store(
    sets: &[ReferenceSet<'_>],
    scale: ProfileScale,
) -> Result<ProfileStore, ReferenceError> {
    let mut universe: BTreeSet<&str> = BTreeSet::new();
    for set in sets {
        universe.extend(set.matrix.genes().iter().map(String::as_str));
    }
    if universe.is_empty() {
        return Err(ReferenceError::EmptyGeneUniverse);
    }
    let genes: Vec<String> = universe.iter().map(|g| g.to_string()).collect();
    let n_genes = genes.len();
    let universe_index: HashMap<&str, usize> = universe
        .iter()
        .enumerate()
        .map(|(idx, g)| (*g, idx))
        .collect();

    let mut groups: BTreeMap<String, GroupAccumulator> = BTreeMap::new();
    for set in sets {
        for (_, label) in set.labels {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            groups
                .entry(label.to_string())
                .or_insert_with(|| GroupAccumulator {
                    sums: vec![0f64; n_genes],
                    n_cells: 0,
                });
        }
    }
    if groups.is_empty() {
        return Err(ReferenceError::NoLabelledCells);
    }

    for (set_idx, set) in sets.iter().enumerate() {
        let matrix = set.matrix;
        let to_universe: Vec<Option<usize>> = matrix
            .genes()
            .iter()
            .map(|g| universe_index.get(g.as_str()).copied())
            .collect();

        let mut label_by_cell: HashMap<&str, &str> = HashMap::with_capacity(set.labels.len());
        for (cell, label) in set.labels {
            let label = label.trim();
            if label.is_empty() {
                tracing::warn!(set = set_idx, cell = %cell, "blank reference label; skipping");
                continue;
            }
            if label_by_cell.insert(cell.as_str(), label).is_some() {
                tracing::warn!(
                    set = set_idx,
                    cell = %cell,
                    "cell labelled more than once; keeping last label"
                );
            }
        }

        let mut labelled = 0usize;
        for (cell_idx, cell) in matrix.cells().iter().enumerate() {
            let Some(label) = label_by_cell.get(cell.as_str()) else {
                continue;
            };
            let Some(acc) = groups.get_mut(*label) else {
                continue;
            };
            for &(gene, value) in matrix.column(cell_idx) {
                if let Some(u) = to_universe[gene as usize] {
                    acc.sums[u] += scale.apply(value) as f64;
                }
            }
            acc.n_cells += 1;
            labelled += 1;
        }

        let present: HashSet<&str> = matrix.cells().iter().map(String::as_str).collect();
        let missing = label_by_cell
            .keys()
            .filter(|cell| !present.contains(*cell))
            .count();
        if missing > 0 {
            tracing::warn!(
                set = set_idx,
                missing,
                "labelled cells absent from the reference matrix"
            );
        }
        tracing::info!(
            set = set_idx,
            labelled,
            unlabelled = matrix.n_cells() - labelled,
            "reference cells assigned to groups"
        );
    }

    let mut profiles = Vec::with_capacity(groups.len());
    for (label, acc) in groups {
        if acc.n_cells == 0 {
            return Err(ReferenceError::EmptyGroup { label });
        }
        let denom = acc.n_cells as f64;
        let values = acc.sums.iter().map(|s| (s / denom) as f32).collect();
        profiles.push(Profile {
            name: label,
            n_cells: acc.n_cells,
            values,
        });
    }

    tracing::info!(
        types = profiles.len(),
        genes = n_genes,
        "built reference profiles"
    );
    ProfileStore::new(scale, genes, profiles)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage1_profiles.rs"]
mod tests;
