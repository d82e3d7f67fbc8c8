use crate::model::matrix::ExpressionMatrix;
use crate::model::profile::ProfileStore;

/// Maps a query matrix onto the reference gene universe.
#[derive(Debug, Clone)]
pub struct QueryAlignment {
    to_store: Vec<Option<usize>>,
    present: Vec<bool>,
    n_shared: usize,
}

impl QueryAlignment {
    pub fn new(store: &ProfileStore, query: &ExpressionMatrix) -> Self {
        let mut present = vec![false; store.n_genes()];
        let mut to_store = Vec::with_capacity(query.n_genes());
        for gene in query.genes() {
            let idx = store.gene_index(gene);
            if let Some(i) = idx {
                present[i] = true;
            }
            to_store.push(idx);
        }
        let n_shared = present.iter().filter(|p| **p).count();
        Self {
            to_store,
            present,
            n_shared,
        }
    }

    #[inline]
    pub fn is_present(&self, store_gene: usize) -> bool {
        self.present[store_gene]
    }

    /// Reference genes measured by the query, ascending.
    pub fn shared_genes(&self) -> Vec<usize> {
        self.present
            .iter()
            .enumerate()
            .filter_map(|(idx, p)| p.then_some(idx))
            .collect()
    }

    pub fn n_shared(&self) -> usize {
        self.n_shared
    }

    /// Dense vector over the reference universe with the store scale applied, plus the number
    /// of shared genes the cell actually detects.
    pub fn cell_vector(
        &self,
        store: &ProfileStore,
        query: &ExpressionMatrix,
        cell: usize,
    ) -> (Vec<f32>, usize) {
        let scale = store.scale();
        let mut dense = vec![0f32; store.n_genes()];
        let mut detected = 0usize;
        for &(gene, value) in query.column(cell) {
            if let Some(idx) = self.to_store[gene as usize] {
                dense[idx] = scale.apply(value);
                if value > 0.0 {
                    detected += 1;
                }
            }
        }
        (dense, detected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneSelection {
    /// Reference gene indices, strongest contrast first.
    pub genes: Vec<usize>,
    /// Genes chosen before dropping those absent from the query.
    pub selected: usize,
    pub missing: usize,
}

impl GeneSelection {
    pub fn loss_fraction(&self) -> f32 {
        if self.selected == 0 {
            0.0
        } else {
            self.missing as f32 / self.selected as f32
        }
    }
}

/// Up to `k` genes with the largest absolute difference between the mean of `side_a` and the
/// mean of `side_b`. Equal contrasts are ordered by gene index, which follows gene identifier
/// order in a [`ProfileStore`]. Genes with no contrast are never selected.
pub fn rank_discriminating_genes(side_a: &[&[f32]], side_b: &[&[f32]], k: usize) -> Vec<usize> {
    let n_genes = side_a
        .first()
        .or_else(|| side_b.first())
        .map_or(0, |p| p.len());
    if side_a.is_empty() || side_b.is_empty() || k == 0 {
        return Vec::new();
    }

    let mean_a = side_mean(side_a, n_genes);
    let mean_b = side_mean(side_b, n_genes);

    let mut contrast: Vec<(usize, f64)> = Vec::with_capacity(n_genes);
    for gene in 0..n_genes {
        let diff = (mean_a[gene] - mean_b[gene]).abs();
        if diff > 0.0 && diff.is_finite() {
            contrast.push((gene, diff));
        }
    }
    contrast.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    contrast.truncate(k);
    contrast.into_iter().map(|(gene, _)| gene).collect()
}

/// [`rank_discriminating_genes`] followed by removal of genes the query does not measure.
pub fn select_discriminating_genes(
    side_a: &[&[f32]],
    side_b: &[&[f32]],
    k: usize,
    alignment: &QueryAlignment,
) -> GeneSelection {
    let ranked = rank_discriminating_genes(side_a, side_b, k);
    let selected = ranked.len();
    let genes: Vec<usize> = ranked
        .into_iter()
        .filter(|&g| alignment.is_present(g))
        .collect();
    GeneSelection {
        missing: selected - genes.len(),
        selected,
        genes,
    }
}

fn side_mean(side: &[&[f32]], n_genes: usize) -> Vec<f64> {
    let mut sums = vec![0f64; n_genes];
    for profile in side {
        for (sum, &v) in sums.iter_mut().zip(profile.iter()) {
            *sum += v as f64;
        }
    }
    let denom = side.len() as f64;
    sums.iter_mut().for_each(|s| *s /= denom);
    sums
}

#[inline]
pub fn gather(values: &[f32], genes: &[usize]) -> Vec<f32> {
    genes.iter().map(|&g| values[g]).collect()
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_genes.rs"]
mod tests;
