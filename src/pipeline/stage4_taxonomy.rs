use rayon::prelude::*;

use crate::error::ReferenceError;
use crate::model::config::{ClassifierConfig, ProfileWeighting};
use crate::model::profile::ProfileStore;
use crate::model::taxonomy::{NodeId, Taxonomy, TaxonomyNode};
use crate::pipeline::workers::build_pool;
use crate::stats::{pearson, prepare};

struct Cluster {
    node: NodeId,
    /// Smallest member leaf id. Leaf ids follow profile-name order, so comparing keys compares
    /// member names lexicographically.
    key: usize,
    size: usize,
}

/// Agglomerative average-linkage clustering of the reference profiles over
/// `1 - correlation` distance.
///
/// Exactly equal linkage distances are resolved by the (smaller, larger) key pair of the two
/// clusters, so the tree does not depend on worker count or scan order.
pub fn build_taxonomy(
    store: &ProfileStore,
    config: &ClassifierConfig,
) -> Result<Taxonomy, ReferenceError> {
    let profiles = store.profiles();
    let n_leaves = profiles.len();
    if n_leaves == 0 {
        return Err(ReferenceError::NoLabelledCells);
    }

    let mut nodes: Vec<TaxonomyNode> = profiles
        .iter()
        .enumerate()
        .map(|(idx, p)| TaxonomyNode {
            id: NodeId(idx),
            parent: None,
            children: None,
            name: Some(p.name.clone()),
            leaves: vec![NodeId(idx)],
            n_cells: p.n_cells,
            height: 0.0,
            profile: p.values.clone(),
        })
        .collect();

    let mut dist = leaf_distances(store, config)?;
    let mut slots: Vec<Option<Cluster>> = (0..n_leaves)
        .map(|idx| {
            Some(Cluster {
                node: NodeId(idx),
                key: idx,
                size: 1,
            })
        })
        .collect();

    for _ in 1..n_leaves {
        let Some((a, b, d)) = closest_pair(&slots, &dist) else {
            break;
        };
        let (Some(ca), Some(cb)) = (slots[a].take(), slots[b].take()) else {
            return Err(ReferenceError::InvalidTaxonomy(
                "merge selected an inactive cluster".to_string(),
            ));
        };
        let (first, second) = if ca.key <= cb.key { (&ca, &cb) } else { (&cb, &ca) };

        let id = NodeId(nodes.len());
        let mut leaves = nodes[first.node.index()].leaves.clone();
        leaves.extend_from_slice(&nodes[second.node.index()].leaves);
        leaves.sort();
        let n_cells = leaves.iter().map(|l| nodes[l.index()].n_cells).sum();
        let profile = combine_leaves(&nodes, &leaves, config.weighting);

        nodes[first.node.index()].parent = Some(id);
        nodes[second.node.index()].parent = Some(id);
        nodes.push(TaxonomyNode {
            id,
            parent: None,
            children: Some([first.node, second.node]),
            name: None,
            leaves,
            n_cells,
            height: d as f32,
            profile,
        });
        tracing::debug!(
            node = %id,
            first = %first.node,
            second = %second.node,
            distance = d,
            "merged clusters"
        );

        // Lance-Williams update for average linkage, merged cluster kept in slot `a`.
        let (na, nb) = (ca.size as f64, cb.size as f64);
        for k in 0..slots.len() {
            if k == a || slots[k].is_none() {
                continue;
            }
            let merged = (na * dist[a][k] + nb * dist[b][k]) / (na + nb);
            dist[a][k] = merged;
            dist[k][a] = merged;
        }
        slots[a] = Some(Cluster {
            node: id,
            key: ca.key.min(cb.key),
            size: ca.size + cb.size,
        });
    }

    let root = NodeId(nodes.len() - 1);
    tracing::info!(
        leaves = n_leaves,
        nodes = nodes.len(),
        "built reference taxonomy"
    );
    Taxonomy::from_nodes(nodes, root)
}

/// Symmetric `1 - r` matrix between leaf profiles; rows computed in parallel.
fn leaf_distances(
    store: &ProfileStore,
    config: &ClassifierConfig,
) -> Result<Vec<Vec<f64>>, ReferenceError> {
    let prepared: Vec<Vec<f32>> = store
        .profiles()
        .iter()
        .map(|p| prepare(config.method, &p.values))
        .collect();
    let n = prepared.len();
    let pool = build_pool(config.workers)?;
    let upper: Vec<Vec<f64>> = pool.install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| 1.0 - pearson(&prepared[i], &prepared[j]) as f64)
                    .collect()
            })
            .collect()
    });

    let mut dist = vec![vec![0f64; n]; n];
    for (i, row) in upper.iter().enumerate() {
        for (offset, &d) in row.iter().enumerate() {
            let j = i + 1 + offset;
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }
    Ok(dist)
}

fn closest_pair(slots: &[Option<Cluster>], dist: &[Vec<f64>]) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64, (usize, usize))> = None;
    for i in 0..slots.len() {
        let Some(ci) = &slots[i] else { continue };
        for j in (i + 1)..slots.len() {
            let Some(cj) = &slots[j] else { continue };
            let d = dist[i][j];
            let keys = (ci.key.min(cj.key), ci.key.max(cj.key));
            let better = match &best {
                None => true,
                Some((_, _, bd, bkeys)) => d < *bd || (d == *bd && keys < *bkeys),
            };
            if better {
                best = Some((i, j, d, keys));
            }
        }
    }
    best.map(|(i, j, d, _)| (i, j, d))
}

/// Mean of the member leaf profiles; with [`ProfileWeighting::Cells`] each leaf is weighted
/// by its reference cell count.
pub fn combine_leaves(
    nodes: &[TaxonomyNode],
    leaves: &[NodeId],
    weighting: ProfileWeighting,
) -> Vec<f32> {
    let n_genes = nodes.first().map_or(0, |n| n.profile.len());
    let mut sums = vec![0f64; n_genes];
    let mut total = 0f64;
    for leaf in leaves {
        let node = &nodes[leaf.index()];
        let w = match weighting {
            ProfileWeighting::Leaves => 1.0,
            ProfileWeighting::Cells => node.n_cells.max(1) as f64,
        };
        for (s, &v) in sums.iter_mut().zip(&node.profile) {
            *s += w * v as f64;
        }
        total += w;
    }
    if total == 0.0 {
        return vec![0.0; n_genes];
    }
    sums.iter().map(|s| (s / total) as f32).collect()
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_taxonomy.rs"]
mod tests;
