use std::time::Instant;

use crate::error::{CellError, RunError};
use crate::model::config::ClassifierConfig;
use crate::model::matrix::ExpressionMatrix;
use crate::model::profile::ProfileStore;
use crate::model::result::{CellScores, ClassificationResult, GeneLoss, NodeScore, ScoreTable};
use crate::model::taxonomy::{NodeId, Taxonomy};
use crate::pipeline::stage2_genes::{QueryAlignment, gather, select_discriminating_genes};
use crate::pipeline::stage6_threshold::relabel;
use crate::pipeline::workers::{CancelToken, map_cells};
use crate::stats::{pearson, prepare};

#[derive(Debug, Clone)]
pub struct HierarchicalOutput {
    pub reference: String,
    pub cells: Vec<String>,
    pub results: Vec<ClassificationResult>,
    pub scores: ScoreTable,
    pub gene_loss: Vec<GeneLoss>,
}

impl HierarchicalOutput {
    pub fn n_failed(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Query-independent data of one internal node, restricted to its discriminating genes.
#[derive(Debug, Clone)]
pub struct NodePlan {
    pub node: NodeId,
    pub children: [NodeId; 2],
    pub genes: Vec<usize>,
    pub loss: GeneLoss,
    centroids: [Vec<f32>; 2],
    prepared: [Vec<f32>; 2],
}

impl NodePlan {
    fn new(
        taxonomy: &Taxonomy,
        node: NodeId,
        alignment: &QueryAlignment,
        config: &ClassifierConfig,
    ) -> Option<Self> {
        let children = taxonomy.node(node).children?;
        let member_profiles = |child: NodeId| -> Vec<&[f32]> {
            taxonomy
                .node(child)
                .leaves
                .iter()
                .map(|leaf| taxonomy.node(*leaf).profile.as_slice())
                .collect()
        };
        let selection = select_discriminating_genes(
            &member_profiles(children[0]),
            &member_profiles(children[1]),
            config.n_genes,
            alignment,
        );

        let left = gather(&taxonomy.node(children[0]).profile, &selection.genes);
        let right = gather(&taxonomy.node(children[1]).profile, &selection.genes);
        let prepared = [prepare(config.method, &left), prepare(config.method, &right)];

        let fraction = selection.loss_fraction();
        let loss = GeneLoss {
            node,
            selected: selection.selected,
            missing: selection.missing,
            flagged: fraction > config.gene_loss_warn_fraction,
        };

        Some(Self {
            node,
            children,
            genes: selection.genes,
            loss,
            centroids: [left, right],
            prepared,
        })
    }

    /// Scores one query cell (dense over the reference universe) at this node.
    pub fn score(&self, dense: &[f32], config: &ClassifierConfig) -> NodeScore {
        let query = gather(dense, &self.genes);
        let confidence = contrast_confidence(&query, &self.centroids[0], &self.centroids[1]);

        let prepared_query = prepare(config.method, &query);
        let profile_scores = [
            pearson(&prepared_query, &self.prepared[0]),
            pearson(&prepared_query, &self.prepared[1]),
        ];
        let chosen = if profile_scores[0] > profile_scores[1] {
            self.children[0]
        } else if profile_scores[1] > profile_scores[0] {
            self.children[1]
        } else if confidence >= 0.0 {
            self.children[0]
        } else {
            self.children[1]
        };

        NodeScore {
            node: self.node,
            confidence,
            profile_scores,
            chosen,
        }
    }
}

/// Children whose centered profiles are closer to collinear than this cannot be separated by
/// regression.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// Scores closer to zero than this are below the resolution of `f32` inputs.
const SCORE_RESOLUTION: f64 = 1e-6;

/// Signed evidence for continuing past a node.
///
/// The query is fitted as `a + b * left + c * right` by least squares over the selected genes,
/// and the score is `(b - c) / (|b| + |c|)`. It lies in `[-1, 1]` and is positive toward
/// `left`. It is 1 at `left`, -1 at `right` and 0 at their midpoint, and any positive rescaling
/// or shift of the query leaves it unchanged.
///
/// When the children are collinear on the selected genes the fit is undefined, and half the
/// difference of the query's correlations with the two children is used instead. That is 0
/// when the children do not differ at all.
pub fn contrast_confidence(query: &[f32], left: &[f32], right: &[f32]) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let q = centered(query);
    let l = centered(left);
    let r = centered(right);

    let qq = dot(&q, &q);
    let ll = dot(&l, &l);
    let rr = dot(&r, &r);
    if qq <= 0.0 {
        return 0.0;
    }
    let lr = dot(&l, &r);
    let lq = dot(&l, &q);
    let rq = dot(&r, &q);

    let det = ll * rr - lr * lr;
    let score = if det > COLLINEAR_TOLERANCE * ll * rr {
        let b = (rr * lq - lr * rq) / det;
        let c = (ll * rq - lr * lq) / det;
        let total = b.abs() + c.abs();
        if total > 0.0 { (b - c) / total } else { 0.0 }
    } else {
        let corr = |xq: f64, xx: f64| if xx > 0.0 { xq / (xx * qq).sqrt() } else { 0.0 };
        (corr(lq, ll) - corr(rq, rr)) * 0.5
    };

    if !score.is_finite() || score.abs() < SCORE_RESOLUTION {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

fn centered(values: &[f32]) -> Vec<f64> {
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64;
    values.iter().map(|&v| v as f64 - mean).collect()
}

fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// Builds the plan of every internal node for one query gene universe and reports gene loss.
pub fn plan_nodes(
    taxonomy: &Taxonomy,
    alignment: &QueryAlignment,
    config: &ClassifierConfig,
) -> Vec<NodePlan> {
    let plans: Vec<NodePlan> = taxonomy
        .internal_nodes()
        .filter_map(|n| NodePlan::new(taxonomy, n.id, alignment, config))
        .collect();
    for plan in &plans {
        if plan.loss.flagged {
            tracing::warn!(
                node = %plan.node,
                missing = plan.loss.missing,
                selected = plan.loss.selected,
                "{:.1}% of discriminating genes at {} were absent from the query",
                plan.loss.fraction() * 100.0,
                plan.node
            );
        }
    }
    plans
}

/// Threshold-independent scores of every internal node for every query cell.
pub fn score_cells(
    store: &ProfileStore,
    taxonomy: &Taxonomy,
    plans: &[NodePlan],
    alignment: &QueryAlignment,
    query: &ExpressionMatrix,
    config: &ClassifierConfig,
    cancel: &CancelToken,
) -> Result<ScoreTable, RunError> {
    let cells = map_cells(config.workers, query.n_cells(), cancel, |cell| {
        let (dense, detected) = alignment.cell_vector(store, query, cell);
        let id = query.cells()[cell].clone();
        if detected < config.min_shared_genes {
            return CellScores {
                cell: id,
                error: Some(CellError::InsufficientOverlap {
                    shared: detected,
                    required: config.min_shared_genes,
                }),
                nodes: Vec::new(),
            };
        }
        CellScores {
            cell: id,
            error: None,
            nodes: plans.iter().map(|p| p.score(&dense, config)).collect(),
        }
    })?;

    Ok(ScoreTable {
        n_nodes: taxonomy.len(),
        root: taxonomy.root(),
        cells,
    })
}

/// Scores every cell once, then walks the taxonomy at `config.threshold`.
pub fn run_hierarchical(
    reference: &str,
    store: &ProfileStore,
    taxonomy: &Taxonomy,
    query: &ExpressionMatrix,
    config: &ClassifierConfig,
    cancel: &CancelToken,
) -> Result<HierarchicalOutput, RunError> {
    let started = Instant::now();
    let alignment = QueryAlignment::new(store, query);
    tracing::info!(
        reference,
        shared_genes = alignment.n_shared(),
        nodes = taxonomy.len(),
        cells = query.n_cells(),
        threshold = config.threshold,
        "hierarchical classification started"
    );

    let plans = plan_nodes(taxonomy, &alignment, config);
    let scores = score_cells(store, taxonomy, &plans, &alignment, query, config, cancel)?;
    let results = relabel(taxonomy, &scores, config.threshold)?;

    let output = HierarchicalOutput {
        reference: reference.to_string(),
        cells: query.cells().to_vec(),
        results,
        scores,
        gene_loss: plans.iter().map(|p| p.loss).collect(),
    };
    let failed = output.n_failed();
    if failed > 0 {
        tracing::warn!(
            reference,
            failed,
            "cells could not be classified (insufficient gene overlap)"
        );
    }
    tracing::info!(
        reference,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "hierarchical classification finished"
    );
    Ok(output)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_hierarchy.rs"]
mod tests;
