use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::config::ClassifierConfig;
use crate::model::result::{GeneLoss, Label};
use crate::model::taxonomy::{NodeId, Taxonomy};
use crate::pipeline::stage3_flat::FlatOutput;
use crate::pipeline::stage5_hierarchy::HierarchicalOutput;

pub mod text;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub kind: &'static str,
    pub count: usize,
    pub fraction: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub tool_name: String,
    pub tool_version: String,
    pub query: String,
    pub n_cells: usize,
    pub normalize: bool,
    pub method: &'static str,
    pub n_genes: usize,
    pub threshold: f32,
    pub fine_tune: bool,
    pub min_shared_genes: usize,
}

impl RunMeta {
    pub fn new(query: &str, n_cells: usize, normalize: bool, config: &ClassifierConfig) -> Self {
        Self {
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            query: query.to_string(),
            n_cells,
            normalize,
            method: config.method.as_str(),
            n_genes: config.n_genes,
            threshold: config.threshold,
            fine_tune: config.fine_tune,
            min_shared_genes: config.min_shared_genes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlatSummary {
    pub reference: String,
    pub failed_cells: usize,
    pub score_median: f32,
    pub labels: Vec<LabelCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchicalSummary {
    pub reference: String,
    pub failed_cells: usize,
    pub leaf_fraction: f32,
    pub intermediate_fraction: f32,
    pub unassigned_fraction: f32,
    pub abs_confidence_median: f32,
    pub abs_confidence_p10: f32,
    pub labels: Vec<LabelCount>,
    pub gene_loss: Vec<GeneLoss>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryData {
    pub run: RunMeta,
    pub flat: Vec<FlatSummary>,
    pub hierarchical: Option<HierarchicalSummary>,
}

/// Counts per label, most frequent first, ties by label text.
pub fn label_counts<'a>(labels: impl Iterator<Item = (&'static str, &'a str)>) -> Vec<LabelCount> {
    let mut counts: BTreeMap<(&'a str, &'static str), usize> = BTreeMap::new();
    let mut total = 0usize;
    for (kind, label) in labels {
        *counts.entry((label, kind)).or_insert(0) += 1;
        total += 1;
    }
    let mut out: Vec<LabelCount> = counts
        .into_iter()
        .map(|((label, kind), count)| LabelCount {
            label: label.to_string(),
            kind,
            count,
            fraction: count as f32 / total as f32,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

pub fn summarize_flat(output: &FlatOutput) -> FlatSummary {
    let labels: Vec<(String, String)> = output.labels();
    let kinds = output.calls.iter().map(|c| match c {
        Ok(_) => "type",
        Err(_) => "unassigned",
    });
    let scores: Vec<f32> = output
        .calls
        .iter()
        .filter_map(|c| c.as_ref().ok().map(|c| c.score))
        .collect();
    FlatSummary {
        reference: output.reference.clone(),
        failed_cells: output.n_failed(),
        score_median: median(&scores),
        labels: label_counts(kinds.zip(labels.iter().map(|(_, l)| l.as_str()))),
    }
}

pub fn summarize_hierarchical(output: &HierarchicalOutput) -> HierarchicalSummary {
    let rendered: Vec<String> = output.results.iter().map(|r| r.label.to_string()).collect();
    let labels = label_counts(
        output
            .results
            .iter()
            .zip(&rendered)
            .map(|(r, s)| (r.label.kind(), s.as_str())),
    );

    let n = output.results.len();
    let fraction_of = |pred: fn(&Label) -> bool| {
        if n == 0 {
            0.0
        } else {
            output.results.iter().filter(|r| pred(&r.label)).count() as f32 / n as f32
        }
    };
    let confidences: Vec<f32> = output
        .results
        .iter()
        .filter_map(|r| r.confidence.map(f32::abs))
        .collect();

    HierarchicalSummary {
        reference: output.reference.clone(),
        failed_cells: output.n_failed(),
        leaf_fraction: fraction_of(|l| matches!(l, Label::Type(_))),
        intermediate_fraction: fraction_of(|l| matches!(l, Label::Intermediate(_))),
        unassigned_fraction: fraction_of(|l| matches!(l, Label::Unassigned)),
        abs_confidence_median: median(&confidences),
        abs_confidence_p10: p10(&confidences),
        labels,
        gene_loss: output.gene_loss.clone(),
    }
}

/// Profile-free view of the taxonomy for external tree rendering.
#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyView {
    pub root: NodeId,
    pub nodes: Vec<TaxonomyNodeView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyNodeView {
    pub id: NodeId,
    pub label: String,
    pub parent: Option<NodeId>,
    pub children: Option<[NodeId; 2]>,
    pub leaves: Vec<String>,
    pub n_cells: usize,
    pub height: f32,
}

pub fn taxonomy_view(taxonomy: &Taxonomy) -> TaxonomyView {
    let leaf_name = |id: NodeId| {
        taxonomy
            .node(id)
            .name
            .clone()
            .unwrap_or_else(|| id.to_string())
    };
    TaxonomyView {
        root: taxonomy.root(),
        nodes: taxonomy
            .nodes()
            .iter()
            .map(|n| TaxonomyNodeView {
                id: n.id,
                label: n.name.clone().unwrap_or_else(|| n.id.to_string()),
                parent: n.parent,
                children: n.children,
                leaves: n.leaves.iter().map(|l| leaf_name(*l)).collect(),
                n_cells: n.n_cells,
                height: n.height,
            })
            .collect(),
    }
}

pub fn format_f32_6(v: f32) -> String {
    format!("{:.6}", v)
}

pub fn quantile_indexed(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f32 * p).ceil() as usize;
    sorted[idx]
}

pub fn median(values: &[f32]) -> f32 {
    quantile_indexed(values, 0.5)
}

pub fn p10(values: &[f32]) -> f32 {
    quantile_indexed(values, 0.10)
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
