use std::collections::BTreeSet;
use std::time::Instant;

use crate::error::{CellError, RunError};
use crate::model::config::ClassifierConfig;
use crate::model::matrix::ExpressionMatrix;
use crate::model::profile::ProfileStore;
use crate::model::result::FlatCall;
use crate::pipeline::stage2_genes::{QueryAlignment, gather, select_discriminating_genes};
use crate::pipeline::workers::{CancelToken, map_cells};
use crate::stats::{correlate, pearson, prepare};

#[derive(Debug, Clone)]
pub struct FlatOutput {
    pub reference: String,
    pub cells: Vec<String>,
    pub calls: Vec<Result<FlatCall, CellError>>,
}

impl FlatOutput {
    /// Cell identifier to label; failed cells read "Unassigned".
    pub fn labels(&self) -> Vec<(String, String)> {
        self.cells
            .iter()
            .zip(&self.calls)
            .map(|(cell, call)| {
                let label = match call {
                    Ok(c) => c.label.clone(),
                    Err(_) => "Unassigned".to_string(),
                };
                (cell.clone(), label)
            })
            .collect()
    }

    pub fn n_failed(&self) -> usize {
        self.calls.iter().filter(|c| c.is_err()).count()
    }
}

/// Reference profiles restricted to the genes shared with one query, prepared for scoring.
struct FlatContext<'a> {
    store: &'a ProfileStore,
    alignment: &'a QueryAlignment,
    config: &'a ClassifierConfig,
    shared: Vec<usize>,
    prepared_refs: Vec<Vec<f32>>,
}

impl<'a> FlatContext<'a> {
    fn new(
        store: &'a ProfileStore,
        alignment: &'a QueryAlignment,
        config: &'a ClassifierConfig,
    ) -> Self {
        let shared = alignment.shared_genes();
        let prepared_refs = store
            .profiles()
            .iter()
            .map(|p| prepare(config.method, &gather(&p.values, &shared)))
            .collect();
        Self {
            store,
            alignment,
            config,
            shared,
            prepared_refs,
        }
    }

    fn classify(&self, dense: &[f32], detected: usize) -> Result<FlatCall, CellError> {
        if detected < self.config.min_shared_genes {
            return Err(CellError::InsufficientOverlap {
                shared: detected,
                required: self.config.min_shared_genes,
            });
        }

        let query = prepare(self.config.method, &gather(dense, &self.shared));
        let scores: Vec<f32> = self
            .prepared_refs
            .iter()
            .map(|r| pearson(&query, r))
            .collect();
        let best = argmax(&scores);
        let profiles = self.store.profiles();

        let fine_tuned = if self.config.fine_tune && profiles.len() > 1 {
            let idx = self.fine_tune(dense, &scores);
            Some(profiles[idx].name.clone())
        } else {
            None
        };

        Ok(FlatCall {
            label: profiles[best].name.clone(),
            score: scores[best],
            fine_tuned,
            scores,
        })
    }

    /// Narrows the candidates close to the top score, rescoring on genes that separate the
    /// remaining candidates, until one is left or their scores agree within epsilon.
    fn fine_tune(&self, dense: &[f32], scores: &[f32]) -> usize {
        let cfg = self.config;
        let profiles = self.store.profiles();
        let top = scores[argmax(scores)];
        let mut candidates: Vec<usize> = (0..scores.len())
            .filter(|&i| scores[i] >= top - cfg.fine_tune_margin)
            .collect();
        let mut current: Vec<f32> = candidates.iter().map(|&i| scores[i]).collect();

        while candidates.len() > 1 {
            let mut genes: BTreeSet<usize> = BTreeSet::new();
            for (pos, &i) in candidates.iter().enumerate() {
                for &j in &candidates[pos + 1..] {
                    let selection = select_discriminating_genes(
                        &[profiles[i].values.as_slice()],
                        &[profiles[j].values.as_slice()],
                        cfg.fine_tune_genes_per_pair,
                        self.alignment,
                    );
                    genes.extend(selection.genes);
                }
            }
            if genes.len() < cfg.min_shared_genes {
                break;
            }
            let genes: Vec<usize> = genes.into_iter().collect();
            let query = gather(dense, &genes);
            current = candidates
                .iter()
                .map(|&i| correlate(cfg.method, &query, &gather(&profiles[i].values, &genes)))
                .collect();

            let max = current.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let min = current.iter().copied().fold(f32::INFINITY, f32::min);
            if max - min <= cfg.fine_tune_epsilon {
                break;
            }

            let mut keep: Vec<usize> = (0..candidates.len())
                .filter(|&k| current[k] >= max - cfg.fine_tune_margin)
                .collect();
            if keep.len() == candidates.len() {
                // always make progress: drop the weakest, later index on ties
                let weakest = (0..current.len())
                    .rev()
                    .min_by(|&a, &b| current[a].total_cmp(&current[b]))
                    .unwrap_or(0);
                keep.retain(|&k| k != weakest);
            }
            candidates = keep.iter().map(|&k| candidates[k]).collect();
            current = keep.iter().map(|&k| current[k]).collect();
        }

        candidates[argmax(&current)]
    }
}

/// First index holding the maximum; NaN never wins.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    for (idx, &v) in values.iter().enumerate() {
        if v > values[best] || values[best].is_nan() {
            best = idx;
        }
    }
    best
}

/// Scores every query cell against every reference profile and keeps the best match.
pub fn run_flat(
    reference: &str,
    store: &ProfileStore,
    query: &ExpressionMatrix,
    config: &ClassifierConfig,
    cancel: &CancelToken,
) -> Result<FlatOutput, RunError> {
    let started = Instant::now();
    let alignment = QueryAlignment::new(store, query);
    tracing::info!(
        reference,
        shared_genes = alignment.n_shared(),
        reference_genes = store.n_genes(),
        cells = query.n_cells(),
        "flat classification started"
    );

    let ctx = FlatContext::new(store, &alignment, config);
    let calls = map_cells(config.workers, query.n_cells(), cancel, |cell| {
        let (dense, detected) = alignment.cell_vector(store, query, cell);
        ctx.classify(&dense, detected)
    })?;

    let output = FlatOutput {
        reference: reference.to_string(),
        cells: query.cells().to_vec(),
        calls,
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
        "flat classification finished"
    );
    Ok(output)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_flat.rs"]
mod tests;
