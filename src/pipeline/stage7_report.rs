use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::model::config::ClassifierConfig;
use crate::model::result::{GeneLoss, ScoreTable};
use crate::model::taxonomy::Taxonomy;
use crate::pipeline::stage3_flat::FlatOutput;
use crate::pipeline::stage5_hierarchy::HierarchicalOutput;
use crate::pipeline::stage6_threshold::relabel;
use crate::report::text::render_report_text;
use crate::report::{
    RunMeta, SummaryData, format_f32_6, summarize_flat, summarize_hierarchical, taxonomy_view,
};

pub const FLAT_TSV: &str = "flat.tsv";
pub const HIERARCHICAL_TSV: &str = "hierarchical.tsv";
pub const SUMMARY_JSON: &str = "summary.json";
pub const TAXONOMY_JSON: &str = "taxonomy.json";
pub const SCORES_JSON: &str = "scores.json";
pub const REPORT_TXT: &str = "report.txt";

/// Persisted score table, enough to re-threshold without the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCache {
    pub reference: String,
    pub tool_version: String,
    /// Configuration the scores were computed with.
    pub config: ClassifierConfig,
    pub gene_loss: Vec<GeneLoss>,
    pub table: ScoreTable,
}

impl ScoreCache {
    pub fn from_output(output: &HierarchicalOutput, config: &ClassifierConfig) -> Self {
        Self {
            reference: output.reference.clone(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            config: config.clone(),
            gene_loss: output.gene_loss.clone(),
            table: output.scores.clone(),
        }
    }

    /// The scoring configuration with only the threshold replaced.
    pub fn config_at(&self, threshold: f32) -> ClassifierConfig {
        ClassifierConfig {
            threshold,
            ..self.config.clone()
        }
    }

    /// Rebuilds the hierarchical output at `threshold` from cached scores alone.
    pub fn relabel(
        self,
        taxonomy: &Taxonomy,
        threshold: f32,
    ) -> Result<HierarchicalOutput, RunError> {
        let results = relabel(taxonomy, &self.table, threshold)?;
        Ok(HierarchicalOutput {
            reference: self.reference,
            cells: self.table.cells.iter().map(|c| c.cell.clone()).collect(),
            results,
            scores: self.table,
            gene_loss: self.gene_loss,
        })
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let cache: ScoreCache = serde_json::from_reader(reader)?;
        tracing::info!(
            reference = %cache.reference,
            cells = cache.table.cells.len(),
            "loaded score table {}",
            path.display()
        );
        Ok(cache)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub query: &'a str,
    pub n_cells: usize,
    pub normalize: bool,
    pub config: &'a ClassifierConfig,
    pub flat: &'a [FlatOutput],
    pub hierarchical: Option<(&'a HierarchicalOutput, &'a Taxonomy)>,
}

pub fn build_summary(input: &ReportInput<'_>) -> SummaryData {
    SummaryData {
        run: RunMeta::new(input.query, input.n_cells, input.normalize, input.config),
        flat: input.flat.iter().map(summarize_flat).collect(),
        hierarchical: input.hierarchical.map(|(h, _)| summarize_hierarchical(h)),
    }
}

pub fn write_reports(input: &ReportInput<'_>, out_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(out_dir)?;

    if !input.flat.is_empty() {
        write_flat_tsv(input.flat, &out_dir.join(FLAT_TSV))?;
    }
    if let Some((output, taxonomy)) = input.hierarchical {
        write_hierarchical_tsv(output, &out_dir.join(HIERARCHICAL_TSV))?;
        write_json(&taxonomy_view(taxonomy), &out_dir.join(TAXONOMY_JSON))?;
        write_json(
            &ScoreCache::from_output(output, input.config),
            &out_dir.join(SCORES_JSON),
        )?;
    }

    let summary = build_summary(input);
    write_json(&summary, &out_dir.join(SUMMARY_JSON))?;
    write_text(&out_dir.join(REPORT_TXT), &render_report_text(&summary))?;

    tracing::info!("reports written to {}", out_dir.display());
    Ok(())
}

/// One row per cell; four columns per reference.
fn write_flat_tsv(outputs: &[FlatOutput], path: &Path) -> io::Result<()> {
    let cells = &outputs[0].cells;
    if outputs.iter().any(|o| o.cells != *cells) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "flat outputs cover different cells",
        ));
    }

    let mut w = BufWriter::new(File::create(path)?);
    let mut header = vec!["cell".to_string()];
    for o in outputs {
        let r = &o.reference;
        header.extend([
            format!("{r}_label"),
            format!("{r}_score"),
            format!("{r}_fine_tuned"),
            format!("{r}_error"),
        ]);
    }
    writeln!(w, "{}", header.join("\t"))?;

    for (cell_idx, cell) in cells.iter().enumerate() {
        let mut row = vec![cell.clone()];
        for o in outputs {
            match &o.calls[cell_idx] {
                Ok(call) => row.extend([
                    call.label.clone(),
                    format_f32_6(call.score),
                    call.fine_tuned.clone().unwrap_or_default(),
                    String::new(),
                ]),
                Err(err) => row.extend([
                    "Unassigned".to_string(),
                    String::new(),
                    String::new(),
                    err.to_string(),
                ]),
            }
        }
        writeln!(w, "{}", row.join("\t"))?;
    }
    w.flush()
}

fn write_hierarchical_tsv(output: &HierarchicalOutput, path: &Path) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "cell\tlabel\tlabel_kind\tconfidence\tpath\terror")?;
    for (cell, r) in output.cells.iter().zip(&output.results) {
        let path = r
            .path
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(">");
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            cell,
            r.label,
            r.label.kind(),
            r.confidence.map(format_f32_6).unwrap_or_default(),
            path,
            r.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
        )?;
    }
    w.flush()
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, value)?;
    writeln!(w)?;
    w.flush()
}

fn write_text(path: &Path, contents: &str) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(contents.as_bytes())?;
    w.flush()
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage7_report.rs"]
mod tests;
