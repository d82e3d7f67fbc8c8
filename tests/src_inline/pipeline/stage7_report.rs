use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::model::config::CorrelationMethod;
use crate::model::result::Label;
use crate::pipeline::fixtures::*;
use crate::pipeline::stage3_flat::run_flat;
use crate::pipeline::stage4_taxonomy::build_taxonomy;
use crate::pipeline::stage5_hierarchy::run_hierarchical;
use crate::pipeline::workers::CancelToken;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("kira_celltyper_report_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

struct Run {
    config: ClassifierConfig,
    taxonomy: Taxonomy,
    flat: FlatOutput,
    hierarchical: HierarchicalOutput,
}

fn run() -> Run {
    let mut sparse = vec![0.0; N_GENES];
    sparse[5] = 1.0;
    let q = query(&[
        ("cell-a", profile_a()),
        ("cell-ab", profile_ab_midpoint()),
        ("cell-sparse", sparse),
    ]);
    let store = abc_store();
    let config = linear_config(CorrelationMethod::Pearson);
    let taxonomy = build_taxonomy(&store, &config).unwrap();
    let cancel = CancelToken::new();
    let flat = run_flat("abc", &store, &q, &config, &cancel).unwrap();
    let hierarchical = run_hierarchical("abc", &store, &taxonomy, &q, &config, &cancel).unwrap();
    Run {
        config,
        taxonomy,
        flat,
        hierarchical,
    }
}

fn input(run: &Run) -> ReportInput<'_> {
    ReportInput {
        query: "query",
        n_cells: 3,
        normalize: false,
        config: &run.config,
        flat: std::slice::from_ref(&run.flat),
        hierarchical: Some((&run.hierarchical, &run.taxonomy)),
    }
}

#[test]
fn test_reports_written() {
    let run = run();
    let dir = make_temp_dir();
    write_reports(&input(&run), &dir).unwrap();

    for name in [
        FLAT_TSV,
        HIERARCHICAL_TSV,
        SUMMARY_JSON,
        TAXONOMY_JSON,
        SCORES_JSON,
        REPORT_TXT,
    ] {
        assert!(dir.join(name).exists(), "{name}");
    }

    let flat = fs::read_to_string(dir.join(FLAT_TSV)).unwrap();
    let lines: Vec<&str> = flat.lines().collect();
    assert_eq!(
        lines[0],
        "cell\tabc_label\tabc_score\tabc_fine_tuned\tabc_error"
    );
    assert_eq!(lines[1], "cell-a\tA\t1.000000\tA\t");
    assert!(lines[3].starts_with("cell-sparse\tUnassigned\t\t\tonly 1 genes shared"));

    let hier = fs::read_to_string(dir.join(HIERARCHICAL_TSV)).unwrap();
    let lines: Vec<&str> = hier.lines().collect();
    assert_eq!(lines[0], "cell\tlabel\tlabel_kind\tconfidence\tpath\terror");
    assert!(lines[1].starts_with("cell-a\tA\ttype\t"));
    assert!(lines[1].ends_with("\tNode4>Node3>Node0\t"));
    assert_eq!(
        lines[2],
        "cell-ab\tNode3\tintermediate\t0.000000\tNode4>Node3\t"
    );
    assert!(lines[3].starts_with("cell-sparse\tUnassigned\tunassigned\t\t\t"));
}

#[test]
fn test_summary_json_fields() {
    let run = run();
    let dir = make_temp_dir();
    write_reports(&input(&run), &dir).unwrap();

    let raw = fs::read_to_string(dir.join(SUMMARY_JSON)).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(summary["run"]["method"], "pearson");
    assert_eq!(summary["run"]["n_cells"], 3);
    assert_eq!(summary["flat"][0]["reference"], "abc");
    assert_eq!(summary["flat"][0]["failed_cells"], 1);
    let h = &summary["hierarchical"];
    assert_eq!(h["failed_cells"], 1);
    assert_eq!(h["gene_loss"].as_array().unwrap().len(), 2);
    assert!(h["labels"].as_array().unwrap().len() >= 3);

    let tax: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join(TAXONOMY_JSON)).unwrap()).unwrap();
    assert_eq!(tax["root"], 4);
    assert_eq!(tax["nodes"][3]["label"], "Node3");
    assert_eq!(tax["nodes"][4]["leaves"], serde_json::json!(["A", "B", "C"]));
}

#[test]
fn test_scores_relabel_across_invocations() {
    let run = run();
    let dir = make_temp_dir();
    write_reports(&input(&run), &dir).unwrap();

    let cache = ScoreCache::load(&dir.join(SCORES_JSON)).unwrap();
    assert_eq!(cache.table, run.hierarchical.scores);

    let same = cache.clone().relabel(&run.taxonomy, 0.1).unwrap();
    assert_eq!(same.results, run.hierarchical.results);
    assert_eq!(same.cells, run.hierarchical.cells);

    let forced = cache.relabel(&run.taxonomy, 0.0).unwrap();
    assert!(matches!(forced.results[1].label, Label::Type(_)));
    assert_eq!(forced.results[2].label, Label::Unassigned);
}

#[test]
fn test_relabel_report_keeps_scoring_config() {
    let run = run();
    let dir = make_temp_dir();
    write_reports(&input(&run), &dir).unwrap();

    let cache = ScoreCache::load(&dir.join(SCORES_JSON)).unwrap();
    assert_eq!(cache.config, run.config);
    let config = cache.config_at(0.25);
    assert_eq!(config.method, CorrelationMethod::Pearson);
    assert_eq!(config.scale, run.config.scale);

    let output = cache.relabel(&run.taxonomy, 0.25).unwrap();
    let relabelled = make_temp_dir();
    let rerun = ReportInput {
        query: "scores.json",
        n_cells: output.cells.len(),
        normalize: false,
        config: &config,
        flat: &[],
        hierarchical: Some((&output, &run.taxonomy)),
    };
    write_reports(&rerun, &relabelled).unwrap();

    let raw = fs::read_to_string(relabelled.join(SUMMARY_JSON)).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(summary["run"]["method"], "pearson");
    assert!((summary["run"]["threshold"].as_f64().unwrap() - 0.25).abs() < 1e-6);
    let report = fs::read_to_string(relabelled.join(REPORT_TXT)).unwrap();
    assert!(report.contains("Method: pearson"));
}

#[test]
fn test_flat_only_run_skips_hierarchical_files() {
    let run = run();
    let dir = make_temp_dir();
    let mut only_flat = input(&run);
    only_flat.hierarchical = None;
    write_reports(&only_flat, &dir).unwrap();
    assert!(dir.join(FLAT_TSV).exists());
    assert!(!dir.join(HIERARCHICAL_TSV).exists());
    assert!(!dir.join(SCORES_JSON).exists());

    let report = fs::read_to_string(dir.join(REPORT_TXT)).unwrap();
    assert!(report.contains("Flat calls against abc"));
    assert!(!report.contains("Hierarchical calls"));
}
