use super::*;
use crate::model::config::CorrelationMethod;
use crate::pipeline::fixtures::*;

fn run(query: &ExpressionMatrix, config: &ClassifierConfig) -> FlatOutput {
    run_flat("abc", &abc_store(), query, config, &CancelToken::new()).unwrap()
}

#[test]
fn test_reference_profiles_classify_as_themselves() {
    for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
        let q = query(&[("a", profile_a()), ("b", profile_b()), ("c", profile_c())]);
        let out = run(&q, &linear_config(method));
        let labels: Vec<String> = out.labels().into_iter().map(|(_, l)| l).collect();
        assert_eq!(labels, vec!["A", "B", "C"], "{}", method.as_str());
        for call in &out.calls {
            let call = call.as_ref().unwrap();
            assert!((call.score - 1.0).abs() < 1e-5);
            assert_eq!(call.scores.len(), 3);
            assert_eq!(call.fine_tuned.as_deref(), Some(call.label.as_str()));
        }
    }
}

#[test]
fn test_correlation_ignores_scale() {
    let scaled: Vec<f32> = profile_c().iter().map(|v| v * 3.0).collect();
    let q = query(&[("c3", scaled)]);
    let out = run(&q, &linear_config(CorrelationMethod::Pearson));
    let call = out.calls[0].as_ref().unwrap();
    assert_eq!(call.label, "C");
    assert!(call.scores[0] < 0.1 && call.scores[1] < 0.1);
}

#[test]
fn test_close_call_is_fine_tuned_among_candidates() {
    let q = query(&[("ab", profile_ab_midpoint())]);
    let mut config = linear_config(CorrelationMethod::Spearman);
    config.min_shared_genes = 2;
    let out = run(&q, &config);
    let call = out.calls[0].as_ref().unwrap();

    // both A and B are within the margin of the top score
    assert!((call.scores[0] - call.scores[1]).abs() < config.fine_tune_margin);
    let refined = call.fine_tuned.as_deref().unwrap();
    assert!(refined == "A" || refined == "B");
    assert_ne!(call.label, "C");
}

#[test]
fn test_fine_tuning_can_be_disabled() {
    let q = query(&[("a", profile_a())]);
    let mut config = linear_config(CorrelationMethod::Pearson);
    config.fine_tune = false;
    let out = run(&q, &config);
    assert_eq!(out.calls[0].as_ref().unwrap().fine_tuned, None);
}

#[test]
fn test_insufficient_overlap_is_per_cell() {
    let genes: Vec<String> = gene_names().into_iter().take(5).collect();
    let q = query_on(&genes, &[("sparse", profile_a())]);
    let out = run(&q, &linear_config(CorrelationMethod::Pearson));
    assert_eq!(
        out.calls[0],
        Err(CellError::InsufficientOverlap {
            shared: 5,
            required: 10
        })
    );
    assert_eq!(out.n_failed(), 1);
    assert_eq!(out.labels()[0].1, "Unassigned");
}

#[test]
fn test_undetected_genes_do_not_count_as_overlap() {
    let mut sparse = vec![0.0; N_GENES];
    for v in sparse.iter_mut().take(4) {
        *v = 1.0;
    }
    let q = query(&[("sparse", sparse), ("full", profile_b())]);
    let out = run(&q, &linear_config(CorrelationMethod::Spearman));
    assert!(out.calls[0].is_err());
    assert_eq!(out.calls[1].as_ref().unwrap().label, "B");
}

#[test]
fn test_results_do_not_depend_on_worker_count() {
    let cells: Vec<(String, Vec<f32>)> = (0..24)
        .map(|i| {
            let w = i as f32 / 23.0;
            let v = profile_a()
                .iter()
                .zip(profile_c())
                .map(|(a, c)| a * w + c * (1.0 - w))
                .collect();
            (format!("cell{i}"), v)
        })
        .collect();
    let refs: Vec<(&str, Vec<f32>)> = cells
        .iter()
        .map(|(n, v)| (n.as_str(), v.clone()))
        .collect();
    let q = query(&refs);

    let mut config = linear_config(CorrelationMethod::Spearman);
    config.workers = 1;
    let single = run(&q, &config);
    config.workers = 4;
    let multi = run(&q, &config);
    assert_eq!(single.calls, multi.calls);
    assert_eq!(single.cells, multi.cells);
}

#[test]
fn test_cancelled_run() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let q = query(&[("a", profile_a())]);
    let res = run_flat(
        "abc",
        &abc_store(),
        &q,
        &linear_config(CorrelationMethod::Pearson),
        &cancel,
    );
    assert!(matches!(res, Err(RunError::Cancelled)));
}

#[test]
fn test_argmax_prefers_first_and_skips_nan() {
    assert_eq!(argmax(&[0.5, 0.9, 0.9]), 1);
    assert_eq!(argmax(&[f32::NAN, 0.2, 0.1]), 1);
    assert_eq!(argmax(&[0.3]), 0);
}
