use super::*;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn test_pearson_perfect_and_inverse() {
    let x = [1.0f32, 2.0, 3.0, 4.0];
    let y = [2.0f32, 4.0, 6.0, 8.0];
    let z = [8.0f32, 6.0, 4.0, 2.0];
    assert!(approx(pearson(&x, &y), 1.0));
    assert!(approx(pearson(&x, &z), -1.0));
}

#[test]
fn test_pearson_constant_is_zero() {
    let x = [1.0f32, 1.0, 1.0];
    let y = [0.5f32, 2.0, 3.0];
    assert_eq!(pearson(&x, &y), 0.0);
    assert_eq!(spearman(&x, &y), 0.0);
}

#[test]
fn test_short_vectors_score_zero() {
    assert_eq!(pearson(&[1.0], &[2.0]), 0.0);
    assert_eq!(spearman(&[], &[]), 0.0);
}

#[test]
fn test_average_ranks_with_ties() {
    let ranks = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
    assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
}

#[test]
fn test_spearman_is_monotone_invariant() {
    let x = [0.1f32, 0.5, 2.0, 9.0, 3.0];
    let y: Vec<f32> = x.iter().map(|v| v.ln_1p() * 7.0).collect();
    assert!(approx(spearman(&x, &y), 1.0));
    assert!(pearson(&x, &y) < 1.0);
}

#[test]
fn test_correlate_dispatch() {
    let x = [1.0f32, 2.0, 3.0, 100.0];
    let y = [1.0f32, 2.0, 3.0, 4.0];
    assert!(approx(correlate(CorrelationMethod::Spearman, &x, &y), 1.0));
    assert!(correlate(CorrelationMethod::Pearson, &x, &y) < 0.99);
}

#[test]
fn test_prepare_matches_correlate() {
    let x = [0.0f32, 3.0, 1.0, 1.0, 8.0];
    let y = [2.0f32, 1.0, 0.5, 4.0, 9.0];
    for method in [CorrelationMethod::Pearson, CorrelationMethod::Spearman] {
        let direct = correlate(method, &x, &y);
        let prepared = pearson(&prepare(method, &x), &prepare(method, &y));
        assert_eq!(direct.to_bits(), prepared.to_bits());
    }
}
