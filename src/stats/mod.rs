use std::cmp::Ordering;

use crate::model::config::CorrelationMethod;

const VARIANCE_FLOOR: f64 = 1e-12;

/// Correlation of two equally long vectors with the configured method.
///
/// Constant inputs carry no rank or linear information and score 0.
#[inline]
pub fn correlate(method: CorrelationMethod, x: &[f32], y: &[f32]) -> f32 {
    match method {
        CorrelationMethod::Pearson => pearson(x, y),
        CorrelationMethod::Spearman => spearman(x, y),
    }
}

/// Per-vector preprocessing so that `pearson(prepare(x), prepare(y))` equals
/// `correlate(method, x, y)`. Lets a fixed side be prepared once and reused.
pub fn prepare(method: CorrelationMethod, values: &[f32]) -> Vec<f32> {
    match method {
        CorrelationMethod::Pearson => values.to_vec(),
        CorrelationMethod::Spearman => average_ranks(values),
    }
}

pub fn pearson(x: &[f32], y: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mut sum_x = 0f64;
    let mut sum_y = 0f64;
    for i in 0..n {
        sum_x += x[i] as f64;
        sum_y += y[i] as f64;
    }
    let mean_x = sum_x / n as f64;
    let mean_y = sum_y / n as f64;

    let mut cov = 0f64;
    let mut var_x = 0f64;
    let mut var_y = 0f64;
    for i in 0..n {
        let dx = x[i] as f64 - mean_x;
        let dy = y[i] as f64 - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= VARIANCE_FLOOR || var_y <= VARIANCE_FLOOR {
        return 0.0;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0) as f32
}

pub fn spearman(x: &[f32], y: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    if x.len() < 2 || y.len() < 2 {
        return 0.0;
    }
    let rx = average_ranks(x);
    let ry = average_ranks(y);
    pearson(&rx, &ry)
}

/// 1-based ranks; tied values share the mean of the ranks they span.
pub fn average_ranks(values: &[f32]) -> Vec<f32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut ranks = vec![0f32; values.len()];
    let mut start = 0usize;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // ranks start..end (0-based) map to (start+1)..=end
        let rank = (start + 1 + end) as f32 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

#[cfg(test)]
#[path = "../../tests/src_inline/stats/tests.rs"]
mod tests;
