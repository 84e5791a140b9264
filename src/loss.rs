//! Softmax cross-entropy over a batch of class scores.
//!
//! These helpers assert their shape contracts; the public entry points on
//! `Network` validate inputs before calling them.

use crate::Matrix;

/// Mean softmax cross-entropy of `scores` against integer `labels`.
///
/// Scores are shifted by their row maximum before exponentiating, so large
/// magnitudes do not overflow.
pub fn softmax_cross_entropy(scores: &Matrix, labels: &[usize]) -> f64 {
    assert_eq!(
        scores.rows(),
        labels.len(),
        "scores rows {} do not match labels len {}",
        scores.rows(),
        labels.len()
    );
    assert!(scores.rows() > 0, "softmax_cross_entropy requires a non-empty batch");

    let mut total = 0.0_f64;
    for (r, &label) in labels.iter().enumerate() {
        let row = scores.row(r);
        total += log_sum_exp(row) - row[label];
    }
    total / labels.len() as f64
}

/// Softmax cross-entropy + gradient w.r.t. the scores.
///
/// Writes `d_scores = (softmax(scores) - onehot(labels)) / N` and returns the
/// mean loss over the batch.
pub fn softmax_cross_entropy_backward(
    scores: &Matrix,
    labels: &[usize],
    d_scores: &mut Matrix,
) -> f64 {
    assert_eq!(
        scores.rows(),
        labels.len(),
        "scores rows {} do not match labels len {}",
        scores.rows(),
        labels.len()
    );
    assert!(
        scores.rows() > 0,
        "softmax_cross_entropy_backward requires a non-empty batch"
    );

    let n = labels.len();
    let inv_n = 1.0 / n as f64;
    d_scores.clone_from(scores);

    let mut total = 0.0_f64;
    for (r, &label) in labels.iter().enumerate() {
        let row = d_scores.row_mut(r);
        let max = row_max(row);

        let mut sum_exp = 0.0_f64;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum_exp += *v;
        }

        // -log p[label] = log(sum_exp) - (s[label] - max)
        total += sum_exp.ln() - (scores.get(r, label) - max);

        let inv_sum = 1.0 / sum_exp;
        for v in row.iter_mut() {
            *v *= inv_sum * inv_n;
        }
        row[label] -= inv_n;
    }

    total * inv_n
}

/// Row-wise probabilities.
pub fn softmax(scores: &Matrix) -> Matrix {
    let mut probs = scores.clone();
    for r in 0..probs.rows() {
        let row = probs.row_mut(r);
        let max = row_max(row);
        let mut sum_exp = 0.0_f64;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum_exp += *v;
        }
        for v in row.iter_mut() {
            *v /= sum_exp;
        }
    }
    probs
}

/// Index of the maximum value; ties go to the lowest index.
///
/// NaN entries never win. Panics on an empty slice.
#[inline]
pub fn argmax(xs: &[f64]) -> usize {
    assert!(!xs.is_empty(), "argmax of an empty slice");
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate().skip(1) {
        if x > xs[best] || xs[best].is_nan() {
            best = i;
        }
    }
    best
}

#[inline]
fn row_max(xs: &[f64]) -> f64 {
    xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[inline]
fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = row_max(xs);
    let sum_exp: f64 = xs.iter().map(|&x| (x - max).exp()).sum();
    max + sum_exp.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_scores_give_log_k() {
        let scores = Matrix::zeros(3, 4);
        let loss = softmax_cross_entropy(&scores, &[0, 1, 3]);
        assert!((loss - 4.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn backward_matches_forward_and_sums_to_zero_per_row() {
        let scores = Matrix::from_vec(2, 3, vec![1.0, 2.0, 0.5, -1.0, 0.0, 3.0]).unwrap();
        let labels = [1, 0];
        let mut d = Matrix::zeros(2, 3);
        let loss = softmax_cross_entropy_backward(&scores, &labels, &mut d);

        assert!((loss - softmax_cross_entropy(&scores, &labels)).abs() < 1e-12);
        for r in 0..2 {
            let row_sum: f64 = d.row(r).iter().sum();
            assert!(row_sum.abs() < 1e-12);
        }
        // The true class always gets a negative gradient.
        assert!(d.get(0, 1) < 0.0);
        assert!(d.get(1, 0) < 0.0);
    }

    #[test]
    fn large_scores_do_not_overflow() {
        let scores = Matrix::from_vec(1, 3, vec![1000.0, 0.0, -1000.0]).unwrap();
        let mut d = Matrix::zeros(1, 3);
        let good = softmax_cross_entropy_backward(&scores, &[0], &mut d);
        assert!(good.is_finite() && good < 1e-12);
        assert!(d.as_slice().iter().all(|v| v.is_finite()));

        let bad = softmax_cross_entropy(&scores, &[2]);
        assert!((bad - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn softmax_rows_are_distributions() {
        let scores = Matrix::from_vec(2, 2, vec![0.0, 0.0, 800.0, -800.0]).unwrap();
        let p = softmax(&scores);
        assert_eq!(p.row(0), &[0.5, 0.5]);
        assert!((p.get(1, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn argmax_breaks_ties_to_lowest_index() {
        assert_eq!(argmax(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax(&[-1.0]), 0);
    }
}
