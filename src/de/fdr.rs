//! Benjamini-Hochberg false discovery rate adjustment

use std::cmp::Ordering;

/// Apply Benjamini-Hochberg FDR correction to p-values
///
/// NaN p-values stay NaN and do not count towards the number of tests.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    // NaN sorts last
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| match (pvalues[a].is_nan(), pvalues[b].is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => pvalues[a].partial_cmp(&pvalues[b]).unwrap_or(Ordering::Equal),
    });

    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; n];
    }

    // Walk from the largest p-value down, keeping the running minimum
    let mut padj = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;
    let mut rank = m;
    for &i in indices.iter().rev() {
        let p = pvalues[i];
        if p.is_finite() {
            let adj = (p * m as f64 / rank as f64).min(1.0);
            cummin = cummin.min(adj);
            padj[i] = cummin;
            rank -= 1;
        }
    }

    padj
}

/// Indices whose adjusted p-value is strictly below `alpha`
pub fn rejected(padj: &[f64], alpha: f64) -> Vec<usize> {
    padj.iter()
        .enumerate()
        .filter(|(_, &q)| q.is_finite() && q < alpha)
        .map(|(i, _)| i)
        .collect()
}
