//! Statistical utility functions shared across modules
//!
//! Quantiles, moments, ranks and correlations used by the label assignment,
//! the differential-expression methods, the co-expression network and the
//! scoring utility. Percentiles everywhere follow the linear-interpolation
//! (type 7) definition.

use std::cmp::Ordering;

/// Quantile of already sorted data using linear interpolation (type 7)
///
/// h = (n - 1) * p, result = x[floor(h)] + frac(h) * (x[ceil(h)] - x[floor(h)])
pub fn quantile_sorted(sorted_x: &[f64], p: f64) -> f64 {
    let n = sorted_x.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_x[0];
    }

    let h = (n as f64 - 1.0) * p.clamp(0.0, 1.0);
    let lo = (h.floor() as usize).min(n - 1);
    let hi = (h.ceil() as usize).min(n - 1);

    if lo == hi {
        sorted_x[lo]
    } else {
        let frac = h - lo as f64;
        sorted_x[lo] + frac * (sorted_x[hi] - sorted_x[lo])
    }
}

/// Quantile of the finite entries of `x`; NaN when there are none
pub fn quantile(x: &[f64], p: f64) -> f64 {
    let mut finite: Vec<f64> = x.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    quantile_sorted(&finite, p)
}

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Variance with `ddof` delta degrees of freedom (0 = population, 1 = sample)
pub fn variance(x: &[f64], ddof: usize) -> f64 {
    if x.len() <= ddof {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / (x.len() - ddof) as f64
}

/// Median; an even count averages the two middle values
pub fn median(x: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n == 0 {
        f64::NAN
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Ranks starting at 1 with ties given their average rank
pub fn average_ranks(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && x[order[j + 1]] == x[order[i]] {
            j += 1;
        }
        // positions i..=j share rank ((i+1) + (j+1)) / 2
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Pearson correlation; NaN when either vector is constant
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len());
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
        syy += (b - my) * (b - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Spearman rank correlation (Pearson on average ranks)
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Standardize to zero mean and unit population variance.
/// A constant vector maps to all zeros.
pub fn standardize(x: &[f64]) -> Vec<f64> {
    let m = mean(x);
    let sd = variance(x, 0).sqrt();
    if !sd.is_finite() || sd == 0.0 {
        return vec![0.0; x.len()];
    }
    x.iter().map(|&v| (v - m) / sd).collect()
}

/// Per-group moments for a two-group comparison
#[derive(Debug, Clone, Copy)]
pub struct GroupMoments {
    pub n1: usize,
    pub n2: usize,
    pub mean1: f64,
    pub mean2: f64,
    /// Sample variance (ddof = 1) of group 1
    pub var1: f64,
    /// Sample variance (ddof = 1) of group 2
    pub var2: f64,
}

impl GroupMoments {
    /// Split `values` by `in_group1` and compute both groups' moments
    pub fn compute<'a, I>(values: I, in_group1: &[bool]) -> Self
    where
        I: IntoIterator<Item = &'a f64>,
    {
        let mut g1 = Vec::new();
        let mut g2 = Vec::new();
        for (&v, &first) in values.into_iter().zip(in_group1.iter()) {
            if first {
                g1.push(v);
            } else {
                g2.push(v);
            }
        }
        Self {
            n1: g1.len(),
            n2: g2.len(),
            mean1: mean(&g1),
            mean2: mean(&g2),
            var1: variance(&g1, 1),
            var2: variance(&g2, 1),
        }
    }

    /// Pooled residual variance of the two-group linear model
    pub fn pooled_variance(&self) -> f64 {
        let df = (self.n1 + self.n2) as f64 - 2.0;
        ((self.n1 as f64 - 1.0) * self.var1 + (self.n2 as f64 - 1.0) * self.var2) / df
    }

    pub fn mean_difference(&self) -> f64 {
        self.mean1 - self.mean2
    }
}

/// Trigamma function psi'(x) for x > 0
///
/// Recurrence psi'(x) = psi'(x + 1) + 1/x^2 up to x >= 6, then the
/// asymptotic expansion.
pub fn trigamma(x: f64) -> f64 {
    if !(x > 0.0) {
        return f64::NAN;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 6.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let x2 = 1.0 / (x * x);
    acc + 1.0 / x
        + x2 / 2.0
        + (1.0 / x) * x2 * (1.0 / 6.0 - x2 * (1.0 / 30.0 - x2 * (1.0 / 42.0 - x2 / 30.0)))
}

/// Tetragamma function psi''(x) for x > 0
fn tetragamma(x: f64) -> f64 {
    let mut x = x;
    let mut acc = 0.0;
    while x < 6.0 {
        acc -= 2.0 / (x * x * x);
        x += 1.0;
    }
    let x2 = 1.0 / (x * x);
    acc - x2
        - x2 / x
        - x2 * x2 * (0.5 - x2 * (1.0 / 6.0 - x2 * (1.0 / 6.0 - x2 * 0.3)))
}

/// Inverse of the trigamma function by Newton iteration
pub fn trigamma_inverse(y: f64) -> f64 {
    if !(y > 0.0) {
        return f64::NAN;
    }
    if y > 1e7 {
        return 1.0 / y.sqrt();
    }
    if y < 1e-6 {
        return 1.0 / y;
    }

    let mut x = 0.5 + 1.0 / y;
    for _ in 0..50 {
        let tri = trigamma(x);
        let dif = tri * (1.0 - tri / y) / tetragamma(x);
        x += dif;
        if -dif / x < 1e-8 {
            break;
        }
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_linear_interpolation() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((quantile(&x, 0.5) - 3.0).abs() < 1e-12);
        assert!((quantile(&x, 0.2) - 1.8).abs() < 1e-12);
        assert!((quantile(&x, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&x, 1.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_ignores_nan() {
        let x = vec![f64::NAN, 3.0, 1.0, f64::NAN, 2.0];
        assert!((quantile(&x, 0.5) - 2.0).abs() < 1e-12);
        assert!(quantile(&[f64::NAN], 0.5).is_nan());
    }

    #[test]
    fn test_median_even_count_averages() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn test_average_ranks_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
    }

    #[test]
    fn test_spearman_monotone() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![1.0, 4.0, 9.0, 16.0, 25.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
        let z: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!((spearman(&x, &z) + 1.0).abs() < 1e-12);
        assert!(spearman(&x, &[1.0; 5]).is_nan());
    }

    #[test]
    fn test_standardize_constant_is_zero() {
        assert_eq!(standardize(&[2.0, 2.0, 2.0]), vec![0.0, 0.0, 0.0]);
        let z = standardize(&[1.0, 2.0, 3.0]);
        assert!(mean(&z).abs() < 1e-12);
        assert!((variance(&z, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_group_moments() {
        let values = [1.0, 2.0, 3.0, 10.0, 12.0];
        let groups = [true, true, true, false, false];
        let m = GroupMoments::compute(values.iter(), &groups);
        assert_eq!(m.n1, 3);
        assert_eq!(m.n2, 2);
        assert!((m.mean1 - 2.0).abs() < 1e-12);
        assert!((m.mean2 - 11.0).abs() < 1e-12);
        assert!((m.var1 - 1.0).abs() < 1e-12);
        assert!((m.var2 - 2.0).abs() < 1e-12);
        assert!((m.pooled_variance() - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_trigamma_known_values() {
        // psi'(1) = pi^2 / 6
        let expected = std::f64::consts::PI.powi(2) / 6.0;
        assert!((trigamma(1.0) - expected).abs() < 1e-8);
        // psi'(0.5) = pi^2 / 2
        let expected = std::f64::consts::PI.powi(2) / 2.0;
        assert!((trigamma(0.5) - expected).abs() < 1e-8);
    }

    #[test]
    fn test_trigamma_inverse_roundtrip() {
        for &x in &[0.3, 1.0, 2.5, 10.0, 50.0] {
            let y = trigamma(x);
            assert!((trigamma_inverse(y) - x).abs() / x < 1e-6, "x = {}", x);
        }
    }
}
