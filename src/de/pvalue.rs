//! P-values from t statistics

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
/// Infinite `df` falls back to the standard normal limit.
pub fn two_sided_t_pvalue(stat: f64, df: f64) -> f64 {
    if !stat.is_finite() || !(df > 0.0) {
        return f64::NAN;
    }

    let df = df.min(1e6);
    match StudentsT::new(0.0, 1.0, df) {
        Ok(t_dist) => (2.0 * t_dist.cdf(-stat.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

/// Welch two-sample t statistic and Welch-Satterthwaite degrees of freedom
pub fn welch_t(mean1: f64, var1: f64, n1: usize, mean2: f64, var2: f64, n2: usize) -> (f64, f64) {
    let a = var1 / n1 as f64;
    let b = var2 / n2 as f64;
    let se2 = a + b;
    if !(se2 > 0.0) {
        return (f64::NAN, f64::NAN);
    }
    let t = (mean1 - mean2) / se2.sqrt();
    let df = se2 * se2 / (a * a / (n1 as f64 - 1.0) + b * b / (n2 as f64 - 1.0));
    (t, df)
}
