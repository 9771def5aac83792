//! Moderated two-group linear-model test (empirical Bayes)
//!
//! Each gene's pooled residual variance is shrunk toward a common prior whose
//! degrees of freedom d0 and scale s0^2 are estimated by matching the first two
//! moments of the log variances. The moderated t statistic has d + d0 degrees
//! of freedom; p-values are Benjamini-Hochberg adjusted.

use std::collections::BTreeSet;

use statrs::function::gamma::digamma;

use super::fdr::{benjamini_hochberg, rejected};
use super::method::{check_input, gene_moments, gene_names, DifferentialExpressionMethod, MethodBudget};
use super::pvalue::two_sided_t_pvalue;
use crate::config::SignatureConfig;
use crate::data::ExpressionMatrix;
use crate::error::{Result, SignatureError};
use crate::stats::{mean, trigamma, trigamma_inverse};

const NAME: &str = "moderated_t";

#[derive(Debug, Clone, Copy, Default)]
pub struct ModeratedTTest;

/// Prior for the gene-wise variances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariancePrior {
    /// Prior degrees of freedom; infinite when the variances show no extra spread
    pub df: f64,
    pub scale: f64,
}

/// Fit a scaled inverse chi-square prior to variances `s2` with `df` residual
/// degrees of freedom each. Non-positive or non-finite variances are ignored.
pub fn fit_variance_prior(s2: &[f64], df: f64) -> Option<VariancePrior> {
    let usable: Vec<f64> = s2.iter().copied().filter(|v| v.is_finite() && *v > 0.0).collect();
    if usable.is_empty() {
        return None;
    }

    let half = df / 2.0;
    let e: Vec<f64> = usable
        .iter()
        .map(|v| v.ln() - digamma(half) + half.ln())
        .collect();
    let e_mean = mean(&e);

    if e.len() < 2 {
        return Some(VariancePrior {
            df: 0.0,
            scale: usable[0],
        });
    }

    let e_var = e.iter().map(|x| (x - e_mean) * (x - e_mean)).sum::<f64>() / (e.len() - 1) as f64
        - trigamma(half);

    if e_var > 0.0 {
        let d0 = 2.0 * trigamma_inverse(e_var);
        let scale = (e_mean + digamma(d0 / 2.0) - (d0 / 2.0).ln()).exp();
        Some(VariancePrior { df: d0, scale })
    } else {
        Some(VariancePrior {
            df: f64::INFINITY,
            scale: e_mean.exp(),
        })
    }
}

fn moderated_variance(s2: f64, df: f64, prior: &VariancePrior) -> f64 {
    if prior.df.is_infinite() {
        prior.scale
    } else if prior.df + df > 0.0 {
        (prior.df * prior.scale + df * s2) / (prior.df + df)
    } else {
        f64::NAN
    }
}

impl DifferentialExpressionMethod for ModeratedTTest {
    fn name(&self) -> &'static str {
        NAME
    }

    fn permutation_budget(&self, _config: &SignatureConfig) -> usize {
        0
    }

    fn run(
        &self,
        matrix: &ExpressionMatrix,
        sensitive: &[bool],
        budget: &MethodBudget,
    ) -> Result<BTreeSet<String>> {
        check_input(NAME, matrix, sensitive)?;

        let moments = gene_moments(matrix, sensitive);
        let df_residual = (sensitive.len() - 2) as f64;
        let s2: Vec<f64> = moments.iter().map(|m| m.pooled_variance()).collect();

        let prior = fit_variance_prior(&s2, df_residual)
            .ok_or_else(|| SignatureError::method(NAME, "every gene has zero variance"))?;
        log::debug!("{}: prior df = {:.3}, prior scale = {:.4}", NAME, prior.df, prior.scale);
        budget.check_deadline(NAME)?;

        let pvalues: Vec<f64> = moments
            .iter()
            .zip(s2.iter())
            .map(|(m, &v)| {
                let post = moderated_variance(v, df_residual, &prior);
                let se = (post * (1.0 / m.n1 as f64 + 1.0 / m.n2 as f64)).sqrt();
                let t = m.mean_difference() / se;
                two_sided_t_pvalue(t, df_residual + prior.df)
            })
            .collect();

        let qvalues = benjamini_hochberg(&pvalues);
        Ok(gene_names(matrix, rejected(&qvalues, budget.alpha)))
    }
}
