//! SAM-style permutation test with a variance fudge factor
//!
//! The relative difference d = (mean_s - mean_r) / (s + s0) shrinks genes with
//! tiny standard errors through the fudge factor s0 (median gene-wise standard
//! error). Gene p-values come from the null of |d| pooled over all genes and
//! permutations, then Benjamini-Hochberg adjusted.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rayon::prelude::*;

use super::fdr::{benjamini_hochberg, rejected};
use super::method::{check_input, gene_moments, gene_names, permuted_labels, DifferentialExpressionMethod, MethodBudget};
use crate::config::SignatureConfig;
use crate::data::ExpressionMatrix;
use crate::error::{Result, SignatureError};
use crate::stats::{median, GroupMoments};

const NAME: &str = "sam";

#[derive(Debug, Clone, Copy, Default)]
pub struct SamTest;

fn standard_error(m: &GroupMoments) -> f64 {
    (m.pooled_variance() * (1.0 / m.n1 as f64 + 1.0 / m.n2 as f64)).sqrt()
}

fn relative_differences(moments: &[GroupMoments], s0: f64) -> Vec<f64> {
    moments
        .iter()
        .map(|m| m.mean_difference() / (standard_error(m) + s0))
        .collect()
}

/// Number of entries in `null_desc` (sorted descending) that are >= `x`
fn count_at_least(null_desc: &[f64], x: f64) -> usize {
    null_desc.partition_point(|&v| v >= x)
}

impl DifferentialExpressionMethod for SamTest {
    fn name(&self) -> &'static str {
        NAME
    }

    fn permutation_budget(&self, config: &SignatureConfig) -> usize {
        config.sam_perm
    }

    fn run(
        &self,
        matrix: &ExpressionMatrix,
        sensitive: &[bool],
        budget: &MethodBudget,
    ) -> Result<BTreeSet<String>> {
        check_input(NAME, matrix, sensitive)?;
        if budget.permutations == 0 {
            return Err(SignatureError::Configuration {
                reason: "SAM needs at least one permutation".to_string(),
            });
        }

        let moments = gene_moments(matrix, sensitive);
        let errors: Vec<f64> = moments.iter().map(standard_error).filter(|s| s.is_finite()).collect();
        if errors.iter().all(|&s| s == 0.0) {
            return Err(SignatureError::method(NAME, "every gene has zero variance"));
        }
        let s0 = median(&errors);

        let observed = relative_differences(&moments, s0);

        let mut null: Vec<f64> = Vec::with_capacity(budget.permutations * matrix.n_genes());
        for b in 0..budget.permutations {
            budget.check_deadline(NAME)?;
            let labels = permuted_labels(sensitive, budget.seed, b);
            let perm_moments = gene_moments(matrix, &labels);
            null.extend(
                relative_differences(&perm_moments, s0)
                    .into_iter()
                    .filter(|d| d.is_finite())
                    .map(f64::abs),
            );
        }
        null.par_sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        let total = null.len() as f64;
        let pvalues: Vec<f64> = observed
            .iter()
            .map(|&d| {
                if d.is_finite() {
                    (1.0 + count_at_least(&null, d.abs()) as f64) / (1.0 + total)
                } else {
                    f64::NAN
                }
            })
            .collect();

        let qvalues = benjamini_hochberg(&pvalues);
        let hits = gene_names(matrix, rejected(&qvalues, budget.alpha));
        log::debug!("{}: s0 = {:.4}, {} genes called", NAME, s0, hits.len());
        Ok(hits)
    }
}
