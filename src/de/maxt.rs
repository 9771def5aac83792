//! Westfall-Young step-down maxT test on Welch t statistics
//!
//! Adjusted p-values control the family-wise error rate: for the gene with
//! the j-th largest observed |t|, the adjusted p-value is the fraction of
//! permutations in which the largest permuted |t| among genes ranked j or
//! lower reaches it. Monotonicity is enforced down the ranking.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::method::{check_input, gene_moments, gene_names, permuted_labels, DifferentialExpressionMethod, MethodBudget};
use super::pvalue::welch_t;
use crate::config::SignatureConfig;
use crate::data::ExpressionMatrix;
use crate::error::{Result, SignatureError};
use crate::stats::GroupMoments;

const NAME: &str = "maxt";

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxTTest;

fn abs_welch(moments: &[GroupMoments]) -> Vec<f64> {
    moments
        .iter()
        .map(|m| welch_t(m.mean1, m.var1, m.n1, m.mean2, m.var2, m.n2).0.abs())
        .collect()
}

/// Step-down maxT adjusted p-values, indexed like `observed`.
/// Genes with an undefined statistic get NaN.
pub fn step_down_maxt<F>(observed: &[f64], permutations: usize, mut permuted: F) -> Result<Vec<f64>>
where
    F: FnMut(usize) -> Result<Vec<f64>>,
{
    // Ranked by observed |t|, largest first; undefined statistics are not ranked
    let mut order: Vec<usize> = (0..observed.len()).filter(|&i| observed[i].is_finite()).collect();
    order.sort_by(|&a, &b| observed[b].partial_cmp(&observed[a]).unwrap_or(Ordering::Equal));

    let mut exceed = vec![0usize; order.len()];
    for b in 0..permutations {
        let stats = permuted(b)?;
        let mut running_max = f64::NEG_INFINITY;
        for (rank, &g) in order.iter().enumerate().rev() {
            if stats[g].is_finite() && stats[g] > running_max {
                running_max = stats[g];
            }
            if running_max >= observed[g] {
                exceed[rank] += 1;
            }
        }
    }

    let mut adjusted = vec![f64::NAN; observed.len()];
    let mut floor = 0.0f64;
    for (rank, &g) in order.iter().enumerate() {
        let p = (1.0 + exceed[rank] as f64) / (1.0 + permutations as f64);
        floor = floor.max(p);
        adjusted[g] = floor;
    }
    Ok(adjusted)
}

impl DifferentialExpressionMethod for MaxTTest {
    fn name(&self) -> &'static str {
        NAME
    }

    fn permutation_budget(&self, config: &SignatureConfig) -> usize {
        config.mult_perm
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
                reason: "maxT needs at least one permutation".to_string(),
            });
        }

        let observed = abs_welch(&gene_moments(matrix, sensitive));
        if observed.iter().all(|t| !t.is_finite()) {
            return Err(SignatureError::method(NAME, "no gene has a defined t statistic"));
        }

        let adjusted = step_down_maxt(&observed, budget.permutations, |b| {
            budget.check_deadline(NAME)?;
            let labels = permuted_labels(sensitive, budget.seed, b);
            Ok(abs_welch(&gene_moments(matrix, &labels)))
        })?;

        Ok(gene_names(
            matrix,
            adjusted
                .iter()
                .enumerate()
                .filter(|(_, &p)| p.is_finite() && p < budget.alpha)
                .map(|(i, _)| i),
        ))
    }
}
