//! Pluggable two-group differential-expression methods
//!
//! Every method sees the same genes x samples matrix restricted to labelled
//! samples plus a group vector (`true` = sensitive) and answers with the set
//! of genes it calls significant. The consensus step never looks inside.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::SignatureConfig;
use crate::data::ExpressionMatrix;
use crate::error::{Result, SignatureError};
use crate::stats::GroupMoments;

/// Resources granted to one method call
#[derive(Debug, Clone)]
pub struct MethodBudget {
    /// Label permutations (ignored by methods without a permutation null)
    pub permutations: usize,
    /// Significance level of the method's own decision rule
    pub alpha: f64,
    pub seed: u64,
    pub deadline: Option<Instant>,
}

impl MethodBudget {
    pub fn new(permutations: usize, alpha: f64, seed: u64) -> Self {
        Self {
            permutations,
            alpha,
            seed,
            deadline: None,
        }
    }

    /// Start the clock: the call must finish within `timeout` from now
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout.map(|t| Instant::now() + t);
        self
    }

    pub fn check_deadline(&self, method: &str) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(SignatureError::method(method, "deadline exceeded"))
            }
            _ => Ok(()),
        }
    }
}

/// A two-group differential-expression test with a boolean decision per gene
pub trait DifferentialExpressionMethod: Send + Sync {
    fn name(&self) -> &'static str;

    /// Permutation budget this method draws from the configuration
    fn permutation_budget(&self, config: &SignatureConfig) -> usize;

    fn run(
        &self,
        matrix: &ExpressionMatrix,
        sensitive: &[bool],
        budget: &MethodBudget,
    ) -> Result<BTreeSet<String>>;
}

/// Shared input contract of all methods
pub(crate) fn check_input(method: &str, matrix: &ExpressionMatrix, sensitive: &[bool]) -> Result<()> {
    if sensitive.len() != matrix.n_samples() {
        return Err(SignatureError::DimensionMismatch {
            expected: format!("{} group labels", matrix.n_samples()),
            got: format!("{} group labels", sensitive.len()),
        });
    }
    if matrix.n_genes() == 0 {
        return Err(SignatureError::method(method, "expression matrix has no genes"));
    }
    let n1 = sensitive.iter().filter(|&&s| s).count();
    let n2 = sensitive.len() - n1;
    if n1 < 2 || n2 < 2 {
        return Err(SignatureError::method(
            method,
            format!("groups of size {} and {} cannot be compared", n1, n2),
        ));
    }
    if matrix.values().iter().any(|v| !v.is_finite()) {
        return Err(SignatureError::method(method, "expression matrix contains non-finite values"));
    }
    Ok(())
}

/// Per-gene group moments, genes in parallel
pub(crate) fn gene_moments(matrix: &ExpressionMatrix, sensitive: &[bool]) -> Vec<GroupMoments> {
    (0..matrix.n_genes())
        .into_par_iter()
        .map(|g| GroupMoments::compute(matrix.gene_values(g).iter(), sensitive))
        .collect()
}

/// Label vector for permutation `b`, seeded per permutation
pub(crate) fn permuted_labels(sensitive: &[bool], seed: u64, b: usize) -> Vec<bool> {
    let mut labels = sensitive.to_vec();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(b as u64));
    labels.shuffle(&mut rng);
    labels
}

pub(crate) fn gene_names(matrix: &ExpressionMatrix, indices: impl IntoIterator<Item = usize>) -> BTreeSet<String> {
    indices
        .into_iter()
        .map(|i| matrix.gene_ids()[i].clone())
        .collect()
}
