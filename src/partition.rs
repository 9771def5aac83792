//! Cross-validation partitioning of the cell-line cohort
//!
//! Sample positions are shuffled with a seeded generator and the shuffled
//! sequence is cut into N contiguous blocks. The first `n % N` blocks carry one
//! extra sample, so block sizes differ by at most one.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SignatureError};

/// One held-out block of samples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub index: usize,
    /// Positions into the cohort's sample list, in shuffled order
    pub sample_indices: Vec<usize>,
}

impl Fold {
    /// Training positions: every cohort position not held out by this fold, ascending
    pub fn training_indices(&self, n_samples: usize) -> Vec<usize> {
        let mut held_out = vec![false; n_samples];
        for &i in &self.sample_indices {
            held_out[i] = true;
        }
        (0..n_samples).filter(|&i| !held_out[i]).collect()
    }

    pub fn len(&self) -> usize {
        self.sample_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_indices.is_empty()
    }
}

/// Split a cohort of `n_samples` positions into `n_folds` disjoint folds
pub fn partition_indices(n_samples: usize, n_folds: usize, seed: u64) -> Result<Vec<Fold>> {
    if n_folds == 0 {
        return Err(SignatureError::Configuration {
            reason: "fold count must be positive".to_string(),
        });
    }
    if n_folds > n_samples {
        return Err(SignatureError::Configuration {
            reason: format!(
                "fold count {} exceeds cohort size {}",
                n_folds, n_samples
            ),
        });
    }

    let mut order: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let base = n_samples / n_folds;
    let extra = n_samples % n_folds;

    let mut folds = Vec::with_capacity(n_folds);
    let mut start = 0;
    for index in 0..n_folds {
        let size = base + usize::from(index < extra);
        folds.push(Fold {
            index,
            sample_indices: order[start..start + size].to_vec(),
        });
        start += size;
    }

    Ok(folds)
}

/// Same as [`partition_indices`] but returns the sample identifiers of each fold
pub fn partition_samples(sample_ids: &[String], n_folds: usize, seed: u64) -> Result<Vec<Vec<String>>> {
    let folds = partition_indices(sample_ids.len(), n_folds, seed)?;
    Ok(folds
        .iter()
        .map(|f| f.sample_indices.iter().map(|&i| sample_ids[i].clone()).collect())
        .collect())
}
