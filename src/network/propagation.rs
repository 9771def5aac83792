//! Seed-gene membership, connectivity and the connectivity filter

use std::collections::BTreeSet;

use ndarray::Array2;
use serde::Serialize;

use super::affinity::AffinityMatrix;
use crate::stats::quantile;

/// Per-fold propagation outcome for one seed set
#[derive(Debug, Clone, Serialize)]
pub struct Propagation {
    /// Seeds present in the affinity structure, sorted; rows of `membership`
    pub seeds: Vec<String>,
    /// Seeds absent from the affinity structure; they cannot pass the filter
    pub missing_seeds: Vec<String>,
    /// (1 - conn_sig_frac) percentile of the seed x gene affinities
    pub membership_threshold: f64,
    /// 1.0 / 0.0 strong co-expression indicator, NaN where a seed meets itself
    pub membership: Array2<f64>,
    /// Fraction of seeds strongly co-expressed with each affinity gene
    pub connectivity: Vec<f64>,
    /// (1 - conn_cutoff_perc) percentile of `connectivity`
    pub connectivity_cutoff: f64,
    /// Seeds whose own connectivity reaches the cutoff
    pub kept: BTreeSet<String>,
}

impl Propagation {
    fn empty(affinity: &AffinityMatrix, missing_seeds: Vec<String>) -> Self {
        Self {
            seeds: Vec::new(),
            missing_seeds,
            membership_threshold: f64::NAN,
            membership: Array2::zeros((0, affinity.n_genes())),
            connectivity: vec![f64::NAN; affinity.n_genes()],
            connectivity_cutoff: f64::NAN,
            kept: BTreeSet::new(),
        }
    }
}

/// Binarize the seed rows of the affinity matrix at the (1 - `sig_frac`)
/// percentile of their finite values.
pub fn membership(affinity: &AffinityMatrix, seed_rows: &[usize], sig_frac: f64) -> (f64, Array2<f64>) {
    let values = affinity.values();
    let finite: Vec<f64> = seed_rows
        .iter()
        .flat_map(|&r| values.row(r).to_vec())
        .filter(|v| v.is_finite())
        .collect();
    let threshold = quantile(&finite, 1.0 - sig_frac);

    let member = Array2::from_shape_fn((seed_rows.len(), affinity.n_genes()), |(i, j)| {
        let v = values[[seed_rows[i], j]];
        if !v.is_finite() {
            f64::NAN
        } else if v >= threshold {
            1.0
        } else {
            0.0
        }
    });
    (threshold, member)
}

/// Column means of a membership matrix, ignoring undefined entries.
/// A column with no defined entry has undefined connectivity.
pub fn connectivity(membership: &Array2<f64>) -> Vec<f64> {
    membership
        .columns()
        .into_iter()
        .map(|col| {
            let defined: Vec<f64> = col.iter().copied().filter(|v| v.is_finite()).collect();
            if defined.is_empty() {
                f64::NAN
            } else {
                defined.iter().sum::<f64>() / defined.len() as f64
            }
        })
        .collect()
}

/// Keep the seeds that are well supported by co-expression evidence.
///
/// Every seed is ranked against the connectivity distribution of all genes;
/// a seed survives when its connectivity is at or above the
/// (1 - `conn_cutoff_perc`) percentile. When that percentile is the minimum
/// connectivity, every seed with defined connectivity passes.
pub fn propagate(
    affinity: &AffinityMatrix,
    seeds: &BTreeSet<String>,
    conn_sig_frac: f64,
    conn_cutoff_perc: f64,
) -> Propagation {
    let mut present = Vec::new();
    let mut missing_seeds = Vec::new();
    for seed in seeds {
        match affinity.gene_index(seed) {
            Some(idx) => present.push((seed.clone(), idx)),
            None => missing_seeds.push(seed.clone()),
        }
    }
    if !missing_seeds.is_empty() {
        log::warn!(
            "{} seed genes missing from the affinity structure: {:?}",
            missing_seeds.len(),
            missing_seeds
        );
    }
    if present.is_empty() {
        return Propagation::empty(affinity, missing_seeds);
    }

    let rows: Vec<usize> = present.iter().map(|(_, idx)| *idx).collect();
    let (membership_threshold, membership) = membership(affinity, &rows, conn_sig_frac);
    let connectivity = connectivity(&membership);
    let connectivity_cutoff = quantile(&connectivity, 1.0 - conn_cutoff_perc);

    let kept = present
        .iter()
        .filter(|(_, idx)| connectivity[*idx] >= connectivity_cutoff)
        .map(|(id, _)| id.clone())
        .collect();

    log::debug!(
        "membership threshold {:.4}, connectivity cutoff {:.4}",
        membership_threshold,
        connectivity_cutoff
    );

    Propagation {
        seeds: present.into_iter().map(|(id, _)| id).collect(),
        missing_seeds,
        membership_threshold,
        membership,
        connectivity,
        connectivity_cutoff,
        kept,
    }
}
