//! Per-fold consensus of the differential-expression methods
//!
//! A gene becomes a seed only when every method calls it. Seeds are then
//! tagged by the direction of the sensitive vs resistant mean difference.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::labels::assign_labels;
use super::maxt::MaxTTest;
use super::method::{DifferentialExpressionMethod, MethodBudget};
use super::moderated::ModeratedTTest;
use super::sam::SamTest;
use crate::config::SignatureConfig;
use crate::data::{CellLineDataset, ExpressionMatrix};
use crate::error::{Result, SignatureError};
use crate::stats::GroupMoments;

/// Direction-tagged consensus genes of one fold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedGenes {
    /// Higher mean in sensitive samples
    pub up: BTreeSet<String>,
    /// Higher mean in resistant samples
    pub down: BTreeSet<String>,
    /// Identical means in both classes; belongs to neither direction
    pub extra: BTreeSet<String>,
}

/// Outcome of the consensus step on one training subset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub n_training: usize,
    pub n_sensitive: usize,
    pub n_resistant: usize,
    pub n_excluded: usize,
    /// Genes called by each method, keyed by method name
    pub method_hits: BTreeMap<String, usize>,
    pub seeds: SeedGenes,
}

/// The three methods used by default: SAM-style permutation test, moderated
/// t-test and step-down maxT
pub fn default_methods() -> Vec<Box<dyn DifferentialExpressionMethod>> {
    vec![
        Box::new(SamTest),
        Box::new(ModeratedTTest),
        Box::new(MaxTTest),
    ]
}

/// Tag `genes` by comparing their sensitive and resistant means
pub fn tag_directions(matrix: &ExpressionMatrix, sensitive: &[bool], genes: &BTreeSet<String>) -> Result<SeedGenes> {
    let mut seeds = SeedGenes::default();
    for gene in genes {
        let idx = matrix.gene_index(gene).ok_or_else(|| SignatureError::InvalidInput {
            reason: format!("gene '{}' not present in expression matrix", gene),
        })?;
        let m = GroupMoments::compute(matrix.gene_values(idx).iter(), sensitive);
        let target = if m.mean1 > m.mean2 {
            &mut seeds.up
        } else if m.mean1 < m.mean2 {
            &mut seeds.down
        } else {
            &mut seeds.extra
        };
        target.insert(gene.clone());
    }
    Ok(seeds)
}

/// Put samples and genes in identifier order so results do not depend on
/// the input layout
fn canonical(matrix: &ExpressionMatrix, sensitive: &[bool]) -> Result<(ExpressionMatrix, Vec<bool>)> {
    let mut samples: Vec<usize> = (0..matrix.n_samples()).collect();
    samples.sort_by(|&a, &b| matrix.sample_ids()[a].cmp(&matrix.sample_ids()[b]));
    let mut genes: Vec<usize> = (0..matrix.n_genes()).collect();
    genes.sort_by(|&a, &b| matrix.gene_ids()[a].cmp(&matrix.gene_ids()[b]));

    let reordered = matrix.subset_samples(&samples)?.subset_genes(&genes)?;
    let groups = samples.iter().map(|&i| sensitive[i]).collect();
    Ok((reordered, groups))
}

/// Run the consensus on one fold's training subset.
///
/// Label assignment errors (configuration or too few samples per class) and
/// the first failing method abort the call.
pub fn run_consensus(
    training: &CellLineDataset,
    config: &SignatureConfig,
    methods: &[Box<dyn DifferentialExpressionMethod>],
    seed: u64,
) -> Result<ConsensusResult> {
    if methods.is_empty() {
        return Err(SignatureError::Configuration {
            reason: "at least one differential-expression method is required".to_string(),
        });
    }

    let labels = assign_labels(training.response(), config.de_comp_perc, config.rm_extreme_perc)?;
    let labelled = training.expression().subset_samples(&labels.labelled_indices())?;
    let (matrix, sensitive) = canonical(&labelled, &labels.sensitive_mask())?;

    let mut method_hits = BTreeMap::new();
    let mut consensus: Option<BTreeSet<String>> = None;
    for method in methods {
        let budget = MethodBudget::new(method.permutation_budget(config), config.de_alpha, seed)
            .with_timeout(config.method_timeout());
        let hits = method.run(&matrix, &sensitive, &budget)?;
        log::debug!("  {}: {} genes", method.name(), hits.len());
        method_hits.insert(method.name().to_string(), hits.len());

        consensus = Some(match consensus {
            None => hits,
            Some(acc) => acc.intersection(&hits).cloned().collect(),
        });
    }

    let agreed = consensus.unwrap_or_default();
    let seeds = tag_directions(&matrix, &sensitive, &agreed)?;

    Ok(ConsensusResult {
        n_training: training.n_samples(),
        n_sensitive: labels.n_sensitive(),
        n_resistant: labels.n_resistant(),
        n_excluded: labels.n_excluded(),
        method_hits,
        seeds,
    })
}
