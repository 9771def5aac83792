//! Cross-validated signature extraction
//!
//! 1. Partition the cell lines into folds
//! 2. Compute the tumor affinity structure once
//! 3. Per fold (in parallel): DE consensus on the training subset, then
//!    co-expression propagation of the up and down seed sets
//! 4. Majority vote over the folds

use std::collections::BTreeSet;
use std::fmt;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{FoldFailurePolicy, SignatureConfig};
use crate::consolidate::{consolidate, majority_threshold, Consolidation};
use crate::data::{CellLineDataset, ExpressionMatrix};
use crate::de::{run_consensus, ConsensusResult, DifferentialExpressionMethod};
use crate::error::{Result, SignatureError};
use crate::network::{compute_affinity, propagate, AffinityMatrix, Propagation};
use crate::partition::{partition_indices, Fold};

/// How a single fold ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FoldOutcome {
    Completed {
        consensus: ConsensusResult,
        up: Propagation,
        down: Propagation,
    },
    /// A differential-expression method failed on this fold's training data
    Failed { error: String },
}

/// Audit record of one fold
#[derive(Debug, Clone, Serialize)]
pub struct FoldReport {
    pub fold: usize,
    pub held_out: Vec<String>,
    pub outcome: FoldOutcome,
}

impl FoldReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, FoldOutcome::Completed { .. })
    }

    /// Connectivity-filtered up-regulated genes
    pub fn filtered_up(&self) -> Option<&BTreeSet<String>> {
        match &self.outcome {
            FoldOutcome::Completed { up, .. } => Some(&up.kept),
            FoldOutcome::Failed { .. } => None,
        }
    }

    /// Connectivity-filtered down-regulated genes
    pub fn filtered_down(&self) -> Option<&BTreeSet<String>> {
        match &self.outcome {
            FoldOutcome::Completed { down, .. } => Some(&down.kept),
            FoldOutcome::Failed { .. } => None,
        }
    }
}

/// Per-fold results before consolidation
#[derive(Debug, Clone, Serialize)]
pub struct FoldBatch {
    /// Column order of every connectivity vector and membership matrix
    pub affinity_genes: Vec<String>,
    /// Tumor genes without a defined rank correlation
    pub affinity_excluded: Vec<String>,
    pub folds: Vec<FoldReport>,
}

impl FoldBatch {
    pub fn failed_folds(&self) -> Vec<usize> {
        self.folds
            .iter()
            .filter(|f| !f.is_completed())
            .map(|f| f.fold)
            .collect()
    }

    /// Majority vote over the completed folds, subject to the failure policy
    pub fn consolidate(self, config: &SignatureConfig) -> Result<SignatureRun> {
        let failed = self.failed_folds();
        if !failed.is_empty() {
            match config.fold_failure_policy {
                FoldFailurePolicy::Abort => return Err(SignatureError::FoldsFailed { failed }),
                FoldFailurePolicy::DropFailed if failed.len() == self.folds.len() => {
                    return Err(SignatureError::FoldsFailed { failed });
                }
                FoldFailurePolicy::DropFailed => {
                    warn!(
                        "Dropping failed folds {:?}; majority threshold uses {} folds",
                        failed,
                        self.folds.len() - failed.len()
                    );
                }
            }
        }

        let signature = consolidate(self.folds.iter().filter_map(FoldReport::filtered_up));
        let down_signature = consolidate(self.folds.iter().filter_map(FoldReport::filtered_down));

        info!(
            "Signature: {} genes (in at least {} of {} folds)",
            signature.genes.len(),
            majority_threshold(signature.n_folds),
            signature.n_folds
        );
        info!("  {:?}", signature.genes);
        info!("Down-regulated set: {} genes", down_signature.genes.len());

        Ok(SignatureRun {
            config: config.clone(),
            fingerprint: config.fingerprint(),
            affinity_genes: self.affinity_genes,
            affinity_excluded: self.affinity_excluded,
            folds: self.folds,
            signature,
            down_signature,
        })
    }
}

/// Complete outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct SignatureRun {
    pub config: SignatureConfig,
    pub fingerprint: String,
    pub affinity_genes: Vec<String>,
    pub affinity_excluded: Vec<String>,
    pub folds: Vec<FoldReport>,
    /// The published signature, built from the up-regulated branch
    pub signature: Consolidation,
    /// Symmetric consolidation of the down-regulated branch; kept for audit only
    pub down_signature: Consolidation,
}

impl SignatureRun {
    /// Signature genes in sorted order
    pub fn signature_genes(&self) -> Vec<String> {
        self.signature.genes.iter().cloned().collect()
    }
}

impl fmt::Display for SignatureRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} Signature Summary", self.config.drug)?;
        writeln!(f, "==========================")?;
        writeln!(f, "Configuration: {}", self.fingerprint)?;
        writeln!(
            f,
            "Affinity genes: {} ({} excluded)",
            self.affinity_genes.len(),
            self.affinity_excluded.len()
        )?;
        for report in &self.folds {
            match &report.outcome {
                FoldOutcome::Completed { consensus, up, down } => {
                    writeln!(
                        f,
                        "Fold {}: train {} (sensitive {}, resistant {}, excluded {}), seeds up {} / down {}, filtered up {} / down {}",
                        report.fold,
                        consensus.n_training,
                        consensus.n_sensitive,
                        consensus.n_resistant,
                        consensus.n_excluded,
                        consensus.seeds.up.len(),
                        consensus.seeds.down.len(),
                        up.kept.len(),
                        down.kept.len()
                    )?;
                }
                FoldOutcome::Failed { error } => {
                    writeln!(f, "Fold {}: FAILED ({})", report.fold, error)?;
                }
            }
        }
        writeln!(
            f,
            "Signature ({} of {} folds): {} genes",
            majority_threshold(self.signature.n_folds),
            self.signature.n_folds,
            self.signature.genes.len()
        )?;
        for gene in &self.signature.genes {
            writeln!(f, "  {}\t{}", gene, self.signature.tallies.get(gene).copied().unwrap_or(0))?;
        }
        writeln!(f, "Down-regulated set: {} genes", self.down_signature.genes.len())?;
        Ok(())
    }
}

/// Seed for the permutation streams of one fold
fn fold_seed(seed: u64, fold: usize) -> u64 {
    seed.wrapping_add((fold as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn log_fold(report: &FoldReport) {
    match &report.outcome {
        FoldOutcome::Completed { consensus, up, down } => {
            info!(
                "Fold {}: {} training samples, {} sensitive, {} resistant, {} excluded",
                report.fold,
                consensus.n_training,
                consensus.n_sensitive,
                consensus.n_resistant,
                consensus.n_excluded
            );
            for (method, hits) in &consensus.method_hits {
                info!("  {}: {} genes", method, hits);
            }
            info!(
                "  seeds: {} up, {} down, {} extra",
                consensus.seeds.up.len(),
                consensus.seeds.down.len(),
                consensus.seeds.extra.len()
            );
            info!(
                "  connectivity-filtered: {} up, {} down",
                up.kept.len(),
                down.kept.len()
            );
        }
        FoldOutcome::Failed { error } => {
            warn!("Fold {} failed: {}", report.fold, error);
        }
    }
}

fn run_fold(
    fold: &Fold,
    cell_lines: &CellLineDataset,
    affinity: &AffinityMatrix,
    config: &SignatureConfig,
    methods: &[Box<dyn DifferentialExpressionMethod>],
) -> Result<FoldReport> {
    let held_out = fold
        .sample_indices
        .iter()
        .map(|&i| cell_lines.sample_ids()[i].clone())
        .collect();
    let training = cell_lines.subset_samples(&fold.training_indices(cell_lines.n_samples()))?;

    let outcome = match run_consensus(&training, config, methods, fold_seed(config.seed, fold.index)) {
        Ok(consensus) => {
            let up = propagate(affinity, &consensus.seeds.up, config.conn_sig_frac, config.conn_cutoff_perc);
            let down = propagate(affinity, &consensus.seeds.down, config.conn_sig_frac, config.conn_cutoff_perc);
            FoldOutcome::Completed { consensus, up, down }
        }
        Err(e) if e.is_fatal_for_run() => return Err(e),
        Err(e) => FoldOutcome::Failed { error: e.to_string() },
    };

    Ok(FoldReport {
        fold: fold.index,
        held_out,
        outcome,
    })
}

/// Run every fold and collect the per-fold reports.
///
/// Configuration, input and insufficient-data errors abort immediately.
/// Method failures are recorded on the fold that raised them.
pub fn run_folds(
    cell_lines: &CellLineDataset,
    tumor: &ExpressionMatrix,
    config: &SignatureConfig,
    methods: &[Box<dyn DifferentialExpressionMethod>],
) -> Result<FoldBatch> {
    config.validate()?;

    let absent: Vec<&String> = cell_lines
        .gene_ids()
        .iter()
        .filter(|g| tumor.gene_index(g).is_none())
        .collect();
    if !absent.is_empty() {
        return Err(SignatureError::InvalidInput {
            reason: format!(
                "{} cell-line genes are missing from the tumor data (e.g. '{}'); align the gene spaces first",
                absent.len(),
                absent[0]
            ),
        });
    }

    // Tumor gaps only drop genes from the affinity; cell-line gaps would
    // break every DE method
    if cell_lines.expression().has_missing_values() {
        return Err(SignatureError::InvalidInput {
            reason: "cell-line expression contains missing values".to_string(),
        });
    }

    info!("Configuration: {}", config.fingerprint());
    info!(
        "{} cell lines, {} genes, {} tumor samples",
        cell_lines.n_samples(),
        cell_lines.n_genes(),
        tumor.n_samples()
    );

    let folds = partition_indices(cell_lines.n_samples(), config.n_folds, config.seed)?;

    info!("Computing tumor affinity...");
    let affinity = compute_affinity(tumor)?;

    info!("Running {} folds...", folds.len());
    let results: Vec<Result<FoldReport>> = folds
        .par_iter()
        .map(|fold| run_fold(fold, cell_lines, &affinity, config, methods))
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        let report = result?;
        log_fold(&report);
        reports.push(report);
    }

    Ok(FoldBatch {
        affinity_genes: affinity.gene_ids().to_vec(),
        affinity_excluded: affinity.excluded().to_vec(),
        folds: reports,
    })
}

/// Run the full pipeline and consolidate the folds into the signature
pub fn run_pipeline(
    cell_lines: &CellLineDataset,
    tumor: &ExpressionMatrix,
    config: &SignatureConfig,
    methods: &[Box<dyn DifferentialExpressionMethod>],
) -> Result<SignatureRun> {
    run_folds(cell_lines, tumor, config, methods)?.consolidate(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::{default_methods, MethodBudget};
    use crate::simulate::{simulate, SimulationParams};

    /// Calls a fixed gene set, failing whenever `sentinel` is not among the samples
    struct Sentinel {
        sentinel: &'static str,
        genes: &'static [&'static str],
    }

    impl DifferentialExpressionMethod for Sentinel {
        fn name(&self) -> &'static str {
            "sentinel"
        }
        fn permutation_budget(&self, _config: &SignatureConfig) -> usize {
            0
        }
        fn run(&self, matrix: &ExpressionMatrix, _sensitive: &[bool], _budget: &MethodBudget) -> Result<BTreeSet<String>> {
            if matrix.sample_index(self.sentinel).is_none() {
                return Err(SignatureError::method("sentinel", "sentinel sample held out"));
            }
            Ok(self.genes.iter().map(|s| s.to_string()).collect())
        }
    }

    fn sentinel_methods() -> Vec<Box<dyn DifferentialExpressionMethod>> {
        vec![Box::new(Sentinel {
            sentinel: "cell_000",
            genes: &["signal_0", "signal_1", "signal_2"],
        })]
    }

    fn half_split_config(policy: FoldFailurePolicy) -> SignatureConfig {
        SignatureConfig {
            de_comp_perc: 0.5,
            fold_failure_policy: policy,
            ..SignatureConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_recovers_coexpressed_signal() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let config = SignatureConfig {
            mult_perm: 300,
            ..SignatureConfig::default()
        };
        let run = run_pipeline(&data.cell_lines, &data.tumor, &config, &default_methods()).unwrap();

        for gene in &data.coexpressed_genes {
            assert!(run.signature.genes.contains(gene), "missing {}: {}", gene, run);
        }
        assert!(
            run.signature.genes.iter().all(|g| g.starts_with("signal_")),
            "noise gene in signature: {}",
            run
        );
        assert_eq!(run.signature.n_folds, 5);
        assert!(run.folds.iter().all(FoldReport::is_completed));
    }

    #[test]
    fn test_recovery_rate_over_seeds() {
        let n_runs = 20u64;
        let mut recovered = 0;
        let mut clean = 0;
        for s in 1..=n_runs {
            let data = simulate(&SimulationParams {
                seed: s,
                ..SimulationParams::default()
            })
            .unwrap();
            let config = SignatureConfig {
                mult_perm: 300,
                seed: 100 + s,
                ..SignatureConfig::default()
            };
            let run = run_pipeline(&data.cell_lines, &data.tumor, &config, &default_methods()).unwrap();
            if data.coexpressed_genes.iter().all(|g| run.signature.genes.contains(g)) {
                recovered += 1;
            }
            if run.signature.genes.iter().all(|g| g.starts_with("signal_")) {
                clean += 1;
            }
        }
        assert!(recovered >= 18, "co-expressed genes recovered in {} of {} runs", recovered, n_runs);
        assert!(clean >= 18, "noise-free signature in {} of {} runs", clean, n_runs);
    }

    #[test]
    fn test_missing_cell_line_values_rejected() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let expression = data.cell_lines.expression();
        let mut values = expression.values().to_owned();
        values[[0, 0]] = f64::NAN;
        let matrix = ExpressionMatrix::new(values, expression.gene_ids().to_vec(), expression.sample_ids().to_vec()).unwrap();
        let cell_lines = CellLineDataset::new(matrix, data.cell_lines.response().to_vec(), None).unwrap();

        let result = run_folds(&cell_lines, &data.tumor, &SignatureConfig::default(), &sentinel_methods());
        assert!(matches!(result, Err(SignatureError::InvalidInput { .. })));
    }

    #[test]
    fn test_pipeline_deterministic() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let config = half_split_config(FoldFailurePolicy::DropFailed);
        let methods = sentinel_methods();
        let a = run_pipeline(&data.cell_lines, &data.tumor, &config, &methods).unwrap();
        let b = run_pipeline(&data.cell_lines, &data.tumor, &config, &methods).unwrap();
        assert_eq!(a.signature, b.signature);
        let held_a: Vec<_> = a.folds.iter().map(|f| f.held_out.clone()).collect();
        let held_b: Vec<_> = b.folds.iter().map(|f| f.held_out.clone()).collect();
        assert_eq!(held_a, held_b);
    }

    #[test]
    fn test_failed_fold_aborts_consolidation() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let config = half_split_config(FoldFailurePolicy::Abort);
        let batch = run_folds(&data.cell_lines, &data.tumor, &config, &sentinel_methods()).unwrap();

        // exactly the fold holding out the sentinel fails
        let failed = batch.failed_folds();
        assert_eq!(failed.len(), 1);
        let sentinel_fold = batch
            .folds
            .iter()
            .find(|f| f.held_out.iter().any(|s| s == "cell_000"))
            .unwrap();
        assert_eq!(failed[0], sentinel_fold.fold);

        match batch.consolidate(&config) {
            Err(SignatureError::FoldsFailed { failed: f }) => assert_eq!(f, failed),
            other => panic!("expected FoldsFailed, got {:?}", other.map(|r| r.signature)),
        }
    }

    #[test]
    fn test_drop_failed_reduces_fold_count() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let config = half_split_config(FoldFailurePolicy::DropFailed);
        let run = run_pipeline(&data.cell_lines, &data.tumor, &config, &sentinel_methods()).unwrap();
        assert_eq!(run.signature.n_folds, 4);
        for report in &run.folds {
            if let Some(kept) = report.filtered_up() {
                for gene in kept {
                    assert!(gene.starts_with("signal_"));
                }
            }
        }
    }

    #[test]
    fn test_insufficient_data_aborts_run() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let config = SignatureConfig {
            de_comp_perc: 0.01,
            ..SignatureConfig::default()
        };
        let result = run_pipeline(&data.cell_lines, &data.tumor, &config, &sentinel_methods());
        assert!(matches!(result, Err(SignatureError::InsufficientData { .. })));
    }

    #[test]
    fn test_too_many_folds() {
        let data = simulate(&SimulationParams {
            n_samples: 10,
            ..SimulationParams::default()
        })
        .unwrap();
        let config = SignatureConfig {
            n_folds: 11,
            ..SignatureConfig::default()
        };
        let result = run_folds(&data.cell_lines, &data.tumor, &config, &sentinel_methods());
        assert!(matches!(result, Err(SignatureError::Configuration { .. })));
    }

    #[test]
    fn test_missing_tumor_gene_rejected() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let tumor = data.tumor.subset_genes(&[0, 1, 2]).unwrap();
        let result = run_folds(&data.cell_lines, &tumor, &SignatureConfig::default(), &sentinel_methods());
        assert!(matches!(result, Err(SignatureError::InvalidInput { .. })));
    }
}
