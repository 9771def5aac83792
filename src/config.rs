//! Run configuration for signature extraction
//!
//! One explicit `SignatureConfig` value is threaded through every stage; there
//! is no process-wide default state. Values can be loaded from JSON and
//! overridden from the command line.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignatureError};

/// What to do when a fold's consensus step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldFailurePolicy {
    /// Refuse to consolidate if any fold failed
    Abort,
    /// Consolidate over the completed folds only, with the majority threshold
    /// computed from their count
    DropFailed,
}

impl Default for FoldFailurePolicy {
    fn default() -> Self {
        FoldFailurePolicy::Abort
    }
}

/// Configurable parameters for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Drug the response column belongs to; used for labelling outputs only
    pub drug: String,
    /// Name of the response column in the cell-line table
    pub response_column: String,
    /// Name of the optional AUC column in the cell-line table
    pub auc_column: Option<String>,
    /// Fraction of training samples at each response extreme used as classes
    pub de_comp_perc: f64,
    /// Fraction trimmed from each response extreme before class assignment
    pub rm_extreme_perc: f64,
    /// Permutation budget of the SAM-style test
    pub sam_perm: usize,
    /// Permutation budget of the step-down maxT test
    pub mult_perm: usize,
    /// Significance level applied by each differential-expression method
    pub de_alpha: f64,
    /// Number of cross-validation folds
    pub n_folds: usize,
    /// Seed for fold assignment and permutations
    pub seed: u64,
    /// Fraction of the seed x gene affinity values counted as strong co-expression
    pub conn_sig_frac: f64,
    /// Fraction of genes with the highest connectivity that a seed gene must reach
    pub conn_cutoff_perc: f64,
    /// Wall-clock limit for each differential-expression method call
    pub method_timeout_secs: Option<u64>,
    pub fold_failure_policy: FoldFailurePolicy,
    /// Worker threads (0 = rayon default)
    pub threads: usize,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            drug: "cisplatin".to_string(),
            response_column: "ln_ic50".to_string(),
            auc_column: Some("auc".to_string()),
            de_comp_perc: 0.20,
            rm_extreme_perc: 0.0,
            sam_perm: 100,
            mult_perm: 1000,
            de_alpha: 0.05,
            n_folds: 5,
            seed: 42,
            conn_sig_frac: 0.05,
            conn_cutoff_perc: 0.20,
            method_timeout_secs: None,
            fold_failure_policy: FoldFailurePolicy::Abort,
            threads: 0,
        }
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..1.0).contains(&value) {
        return Err(SignatureError::Configuration {
            reason: format!("{} must lie in [0, 1), got {}", name, value),
        });
    }
    Ok(())
}

impl SignatureConfig {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: SignatureConfig = serde_json::from_reader(reader)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_fraction("de_comp_perc", self.de_comp_perc)?;
        check_fraction("rm_extreme_perc", self.rm_extreme_perc)?;
        check_fraction("conn_sig_frac", self.conn_sig_frac)?;
        check_fraction("conn_cutoff_perc", self.conn_cutoff_perc)?;

        if self.de_comp_perc == 0.0 || self.de_comp_perc > 0.5 {
            return Err(SignatureError::Configuration {
                reason: format!(
                    "de_comp_perc must lie in (0, 0.5] so the classes do not overlap, got {}",
                    self.de_comp_perc
                ),
            });
        }
        if 2.0 * self.rm_extreme_perc >= 1.0 {
            return Err(SignatureError::Configuration {
                reason: format!(
                    "rm_extreme_perc {} trims away every sample",
                    self.rm_extreme_perc
                ),
            });
        }
        if !(self.de_alpha > 0.0 && self.de_alpha < 1.0) {
            return Err(SignatureError::Configuration {
                reason: format!("de_alpha must lie in (0, 1), got {}", self.de_alpha),
            });
        }
        if self.n_folds < 2 {
            return Err(SignatureError::Configuration {
                reason: format!("n_folds must be at least 2, got {}", self.n_folds),
            });
        }
        if self.sam_perm == 0 || self.mult_perm == 0 {
            return Err(SignatureError::Configuration {
                reason: "permutation budgets must be at least 1".to_string(),
            });
        }
        if self.method_timeout_secs == Some(0) {
            return Err(SignatureError::Configuration {
                reason: "method_timeout_secs must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn method_timeout(&self) -> Option<Duration> {
        self.method_timeout_secs.map(Duration::from_secs)
    }

    /// Short stable key identifying the parameters that shape the results
    pub fn fingerprint(&self) -> String {
        format!(
            "perc{:.2}_trim{:.2}_sam{}_mult{}_k{}_seed{}_sig{:.2}_conn{:.2}",
            self.de_comp_perc,
            self.rm_extreme_perc,
            self.sam_perm,
            self.mult_perm,
            self.n_folds,
            self.seed,
            self.conn_sig_frac,
            self.conn_cutoff_perc
        )
    }
}
