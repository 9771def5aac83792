//! Synthetic cell-line and tumor data with a planted signature
//!
//! Cell lines get a normally distributed log response. Signal genes are
//! raised by `effect_sd / 2` in the most sensitive response quintile and
//! lowered by the same amount in the most resistant one, so the two
//! extreme quintiles differ by `effect_sd` noise standard deviations.
//! In the tumor data the first `n_coexpressed` signal genes share a latent
//! factor; every other gene is independent noise.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::{CellLineDataset, ExpressionMatrix};
use crate::error::{Result, SignatureError};
use crate::stats::average_ranks;

/// Baseline log expression of every simulated gene
const BASELINE: f64 = 8.0;
/// Noise added on top of the shared factor for co-expressed tumor genes
const COEXPRESSION_NOISE: f64 = 0.3;
/// Response quintile receiving the planted shift
const EXTREME_FRACTION: f64 = 0.2;

/// Parameters for synthetic data generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub n_samples: usize,
    pub n_genes: usize,
    pub n_signal: usize,
    /// Mean difference between the extreme response quintiles, in noise sd
    pub effect_sd: f64,
    pub n_tumor_samples: usize,
    pub n_coexpressed: usize,
    pub seed: u64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            n_samples: 100,
            n_genes: 20,
            n_signal: 5,
            effect_sd: 2.0,
            n_tumor_samples: 80,
            n_coexpressed: 3,
            seed: 1,
        }
    }
}

/// Generated inputs plus the truth they were built from
#[derive(Debug, Clone)]
pub struct SimulatedData {
    pub cell_lines: CellLineDataset,
    pub tumor: ExpressionMatrix,
    pub signal_genes: Vec<String>,
    pub coexpressed_genes: Vec<String>,
}

impl SimulationParams {
    fn validate(&self) -> Result<()> {
        if self.n_signal > self.n_genes {
            return Err(SignatureError::Configuration {
                reason: format!("{} signal genes requested out of {}", self.n_signal, self.n_genes),
            });
        }
        if self.n_coexpressed > self.n_signal {
            return Err(SignatureError::Configuration {
                reason: format!(
                    "{} co-expressed genes requested out of {} signal genes",
                    self.n_coexpressed, self.n_signal
                ),
            });
        }
        if self.n_samples < 10 || self.n_tumor_samples < 3 {
            return Err(SignatureError::Configuration {
                reason: "need at least 10 cell lines and 3 tumor samples".to_string(),
            });
        }
        if !self.effect_sd.is_finite() {
            return Err(SignatureError::Configuration {
                reason: "effect_sd must be finite".to_string(),
            });
        }
        Ok(())
    }

    fn gene_ids(&self) -> Vec<String> {
        (0..self.n_genes)
            .map(|g| {
                if g < self.n_signal {
                    format!("signal_{}", g)
                } else {
                    format!("noise_{}", g - self.n_signal)
                }
            })
            .collect()
    }
}

/// Generate a cell-line dataset and a tumor expression matrix
pub fn simulate(params: &SimulationParams) -> Result<SimulatedData> {
    params.validate()?;

    let mut rng = StdRng::seed_from_u64(params.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| SignatureError::InvalidInput {
        reason: e.to_string(),
    })?;
    let gene_ids = params.gene_ids();

    // Cell lines
    let n = params.n_samples;
    let response: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
    let rank_fraction: Vec<f64> = average_ranks(&response)
        .into_iter()
        .map(|r| (r - 1.0) / n as f64)
        .collect();

    let half_effect = params.effect_sd / 2.0;
    let mut cell_values = Array2::zeros((params.n_genes, n));
    for g in 0..params.n_genes {
        for j in 0..n {
            let shift = if g >= params.n_signal {
                0.0
            } else if rank_fraction[j] < EXTREME_FRACTION {
                half_effect
            } else if rank_fraction[j] >= 1.0 - EXTREME_FRACTION {
                -half_effect
            } else {
                0.0
            };
            cell_values[[g, j]] = BASELINE + shift + normal.sample(&mut rng);
        }
    }
    let auc: Vec<f64> = response.iter().map(|r| 1.0 / (1.0 + (-r).exp())).collect();
    let cell_ids = (0..n).map(|j| format!("cell_{:03}", j)).collect();
    let expression = ExpressionMatrix::new(cell_values, gene_ids.clone(), cell_ids)?;
    let cell_lines = CellLineDataset::new(expression, response, Some(auc))?;

    // Tumors
    let m = params.n_tumor_samples;
    let latent: Vec<f64> = (0..m).map(|_| normal.sample(&mut rng)).collect();
    let mut tumor_values = Array2::zeros((params.n_genes, m));
    for g in 0..params.n_genes {
        for j in 0..m {
            let noise = normal.sample(&mut rng);
            tumor_values[[g, j]] = if g < params.n_coexpressed {
                BASELINE + latent[j] + COEXPRESSION_NOISE * noise
            } else {
                BASELINE + noise
            };
        }
    }
    let tumor_ids = (0..m).map(|j| format!("tumor_{:03}", j)).collect();
    let tumor = ExpressionMatrix::new(tumor_values, gene_ids.clone(), tumor_ids)?;

    Ok(SimulatedData {
        cell_lines,
        tumor,
        signal_genes: gene_ids[..params.n_signal].to_vec(),
        coexpressed_genes: gene_ids[..params.n_coexpressed].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::spearman;

    #[test]
    fn test_simulation_shapes() {
        let data = simulate(&SimulationParams::default()).unwrap();
        assert_eq!(data.cell_lines.n_samples(), 100);
        assert_eq!(data.cell_lines.n_genes(), 20);
        assert_eq!(data.tumor.n_genes(), 20);
        assert_eq!(data.signal_genes.len(), 5);
        assert_eq!(data.coexpressed_genes, vec!["signal_0", "signal_1", "signal_2"]);
        assert!(data.cell_lines.auc().is_some());
    }

    #[test]
    fn test_simulation_deterministic() {
        let a = simulate(&SimulationParams::default()).unwrap();
        let b = simulate(&SimulationParams::default()).unwrap();
        assert_eq!(a.cell_lines.response(), b.cell_lines.response());
        assert_eq!(a.tumor.values(), b.tumor.values());
    }

    #[test]
    fn test_coexpressed_genes_correlate() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let a = data.tumor.gene_values(0).to_vec();
        let b = data.tumor.gene_values(1).to_vec();
        assert!(spearman(&a, &b) > 0.7);
    }

    #[test]
    fn test_invalid_params() {
        let params = SimulationParams {
            n_coexpressed: 6,
            ..SimulationParams::default()
        };
        assert!(simulate(&params).is_err());
    }
}
