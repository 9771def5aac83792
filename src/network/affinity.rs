//! Gene-gene Spearman affinity computed from independent tumor expression

use std::collections::HashMap;

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::Serialize;

use crate::data::ExpressionMatrix;
use crate::error::{Result, SignatureError};
use crate::stats::average_ranks;

/// Minimum tumor samples for a rank correlation to carry information
const MIN_SAMPLES: usize = 3;

/// Symmetric gene x gene Spearman correlation matrix.
/// Diagonal entries are NaN: a gene's affinity to itself is undefined.
#[derive(Debug, Clone, Serialize)]
pub struct AffinityMatrix {
    gene_ids: Vec<String>,
    values: Array2<f64>,
    /// Genes left out because their tumor expression is constant or incomplete
    excluded: Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl AffinityMatrix {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.lookup.get(gene_id).copied()
    }

    /// Affinity between two genes; `None` if either is not in the structure
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.values[[self.gene_index(a)?, self.gene_index(b)?]])
    }
}

/// Centered ranks scaled to unit norm; `None` for constant or incomplete genes
fn scaled_ranks(values: &[f64]) -> Option<Vec<f64>> {
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let ranks = average_ranks(values);
    let center = (ranks.len() as f64 + 1.0) / 2.0;
    let centered: Vec<f64> = ranks.iter().map(|r| r - center).collect();
    let norm = centered.iter().map(|c| c * c).sum::<f64>().sqrt();
    if norm <= 0.0 {
        return None;
    }
    Some(centered.into_iter().map(|c| c / norm).collect())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute the Spearman affinity between every pair of tumor genes.
///
/// Constant genes (and genes with missing values) have undefined
/// correlations; they are dropped from the structure and logged. Fails only
/// when fewer than two usable genes remain.
pub fn compute_affinity(tumor: &ExpressionMatrix) -> Result<AffinityMatrix> {
    if tumor.n_samples() < MIN_SAMPLES {
        return Err(SignatureError::DegenerateAffinity {
            reason: format!(
                "{} tumor samples, need at least {}",
                tumor.n_samples(),
                MIN_SAMPLES
            ),
        });
    }

    let scaled: Vec<Option<Vec<f64>>> = (0..tumor.n_genes())
        .into_par_iter()
        .map(|g| scaled_ranks(&tumor.gene_values(g).to_vec()))
        .collect();

    let mut gene_ids = Vec::new();
    let mut excluded = Vec::new();
    let mut kept_ranks = Vec::new();
    for (id, ranks) in tumor.gene_ids().iter().zip(scaled) {
        match ranks {
            Some(r) => {
                gene_ids.push(id.clone());
                kept_ranks.push(r);
            }
            None => excluded.push(id.clone()),
        }
    }

    if !excluded.is_empty() {
        log::warn!(
            "{} constant or incomplete tumor genes excluded from affinity",
            excluded.len()
        );
    }
    if gene_ids.len() < 2 {
        return Err(SignatureError::DegenerateAffinity {
            reason: format!("only {} genes have defined rank correlations", gene_ids.len()),
        });
    }

    let n = gene_ids.len();
    // Row i is computed exactly like column i, so the result is symmetric.
    // Rows are written in place into a single n x n buffer.
    let mut flat = vec![f64::NAN; n * n];
    flat.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, cell) in row.iter_mut().enumerate() {
            if i != j {
                *cell = dot(&kept_ranks[i], &kept_ranks[j]).clamp(-1.0, 1.0);
            }
        }
    });
    let values = Array2::from_shape_vec((n, n), flat).map_err(|e| SignatureError::DimensionMismatch {
        expected: format!("{} x {} affinity", n, n),
        got: e.to_string(),
    })?;

    let lookup = gene_ids
        .iter()
        .enumerate()
        .map(|(i, g)| (g.clone(), i))
        .collect();

    log::debug!("Affinity computed over {} genes", n);
    Ok(AffinityMatrix {
        gene_ids,
        values,
        excluded,
        lookup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::spearman;
    use ndarray::array;

    fn tumor() -> ExpressionMatrix {
        ExpressionMatrix::new(
            array![
                [1.0, 2.0, 3.0, 4.0, 5.0],
                [2.0, 4.0, 5.0, 9.0, 10.0],
                [5.0, 3.0, 4.0, 1.0, 2.0],
                [7.0, 7.0, 7.0, 7.0, 7.0],
                [0.3, 0.1, 0.9, 0.2, 0.5],
            ],
            vec!["A", "B", "C", "K", "N"].into_iter().map(String::from).collect(),
            (0..5).map(|i| format!("t{}", i)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_affinity_symmetric_with_undefined_diagonal() {
        let affinity = compute_affinity(&tumor()).unwrap();
        let v = affinity.values();
        for i in 0..affinity.n_genes() {
            assert!(v[[i, i]].is_nan());
            for j in 0..affinity.n_genes() {
                if i != j {
                    assert_eq!(v[[i, j]], v[[j, i]]);
                }
            }
        }
    }

    #[test]
    fn test_affinity_matches_spearman() {
        let t = tumor();
        let affinity = compute_affinity(&t).unwrap();
        assert!((affinity.get("A", "B").unwrap() - 1.0).abs() < 1e-12);
        let expected = spearman(&t.gene_values(0).to_vec(), &t.gene_values(2).to_vec());
        assert!((affinity.get("A", "C").unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_affinity_cells_follow_gene_order() {
        let t = tumor();
        let affinity = compute_affinity(&t).unwrap();
        let v = affinity.values();
        assert_eq!(v.dim(), (4, 4));
        for (i, a) in affinity.gene_ids().iter().enumerate() {
            for (j, b) in affinity.gene_ids().iter().enumerate() {
                if i == j {
                    continue;
                }
                let ra = t.gene_values(t.gene_index(a).unwrap()).to_vec();
                let rb = t.gene_values(t.gene_index(b).unwrap()).to_vec();
                assert!((v[[i, j]] - spearman(&ra, &rb)).abs() < 1e-12, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_constant_gene_excluded() {
        let affinity = compute_affinity(&tumor()).unwrap();
        assert_eq!(affinity.excluded(), &["K".to_string()]);
        assert!(affinity.gene_index("K").is_none());
        assert_eq!(affinity.n_genes(), 4);
    }

    #[test]
    fn test_degenerate_affinity() {
        let t = ExpressionMatrix::new(
            array![[1.0, 1.0, 1.0], [1.0, 2.0, 3.0]],
            vec!["K".to_string(), "A".to_string()],
            (0..3).map(|i| format!("t{}", i)).collect(),
        )
        .unwrap();
        assert!(matches!(
            compute_affinity(&t),
            Err(SignatureError::DegenerateAffinity { .. })
        ));
    }
}
