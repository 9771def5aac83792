//! Named expression matrix (genes x samples)

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Result, SignatureError};

fn check_unique(ids: &[String], what: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(SignatureError::InvalidInput {
                reason: format!("duplicate {} identifier '{}'", what, id),
            });
        }
    }
    Ok(())
}

/// Expression values with named rows and columns
/// Rows are genes, columns are samples
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Expression data (genes x samples)
    values: Array2<f64>,
    /// Gene identifiers
    gene_ids: Vec<String>,
    /// Sample identifiers
    sample_ids: Vec<String>,
    gene_lookup: HashMap<String, usize>,
}

impl ExpressionMatrix {
    /// Create a new matrix from genes x samples data
    pub fn new(values: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = values.dim();

        if gene_ids.len() != n_genes {
            return Err(SignatureError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(SignatureError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        check_unique(&gene_ids, "gene")?;
        check_unique(&sample_ids, "sample")?;

        if values.iter().any(|x| x.is_infinite()) {
            return Err(SignatureError::InvalidInput {
                reason: "expression values must not be infinite".to_string(),
            });
        }

        let gene_lookup = gene_ids
            .iter()
            .enumerate()
            .map(|(i, g)| (g.clone(), i))
            .collect();

        Ok(Self {
            values,
            gene_ids,
            sample_ids,
            gene_lookup,
        })
    }

    /// Create from a samples x genes table, the orientation used on disk
    pub fn from_sample_rows(
        sample_rows: Array2<f64>,
        sample_ids: Vec<String>,
        gene_ids: Vec<String>,
    ) -> Result<Self> {
        Self::new(sample_rows.reversed_axes(), gene_ids, sample_ids)
    }

    pub fn n_genes(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    /// Get the expression values as a view
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Expression of one gene across all samples
    pub fn gene_values(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(gene_idx)
    }

    /// Expression of all genes in one sample
    pub fn sample_values(&self, sample_idx: usize) -> ArrayView1<'_, f64> {
        self.values.column(sample_idx)
    }

    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_lookup.get(gene_id).copied()
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|x| x.is_nan())
    }

    /// Subset to specific samples (column order follows `sample_indices`)
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(1), sample_indices);
        let sample_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        Self::new(values, self.gene_ids.clone(), sample_ids)
    }

    /// Subset to specific genes (row order follows `gene_indices`)
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(0), gene_indices);
        let gene_ids: Vec<String> = gene_indices
            .iter()
            .map(|&i| self.gene_ids[i].clone())
            .collect();

        Self::new(values, gene_ids, self.sample_ids.clone())
    }

    /// Subset to the named genes, in the given order.
    /// Fails if any name is unknown.
    pub fn select_genes(&self, gene_ids: &[String]) -> Result<Self> {
        let indices = gene_ids
            .iter()
            .map(|g| {
                self.gene_index(g).ok_or_else(|| SignatureError::InvalidInput {
                    reason: format!("gene '{}' not present in expression matrix", g),
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        self.subset_genes(&indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_matrix_creation() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let matrix = ExpressionMatrix::new(values, ids("g", 2), ids("s", 3)).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.gene_index("g2"), Some(1));
        assert_eq!(matrix.sample_index("s3"), Some(2));
    }

    #[test]
    fn test_from_sample_rows_transposes() {
        // 3 samples x 2 genes
        let table = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let matrix = ExpressionMatrix::from_sample_rows(table, ids("s", 3), ids("g", 2)).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.gene_values(1).to_vec(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let genes = vec!["g1".to_string(), "g1".to_string()];
        assert!(ExpressionMatrix::new(values, genes, ids("s", 2)).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let result = ExpressionMatrix::new(values, ids("g", 3), ids("s", 2));
        assert!(matches!(result, Err(SignatureError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_missing_values_detected() {
        let values = array![[1.0, f64::NAN], [3.0, 4.0]];
        let matrix = ExpressionMatrix::new(values, ids("g", 2), ids("s", 2)).unwrap();
        assert!(matrix.has_missing_values());
        let complete = matrix.subset_samples(&[0]).unwrap();
        assert!(!complete.has_missing_values());
    }

    #[test]
    fn test_select_genes_order() {
        let values = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let matrix = ExpressionMatrix::new(values, ids("g", 3), ids("s", 2)).unwrap();
        let sub = matrix
            .select_genes(&["g3".to_string(), "g1".to_string()])
            .unwrap();
        assert_eq!(sub.gene_ids(), &["g3".to_string(), "g1".to_string()]);
        assert_eq!(sub.gene_values(0).to_vec(), vec![5.0, 6.0]);
        assert!(matrix.select_genes(&["nope".to_string()]).is_err());
    }
}
