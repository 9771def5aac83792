//! CellLineDataset - expression plus drug response for one drug-response experiment

use std::collections::HashSet;

use super::ExpressionMatrix;
use crate::error::{Result, SignatureError};

/// Cell-line cohort used for signature extraction
/// Expression is genes x samples; responses are aligned with the sample columns
#[derive(Debug, Clone)]
pub struct CellLineDataset {
    expression: ExpressionMatrix,
    /// Drug response per sample (log-scaled IC50 or similar, lower = more sensitive)
    response: Vec<f64>,
    /// Optional area-under-curve per sample
    auc: Option<Vec<f64>>,
}

impl CellLineDataset {
    pub fn new(expression: ExpressionMatrix, response: Vec<f64>, auc: Option<Vec<f64>>) -> Result<Self> {
        let n = expression.n_samples();
        if response.len() != n {
            return Err(SignatureError::DimensionMismatch {
                expected: format!("{} response values", n),
                got: format!("{} response values", response.len()),
            });
        }
        if let Some(auc) = &auc {
            if auc.len() != n {
                return Err(SignatureError::DimensionMismatch {
                    expected: format!("{} AUC values", n),
                    got: format!("{} AUC values", auc.len()),
                });
            }
        }
        if response.iter().any(|r| !r.is_finite()) {
            return Err(SignatureError::InvalidInput {
                reason: "drug response values must be finite".to_string(),
            });
        }
        Ok(Self {
            expression,
            response,
            auc,
        })
    }

    pub fn expression(&self) -> &ExpressionMatrix {
        &self.expression
    }

    pub fn response(&self) -> &[f64] {
        &self.response
    }

    pub fn auc(&self) -> Option<&[f64]> {
        self.auc.as_deref()
    }

    pub fn n_samples(&self) -> usize {
        self.expression.n_samples()
    }

    pub fn n_genes(&self) -> usize {
        self.expression.n_genes()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.expression.sample_ids()
    }

    pub fn gene_ids(&self) -> &[String] {
        self.expression.gene_ids()
    }

    /// Subset to specific samples, keeping responses aligned
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let expression = self.expression.subset_samples(sample_indices)?;
        let response = sample_indices.iter().map(|&i| self.response[i]).collect();
        let auc = self
            .auc
            .as_ref()
            .map(|a| sample_indices.iter().map(|&i| a[i]).collect());
        Self::new(expression, response, auc)
    }

    /// Subset to the named genes, in the given order
    pub fn select_genes(&self, gene_ids: &[String]) -> Result<Self> {
        Ok(Self {
            expression: self.expression.select_genes(gene_ids)?,
            response: self.response.clone(),
            auc: self.auc.clone(),
        })
    }
}

/// Restrict a cell-line dataset and a tumor matrix to their shared genes.
///
/// The shared genes keep the cell-line ordering. Both outputs have identical
/// gene identifier lists.
pub fn align_gene_space(
    cell_lines: &CellLineDataset,
    tumor: &ExpressionMatrix,
) -> Result<(CellLineDataset, ExpressionMatrix)> {
    let tumor_genes: HashSet<&str> = tumor.gene_ids().iter().map(|g| g.as_str()).collect();
    let shared: Vec<String> = cell_lines
        .gene_ids()
        .iter()
        .filter(|g| tumor_genes.contains(g.as_str()))
        .cloned()
        .collect();

    if shared.is_empty() {
        return Err(SignatureError::EmptyData {
            reason: "cell-line and tumor datasets share no genes".to_string(),
        });
    }

    let dropped_cell = cell_lines.n_genes() - shared.len();
    let dropped_tumor = tumor.n_genes() - shared.len();
    if dropped_cell > 0 || dropped_tumor > 0 {
        log::info!(
            "Aligned gene space: {} shared genes ({} cell-line-only, {} tumor-only dropped)",
            shared.len(),
            dropped_cell,
            dropped_tumor
        );
    }

    Ok((cell_lines.select_genes(&shared)?, tumor.select_genes(&shared)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn cell_lines() -> CellLineDataset {
        let expr = ExpressionMatrix::new(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
            strings(&["A", "B", "C"]),
            strings(&["c1", "c2", "c3"]),
        )
        .unwrap();
        CellLineDataset::new(expr, vec![0.5, -1.0, 2.0], Some(vec![0.1, 0.2, 0.3])).unwrap()
    }

    #[test]
    fn test_response_length_checked() {
        let expr = ExpressionMatrix::new(array![[1.0, 2.0]], strings(&["A"]), strings(&["c1", "c2"])).unwrap();
        assert!(CellLineDataset::new(expr, vec![1.0], None).is_err());
    }

    #[test]
    fn test_subset_keeps_response_aligned() {
        let ds = cell_lines();
        let sub = ds.subset_samples(&[2, 0]).unwrap();
        assert_eq!(sub.sample_ids(), &strings(&["c3", "c1"]));
        assert_eq!(sub.response(), &[2.0, 0.5]);
        assert_eq!(sub.auc().unwrap(), &[0.3, 0.1]);
    }

    #[test]
    fn test_align_gene_space() {
        let ds = cell_lines();
        let tumor = ExpressionMatrix::new(
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
            strings(&["C", "D", "A"]),
            strings(&["t1", "t2"]),
        )
        .unwrap();
        let (ds, tumor) = align_gene_space(&ds, &tumor).unwrap();
        assert_eq!(ds.gene_ids(), &strings(&["A", "C"]));
        assert_eq!(tumor.gene_ids(), &strings(&["A", "C"]));
        assert_eq!(tumor.gene_values(0).to_vec(), vec![5.0, 6.0]);
    }
}
