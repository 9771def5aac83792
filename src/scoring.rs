//! Per-sample signature score
//!
//! Each listed gene is standardized across the given samples, then every
//! sample (column) is scored by the median of its standardized values.
//! Scores depend on the sample set and are not comparable across
//! differently filtered tables.

use ndarray::Array2;

use crate::data::ExpressionMatrix;
use crate::error::{Result, SignatureError};
use crate::stats::{median, standardize};

/// Z-score one gene over its observed samples; missing values stay missing
fn standardize_observed(values: &[f64]) -> Vec<f64> {
    let observed: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let z = standardize(&observed);
    let mut z_iter = z.into_iter();
    values
        .iter()
        .map(|v| if v.is_finite() { z_iter.next().unwrap_or(f64::NAN) } else { f64::NAN })
        .collect()
}

/// Score every sample of `matrix` against `genes`.
///
/// Genes absent from the matrix are skipped with a warning; if none are
/// present the call fails. Returned scores follow `matrix.sample_ids()`.
pub fn signature_scores(matrix: &ExpressionMatrix, genes: &[String]) -> Result<Vec<f64>> {
    let mut rows = Vec::new();
    let mut missing = Vec::new();
    for gene in genes {
        match matrix.gene_index(gene) {
            Some(idx) if !rows.contains(&idx) => rows.push(idx),
            Some(_) => {}
            None => missing.push(gene.as_str()),
        }
    }
    if !missing.is_empty() {
        log::warn!("{} signature genes not in expression table: {:?}", missing.len(), missing);
    }
    if rows.is_empty() {
        return Err(SignatureError::EmptyData {
            reason: "none of the signature genes are present in the expression table".to_string(),
        });
    }

    let n_samples = matrix.n_samples();
    let mut z = Array2::zeros((rows.len(), n_samples));
    for (r, &g) in rows.iter().enumerate() {
        let standardized = standardize_observed(&matrix.gene_values(g).to_vec());
        for (j, value) in standardized.into_iter().enumerate() {
            z[[r, j]] = value;
        }
    }

    Ok((0..n_samples)
        .map(|j| {
            let column: Vec<f64> = z.column(j).iter().copied().filter(|v| v.is_finite()).collect();
            median(&column)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix() -> ExpressionMatrix {
        ExpressionMatrix::new(
            array![
                [1.0, 2.0, 3.0, 4.0],
                [10.0, 30.0, 20.0, 40.0],
                [5.0, 5.0, 5.0, 5.0],
                [0.0, 1.0, 0.0, 1.0],
            ],
            vec!["A", "B", "C", "D"].into_iter().map(String::from).collect(),
            vec!["s1", "s2", "s3", "s4"].into_iter().map(String::from).collect(),
        )
        .unwrap()
    }

    fn genes(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scores_deterministic() {
        let m = matrix();
        let a = signature_scores(&m, &genes(&["A", "B", "D"])).unwrap();
        let b = signature_scores(&m, &genes(&["A", "B", "D"])).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_scores_invariant_to_sample_order() {
        let m = matrix();
        let list = genes(&["A", "B", "D"]);
        let base = signature_scores(&m, &list).unwrap();
        let order = [2, 0, 3, 1];
        let permuted = m.subset_samples(&order).unwrap();
        let scores = signature_scores(&permuted, &list).unwrap();
        for (k, &j) in order.iter().enumerate() {
            assert!((scores[k] - base[j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_single_gene_score_is_z_score() {
        let m = matrix();
        let scores = signature_scores(&m, &genes(&["A"])).unwrap();
        let expected = standardize(&[1.0, 2.0, 3.0, 4.0]);
        for (s, e) in scores.iter().zip(expected.iter()) {
            assert!((s - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_even_gene_count_averages_middle() {
        let m = matrix();
        // constant gene C standardizes to zero
        let scores = signature_scores(&m, &genes(&["A", "C"])).unwrap();
        let za = standardize(&[1.0, 2.0, 3.0, 4.0]);
        for (s, z) in scores.iter().zip(za.iter()) {
            assert!((s - z / 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_missing_genes() {
        let m = matrix();
        let scores = signature_scores(&m, &genes(&["A", "ghost"])).unwrap();
        assert_eq!(scores.len(), 4);
        assert!(matches!(
            signature_scores(&m, &genes(&["ghost"])),
            Err(SignatureError::EmptyData { .. })
        ));
    }
}
