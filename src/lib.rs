//! cisplatin_signature: cross-validated drug-sensitivity gene signatures
//!
//! Cell lines are split into folds. On each training subset three
//! differential-expression tests compare drug-sensitive with drug-resistant
//! lines and only genes called by all three become seeds. Seeds are then
//! filtered by their co-expression connectivity in independent tumor data,
//! and genes that survive in a majority of folds form the signature.
//!
//! # Example
//!
//! ```ignore
//! use cisplatin_signature::prelude::*;
//!
//! let config = SignatureConfig::default();
//! let cell_lines = read_cell_line_table("cell_lines.tsv", &config.response_column, None)?;
//! let tumor = read_expression_table("tumor.tsv")?;
//!
//! let run = extract_signature(&cell_lines, &tumor, &config)?;
//! println!("{}", run);
//!
//! let scores = signature_scores(&tumor, &run.signature_genes())?;
//! ```

pub mod cli;
pub mod config;
pub mod consolidate;
pub mod data;
pub mod de;
pub mod error;
pub mod io;
pub mod network;
pub mod partition;
pub mod pipeline;
pub mod scoring;
pub mod simulate;
pub mod stats;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{FoldFailurePolicy, SignatureConfig};
    pub use crate::consolidate::{consolidate, Consolidation};
    pub use crate::data::{align_gene_space, CellLineDataset, ExpressionMatrix};
    pub use crate::de::{default_methods, run_consensus, DifferentialExpressionMethod, MethodBudget, SeedGenes};
    pub use crate::error::{Result, SignatureError};
    pub use crate::io::{
        read_cell_line_table, read_expression_table, read_gene_list, write_cell_line_table, write_expression_table,
        write_fold_artifacts, write_run_report, write_scores, write_signature,
    };
    pub use crate::network::{compute_affinity, propagate, AffinityMatrix, Propagation};
    pub use crate::partition::{partition_indices, partition_samples, Fold};
    pub use crate::pipeline::{run_folds, run_pipeline, FoldBatch, FoldReport, SignatureRun};
    pub use crate::scoring::signature_scores;
    pub use crate::simulate::{simulate, SimulatedData, SimulationParams};
}

use prelude::*;

/// Run the complete pipeline with the default SAM-style, moderated t and
/// maxT tests
pub fn extract_signature(
    cell_lines: &CellLineDataset,
    tumor: &ExpressionMatrix,
    config: &SignatureConfig,
) -> Result<SignatureRun> {
    run_pipeline(cell_lines, tumor, config, &default_methods())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_full_pipeline_through_files() {
        let data = simulate(&SimulationParams::default()).unwrap();
        let dir = tempdir().unwrap();
        let config = SignatureConfig {
            mult_perm: 300,
            ..SignatureConfig::default()
        };

        let cells_path = dir.path().join("cell_lines.tsv");
        let tumor_path = dir.path().join("tumor.tsv");
        write_cell_line_table(&cells_path, &data.cell_lines, &config.response_column, config.auc_column.as_deref())
            .unwrap();
        write_expression_table(&tumor_path, &data.tumor).unwrap();

        let cell_lines =
            read_cell_line_table(&cells_path, &config.response_column, config.auc_column.as_deref()).unwrap();
        let tumor = read_expression_table(&tumor_path).unwrap();
        assert_eq!(cell_lines.response(), data.cell_lines.response());

        let run = extract_signature(&cell_lines, &tumor, &config).unwrap();
        assert!(!run.signature.genes.is_empty());
        println!("{}", run);

        let signature_path = dir.path().join("signature.txt");
        write_signature(&signature_path, &run.signature.genes).unwrap();
        let genes = read_gene_list(&signature_path).unwrap();
        assert_eq!(genes, run.signature_genes());

        // Signature genes are raised in sensitive lines, so scores fall with response
        let scores = signature_scores(cell_lines.expression(), &genes).unwrap();
        assert_eq!(scores.len(), cell_lines.n_samples());
        let rho = crate::stats::spearman(&scores, cell_lines.response());
        assert!(rho < 0.0, "score/response correlation {}", rho);
    }
}
