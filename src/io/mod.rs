//! Input/Output operations for signature extraction

mod csv;
mod results;

pub use self::csv::{
    read_cell_line_table, read_expression_table, read_gene_list, write_cell_line_table, write_expression_table,
    write_scores, write_signature,
};
pub use results::{fold_artifact_path, write_fold_artifacts, write_run_report};
