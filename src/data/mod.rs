//! Data structures for signature extraction

mod dataset;
mod expression_matrix;

pub use dataset::{align_gene_space, CellLineDataset};
pub use expression_matrix::ExpressionMatrix;
