//! Differential expression between drug-sensitive and drug-resistant samples
//!
//! - `labels`: quantile-based class assignment on the response
//! - `sam`, `moderated`, `maxt`: the three independent tests
//! - `consensus`: intersection of their calls and direction tagging

pub mod consensus;
pub mod fdr;
pub mod labels;
pub mod maxt;
pub mod method;
pub mod moderated;
pub mod pvalue;
pub mod sam;

pub use consensus::{default_methods, run_consensus, tag_directions, ConsensusResult, SeedGenes};
pub use fdr::benjamini_hochberg;
pub use labels::{assign_labels, ClassLabel, ClassLabels};
pub use maxt::MaxTTest;
pub use method::{DifferentialExpressionMethod, MethodBudget};
pub use moderated::ModeratedTTest;
pub use sam::SamTest;
