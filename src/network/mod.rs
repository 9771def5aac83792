//! Co-expression propagation of seed genes
//!
//! The affinity structure is built once from tumor expression and shared
//! read-only by every fold.

pub mod affinity;
pub mod propagation;

pub use affinity::{compute_affinity, AffinityMatrix};
pub use propagation::{propagate, Propagation};
