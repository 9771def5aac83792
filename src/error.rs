//! Error types for signature extraction

use thiserror::Error;

/// Main error type for the signature pipeline
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Differential expression method '{method}' failed: {reason}")]
    MethodFailure { method: String, reason: String },

    #[error("Degenerate affinity structure: {reason}")]
    DegenerateAffinity { reason: String },

    #[error("Consolidation refused, folds failed: {failed:?}")]
    FoldsFailed { failed: Vec<usize> },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SignatureError {
    pub(crate) fn method(method: &str, reason: impl Into<String>) -> Self {
        SignatureError::MethodFailure {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error indicates a bad invocation that must abort the whole run.
    /// Method failures are confined to the fold that raised them.
    pub fn is_fatal_for_run(&self) -> bool {
        !matches!(self, SignatureError::MethodFailure { .. })
    }
}

/// Result type alias for signature operations
pub type Result<T> = std::result::Result<T, SignatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_failure_is_fold_local() {
        let err = SignatureError::method("sam", "zero variance");
        assert!(!err.is_fatal_for_run());
        assert!(err.to_string().contains("sam"));

        let err = SignatureError::InsufficientData {
            reason: "one sensitive sample".to_string(),
        };
        assert!(err.is_fatal_for_run());
    }
}
