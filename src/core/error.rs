//! Error types for topobatch.
//!
//! Uses thiserror for structured errors with context. Errors are split by
//! phase: usage errors are caught before any file is touched, capability
//! and label errors surface while a single file is being processed but
//! describe a setup defect that applies to the whole batch, and load errors
//! are per-file data problems. All of them abort the batch; nothing is
//! retried or swallowed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors caused by misusing the batch controller.
///
/// These are raised before any file I/O happens.
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("no operations or parameters registered")]
    NothingRegistered,

    #[error(
        "additional data is missing the required '{expected}' column; found columns: {found:?}"
    )]
    MissingFileColumn {
        expected: &'static str,
        found: Vec<String>,
    },
}

/// Errors raised while loading a measurement file into a data object.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a valid measurement file: {message}", path.display())]
    Malformed { path: PathBuf, message: String },
}

/// Errors raised when an identifier does not resolve to a capability, or a
/// capability rejects its arguments.
///
/// The same `Unknown` shape is used whether the lookup failed on the batch
/// controller (dynamic parameter registration) or on the data object itself,
/// so callers see one consistent error for a missing name.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("no capability named '{identifier}' is available")]
    Unknown { identifier: String },

    #[error("invalid argument for '{identifier}': {message}")]
    InvalidArgument { identifier: String, message: String },
}

/// Errors in the return-label bookkeeping of multi-valued parameters.
///
/// A multi-valued parameter result can only be turned into named columns if
/// the capability catalog publishes one label per returned value. Both
/// variants describe a setup defect, not a data problem, so they abort the
/// whole batch.
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("no return labels registered for '{identifier}', which returned {values} values")]
    Missing { identifier: String, values: usize },

    #[error("'{identifier}' registered {labels} return labels but returned {values} values")]
    CountMismatch {
        identifier: String,
        labels: usize,
        values: usize,
    },
}

/// Top-level error type for batch execution.
///
/// This enum encompasses all error categories and enables automatic
/// conversion from the specific error types.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("return label error: {0}")]
    Labels(#[from] LabelError),

    #[error("table error: {0}")]
    Table(#[from] polars::error::PolarsError),

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for batch operations.
pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_capability_message() {
        let err = CapabilityError::Unknown {
            identifier: "Sxyz".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no capability named 'Sxyz' is available"
        );
    }

    #[test]
    fn test_label_errors_name_the_counts() {
        let err = LabelError::CountMismatch {
            identifier: "sk".to_string(),
            labels: 3,
            values: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 return labels"));
        assert!(msg.contains("2 values"));
    }

    #[test]
    fn test_batch_error_conversion() {
        let err: BatchError = UsageError::NothingRegistered.into();
        assert!(matches!(err, BatchError::Usage(_)));
        assert!(err.to_string().contains("no operations or parameters"));
    }
}
