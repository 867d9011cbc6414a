use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for results returned by the library contract.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural failures surfaced to the immediate caller.
///
/// Per-file problems during a batch run never show up here; they are
/// recorded as [`crate::types::OutcomeStatus::Failed`] instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("duplicate record for {source_id} window {window_index}")]
    DuplicateRecord {
        source_id: String,
        window_index: usize,
    },

    #[error("template set must contain at least one record")]
    EmptyTemplateSet,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("failed to write {path:?}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed embedding artifact {path:?}: {reason}")]
    FormatFailure { path: PathBuf, reason: String },

    #[error("embedding artifact not found: {0:?}")]
    NotFound(PathBuf),
}

impl Error {
    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::FormatFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
