use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the customer lookup cache.
///
/// Background refreshes never return these to a reader; they are logged and
/// the previous index stays in service. Only a cold build (nothing to serve
/// yet) and input validation reach the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The source spreadsheet is missing, unreadable, in an unsupported
    /// format, or took longer than the configured load timeout.
    #[error("source spreadsheet {path} unavailable: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    /// No header in the source could be matched to the phone-number column.
    #[error("no phone number column found in {path} (headers: {headers:?})")]
    SchemaError { path: PathBuf, headers: Vec<String> },

    /// The lookup query was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CacheError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CacheError::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
