//! Error taxonomy for the training core.
//!
//! Numeric divergence is the only condition expected during steady-state
//! training; the orchestration layer handles it with a step-abort-and-continue
//! policy. Everything else is a precondition checked before entering the hot
//! path.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the sinkrl core.
#[derive(Debug, Error)]
pub enum Error {
    /// The Sinkhorn relaxation or rounding step produced non-finite values.
    ///
    /// Fatal for the current training step: the caller must drop the step
    /// before any replay-buffer append and continue with the next batch.
    #[error("non-finite values in relaxed assignment; step must be aborted")]
    NumericDivergence,

    /// Invalid combination of configuration options, reported at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An instance file could not be read or written.
    #[error("dataset I/O failure at {path}")]
    DatasetIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An instance file exists but does not match the record format.
    #[error("malformed instance record at {path}: {reason}")]
    DatasetFormat { path: PathBuf, reason: String },

    /// Failure in the underlying tensor backend (checkpoint I/O, device).
    #[error(transparent)]
    Tch(#[from] tch::TchError),
}

impl Error {
    /// Wraps an I/O error with the file it occurred on.
    pub fn dataset_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::DatasetIo {
            path: path.into(),
            source,
        }
    }

    /// Builds a malformed-record error.
    pub fn dataset_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::DatasetFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
