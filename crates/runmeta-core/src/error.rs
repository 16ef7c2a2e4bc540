//! Error types for metadata persistence and the heartbeat task.
//!
//! Probe failures are not errors: they are reported as
//! [`ProbeOutcome::Omitted`](crate::probe::ProbeOutcome) and never abort collection.

use std::path::Path;

/// Metadata errors.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// Reading or writing a file failed.
    #[error("io error at {path}: {message}")]
    Io { path: String, message: String },

    /// The document could not be rendered as JSON.
    #[error("serialization error: {message}")]
    Serialize { message: String },

    /// Invalid configuration (e.g. a zero heartbeat tick).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The heartbeat task could not be started or did not exit cleanly.
    #[error("heartbeat task error: {message}")]
    Task { message: String },
}

impl MetaError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for metadata operations.
pub type MetaResult<T> = Result<T, MetaError>;
