//! Error types for FastDet

use thiserror::Error;

/// FastDet error type.
///
/// Configuration and resolution errors are fatal at init time; the remaining
/// kinds are raised per event and handled by the run loop (the event is
/// dropped and a counter incremented).
#[derive(Error, Debug)]
pub enum Error {
    /// Missing required key, malformed parameter list, or duplicate export.
    #[error("configuration error in module '{module}', key '{key}': {message}")]
    Config {
        /// Module whose configuration block is at fault.
        module: String,
        /// Offending configuration key.
        key: String,
        /// What went wrong.
        message: String,
    },

    /// Import of an array nobody exported.
    #[error("module '{module}' imports unknown array '{array}'")]
    Resolve {
        /// Importing module.
        module: String,
        /// Requested array path.
        array: String,
    },

    /// Malformed input event (inconsistent indices, non-finite kinematics).
    #[error("malformed input event: {0}")]
    Input(String),

    /// Numeric failure (formula evaluation, invalid distribution argument).
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Failure raised by an external collaborator (generator, clustering).
    #[error("external error: {0}")]
    External(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Convenience constructor for [`Error::Config`].
    pub fn config(
        module: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Config { module: module.into(), key: key.into(), message: message.into() }
    }

    /// Whether this error must abort the run rather than the current event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. } | Error::Resolve { .. } | Error::Io(_) | Error::Json(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
