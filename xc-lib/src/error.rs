//! Error kinds shared by the query builder, client and downloader.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong talking to xeno-canto or writing results.
#[derive(Debug, Error)]
pub enum XcError {
    /// Bad, conflicting or missing query filters or client settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// API key missing, or rejected by the provider.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The API answered with a payload we could not make sense of.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Timeout, connection failure or 5xx/429 that survived every retry.
    #[error("network error after {attempts} attempt(s): {message}")]
    TransientNetwork {
        /// Requests made before giving up.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },

    /// 4xx answer other than an auth failure. Never retried.
    #[error("request rejected (HTTP {status}): {message}")]
    RequestRejected {
        /// HTTP status code.
        status: u16,
        /// Provider message or response body.
        message: String,
    },

    /// Filesystem failure while creating folders or writing files.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Metadata CSV could not be written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl XcError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the key was missing or refused.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

pub type Result<T> = std::result::Result<T, XcError>;
