//! Error types for the synchronization pipeline
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::job::ResourceKind;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the synchronization pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Fetching a source list failed
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Login against the device failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The device answered with a non-success result code
    #[error("Device {action} on {kind} failed (result {code}): {message}")]
    Device {
        /// Action that was called (show, del, add)
        action: String,
        /// Resource kind the call targeted
        kind: ResourceKind,
        /// Result code returned by the device
        code: i64,
        /// Device-supplied message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure of a job run, with the phase it failed in
    #[error("[{tag}] {phase} failed: {source}")]
    Job {
        /// Job tag (kind, index and target)
        tag: String,
        /// Pipeline phase (fetch, login, show, delete, add)
        phase: &'static str,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a device error from a non-success result code
    pub fn device(
        action: impl Into<String>,
        kind: ResourceKind,
        code: i64,
        message: impl Into<String>,
    ) -> Self {
        Self::Device {
            action: action.into(),
            kind,
            code,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Wrap an error with the job tag and phase it happened in
    pub fn in_job(self, tag: impl Into<String>, phase: &'static str) -> Self {
        Self::Job {
            tag: tag.into(),
            phase,
            source: Box::new(self),
        }
    }

    /// The phase a job error happened in, if this is a job error
    pub fn phase(&self) -> Option<&'static str> {
        match self {
            Self::Job { phase, .. } => Some(phase),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
