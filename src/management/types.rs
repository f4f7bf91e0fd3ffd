//! Management client error definitions.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while talking to the management API.
#[derive(Debug, Error)]
pub enum ManagementError {
    /// None of the configured addresses is a usable absolute URL.
    #[error("Invalid management API addresses: '{0}'")]
    InvalidAddresses(String),

    /// Username or password missing.
    #[error("{0} is null or empty")]
    MissingCredential(&'static str),

    /// No candidate host answered the liveness probe.
    #[error("Unable to connect to any of the provided API hosts: {}", .0.join(", "))]
    NoReachableHost(Vec<String>),

    /// The API answered with a status outside the accepted set.
    #[error("Unexpected HTTP status {status} for {method} {path}")]
    UnexpectedStatus {
        method: &'static str,
        path: String,
        status: StatusCode,
    },

    /// Transport level failure (timeout, reset, TLS).
    #[error("Management request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response or request body could not be (de)serialized.
    #[error("Invalid management payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// A URL could not be built for the request path.
    #[error("Cannot build request path for {0}")]
    InvalidPath(String),
}

impl ManagementError {
    /// HTTP status carried by an `UnexpectedStatus` error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ManagementError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for configuration problems detected at construction time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ManagementError::InvalidAddresses(_) | ManagementError::MissingCredential(_)
        )
    }
}

/// Result type for management operations.
pub type ManagementResult<T> = Result<T, ManagementError>;
