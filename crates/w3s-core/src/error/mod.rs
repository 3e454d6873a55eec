//! Error types and result aliases for w3s operations.
//!
//! Every client operation reports failures through [`StorageError`], so callers
//! can match on a typed [`ErrorKind`] instead of inspecting message strings.

use thiserror::Error;

/// Unified error type for all storage client operations
#[derive(Error, Debug)]
pub enum StorageError {
    // Transport errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    // Local precondition errors
    #[error("Invalid CID: {cid}")]
    InvalidCid { cid: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    // Response errors
    #[error("Failed to decode response: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Config errors
    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },
}

/// Coarse classification of a [`StorageError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request never produced a response
    Transport,
    /// Service answered with a non-success status
    Status,
    /// Caller input was rejected before any request was sent
    Precondition,
    /// Response body did not have the expected shape
    Decode,
    /// Client configuration is unusable
    Config,
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create a decode error from any error type
    pub fn decode<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Decode {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create a status error for a named operation
    pub fn status(operation: &str, status: u16, body: String) -> Self {
        Self::Status {
            operation: operation.to_string(),
            status,
            body,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Network { .. } => ErrorKind::Transport,
            StorageError::Status { .. } => ErrorKind::Status,
            StorageError::InvalidCid { .. } | StorageError::Io { .. } => ErrorKind::Precondition,
            StorageError::Decode { .. } => ErrorKind::Decode,
            StorageError::ConfigValidation { .. } => ErrorKind::Config,
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StorageError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Network { .. } => true,
            StorageError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::Network { .. } => Some("Check your internet connection and try again"),
            StorageError::Status { status: 401 | 403, .. } => {
                Some("Check that the API token is valid and has not been revoked")
            },
            StorageError::InvalidCid { .. } => {
                Some("Content identifiers are 46 to 59 alphanumeric characters")
            },
            StorageError::Io { .. } => Some("Check that the file exists and is readable"),
            StorageError::ConfigValidation { .. } => {
                Some("Fix the value in w3s.toml or the matching W3S_* environment variable")
            },
            _ => None,
        }
    }
}
