//! Error types shared across the ledger core.

use thiserror::Error;

/// Failure of the underlying key-value persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Serialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[cfg(feature = "keyring-storage")]
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("no storage location available: {0}")]
    Unavailable(String),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn serialize(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialize {
            context: context.into(),
            source,
        }
    }
}

/// Failure while preparing an outgoing request for sending.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("failed to read credentials: {0}")]
    Storage(#[from] StorageError),

    /// The stored token contains bytes that are not allowed in a header value
    #[error("stored token cannot be sent as an Authorization header")]
    InvalidHeader,
}

/// Failure of a call against the ledger HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error(transparent)]
    Authorize(#[from] AuthorizeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// True when the server rejected the bearer credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}
