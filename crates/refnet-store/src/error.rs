//! Store error taxonomy.

use thiserror::Error;

/// A failed interaction with the remote record store.
///
/// Timeouts surface through [`StoreError::Transport`] because the HTTP
/// client enforces the per-request deadline.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network-level failure: connect, TLS, timeout.
    #[error("store transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with an unexpected status (auth, rate limit, ...).
    #[error("store returned {status} for key {key}")]
    Status {
        status: reqwest::StatusCode,
        key: String,
    },

    /// The store answered but the body did not match the expected shape.
    #[error("undecodable record at key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The configured base URL or a derived key URL is not parseable.
    #[error("invalid store url {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Injected or backend-specific failure (used by the in-memory store).
    #[error("store unavailable for key {key}")]
    Unavailable { key: String },
}

impl StoreError {
    pub fn status(status: reqwest::StatusCode, key: impl Into<String>) -> Self {
        StoreError::Status {
            status,
            key: key.into(),
        }
    }

    pub fn decode(key: impl Into<String>, source: serde_json::Error) -> Self {
        StoreError::Decode {
            key: key.into(),
            source,
        }
    }

    pub fn unavailable(key: impl Into<String>) -> Self {
        StoreError::Unavailable { key: key.into() }
    }
}
