//! Error types for remote operations.
//!
//! The engine performs no automatic retry; a failed call is terminal for the
//! entity being processed. Retry policy, if any, belongs to the transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The store answered with a non-success status.
    #[error("remote returned {status} for {endpoint}: {message}")]
    Status {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// Login was rejected.
    #[error("authentication rejected for user {user}")]
    AuthRejected { user: String },

    /// Transport-level failure (connect, TLS, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected wire shape.
    #[error("decode error at {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Fetched payload failed domain validation.
    #[error("invalid payload: {0}")]
    Payload(#[from] mirror_data::Error),

    /// Invalid base URL or joined endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Local filesystem failure while staging or uploading files.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
