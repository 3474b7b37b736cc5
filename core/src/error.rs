//! Error types for the Shipfunk client.
//!
//! # Design
//! Every failure surfaces as one `ApiError`. `Validation` is raised before a
//! request ever leaves the process. Non-2xx replies land in `HttpError` with
//! the raw status code and body; a 2xx reply that carries Shipfunk's `Error`
//! block instead of a `response` becomes `Remote`.

use thiserror::Error;

/// Errors returned by the Shipfunk clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required parameter was missing or malformed. No request was sent.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The server answered 2xx but without a `response` payload.
    #[error("remote error{}: {message}", code.map(|c| format!(" {c}")).unwrap_or_default())]
    Remote { code: Option<i64>, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    /// HTTP status attached to the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the error was raised locally, before any network I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}
