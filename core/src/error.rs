//! Error type shared by every project API operation.
//!
//! # Design
//! Callers mostly care whether an operation succeeded, so every failure cause
//! lands in one enum. `HttpError` keeps the raw status and body of a non-2xx
//! response so callers that want the failed response (the tarball save) still
//! have it. `Transport` covers the cases where no response was obtained.

use thiserror::Error;

/// Errors returned by project API operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// No response was obtained (connection refused, DNS, TLS, ...).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// An argument was rejected before any request was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The call was cancelled before the transport settled.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Status code of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Body of the failed response, if the server answered at all.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ApiError::HttpError { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
