//! Error types for the request layer.
//!
//! # Design
//! `NotFound` and `Unauthorized` get dedicated variants because callers
//! branch on them: a missing resource renders an empty state and a 401
//! tears the session down. Every other non-2xx response lands in
//! `HttpError` with the raw status and body. The enum is `Clone` so query
//! and mutation handles can keep the last failure around for display.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned 401.
    #[error("unauthorized")]
    Unauthorized,

    /// The server returned a non-2xx status other than 401 and 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The request never produced a response (connect, timeout, I/O).
    #[error("transport failed: {0}")]
    Transport(String),

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A query or mutation descriptor failed validation at construction.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
