//! Engine error taxonomy.
//!
//! Read-path anomalies (malformed frames, responses with no matching
//! pending call) are handled locally - logged, counted, skipped - and
//! never surface here. Callers only ever see failures scoped to their own
//! operation.

use thiserror::Error;

use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, CdpError>;

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The debuggee answered this call with an error object.
    #[error("remote error: {code} - {message}")]
    Remote { code: i64, message: String },

    /// The physical connection is gone. Every outstanding call fails with
    /// this, and further calls fail fast without a transport write.
    #[error("connection closed")]
    ConnectionClosed,

    /// The session was detached (or never attached). Rejected before any
    /// frame is sent.
    #[error("session closed")]
    SessionClosed,

    /// A configured call timeout expired before the response arrived.
    #[error("call timed out")]
    Timeout,

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
