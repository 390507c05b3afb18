use thiserror::Error;

use crate::peer::PeerId;

/// Global/fatal errors surfaced from the query pipeline.
///
/// Per-peer transient failures (store unavailable, peer offline, passthrough
/// failure) are never represented here — they are recorded directly into
/// [`crate::response::Response::failed`] as plain messages and do not abort
/// the request. Only the handful of failure modes `spec.md` §7 calls global
/// reach this type.
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("bad request: backend {0} does not exist")]
    BadBackend(PeerId),

    #[error("{0}")]
    AllPeersFailed(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("json error: {0}")]
    Json(String),
}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        ProxyError::Json(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
