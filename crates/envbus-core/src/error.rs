//! Shared error type across envbus crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes (safe to log, match on, or ship across the bus).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Inbound message from an unexpected origin.
    OriginMismatch,
    /// Response for an id with no pending request.
    UnknownRequestId,
    /// The remote implementation failed.
    Remote,
    /// Message could not be decoded or is missing required fields.
    Malformed,
    /// Endpoint has been torn down.
    Disposed,
    /// Method name is not part of the remote capability contract.
    NotInContract,
    /// Remote implementation is not ready yet.
    NotReady,
    /// Remote has no handler for the method.
    MethodNotFound,
    /// Handshake retries ran out.
    HandshakeExhausted,
    /// Payload (de)serialization failed.
    Codec,
    /// Underlying post-message primitive failed.
    Transport,
    /// Invalid configuration.
    Config,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and remote error names.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::OriginMismatch => "ORIGIN_MISMATCH",
            ErrorCode::UnknownRequestId => "UNKNOWN_REQUEST_ID",
            ErrorCode::Remote => "REMOTE",
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::Disposed => "DISPOSED",
            ErrorCode::NotInContract => "NOT_IN_CONTRACT",
            ErrorCode::NotReady => "NOT_READY",
            ErrorCode::MethodNotFound => "METHOD_NOT_FOUND",
            ErrorCode::HandshakeExhausted => "HANDSHAKE_EXHAUSTED",
            ErrorCode::Codec => "CODEC",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Config => "CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Serializable error description carried in the `error` field of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Error kind, e.g. `"METHOD_NOT_FOUND"` or an application-chosen name.
    pub name: String,
    /// Human readable message.
    pub message: String,
}

impl RemoteError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BusError>;

/// Unified error type used by core and runtime.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: String, actual: String },
    #[error("unknown request id: {0}")]
    UnknownRequestId(String),
    #[error("remote invocation failed: {0}")]
    Remote(RemoteError),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("endpoint disposed")]
    Disposed,
    #[error("not in contract: {0}")]
    NotInContract(String),
    #[error("remote implementation not ready")]
    NotReady,
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("handshake gave up after {attempts} attempts")]
    HandshakeExhausted { attempts: u32 },
    #[error("codec: {0}")]
    Codec(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl BusError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            BusError::OriginMismatch { .. } => ErrorCode::OriginMismatch,
            BusError::UnknownRequestId(_) => ErrorCode::UnknownRequestId,
            BusError::Remote(_) => ErrorCode::Remote,
            BusError::Malformed(_) => ErrorCode::Malformed,
            BusError::Disposed => ErrorCode::Disposed,
            BusError::NotInContract(_) => ErrorCode::NotInContract,
            BusError::NotReady => ErrorCode::NotReady,
            BusError::MethodNotFound(_) => ErrorCode::MethodNotFound,
            BusError::HandshakeExhausted { .. } => ErrorCode::HandshakeExhausted,
            BusError::Codec(_) => ErrorCode::Codec,
            BusError::Transport(_) => ErrorCode::Transport,
            BusError::Config(_) => ErrorCode::Config,
            BusError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            BusError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Describe this error for the `error` field of a response.
    ///
    /// Application failures (`Remote`) pass through untouched so the caller
    /// sees exactly what the handler produced.
    pub fn to_remote(&self) -> RemoteError {
        match self {
            BusError::Remote(e) => e.clone(),
            BusError::MethodNotFound(m) => RemoteError::new(self.code().as_str(), m.clone()),
            other => RemoteError::new(other.code().as_str(), other.to_string()),
        }
    }

    /// Rebuild a caller-side error from a received `RemoteError`.
    ///
    /// `METHOD_NOT_FOUND` and `NOT_READY` map back to their own variants;
    /// everything else is an application failure.
    pub fn from_remote(err: RemoteError) -> Self {
        match err.name.as_str() {
            "METHOD_NOT_FOUND" => BusError::MethodNotFound(err.message),
            "NOT_READY" => BusError::NotReady,
            _ => BusError::Remote(err),
        }
    }
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Codec(e.to_string())
    }
}
