//! Error taxonomy for the NSO JSON-RPC client.
//!
//! Every fallible client operation returns [`NsoError`]. Variants map onto the
//! places a call can fail:
//!
//! - [`NsoError::Validation`]: bad input, rejected before any network call
//! - [`NsoError::Transport`] / [`NsoError::Timeout`]: the HTTP layer failed
//! - [`NsoError::Rpc`]: the server answered with an `error` envelope
//! - [`NsoError::State`]: the operation is not allowed in the current state
//! - [`NsoError::Decode`] / [`NsoError::IdMismatch`]: the response was not
//!   what the call expected
//!
//! Only transport-level failures are retryable; see [`NsoError::is_retryable`].

use thiserror::Error;

/// Result alias used across the client crates.
pub type Result<T> = std::result::Result<T, NsoError>;

/// Errors produced by the NSO JSON-RPC client.
#[derive(Debug, Error)]
pub enum NsoError {
    /// Invalid constructor or argument input.
    #[error("validation error: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// Connection, TLS or HTTP-status failure.
    #[error("transport error: {message}")]
    Transport {
        /// Transport description of the failure.
        message: String,
        /// HTTP status, when the server answered with a non-success status.
        status: Option<u16>,
    },

    /// The transport gave up waiting for the server.
    #[error("request timed out: {message}")]
    Timeout {
        /// Transport description of the timeout.
        message: String,
    },

    /// The server returned a JSON-RPC `error` envelope.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Server error code.
        code: i64,
        /// Server error message.
        message: String,
        /// Optional structured `data` member of the error.
        data: Option<serde_json::Value>,
    },

    /// Operation invoked in a state that forbids it.
    #[error("invalid state: {message}")]
    State {
        /// Which state rule was violated.
        message: String,
    },

    /// A successful response did not carry what the call expected.
    #[error("decode error: {message}")]
    Decode {
        /// What could not be decoded.
        message: String,
    },

    /// The response id does not match the request id.
    #[error("response id mismatch: expected {expected}, got {actual}")]
    IdMismatch {
        /// Id sent with the request.
        expected: u64,
        /// Id echoed by the server.
        actual: u64,
    },

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

impl NsoError {
    /// Build a [`NsoError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a [`NsoError::State`].
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Build a [`NsoError::Decode`].
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Build a [`NsoError::Transport`] without an HTTP status.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Whether a caller may retry the same call.
    ///
    /// Only transport failures and timeouts qualify. Server errors, state
    /// errors and decode errors will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status, .. } => {
                status.is_none_or(|s| s == 429 || (500..600).contains(&s))
            }
            Self::Timeout { .. } => true,
            Self::Validation { .. }
            | Self::Rpc { .. }
            | Self::State { .. }
            | Self::Decode { .. }
            | Self::IdMismatch { .. }
            | Self::Json(_)
            | Self::Cancelled => false,
        }
    }

    /// Short category string for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Rpc { .. } => "rpc",
            Self::State { .. } => "state",
            Self::Decode { .. } | Self::IdMismatch { .. } | Self::Json(_) => "decode",
            Self::Cancelled => "cancelled",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
