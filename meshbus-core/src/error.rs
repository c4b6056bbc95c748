//! Core error types.
//!
//! Comprehensive error handling for the data model, matcher, and repository.

use thiserror::Error;

/// Main error type for meshbus-core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The wire record could not be parsed (malformed length-prefixed frame).
    ///
    /// Readers never propagate this as a panic; see [`crate::transport_message::read`].
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// A binding key token violated the `#`-must-be-last placement rule.
    #[error("invalid binding key: {0}")]
    InvalidBindingKey(String),

    /// A `PeerId` string failed normalization (e.g. empty, or contains whitespace).
    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),

    /// Startup-only configuration problem; never reached by in-flight dispatch.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for meshbus-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an invalid-frame error with context.
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create an invalid-binding-key error with context.
    pub fn invalid_binding_key(msg: impl Into<String>) -> Self {
        Self::InvalidBindingKey(msg.into())
    }

    /// Create an invalid-peer-id error with context.
    pub fn invalid_peer_id(msg: impl Into<String>) -> Self {
        Self::InvalidPeerId(msg.into())
    }
}
