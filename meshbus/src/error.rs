//! Bus-level error types.

use thiserror::Error;

/// Main error type for bus-facade operations.
#[derive(Error, Debug)]
pub enum BusError {
    /// Wraps a core data-model/matcher error.
    #[error(transparent)]
    Core(#[from] meshbus_core::error::CoreError),

    /// Wraps a dispatch-engine error.
    #[error(transparent)]
    Dispatch(#[from] meshbus_dispatch::error::DispatchError),

    /// The transport endpoint reported an error other than "no message available".
    #[error("transport error: {0}")]
    Transport(String),

    /// Raised at startup only; never reached by in-flight dispatch.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation was attempted against a peer that was never registered,
    /// or has since been unregistered/decommissioned.
    #[error("unknown peer: {0}")]
    UnknownPeer(String),
}

/// Result type alias for bus-facade operations.
pub type Result<T> = std::result::Result<T, BusError>;
