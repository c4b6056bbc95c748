//! Dispatch error types.

use thiserror::Error;

/// Main error type for dispatch-engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A handler raised an error while processing a batch.
    ///
    /// Captured, logged, and reported through the entry's completion; does
    /// NOT stop the owning queue.
    #[error("handler {handler_type} failed on {message_type}: {message}")]
    HandlerFailed {
        /// The handler's declared type name.
        handler_type: String,
        /// The message type being handled when the failure occurred.
        message_type: String,
        /// Human-readable failure description.
        message: String,
    },

    /// An async handler's task was parked awaiting a wake-up that can never
    /// be delivered, because its owning queue shut down while the task was
    /// still in flight. `CooperativeScheduler::spawn` always polls its
    /// future at least once before returning, so "never started" proper is
    /// unreachable here; this is the Rust-native analogue the spec's
    /// contract violation maps onto — a task that started but can never be
    /// resumed to completion.
    #[error("async handler contract violated: {handler_type}.{message_type} was abandoned mid-flight")]
    HandlerContractViolation {
        /// The handler's declared type name.
        handler_type: String,
        /// The message type being handled.
        message_type: String,
    },

    /// The queue has been stopped and no longer accepts entries.
    #[error("dispatch queue '{0}' is stopped")]
    QueueStopped(String),
}

/// Result type alias for dispatch-engine operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
