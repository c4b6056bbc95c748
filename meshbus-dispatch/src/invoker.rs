//! `HandlerInvoker`: the dispatcher's handle to one registered handler.

use async_trait::async_trait;
use meshbus_core::message_type::MessageTypeId;

use crate::context::MessageContext;
use crate::error::Result;

/// A single message delivered to a handler, already matched by the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchedMessage {
    /// The message's logical type.
    pub message_type_id: MessageTypeId,
    /// Serialized message body, opaque to the dispatch engine.
    pub content: bytes::Bytes,
}

/// Whether an invoker's handler runs inline on the queue's worker thread or
/// is driven by the cooperative scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    /// Runs to completion inline; the worker blocks until it returns.
    Synchronous,
    /// Returns a future driven by the owning queue's cooperative scheduler.
    Asynchronous,
}

/// The dispatcher's handle to one registered handler: how to run it, and
/// whether a pending batch can absorb the next enqueued entry.
#[async_trait]
pub trait HandlerInvoker: Send + Sync {
    /// The handler's declared type name, used in diagnostics and filtering.
    fn handler_type_name(&self) -> &str;

    /// The message type this invoker handles.
    fn message_type_id(&self) -> &MessageTypeId;

    /// Whether this handler runs synchronously or asynchronously.
    fn mode(&self) -> InvocationMode;

    /// Whether a pending batch headed by `self` may absorb an entry destined
    /// for `other` (same handler instance, same mode, both declare batching).
    fn can_merge_with(&self, other: &dyn HandlerInvoker) -> bool;

    /// Called immediately before an entry is enqueued (never when run
    /// inline via reentrancy). Handlers that need to snapshot state before
    /// queueing do so here.
    fn before_enqueue(&self) {}

    /// Run this handler inline against `messages` under `context`.
    ///
    /// Only called when `mode() == InvocationMode::Synchronous`.
    fn invoke_sync(&self, messages: &[DispatchedMessage], context: &MessageContext) -> Result<()>;

    /// Run this handler against `messages` under `context`, returning a
    /// future driven by the owning queue's cooperative scheduler.
    ///
    /// Only called when `mode() == InvocationMode::Asynchronous`.
    async fn invoke_async(&self, messages: Vec<DispatchedMessage>, context: MessageContext) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub struct CountingInvoker {
        pub handler_type: String,
        pub type_id: MessageTypeId,
        pub mode: InvocationMode,
        pub mergeable: bool,
        pub invocations: Arc<AtomicUsize>,
        pub messages_seen: Arc<AtomicUsize>,
        pub fail: bool,
    }

    #[async_trait]
    impl HandlerInvoker for CountingInvoker {
        fn handler_type_name(&self) -> &str {
            &self.handler_type
        }

        fn message_type_id(&self) -> &MessageTypeId {
            &self.type_id
        }

        fn mode(&self) -> InvocationMode {
            self.mode
        }

        fn can_merge_with(&self, other: &dyn HandlerInvoker) -> bool {
            self.mergeable && self.handler_type_name() == other.handler_type_name()
        }

        fn invoke_sync(&self, messages: &[DispatchedMessage], _context: &MessageContext) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.messages_seen.fetch_add(messages.len(), Ordering::SeqCst);
            if self.fail {
                return Err(crate::error::DispatchError::HandlerFailed {
                    handler_type: self.handler_type.clone(),
                    message_type: self.type_id.to_string(),
                    message: "forced test failure".into(),
                });
            }
            Ok(())
        }

        async fn invoke_async(&self, messages: Vec<DispatchedMessage>, _context: MessageContext) -> Result<()> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.messages_seen.fetch_add(messages.len(), Ordering::SeqCst);
            if self.fail {
                return Err(crate::error::DispatchError::HandlerFailed {
                    handler_type: self.handler_type.clone(),
                    message_type: self.type_id.to_string(),
                    message: "forced async test failure".into(),
                });
            }
            Ok(())
        }
    }
}
