//! Ambient `MessageContext` and current-queue-name thread-locals.
//!
//! Both are installed with guaranteed release on all exit paths via RAII
//! guards, matching the scoped-resource-acquisition discipline used
//! elsewhere in the bus (see `meshbus_core`'s per-entry locking).

use std::cell::RefCell;

use meshbus_core::message_type::MessageTypeId;
use meshbus_core::peer_id::PeerId;

/// Per-invocation context visible to a running handler.
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// The originating peer.
    pub sender_id: PeerId,
    /// The message type currently being handled.
    pub message_type_id: MessageTypeId,
    /// The deployment environment the message originated in.
    pub environment: String,
    /// Whether the message was persisted by its originator.
    pub was_persisted: bool,
}

impl MessageContext {
    /// Construct a context.
    #[must_use]
    pub fn new(sender_id: PeerId, message_type_id: MessageTypeId, environment: impl Into<String>) -> Self {
        Self { sender_id, message_type_id, environment: environment.into(), was_persisted: false }
    }
}

thread_local! {
    static CURRENT_CONTEXT: RefCell<Option<MessageContext>> = const { RefCell::new(None) };
    static CURRENT_QUEUE_NAME: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// RAII guard that installs a `MessageContext` as ambient for the current
/// thread and restores the previous value (if any) on drop.
pub struct ContextGuard {
    previous: Option<MessageContext>,
}

impl ContextGuard {
    /// Install `context` as ambient, saving whatever was previously installed.
    #[must_use]
    pub fn install(context: MessageContext) -> Self {
        let previous = CURRENT_CONTEXT.with(|cell| cell.borrow_mut().replace(context));
        Self { previous }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|cell| {
            *cell.borrow_mut() = self.previous.take();
        });
    }
}

/// Read the ambient `MessageContext`, if one is installed on this thread.
pub fn current_context() -> Option<MessageContext> {
    CURRENT_CONTEXT.with(|cell| cell.borrow().clone())
}

/// RAII guard that records this thread as running a named queue's worker
/// loop, for reentrancy detection in `run_or_enqueue`.
pub struct QueueNameGuard {
    previous: Option<String>,
}

impl QueueNameGuard {
    /// Mark the current thread as executing `queue_name`'s worker loop.
    #[must_use]
    pub fn install(queue_name: impl Into<String>) -> Self {
        let previous = CURRENT_QUEUE_NAME.with(|cell| cell.borrow_mut().replace(queue_name.into()));
        Self { previous }
    }
}

impl Drop for QueueNameGuard {
    fn drop(&mut self) {
        CURRENT_QUEUE_NAME.with(|cell| {
            *cell.borrow_mut() = self.previous.take();
        });
    }
}

/// Whether the current thread is already running `queue_name`'s worker loop.
#[must_use]
pub fn is_current_queue(queue_name: &str) -> bool {
    CURRENT_QUEUE_NAME.with(|cell| cell.borrow().as_deref() == Some(queue_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_guard_restores_previous_on_drop() {
        assert!(current_context().is_none());
        let outer = MessageContext::new(PeerId::new("Outer.0"), MessageTypeId::new("Tests.Outer"), "Test");
        let _outer_guard = ContextGuard::install(outer.clone());
        assert_eq!(current_context().unwrap().sender_id, outer.sender_id);
        {
            let inner = MessageContext::new(PeerId::new("Inner.0"), MessageTypeId::new("Tests.Inner"), "Test");
            let _inner_guard = ContextGuard::install(inner.clone());
            assert_eq!(current_context().unwrap().sender_id, inner.sender_id);
        }
        assert_eq!(current_context().unwrap().sender_id, outer.sender_id);
    }

    #[test]
    fn queue_name_guard_tracks_reentrancy() {
        assert!(!is_current_queue("Abc.Queue"));
        let _guard = QueueNameGuard::install("Abc.Queue");
        assert!(is_current_queue("Abc.Queue"));
        assert!(!is_current_queue("Other.Queue"));
    }
}
