//! `MessageDispatcher`: routes an inbound message to every registered
//! handler permitted by the active handler filter, each on its own queue.

use std::collections::HashMap;
use std::sync::Arc;

use meshbus_core::message_type::MessageTypeId;
use meshbus_core::peer_id::PeerId;
use parking_lot::RwLock;

use crate::context::MessageContext;
use crate::entry::Dispatch;
use crate::error::Result;
use crate::invoker::{DispatchedMessage, HandlerInvoker};
use crate::pipe::Pipe;
use crate::queue::DispatchQueue;

/// A predicate deciding whether a given handler type name may run for the
/// current dispatch. Defaults to "always permit"; set by the facade to
/// implement subscription-level handler exclusion.
pub type HandlerFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

struct Registration {
    invoker: Arc<dyn HandlerInvoker>,
    queue: DispatchQueue,
}

/// Owns the `MessageTypeId -> [HandlerInvoker]` mapping and, per invoker, the
/// `DispatchQueue` it runs on.
pub struct MessageDispatcher {
    batch_size: usize,
    pipes: Vec<Arc<dyn Pipe>>,
    handlers: RwLock<HashMap<MessageTypeId, Vec<Registration>>>,
    filter: RwLock<HandlerFilter>,
}

impl MessageDispatcher {
    /// Build an empty dispatcher. `batch_size` and `pipes` are applied to
    /// every queue created by `register`.
    #[must_use]
    pub fn new(batch_size: usize, pipes: Vec<Arc<dyn Pipe>>) -> Self {
        Self {
            batch_size,
            pipes,
            handlers: RwLock::new(HashMap::new()),
            filter: RwLock::new(Arc::new(|_| true)),
        }
    }

    /// Replace the handler filter used by subsequent `dispatch` calls.
    pub fn set_handler_filter(&self, filter: HandlerFilter) {
        *self.filter.write() = filter;
    }

    /// Register a handler invoker, starting a dedicated queue named
    /// `queue_name` for it.
    pub fn register(&self, queue_name: impl Into<String>, invoker: Arc<dyn HandlerInvoker>) {
        let type_id = invoker.message_type_id().clone();
        let queue = DispatchQueue::start(queue_name, self.batch_size, self.pipes.clone());
        self.handlers.write().entry(type_id).or_default().push(Registration { invoker, queue });
    }

    /// Drop every registration for `type_id`, stopping their queues.
    pub fn unregister_all(&self, type_id: &MessageTypeId) {
        self.handlers.write().remove(type_id);
    }

    /// Whether any handler is registered for `type_id`.
    #[must_use]
    pub fn has_handlers_for(&self, type_id: &MessageTypeId) -> bool {
        self.handlers.read().get(type_id).is_some_and(|regs| !regs.is_empty())
    }

    /// Dispatch `message` to every registered, filter-permitted handler for
    /// its type, enqueueing one [`Dispatch`] per matching invoker onto its
    /// own queue. Returns once all matching entries have been enqueued (or
    /// run inline, for reentrant/synchronous invokers) — not once they have
    /// all finished running.
    ///
    /// # Errors
    ///
    /// Returns the first [`crate::error::DispatchError`] raised while
    /// enqueueing, if any queue has been stopped.
    pub fn dispatch(&self, sender_id: PeerId, message: DispatchedMessage, environment: impl Into<String>) -> Result<usize> {
        let environment = environment.into();
        let filter = self.filter.read().clone();
        let handlers = self.handlers.read();
        let Some(registrations) = handlers.get(&message.message_type_id) else {
            return Ok(0);
        };

        let mut dispatched = 0;
        for registration in registrations {
            if !filter(registration.invoker.handler_type_name()) {
                continue;
            }
            let context = MessageContext::new(sender_id.clone(), message.message_type_id.clone(), environment.clone());
            let dispatch = Dispatch::new(registration.invoker.clone(), vec![message.clone()], context);
            registration.queue.run_or_enqueue(dispatch)?;
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Wait for every registered queue to drain and finish in-flight async work.
    pub fn wait_until_all_messages_are_processed(&self) {
        for registrations in self.handlers.read().values() {
            for registration in registrations {
                registration.queue.wait_until_all_messages_are_processed();
            }
        }
    }
}
