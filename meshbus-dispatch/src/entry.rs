//! Queue entries: the closed sum of what a `DispatchQueue` can carry.

use std::sync::Arc;

use crate::context::MessageContext;
use crate::error::Result;
use crate::invoker::{DispatchedMessage, HandlerInvoker};

/// A boxed, one-shot unit of work not tied to a handler invocation (used by
/// the cooperative scheduler to re-enqueue continuations, and by `purge`'s
/// internal bookkeeping).
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// A request to run one handler invocation against one or more messages.
pub struct Dispatch {
    /// The handler to run.
    pub invoker: Arc<dyn HandlerInvoker>,
    /// The messages to deliver to the handler.
    pub messages: Vec<DispatchedMessage>,
    /// The ambient context to install for the duration of the invocation.
    pub context: MessageContext,
    /// When set, `run_or_enqueue` always runs this entry inline regardless
    /// of which thread called it.
    pub should_run_synchronously: bool,
    /// Notified with the invocation's outcome once the entry (or the batch
    /// it was folded into) has run.
    pub completion: Option<flume::Sender<Result<()>>>,
}

impl Dispatch {
    /// Construct a dispatch entry with no completion notification.
    #[must_use]
    pub fn new(invoker: Arc<dyn HandlerInvoker>, messages: Vec<DispatchedMessage>, context: MessageContext) -> Self {
        Self { invoker, messages, context, should_run_synchronously: false, completion: None }
    }

    /// Notify this entry's completion channel, if any, swallowing a closed receiver.
    pub fn complete(&self, outcome: Result<()>) {
        if let Some(sender) = &self.completion {
            let _ = sender.send(outcome);
        }
    }
}

/// What a `DispatchQueue` consumes from its channel.
pub enum QueueEntry {
    /// A handler invocation request.
    Dispatch(Dispatch),
    /// An untyped action: run once, never batched.
    Action(Action),
}
