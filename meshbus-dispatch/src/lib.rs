//! Meshbus Dispatch
//!
//! The dispatch engine: named single-consumer queues, the before/after pipe
//! invocation protocol, a hand-rolled cooperative scheduler for async
//! handlers, and the `MessageDispatcher` that ties handler registrations to
//! their queues.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod invoker;
pub mod pipe;
pub mod queue;
pub mod scheduler;

pub mod prelude {
    pub use crate::context::{current_context, is_current_queue, MessageContext};
    pub use crate::dispatcher::{HandlerFilter, MessageDispatcher};
    pub use crate::entry::{Action, Dispatch, QueueEntry};
    pub use crate::error::{DispatchError, Result};
    pub use crate::invoker::{DispatchedMessage, HandlerInvoker, InvocationMode};
    pub use crate::pipe::{InvocationOutcome, Pipe, PipeInvocation};
    pub use crate::queue::DispatchQueue;
    pub use crate::scheduler::CooperativeScheduler;
}
