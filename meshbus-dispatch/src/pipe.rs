//! `Pipe`: paired before/after interceptor hooks run around a handler invocation.

use std::any::Any;

use crate::context::MessageContext;
use crate::error::DispatchError;

/// Opaque per-pipe state produced by `before_invoke` and handed back to the
/// same pipe's `after_invoke`.
pub type PipeState = Box<dyn Any + Send>;

/// The outcome of a handler invocation, passed to `after_invoke` in reverse
/// pipe order.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    /// Whether the invocation raised an error.
    pub is_faulted: bool,
    /// The error, if `is_faulted`.
    pub error: Option<DispatchError>,
}

impl InvocationOutcome {
    /// The invocation completed without error.
    #[must_use]
    pub fn ok() -> Self {
        Self { is_faulted: false, error: None }
    }

    /// The invocation raised `error`.
    #[must_use]
    pub fn faulted(error: DispatchError) -> Self {
        Self { is_faulted: true, error: Some(error) }
    }

    /// Build an outcome from a dispatch result.
    #[must_use]
    pub fn from_result(result: &crate::error::Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::faulted(e.clone()),
        }
    }
}

/// An interceptor with paired `before_invoke`/`after_invoke` hooks around a
/// handler invocation.
///
/// Pipes run `before_invoke` in registration order and `after_invoke` in
/// REVERSE registration order, always — even when the invocation faults.
pub trait Pipe: Send + Sync {
    /// Human-readable name, used in diagnostics.
    fn name(&self) -> &str;

    /// Run before the handler. The returned state is handed back to this
    /// pipe's `after_invoke` unchanged.
    fn before_invoke(&self, context: &MessageContext) -> PipeState {
        let _ = context;
        Box::new(())
    }

    /// Run after the handler, in reverse registration order, with the state
    /// this pipe produced in `before_invoke` and the invocation's outcome.
    fn after_invoke(&self, state: PipeState, context: &MessageContext, outcome: &InvocationOutcome) {
        let _ = (state, context, outcome);
    }
}

/// Runs the ordered `before_invoke` / handler / reverse-ordered `after_invoke`
/// protocol around one handler invocation.
pub struct PipeInvocation<'a> {
    pipes: &'a [std::sync::Arc<dyn Pipe>],
}

impl<'a> PipeInvocation<'a> {
    /// Build an invocation wrapper over `pipes`, run in registration order.
    #[must_use]
    pub fn new(pipes: &'a [std::sync::Arc<dyn Pipe>]) -> Self {
        Self { pipes }
    }

    /// Run `before_invoke` on every pipe, in order.
    #[must_use]
    pub fn before_invoke(&self, context: &MessageContext) -> Vec<PipeState> {
        self.pipes.iter().map(|pipe| pipe.before_invoke(context)).collect()
    }

    /// Run `after_invoke` on every pipe, in REVERSE order, pairing each with
    /// the state it produced in `before_invoke`.
    pub fn after_invoke(&self, mut states: Vec<PipeState>, context: &MessageContext, outcome: &InvocationOutcome) {
        for pipe in self.pipes.iter().rev() {
            let Some(state) = states.pop() else { break };
            pipe.after_invoke(state, context, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshbus_core::message_type::MessageTypeId;
    use meshbus_core::peer_id::PeerId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct OrderRecordingPipe {
        label: &'static str,
        before_order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        after_order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl Pipe for OrderRecordingPipe {
        fn name(&self) -> &str {
            self.label
        }

        fn before_invoke(&self, _context: &MessageContext) -> PipeState {
            self.before_order.lock().unwrap().push(self.label);
            Box::new(self.label)
        }

        fn after_invoke(&self, state: PipeState, _context: &MessageContext, _outcome: &InvocationOutcome) {
            let label = *state.downcast::<&'static str>().unwrap();
            assert_eq!(label, self.label);
            self.after_order.lock().unwrap().push(self.label);
        }
    }

    #[test]
    fn before_runs_in_order_after_runs_in_reverse() {
        let before_order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let after_order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipes: Vec<Arc<dyn Pipe>> = vec![
            Arc::new(OrderRecordingPipe { label: "a", before_order: before_order.clone(), after_order: after_order.clone() }),
            Arc::new(OrderRecordingPipe { label: "b", before_order: before_order.clone(), after_order: after_order.clone() }),
            Arc::new(OrderRecordingPipe { label: "c", before_order: before_order.clone(), after_order: after_order.clone() }),
        ];
        let invocation = PipeInvocation::new(&pipes);
        let context = MessageContext::new(PeerId::new("Abc.Service.0"), MessageTypeId::new("Tests.T"), "Test");

        let states = invocation.before_invoke(&context);
        assert_eq!(*before_order.lock().unwrap(), vec!["a", "b", "c"]);

        invocation.after_invoke(states, &context, &InvocationOutcome::ok());
        assert_eq!(*after_order.lock().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn after_invoke_runs_even_on_fault() {
        let before_order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let after_order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let ran = Arc::new(AtomicUsize::new(0));

        struct FaultAwarePipe {
            ran: Arc<AtomicUsize>,
        }
        impl Pipe for FaultAwarePipe {
            fn name(&self) -> &str {
                "fault-aware"
            }
            fn after_invoke(&self, _state: PipeState, _context: &MessageContext, outcome: &InvocationOutcome) {
                assert!(outcome.is_faulted);
                self.ran.fetch_add(1, Ordering::SeqCst);
            }
        }

        let pipes: Vec<Arc<dyn Pipe>> = vec![Arc::new(FaultAwarePipe { ran: ran.clone() })];
        let invocation = PipeInvocation::new(&pipes);
        let context = MessageContext::new(PeerId::new("Abc.Service.0"), MessageTypeId::new("Tests.T"), "Test");
        let states = invocation.before_invoke(&context);
        let outcome = InvocationOutcome::faulted(crate::error::DispatchError::HandlerFailed {
            handler_type: "Tests.Handler".into(),
            message_type: "Tests.T".into(),
            message: "boom".into(),
        });
        invocation.after_invoke(states, &context, &outcome);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        let _ = before_order;
        let _ = after_order;
    }
}
