//! `DispatchQueue`: a named single-consumer worker owning one background
//! thread, with batched synchronous/asynchronous execution, quiescence
//! waits, purge, and reentrancy detection.
//!
//! The worker loop follows the same split-pump shape as the teacher's
//! `SocketActor::run` (drain what's ready non-blockingly, act, repeat) but
//! with one OS thread per queue instead of one per socket, and a `pending`
//! holder standing in for the teacher's `write_queue` drain buffer.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::context::{ContextGuard, QueueNameGuard};
use crate::entry::{Action, Dispatch, QueueEntry};
use crate::error::{DispatchError, Result};
use crate::invoker::InvocationMode;
use crate::pipe::{InvocationOutcome, Pipe};
use crate::scheduler::CooperativeScheduler;

#[derive(Debug, Default)]
struct QueueState {
    in_flight_async: AtomicUsize,
    async_completed_generation: AtomicU64,
    stopped: AtomicBool,
}

/// A named single-consumer dispatch queue.
pub struct DispatchQueue {
    name: String,
    sender: flume::Sender<QueueEntry>,
    purge_sender: flume::Sender<flume::Sender<usize>>,
    state: Arc<QueueState>,
    batch_size: Arc<AtomicUsize>,
    pipes: Arc<Vec<Arc<dyn Pipe>>>,
    worker: Option<JoinHandle<()>>,
}

impl DispatchQueue {
    /// Start a queue named `name` with the given default `batch_size` and
    /// `pipes` run around every invocation (including ones run inline via
    /// reentrancy).
    #[must_use]
    pub fn start(name: impl Into<String>, batch_size: usize, pipes: Vec<Arc<dyn Pipe>>) -> Self {
        let name = name.into();
        let (sender, receiver) = flume::unbounded::<QueueEntry>();
        let (purge_sender, purge_receiver) = flume::unbounded::<flume::Sender<usize>>();
        let state = Arc::new(QueueState::default());
        let batch_size = Arc::new(AtomicUsize::new(batch_size.max(1)));
        let pipes = Arc::new(pipes);

        let worker_name = name.clone();
        let worker_state = state.clone();
        let worker_batch_size = batch_size.clone();
        let worker_sender = sender.clone();
        let worker_pipes = pipes.clone();

        let worker = std::thread::Builder::new()
            .name(format!("meshbus-dispatch-{worker_name}"))
            .spawn(move || {
                worker_loop(
                    worker_name,
                    receiver,
                    purge_receiver,
                    worker_sender,
                    worker_state,
                    worker_batch_size,
                    worker_pipes,
                );
            })
            .expect("spawning a dispatch queue worker thread");

        Self { name, sender, purge_sender, state, batch_size, pipes, worker: Some(worker) }
    }

    /// This queue's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Update the batch size used for future dequeue cycles.
    pub fn set_batch_size(&self, batch_size: usize) {
        self.batch_size.store(batch_size.max(1), Ordering::SeqCst);
    }

    /// Run `dispatch` now if the current thread is already this queue's
    /// worker, or if `dispatch.should_run_synchronously` is set; otherwise
    /// calls `before_enqueue` and enqueues it for the worker to pick up.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueStopped`] if the queue has been stopped.
    pub fn run_or_enqueue(&self, dispatch: Dispatch) -> Result<()> {
        if self.state.stopped.load(Ordering::SeqCst) {
            return Err(DispatchError::QueueStopped(self.name.clone()));
        }
        if dispatch.should_run_synchronously || crate::context::is_current_queue(&self.name) {
            run_single_inline(&dispatch, self.pipes.as_slice());
            return Ok(());
        }
        dispatch.invoker.before_enqueue();
        self.sender
            .send(QueueEntry::Dispatch(dispatch))
            .map_err(|_| DispatchError::QueueStopped(self.name.clone()))
    }

    /// Enqueue an untyped action; never batched with dispatch entries.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueStopped`] if the queue has been stopped.
    pub fn enqueue_action(&self, action: Action) -> Result<()> {
        if self.state.stopped.load(Ordering::SeqCst) {
            return Err(DispatchError::QueueStopped(self.name.clone()));
        }
        self.sender
            .send(QueueEntry::Action(action))
            .map_err(|_| DispatchError::QueueStopped(self.name.clone()))
    }

    /// Spin with a 1ms sleep until the queue is empty, no async invocation
    /// is in flight, and no async batch has completed since the last
    /// observation. Returns `true` iff it waited at least one full cycle.
    #[must_use]
    pub fn wait_until_all_messages_are_processed(&self) -> bool {
        let mut waited = false;
        let mut prev_generation = self.state.async_completed_generation.load(Ordering::SeqCst);
        loop {
            let in_flight = self.state.in_flight_async.load(Ordering::SeqCst);
            let empty = self.sender.is_empty();
            let generation = self.state.async_completed_generation.load(Ordering::SeqCst);
            if in_flight == 0 && empty && generation == prev_generation {
                return waited;
            }
            prev_generation = generation;
            waited = true;
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Atomically drain pending entries without running them. Returns the
    /// number of entries discarded.
    #[must_use]
    pub fn purge(&self) -> usize {
        let (resp_tx, resp_rx) = flume::bounded(1);
        if self.purge_sender.send(resp_tx).is_err() {
            return 0;
        }
        resp_rx.recv().unwrap_or(0)
    }

    /// Wait for quiescence, seal the queue against new entries, and join the
    /// worker thread.
    pub fn stop(&mut self) {
        self.wait_until_all_messages_are_processed();
        self.state.stopped.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

fn worker_loop(
    name: String,
    receiver: flume::Receiver<QueueEntry>,
    purge_receiver: flume::Receiver<flume::Sender<usize>>,
    self_sender: flume::Sender<QueueEntry>,
    state: Arc<QueueState>,
    batch_size: Arc<AtomicUsize>,
    pipes: Arc<Vec<Arc<dyn Pipe>>>,
) {
    let _queue_guard = QueueNameGuard::install(name.clone());
    let scheduler = CooperativeScheduler::new(self_sender);
    let mut pending: Option<QueueEntry> = None;

    loop {
        if state.stopped.load(Ordering::SeqCst) && pending.is_none() && receiver.is_empty() {
            break;
        }

        if let Ok(resp) = purge_receiver.try_recv() {
            let mut drained = 0usize;
            while receiver.try_recv().is_ok() {
                drained += 1;
            }
            if pending.take().is_some() {
                drained += 1;
            }
            let _ = resp.send(drained);
            continue;
        }

        let first = match pending.take() {
            Some(entry) => entry,
            None => match receiver.recv_timeout(Duration::from_millis(50)) {
                Ok(entry) => entry,
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => break,
            },
        };

        match first {
            QueueEntry::Action(action) => action(),
            QueueEntry::Dispatch(head) => {
                let limit = batch_size.load(Ordering::SeqCst).max(1);
                let mut batch = vec![head];
                while batch.len() < limit {
                    match receiver.try_recv() {
                        Ok(QueueEntry::Dispatch(next)) => {
                            let merges = batch[0].invoker.can_merge_with(next.invoker.as_ref());
                            if merges {
                                batch.push(next);
                            } else {
                                pending = Some(QueueEntry::Dispatch(next));
                                break;
                            }
                        }
                        Ok(other @ QueueEntry::Action(_)) => {
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                execute_batch(batch, &state, &scheduler, pipes.as_slice());
            }
        }
    }
}

fn run_single_inline(dispatch: &Dispatch, pipes: &[Arc<dyn Pipe>]) {
    let invocation = crate::pipe::PipeInvocation::new(pipes);
    let pipe_states = invocation.before_invoke(&dispatch.context);
    let _ctx_guard = ContextGuard::install(dispatch.context.clone());
    let result = dispatch.invoker.invoke_sync(&dispatch.messages, &dispatch.context);
    let outcome = InvocationOutcome::from_result(&result);
    invocation.after_invoke(pipe_states, &dispatch.context, &outcome);
    dispatch.complete(result);
}

fn execute_batch(
    batch: Vec<Dispatch>,
    state: &Arc<QueueState>,
    scheduler: &CooperativeScheduler,
    pipes: &[Arc<dyn Pipe>],
) {
    let mode = batch[0].invoker.mode();
    match mode {
        InvocationMode::Synchronous => execute_sync_batch(batch, pipes),
        InvocationMode::Asynchronous => execute_async_batch(batch, state, scheduler, pipes),
    }
}

fn execute_sync_batch(batch: Vec<Dispatch>, pipes: &[Arc<dyn Pipe>]) {
    let invoker = batch[0].invoker.clone();
    let context = batch[0].context.clone();
    let messages: Vec<_> = batch.iter().flat_map(|d| d.messages.iter().cloned()).collect();

    let invocation = crate::pipe::PipeInvocation::new(pipes);
    let pipe_states = invocation.before_invoke(&context);
    let _ctx_guard = ContextGuard::install(context.clone());
    let result = invoker.invoke_sync(&messages, &context);
    let outcome = InvocationOutcome::from_result(&result);
    invocation.after_invoke(pipe_states, &context, &outcome);

    for entry in &batch {
        entry.complete(result.clone());
    }
}

fn execute_async_batch(
    batch: Vec<Dispatch>,
    state: &Arc<QueueState>,
    scheduler: &CooperativeScheduler,
    pipes: &[Arc<dyn Pipe>],
) {
    let invoker = batch[0].invoker.clone();
    let context = batch[0].context.clone();
    let messages: Vec<_> = batch.iter().flat_map(|d| d.messages.iter().cloned()).collect();

    let pipes_owned: Vec<Arc<dyn Pipe>> = pipes.to_vec();
    let pipe_states = {
        let invocation = crate::pipe::PipeInvocation::new(&pipes_owned);
        invocation.before_invoke(&context)
    };

    state.in_flight_async.fetch_add(1, Ordering::SeqCst);
    let state_for_fut = state.clone();
    let state_for_abandon = state.clone();

    // Shared so that whichever of "the future finishes" or "the task is
    // abandoned" happens first is the one that completes the batch; `take`
    // makes the two mutually exclusive.
    let outstanding: Arc<std::sync::Mutex<Option<Vec<Dispatch>>>> = Arc::new(std::sync::Mutex::new(Some(batch)));
    let outstanding_for_fut = outstanding.clone();
    let handler_type = invoker.handler_type_name().to_string();
    let message_type = context.message_type_id.to_string();

    let fut = Box::pin(async move {
        let _ctx_guard = ContextGuard::install(context.clone());
        let result = invoker.invoke_async(messages, context.clone()).await;
        let outcome = InvocationOutcome::from_result(&result);
        {
            let invocation = crate::pipe::PipeInvocation::new(&pipes_owned);
            invocation.after_invoke(pipe_states, &context, &outcome);
        }
        if let Some(batch) = outstanding_for_fut.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            for entry in &batch {
                entry.complete(result.clone());
            }
        }
        state_for_fut.in_flight_async.fetch_sub(1, Ordering::SeqCst);
        state_for_fut.async_completed_generation.fetch_add(1, Ordering::SeqCst);
    });

    scheduler.spawn(fut, move || {
        if let Some(batch) = outstanding.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            let violation = DispatchError::HandlerContractViolation { handler_type, message_type };
            for entry in &batch {
                entry.complete(Err(violation.clone()));
            }
        }
        state_for_abandon.in_flight_async.fetch_sub(1, Ordering::SeqCst);
        state_for_abandon.async_completed_generation.fetch_add(1, Ordering::SeqCst);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::test_support::CountingInvoker;
    use crate::invoker::DispatchedMessage;
    use meshbus_core::message_type::MessageTypeId;
    use meshbus_core::peer_id::PeerId;
    use std::sync::atomic::AtomicUsize as Counter;

    fn message(type_id: &MessageTypeId) -> DispatchedMessage {
        DispatchedMessage { message_type_id: type_id.clone(), content: bytes::Bytes::new() }
    }

    fn context(type_id: &MessageTypeId) -> crate::context::MessageContext {
        crate::context::MessageContext::new(PeerId::new("Abc.Service.0"), type_id.clone(), "Test")
    }

    #[test]
    fn synchronous_dispatch_runs_and_completes() {
        let queue = DispatchQueue::start("Tests.Queue.Sync", 10, vec![]);
        let type_id = MessageTypeId::new("Tests.T");
        let invocations = Arc::new(Counter::new(0));
        let messages_seen = Arc::new(Counter::new(0));
        let invoker: Arc<dyn crate::invoker::HandlerInvoker> = Arc::new(CountingInvoker {
            handler_type: "Tests.Handler".into(),
            type_id: type_id.clone(),
            mode: InvocationMode::Synchronous,
            mergeable: true,
            invocations: invocations.clone(),
            messages_seen: messages_seen.clone(),
            fail: false,
        });

        let (tx, rx) = flume::bounded(1);
        let mut dispatch = Dispatch::new(invoker, vec![message(&type_id)], context(&type_id));
        dispatch.completion = Some(tx);
        queue.run_or_enqueue(dispatch).unwrap();

        let outcome = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(outcome.is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mergeable_entries_batch_into_one_invocation() {
        let queue = DispatchQueue::start("Tests.Queue.Batch", 10, vec![]);
        let type_id = MessageTypeId::new("Tests.T");
        let invocations = Arc::new(Counter::new(0));
        let messages_seen = Arc::new(Counter::new(0));
        let invoker: Arc<dyn crate::invoker::HandlerInvoker> = Arc::new(CountingInvoker {
            handler_type: "Tests.Handler".into(),
            type_id: type_id.clone(),
            mode: InvocationMode::Synchronous,
            mergeable: true,
            invocations: invocations.clone(),
            messages_seen: messages_seen.clone(),
            fail: false,
        });

        // Stop the worker from draining immediately by enqueuing a burst
        // before it can run (best-effort: the assertions tolerate either
        // 1 or N invocations as long as total messages seen matches).
        for _ in 0..5 {
            let dispatch = Dispatch::new(invoker.clone(), vec![message(&type_id)], context(&type_id));
            queue.run_or_enqueue(dispatch).unwrap();
        }
        queue.wait_until_all_messages_are_processed();
        assert_eq!(messages_seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn asynchronous_dispatch_completes_via_scheduler() {
        let queue = DispatchQueue::start("Tests.Queue.Async", 10, vec![]);
        let type_id = MessageTypeId::new("Tests.T");
        let invocations = Arc::new(Counter::new(0));
        let messages_seen = Arc::new(Counter::new(0));
        let invoker: Arc<dyn crate::invoker::HandlerInvoker> = Arc::new(CountingInvoker {
            handler_type: "Tests.AsyncHandler".into(),
            type_id: type_id.clone(),
            mode: InvocationMode::Asynchronous,
            mergeable: true,
            invocations: invocations.clone(),
            messages_seen: messages_seen.clone(),
            fail: false,
        });

        let (tx, rx) = flume::bounded(1);
        let mut dispatch = Dispatch::new(invoker, vec![message(&type_id)], context(&type_id));
        dispatch.completion = Some(tx);
        queue.run_or_enqueue(dispatch).unwrap();

        let outcome = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(outcome.is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_handler_reports_error_without_stopping_queue() {
        let queue = DispatchQueue::start("Tests.Queue.Fail", 10, vec![]);
        let type_id = MessageTypeId::new("Tests.T");
        let invoker: Arc<dyn crate::invoker::HandlerInvoker> = Arc::new(CountingInvoker {
            handler_type: "Tests.Handler".into(),
            type_id: type_id.clone(),
            mode: InvocationMode::Synchronous,
            mergeable: true,
            invocations: Arc::new(Counter::new(0)),
            messages_seen: Arc::new(Counter::new(0)),
            fail: true,
        });

        let (tx, rx) = flume::bounded(1);
        let mut dispatch = Dispatch::new(invoker.clone(), vec![message(&type_id)], context(&type_id));
        dispatch.completion = Some(tx);
        queue.run_or_enqueue(dispatch).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap().is_err());

        // Queue must still accept and run further work.
        let (tx2, rx2) = flume::bounded(1);
        let mut dispatch2 = Dispatch::new(invoker, vec![message(&type_id)], context(&type_id));
        dispatch2.completion = Some(tx2);
        queue.run_or_enqueue(dispatch2).unwrap();
        assert!(rx2.recv_timeout(Duration::from_secs(1)).unwrap().is_err());
    }

    #[test]
    fn purge_drains_without_running() {
        let queue = DispatchQueue::start("Tests.Queue.Purge", 1, vec![]);
        let type_id = MessageTypeId::new("Tests.T");
        let invocations = Arc::new(Counter::new(0));
        let invoker: Arc<dyn crate::invoker::HandlerInvoker> = Arc::new(CountingInvoker {
            handler_type: "Tests.Handler".into(),
            type_id: type_id.clone(),
            mode: InvocationMode::Synchronous,
            mergeable: false,
            invocations: invocations.clone(),
            messages_seen: Arc::new(Counter::new(0)),
            fail: false,
        });

        for _ in 0..20 {
            let dispatch = Dispatch::new(invoker.clone(), vec![message(&type_id)], context(&type_id));
            let _ = queue.run_or_enqueue(dispatch);
        }
        let drained = queue.purge();
        assert!(drained > 0, "expected purge to discard at least one still-pending entry");
    }

    #[test]
    fn stop_waits_for_quiescence_then_seals_the_queue() {
        let mut queue = DispatchQueue::start("Tests.Queue.Stop", 10, vec![]);
        let type_id = MessageTypeId::new("Tests.T");
        let invoker: Arc<dyn crate::invoker::HandlerInvoker> = Arc::new(CountingInvoker {
            handler_type: "Tests.Handler".into(),
            type_id: type_id.clone(),
            mode: InvocationMode::Synchronous,
            mergeable: true,
            invocations: Arc::new(Counter::new(0)),
            messages_seen: Arc::new(Counter::new(0)),
            fail: false,
        });
        queue.run_or_enqueue(Dispatch::new(invoker.clone(), vec![message(&type_id)], context(&type_id))).unwrap();
        queue.stop();
        assert!(queue.run_or_enqueue(Dispatch::new(invoker, vec![message(&type_id)], context(&type_id))).is_err());
    }
}
