//! Cooperative scheduler: drives an async handler's future to completion
//! without an OS-level async runtime, by re-enqueuing continuations as
//! `Action` entries on the owning queue whenever a poll is pending.
//!
//! This is the systems-language replacement for the teacher's `compio`
//! io_uring runtime (see DESIGN.md): the dispatch engine needs continuations
//! to land back on the *same* single-consumer worker thread, not just any
//! executor thread, so a hand-rolled single-step driver bound to that
//! thread's own channel is a better fit than pulling in a general-purpose
//! reactor.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::Context;

use futures::task::{self, ArcWake};

use crate::entry::QueueEntry;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type SharedFuture = Arc<Mutex<Option<BoxFuture>>>;

/// A one-shot callback fired if a spawned future is parked (returns
/// `Pending`, asking to be woken later) but its wake-up can never be
/// delivered — the owning queue has shut down its channel in the meantime.
/// Without this, such a future sits in its slot forever: never polled
/// again, never completing, its waiting dispatch entries never notified.
type AbandonHook = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

/// Handle used by a `DispatchQueue` worker to spawn an async handler
/// invocation bound to its own channel.
#[derive(Clone)]
pub struct CooperativeScheduler {
    queue_sender: flume::Sender<QueueEntry>,
}

impl CooperativeScheduler {
    /// Build a scheduler that re-enqueues continuations onto `queue_sender`.
    #[must_use]
    pub fn new(queue_sender: flume::Sender<QueueEntry>) -> Self {
        Self { queue_sender }
    }

    /// Begin driving `fut`. Returns immediately after the first poll;
    /// subsequent polls are triggered by the waker re-enqueuing an `Action`
    /// that resumes polling. If a later wake-up cannot be delivered because
    /// the queue has shut down, `on_abandoned` runs instead, exactly once.
    pub fn spawn(&self, fut: BoxFuture, on_abandoned: impl FnOnce() + Send + 'static) {
        let slot: SharedFuture = Arc::new(Mutex::new(Some(fut)));
        let on_abandoned: AbandonHook = Arc::new(Mutex::new(Some(Box::new(on_abandoned))));
        poll_once(self.queue_sender.clone(), slot, on_abandoned);
    }
}

struct RequeueWake {
    sender: flume::Sender<QueueEntry>,
    slot: SharedFuture,
    on_abandoned: AbandonHook,
}

impl ArcWake for RequeueWake {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        let sender = arc_self.sender.clone();
        let slot = arc_self.slot.clone();
        let on_abandoned = arc_self.on_abandoned.clone();
        let action: crate::entry::Action = Box::new(move || {
            poll_once(sender.clone(), slot.clone(), on_abandoned.clone());
        });
        if arc_self.sender.send(QueueEntry::Action(action)).is_err() {
            if let Some(hook) = arc_self.on_abandoned.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
                hook();
            }
        }
    }
}

fn poll_once(sender: flume::Sender<QueueEntry>, slot: SharedFuture, on_abandoned: AbandonHook) {
    let waker_source = Arc::new(RequeueWake { sender, slot: slot.clone(), on_abandoned });
    let waker = task::waker(waker_source);
    let mut cx = Context::from_waker(&waker);

    let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(fut) = guard.as_mut() {
        if fut.as_mut().poll(&mut cx).is_ready() {
            *guard = None;
        }
    }
}
