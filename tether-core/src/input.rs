//! Input mediator.
//!
//! Brokers "give me a line" requests from the computation against lines
//! committed by the human. Both sides queue FIFO:
//!
//! - the human typed ahead → values wait in the input queue,
//! - the computation asked first → requests wait in the waiter queue.
//!
//! The two queues are never both non-empty: a supplied value always goes to
//! the oldest live waiter before it is buffered.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{CancelReason, InputError};

type Settlement = Result<String, InputError>;

/// A pending request for one line of input.
#[derive(Debug)]
struct Waiter {
    id: u64,
    prompt: String,
    tx: oneshot::Sender<Settlement>,
}

#[derive(Debug, Default)]
struct Queues {
    values: VecDeque<String>,
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct InputMediator {
    queues: Mutex<Queues>,
}

impl InputMediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand a committed line to the oldest waiter, or buffer it.
    ///
    /// A waiter whose handle was dropped cannot take the value; it is
    /// retired and the value moves on to the next one.
    pub fn supply(&self, value: impl Into<String>) {
        let mut value = value.into();
        let mut q = self.lock();

        while let Some(waiter) = q.waiters.pop_front() {
            match waiter.tx.send(Ok(value)) {
                Ok(()) => {
                    tracing::debug!(waiter = waiter.id, "input delivered to waiter");
                    return;
                }
                Err(returned) => {
                    tracing::debug!(waiter = waiter.id, "waiter abandoned, offering value onward");
                    value = match returned {
                        Ok(v) => v,
                        Err(_) => return,
                    };
                }
            }
        }

        tracing::debug!(queued = q.values.len() + 1, "input buffered");
        q.values.push_back(value);
    }

    /// Ask for one line. Resolves immediately when a value is buffered.
    pub fn request(&self, prompt: impl Into<String>) -> InputHandle {
        let mut q = self.lock();

        if let Some(value) = q.values.pop_front() {
            return InputHandle::ready(Ok(value));
        }

        let (tx, rx) = oneshot::channel();
        q.next_id += 1;
        let id = q.next_id;
        q.waiters.push_back(Waiter {
            id,
            prompt: prompt.into(),
            tx,
        });
        tracing::debug!(waiter = id, waiting = q.waiters.len(), "input requested");

        InputHandle::waiting(rx)
    }

    /// Reject every pending request with `reason`, oldest first.
    ///
    /// Buffered values are discarded as well; a cancelled session must not
    /// leave type-ahead behind for whoever asks next.
    pub fn cancel_all(&self, reason: CancelReason) -> usize {
        let mut q = self.lock();
        let dropped = q.values.len();
        q.values.clear();

        let mut rejected = 0;
        while let Some(waiter) = q.waiters.pop_front() {
            let _ = waiter.tx.send(Err(InputError::Cancelled(reason)));
            rejected += 1;
        }

        if rejected > 0 || dropped > 0 {
            tracing::debug!(rejected, dropped, ?reason, "input waiters cancelled");
        }
        rejected
    }

    /// Empty both queues for a fresh session.
    ///
    /// No waiter should exist at this point; any survivor is rejected as
    /// stale and reported.
    pub fn reset(&self) -> usize {
        let mut q = self.lock();
        q.values.clear();

        let mut stale = 0;
        while let Some(waiter) = q.waiters.pop_front() {
            tracing::warn!(
                waiter = waiter.id,
                prompt = %waiter.prompt,
                "stale input waiter survived its session"
            );
            let _ = waiter.tx.send(Err(InputError::StaleWaiter));
            stale += 1;
        }
        stale
    }

    /// Prompt of the oldest outstanding request.
    pub fn pending_prompt(&self) -> Option<String> {
        self.lock().waiters.front().map(|w| w.prompt.clone())
    }

    pub fn queued_len(&self) -> usize {
        self.lock().values.len()
    }

    pub fn waiting_len(&self) -> usize {
        self.lock().waiters.len()
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum HandleState {
    Ready(Option<Settlement>),
    Waiting(oneshot::Receiver<Settlement>),
}

/// Future returned by [`InputMediator::request`].
///
/// Yields the supplied line, or an [`InputError`] when the request is
/// cancelled, found stale, or its mediator goes away.
#[derive(Debug)]
pub struct InputHandle {
    state: HandleState,
}

impl InputHandle {
    fn ready(settlement: Settlement) -> Self {
        Self {
            state: HandleState::Ready(Some(settlement)),
        }
    }

    fn waiting(rx: oneshot::Receiver<Settlement>) -> Self {
        Self {
            state: HandleState::Waiting(rx),
        }
    }

    /// True when the request was satisfied from the input queue and will
    /// not suspend.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, HandleState::Ready(_))
    }
}

impl Future for InputHandle {
    type Output = Settlement;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            HandleState::Ready(settlement) => {
                Poll::Ready(settlement.take().unwrap_or(Err(InputError::Abandoned)))
            }
            HandleState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(Err(InputError::Abandoned))),
        }
    }
}
