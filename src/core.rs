//! The Stream coordination engine: the state machine interleaving a
//! producer with consumer pulls.
//!
//! Everything here is guarded by a single [`std::sync::Mutex`] whose scope is
//! exactly one state transition. No lock is ever held across a `.await` of
//! user code, only across the synchronous bookkeeping of one `push`, `next`,
//! or `close` call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tokio::sync::{oneshot, Notify};

use crate::buffer::AnyBuffer;
use crate::error::OverflowKind;
use crate::waiter::{PullWaiter, PushWaiter, WaiterQueue};

/// A type-erased, boxed producer future.
pub(crate) type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<Option<T>, E>> + Send>>;

/// The four states of a Stream, per the coordination data model.
///
/// `Closing` is never observed independently of `Closed` by this
/// implementation: draining the waiter queues and settling `stop` never
/// suspends, so the transition out of `Running` completes within a single
/// critical section and lands directly on `Closed`. The variant is kept so
/// the state machine documents the same four states the protocol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Initial,
    Running,
    #[allow(dead_code)]
    Closing,
    Closed,
}

impl State {
    fn is_closed(self) -> bool {
        matches!(self, State::Closing | State::Closed)
    }
}

/// Normal or Error(e), recorded once per Stream, first-writer-wins.
#[derive(Debug, Clone)]
pub(crate) enum CloseReason<E> {
    Normal,
    Error(E),
}

/// The boxed producer closure, taken exactly once by the first `next()`.
pub(crate) type ProducerFn<T, E> =
    Box<dyn FnOnce(crate::producer::Push<T, E>, crate::producer::Close<T, E>, crate::producer::Stop<T>) -> BoxFuture<T, E> + Send>;

/// What the very first `next()` hands back to the caller so it can spawn
/// the producer outside the lock. `stop_rx` is created and `stop_tx`
/// installed in the very same critical section that flips `state` to
/// `Running` (see [`Shared::next_locked`]). If they were set up later, a
/// `close`/`return_`/`throw` racing that window would find `stop_tx` still
/// `None`, and the producer would await `stop` forever.
pub(crate) struct Started<T, E> {
    pub(crate) producer: ProducerFn<T, E>,
    pub(crate) stop_rx: oneshot::Receiver<Option<T>>,
}

pub(crate) struct Inner<T, E> {
    pub(crate) state: State,
    pub(crate) close_reason: Option<CloseReason<E>>,
    /// Gates the "surfaced exactly once" rule for an error close that found
    /// no pull already queued (see [`Shared::next`] case 4).
    pub(crate) error_delivered: bool,
    pub(crate) buffer: AnyBuffer<T>,
    pub(crate) push_q: WaiterQueue<PushWaiter<T>>,
    pub(crate) pull_q: WaiterQueue<PullWaiter<T, E>>,
    pub(crate) producer_started: bool,
    pub(crate) producer: Option<ProducerFn<T, E>>,
    pub(crate) stop_tx: Option<oneshot::Sender<Option<T>>>,
    /// The producer's terminal outcome. `take()`n by the first caller of
    /// `return_`/`throw` that observes a `Normal` close reason; later
    /// callers see `None` there and fall back to `{done: true}` for the
    /// value (the winning close reason, if an error, is still reported to
    /// every caller via `close_reason`, which is `Clone`).
    pub(crate) producer_completion: Option<Result<Option<T>, E>>,
    pub(crate) producer_finished: bool,
}

/// The shared, reference-counted state behind every clone of a [`crate::Stream`].
pub(crate) struct Shared<T, E> {
    pub(crate) inner: Mutex<Inner<T, E>>,
    pub(crate) producer_done: Notify,
}

/// Outcome of a `push` evaluated under the lock.
pub(crate) enum PushOutcome {
    Delivered(bool),
    Suspended(oneshot::Receiver<bool>),
}

/// Outcome of a `next` evaluated under the lock.
pub(crate) enum NextOutcome<T, E> {
    Ready(Result<Option<T>, E>),
    Suspended(oneshot::Receiver<Result<Option<T>, E>>),
    /// The pull queue itself is at `MAX_QUEUE`; distinct from `Ready`
    /// because it is never a user error `E`, only `StreamError::Overflow`.
    Overflow,
}

impl<T, E> Shared<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new(buffer: AnyBuffer<T>, producer: ProducerFn<T, E>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Initial,
                close_reason: None,
                error_delivered: false,
                buffer,
                push_q: WaiterQueue::default(),
                pull_q: WaiterQueue::default(),
                producer_started: false,
                producer: Some(producer),
                stop_tx: None,
                producer_completion: None,
                producer_finished: false,
            }),
            producer_done: Notify::new(),
        }
    }

    /// `push(v)`, evaluated entirely under the lock. Cases 1 through 4
    /// resolve synchronously; case 5 hands back a receiver to await.
    ///
    /// Returns `Err(value)` on overflow (case 4) so the caller gets the
    /// value back instead of losing it, the same `TrySendErr::Full(value)`
    /// convention a bounded channel's `try_send` uses.
    pub(crate) fn push_locked(&self, value: T) -> Result<PushOutcome, T> {
        let mut g = self.inner.lock().unwrap();

        // Case 1: closing or closed. Accepted but discarded.
        if g.state.is_closed() {
            return Ok(PushOutcome::Delivered(false));
        }

        // Case 2: a pull is already waiting. Hand off directly.
        if let Some(waiter) = g.pull_q.dequeue() {
            let _ = waiter.completion.send(Ok(Some(value)));
            return Ok(PushOutcome::Delivered(true));
        }

        // Case 3: buffer has room (or silently discards per its discipline).
        if !g.buffer.is_full() {
            g.buffer.add(value);
            return Ok(PushOutcome::Delivered(true));
        }

        // Case 4: push queue itself is full. Fail synchronously, do not close.
        if g.push_q.len() >= crate::waiter::MAX_QUEUE {
            tracing::warn!(kind = "push", "waiter queue overflow");
            return Err(value);
        }

        // Case 5: suspend until a future pull or a close drains us.
        let (tx, rx) = oneshot::channel();
        g.push_q
            .enqueue(PushWaiter { value, completion: tx }, OverflowKind::Push)
            .expect("capacity already checked above");
        Ok(PushOutcome::Suspended(rx))
    }

    /// `next()`. `starter` is populated with the producer bundle the very
    /// first time a not-yet-closed Stream is pulled; the caller is
    /// responsible for spawning it *outside* the lock.
    pub(crate) fn next_locked(
        &self,
        starter: &mut Option<Started<T, E>>,
    ) -> NextOutcome<T, E> {
        let mut g = self.inner.lock().unwrap();

        // Settle the start signal exactly once, never if already closed
        // before any pull. The stop channel is created and installed right
        // here, atomically with the state flip, so a concurrent close can
        // never observe `Running` with no `stop_tx`.
        if g.state == State::Initial {
            g.state = State::Running;
            g.producer_started = true;
            if let Some(producer) = g.producer.take() {
                let (stop_tx, stop_rx) = oneshot::channel();
                g.stop_tx = Some(stop_tx);
                *starter = Some(Started { producer, stop_rx });
            }
        }

        // Case 2: buffer holds a value.
        if !g.buffer.is_empty() {
            let value = g.buffer.remove().expect("checked non-empty");
            if let Some(waiter) = g.push_q.dequeue() {
                g.buffer.add(waiter.value);
                let _ = waiter.completion.send(true);
            }
            return NextOutcome::Ready(Ok(Some(value)));
        }

        // Case 3: zero-capacity buffer, direct handoff from a suspended push.
        if let Some(waiter) = g.push_q.dequeue() {
            let _ = waiter.completion.send(true);
            return NextOutcome::Ready(Ok(Some(waiter.value)));
        }

        // Case 4: stream already closing/closed.
        if g.state.is_closed() {
            if let Some(CloseReason::Error(e)) = &g.close_reason {
                if !g.error_delivered {
                    let e = e.clone();
                    g.error_delivered = true;
                    return NextOutcome::Ready(Err(e));
                }
            }
            return NextOutcome::Ready(Ok(None));
        }

        // Case 5: pull queue itself is full.
        if g.pull_q.len() >= crate::waiter::MAX_QUEUE {
            tracing::warn!(kind = "pull", "waiter queue overflow");
            return NextOutcome::Overflow;
        }

        // Case 6: suspend.
        let (tx, rx) = oneshot::channel();
        g.pull_q
            .enqueue(PullWaiter { completion: tx }, OverflowKind::Pull)
            .expect("capacity already checked above");
        NextOutcome::Suspended(rx)
    }

    /// `close(reason)`, also used by the producer harness when the
    /// producer's future resolves. Idempotent; first reason wins.
    pub(crate) fn close_locked_with(&self, incoming: CloseReason<E>, stop_value: Option<T>) {
        let mut g = self.inner.lock().unwrap();
        self.close_locked(&mut g, incoming, stop_value);
    }

    fn close_locked(&self, g: &mut Inner<T, E>, incoming: CloseReason<E>, stop_value: Option<T>) {
        if g.close_reason.is_some() {
            return; // idempotent: first reason wins
        }

        let had_pull_waiters = !g.pull_q.is_empty();
        g.close_reason = Some(incoming);
        g.state = State::Closed;

        g.push_q.drain_and_seal(|w| {
            let _ = w.completion.send(false);
        });

        match g.close_reason.as_ref().expect("just set") {
            CloseReason::Normal => {
                g.pull_q.drain_and_seal(|w| {
                    let _ = w.completion.send(Ok(None));
                });
            }
            CloseReason::Error(e) => {
                let e = e.clone();
                g.pull_q.drain_and_seal(move |w| {
                    let _ = w.completion.send(Err(e.clone()));
                });
                if had_pull_waiters {
                    g.error_delivered = true;
                }
            }
        }

        if let Some(stop_tx) = g.stop_tx.take() {
            let _ = stop_tx.send(stop_value);
        }

        tracing::debug!(state = ?g.state, "stream closed");
    }

    /// Whether the stream has already fully closed (any reason).
    pub(crate) fn is_closed_locked(&self) -> bool {
        self.inner.lock().unwrap().state.is_closed()
    }

    /// Called once by the producer harness when the producer's future
    /// resolves, whether by returning a value, an error, or panicking.
    pub(crate) fn finish_producer(&self, result: Result<Option<T>, E>) {
        {
            let mut g = self.inner.lock().unwrap();
            if g.close_reason.is_none() {
                let reason = match &result {
                    Ok(_) => CloseReason::Normal,
                    Err(e) => CloseReason::Error(e.clone()),
                };
                self.close_locked(&mut g, reason, None);
            }
            g.producer_completion = Some(result);
            g.producer_finished = true;
        }
        self.producer_done.notify_waiters();
    }

    /// Shared tail for `return_`/`throw`: wait for the producer's terminal
    /// outcome and translate it into the public `Result<Option<T>, E>`.
    ///
    /// The `Notified` future is created and `enable`d *before* the state
    /// check, not after. `Notify::notify_waiters` stores no permit for a
    /// not-yet-registered waiter (unlike `notify_one`), so checking the
    /// condition first and only then awaiting `notified()` leaves a window
    /// where `finish_producer` can run in between and the notification is
    /// lost forever, hanging this call on a multi-threaded runtime.
    pub(crate) async fn terminal_result(&self) -> Result<Option<T>, E> {
        loop {
            let notified = self.producer_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut g = self.inner.lock().unwrap();
                if !g.producer_started {
                    return Ok(None);
                }
                if g.producer_finished {
                    return match g.close_reason.clone().expect("closed by now") {
                        CloseReason::Error(e) => Err(e),
                        CloseReason::Normal => match g.producer_completion.take() {
                            Some(Ok(v)) => Ok(v),
                            Some(Err(e)) => {
                                g.close_reason = Some(CloseReason::Error(e.clone()));
                                Err(e)
                            }
                            None => Ok(None),
                        },
                    };
                }
            }
            notified.await;
        }
    }
}
