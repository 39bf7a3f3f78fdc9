//! The producer harness: invokes the user-supplied producer on first pull,
//! surfaces its failures as a close reason, and wires the `start`/`stop`
//! handshake.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::core::{CloseReason, Shared};

/// Handle the producer uses to emit values.
///
/// `push(v).await` resolves to `true` if the value was delivered or
/// queued for delivery, `false` if the Stream had already closed.
pub struct Push<T, E> {
    pub(crate) shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Push<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Push<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Pushes a value. Suspends only when the buffer is full and no pull
    /// is waiting. Never suspends once the push queue itself overflows;
    /// in that case the value is handed back to the caller.
    pub async fn push(&self, value: T) -> Result<bool, T> {
        match self.shared.push_locked(value) {
            Ok(crate::core::PushOutcome::Delivered(delivered)) => Ok(delivered),
            Ok(crate::core::PushOutcome::Suspended(rx)) => Ok(rx.await.unwrap_or(false)),
            Err(value) => Err(value),
        }
    }
}

/// Handle the producer uses to close the Stream, with an optional error.
/// Idempotent; the first call (by the producer, or a concurrent consumer
/// `throw`) wins.
pub struct Close<T, E> {
    pub(crate) shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Close<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Close<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn close(&self, reason: Option<E>) {
        let incoming = match reason {
            Some(e) => CloseReason::Error(e),
            None => CloseReason::Normal,
        };
        self.shared.close_locked_with(incoming, None);
    }
}

/// A one-shot signal the producer awaits to learn when the Stream is
/// shutting down. Settles to whatever value was passed to `return(v)`, or
/// `None` for a producer-initiated or error close.
pub struct Stop<T> {
    rx: oneshot::Receiver<Option<T>>,
}

impl<T> Stop<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Option<T>>) -> Self {
        Self { rx }
    }
}

impl<T> Future for Stop<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(v)) => Poll::Ready(v),
            // The Stream was dropped without ever closing; treat it the
            // same as an unobserved `return(None)`.
            Poll::Ready(Err(_)) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Spawns the producer future on `tokio`, wiring its result back into
/// `shared` once it resolves.
///
/// A panic inside the producer is caught here (it would otherwise just
/// fail the spawned task silently and leave every `next()`/`return_()`
/// call waiting on `stop` forever). There is no way to turn an arbitrary
/// panic payload into the caller's own error type `E`, so the panic is
/// logged and treated as a normal completion with no value. Producers
/// that want a typed error for a panic should catch it themselves and
/// return `Err`; ordinary `?`-propagation already covers every other
/// synchronous producer failure.
pub(crate) fn spawn<T, E>(
    shared: Arc<Shared<T, E>>,
    future: crate::core::BoxFuture<T, E>,
) where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = std::panic::AssertUnwindSafe(future).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => {
                tracing::error!("producer panicked; closing stream without a return value");
                drop(panic);
                Ok(None)
            }
        };
        shared.finish_producer(result);
    });
}
