//! The public [`Stream`] handle: a cloneable front end over [`Shared`]
//! exposing `push`'s counterparts, `next`/`return_`/`throw`, and a bridge
//! into [`futures::Stream`] for use with combinators and `for_each`/`collect`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::buffer::AnyBuffer;
use crate::core::{BoxFuture, CloseReason, NextOutcome, ProducerFn, Shared, Started};
use crate::error::{OverflowKind, StreamError};
use crate::producer::{self, Close, Push, Stop};

/// A future backing the bridge from `next()` into [`futures::Stream::poll_next`].
type PollNextFuture<T, E> = Pin<Box<dyn Future<Output = Option<Result<T, StreamError<E>>>> + Send>>;

/// A lazily-started, backpressured async sequence built from a
/// callback-driven producer.
///
/// Cloning a `Stream` clones the handle, not the sequence: every clone
/// pulls from the same underlying producer and buffer, exactly like
/// cloning an `mpsc::Receiver` wrapped in an `Arc` would. Most callers want
/// exactly one handle per stream.
pub struct Stream<T, E = crate::error::BoxError> {
    shared: Arc<Shared<T, E>>,
    pending: Option<PollNextFuture<T, E>>,
}

impl<T, E> Clone for Stream<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            pending: None,
        }
    }
}

impl<T, E> Stream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    /// Builds a new Stream over `buffer`, from a producer that will be
    /// invoked exactly once, lazily, on the first [`Stream::next`] call.
    pub fn new<F, Fut>(buffer: AnyBuffer<T>, producer: F) -> Self
    where
        F: FnOnce(Push<T, E>, Close<T, E>, Stop<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
    {
        let boxed: ProducerFn<T, E> = Box::new(move |push, close, stop| {
            Box::pin(producer(push, close, stop)) as BoxFuture<T, E>
        });
        Self {
            shared: Arc::new(Shared::new(buffer, boxed)),
            pending: None,
        }
    }

    /// Pulls the next value. Lazily spawns the producer on the very first
    /// call. Resolves `Ok(None)` once the stream is exhausted, `Err` with
    /// the producer's own error (or an explicit `throw`) at most once per
    /// distinct error.
    pub async fn next(&self) -> Result<Option<T>, StreamError<E>> {
        let mut starter = None;
        let outcome = self.shared.next_locked(&mut starter);
        if let Some(started) = starter {
            self.spawn_producer(started);
        }
        match outcome {
            NextOutcome::Ready(result) => result.map_err(StreamError::User),
            NextOutcome::Suspended(rx) => match rx.await {
                Ok(result) => result.map_err(StreamError::User),
                // The stream was dropped mid-suspension; same as a normal close.
                Err(_) => Ok(None),
            },
            NextOutcome::Overflow => Err(StreamError::Overflow(OverflowKind::Pull)),
        }
    }

    /// Stops the stream early, delivering `value` to the producer's `stop`
    /// future, then waits for the producer to actually finish and reports
    /// its terminal value.
    ///
    /// If the producer never started (the stream was never pulled), this
    /// closes immediately and returns `Ok(None)` without ever invoking it.
    pub async fn return_(&self, value: Option<T>) -> Result<Option<T>, StreamError<E>> {
        self.shared.close_locked_with(CloseReason::Normal, value);
        self.shared
            .terminal_result()
            .await
            .map_err(StreamError::User)
    }

    /// Like [`Stream::return_`], but closes with an error.
    ///
    /// A Stream that has already fully closed rejects with `err` itself,
    /// not the stream's own stored close reason. `throw` always surfaces
    /// the error the caller just handed it.
    pub async fn throw(&self, err: E) -> Result<Option<T>, StreamError<E>> {
        if self.shared.is_closed_locked() {
            return Err(StreamError::User(err));
        }
        self.shared
            .close_locked_with(CloseReason::Error(err), None);
        self.shared
            .terminal_result()
            .await
            .map_err(StreamError::User)
    }

    fn spawn_producer(&self, started: Started<T, E>) {
        let push = Push {
            shared: self.shared.clone(),
        };
        let close = Close {
            shared: self.shared.clone(),
        };
        let stop = Stop::new(started.stop_rx);
        let future = (started.producer)(push, close, stop);
        producer::spawn(self.shared.clone(), future);
    }
}

impl<T, E> futures::Stream for Stream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    type Item = Result<T, StreamError<E>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.pending.is_none() {
            let shared = self.shared.clone();
            self.pending = Some(Box::pin(async move {
                let stream = Stream { shared, pending: None };
                stream.next().await.transpose()
            }));
        }
        let pending = self.pending.as_mut().expect("just set");
        match pending.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(item) => {
                self.pending = None;
                Poll::Ready(item)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{DroppingBuffer, FixedBuffer, SlidingBuffer};

    type TestStream<T> = Stream<T, String>;

    #[tokio::test]
    async fn five_value_no_buffer_drain() {
        let s: TestStream<i32> = Stream::new(Box::new(FixedBuffer::new(0).unwrap()), |push, close, _stop| async move {
            for i in 1..=5 {
                push.push(i).await.ok();
            }
            close.close(None);
            Ok(None)
        });

        let mut out = Vec::new();
        while let Some(v) = s.next().await.unwrap() {
            out.push(v);
        }
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
        assert_eq!(s.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sliding_overfill_keeps_latest_three() {
        let s: TestStream<i32> = Stream::new(Box::new(SlidingBuffer::new(3).unwrap()), |push, close, _stop| async move {
            for i in 0..100 {
                push.push(i).await.ok();
            }
            close.close(None);
            Ok(None)
        });

        let mut out = Vec::new();
        while let Some(v) = s.next().await.unwrap() {
            out.push(v);
        }
        assert_eq!(out, vec![97, 98, 99]);
    }

    #[tokio::test]
    async fn dropping_overfill_keeps_earliest_three() {
        let s: TestStream<i32> = Stream::new(Box::new(DroppingBuffer::new(3).unwrap()), |push, close, _stop| async move {
            for i in 0..100 {
                push.push(i).await.ok();
            }
            close.close(None);
            Ok(None)
        });

        let mut out = Vec::new();
        while let Some(v) = s.next().await.unwrap() {
            out.push(v);
        }
        assert_eq!(out, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn early_return_settles_stop_and_is_idempotent() {
        // A zero-capacity buffer means every push beyond what a waiting
        // pull can immediately take is suspended in the push queue rather
        // than landing in the buffer. After three pulls, `push(4)` is
        // suspended with nobody waiting for it; `return_` must drain that
        // suspended push (discarding its value) instead of letting it
        // surface through a later pull.
        let s: TestStream<i32> = Stream::new(Box::new(FixedBuffer::new(0).unwrap()), |push, _close, stop| async move {
            for i in 1..=4 {
                push.push(i).await.ok();
            }
            let v = stop.await;
            Ok(v)
        });

        assert_eq!(s.next().await.unwrap(), Some(1));
        assert_eq!(s.next().await.unwrap(), Some(2));
        assert_eq!(s.next().await.unwrap(), Some(3));

        assert_eq!(s.return_(None).await.unwrap(), None);
        assert_eq!(s.next().await.unwrap(), None);

        // Idempotent: a second `return_` after the stream already closed
        // observes the same terminal outcome, not a fresh one.
        assert_eq!(s.return_(Some(99)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn synchronous_producer_error_rejects_first_pull_only() {
        let s: TestStream<i32> =
            Stream::new(Box::new(FixedBuffer::new(1).unwrap()), |_push, _close, _stop| async move {
                Err("boom".to_string())
            });

        let err = s.next().await.unwrap_err();
        assert_eq!(err.into_user(), Some("boom".to_string()));
        assert_eq!(s.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn error_after_close_surfaces_through_return_not_next() {
        let s: TestStream<i32> = Stream::new(Box::new(FixedBuffer::new(1).unwrap()), |push, close, _stop| async move {
            push.push(1).await.ok();
            close.close(None);
            Err("late".to_string())
        });

        assert_eq!(s.next().await.unwrap(), Some(1));
        assert_eq!(s.next().await.unwrap(), None);
        assert_eq!(s.next().await.unwrap(), None);

        let err = s.return_(None).await.unwrap_err();
        assert_eq!(err.into_user(), Some("late".to_string()));
    }

    #[tokio::test]
    async fn throw_on_already_closed_stream_rejects_with_the_new_error() {
        let s: TestStream<i32> = Stream::new(Box::new(FixedBuffer::new(0).unwrap()), |_push, close, _stop| async move {
            close.close(None);
            Ok(None)
        });

        assert_eq!(s.next().await.unwrap(), None);
        let err = s.throw("fresh".to_string()).await.unwrap_err();
        assert_eq!(err.into_user(), Some("fresh".to_string()));
    }
}
