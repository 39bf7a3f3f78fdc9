//! Merge: forwards every input value in arrival order, terminating once
//! every input has terminated or on the first error (which cancels the
//! rest).

use std::future::Future;
use std::pin::Pin;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use crate::buffer::FixedBuffer;
use crate::error::StreamError;
use crate::stream::Stream;

type Tagged<T, E> = (usize, Result<Option<T>, StreamError<E>>);

/// Merges `streams` into a single stream, interleaving values as they
/// arrive rather than in any fixed round-robin order.
pub fn merge<T, E>(streams: Vec<Stream<T, E>>) -> Stream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    Stream::new(Box::new(FixedBuffer::new(0).expect("0 is always valid")), move |push, _close, mut stop| async move {
        if streams.is_empty() {
            return Ok(None);
        }

        let mut pending: FuturesUnordered<Pin<Box<dyn Future<Output = Tagged<T, E>> + Send>>> =
            FuturesUnordered::new();
        for (idx, s) in streams.iter().enumerate() {
            let s = s.clone();
            pending.push(Box::pin(async move { (idx, s.next().await) }));
        }
        let mut alive = streams.len();

        loop {
            if alive == 0 {
                return Ok(None);
            }

            tokio::select! {
                biased;
                stop_val = &mut stop => {
                    for s in &streams {
                        let _ = s.return_(None).await;
                    }
                    return Ok(stop_val);
                }
                next = pending.next() => {
                    let (idx, result) = match next {
                        Some(tagged) => tagged,
                        None => return Ok(None),
                    };
                    match result {
                        Ok(Some(v)) => {
                            let s = streams[idx].clone();
                            pending.push(Box::pin(async move { (idx, s.next().await) }));
                            if !push.push(v).await.unwrap_or(false) {
                                for s in &streams {
                                    let _ = s.return_(None).await;
                                }
                                return Ok(None);
                            }
                        }
                        Ok(None) => {
                            alive -= 1;
                        }
                        Err(e) => {
                            for (i, s) in streams.iter().enumerate() {
                                if i != idx {
                                    let _ = s.return_(None).await;
                                }
                            }
                            return match e.into_user() {
                                Some(user_err) => Err(user_err),
                                None => Ok(None),
                            };
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::merge;
    use crate::buffer::FixedBuffer;
    use crate::stream::Stream;

    type TestStream<T> = Stream<T, String>;

    #[tokio::test]
    async fn forwards_every_value_and_terminates_once_all_inputs_do() {
        let a: TestStream<i32> = Stream::new(Box::new(FixedBuffer::new(4).unwrap()), |push, close, _stop| async move {
            push.push(1).await.ok();
            push.push(2).await.ok();
            close.close(None);
            Ok(None)
        });
        let b: TestStream<i32> = Stream::new(Box::new(FixedBuffer::new(4).unwrap()), |push, close, _stop| async move {
            push.push(10).await.ok();
            close.close(None);
            Ok(None)
        });

        let merged = merge(vec![a, b]);
        let mut out = Vec::new();
        while let Some(v) = merged.next().await.unwrap() {
            out.push(v);
        }
        out.sort();
        assert_eq!(out, vec![1, 2, 10]);
    }

    #[tokio::test]
    async fn first_error_cancels_the_remaining_inputs() {
        let failing: TestStream<i32> =
            Stream::new(Box::new(FixedBuffer::new(1).unwrap()), |_push, _close, _stop| async move {
                Err("merge-error".to_string())
            });
        let never: TestStream<i32> = Stream::new(Box::new(FixedBuffer::new(1).unwrap()), |push, _close, stop| async move {
            // Never closes on its own; only stops when cancelled.
            let _ = push.push(1).await;
            let _ = stop.await;
            Ok(None)
        });

        let merged = merge(vec![failing, never]);
        let err = merged.next().await.unwrap_err();
        assert_eq!(err.into_user(), Some("merge-error".to_string()));
    }
}
