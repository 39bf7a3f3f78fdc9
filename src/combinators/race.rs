//! Race: consumes a set of input streams in parallel, forwards whichever
//! produces a result first, and cancels the rest via `return`. Once a
//! winner is decided the combinator simply forwards that stream for its
//! remaining lifetime.

use std::future::Future;
use std::pin::Pin;

use futures::future::select_all;

use crate::buffer::FixedBuffer;
use crate::stream::Stream;

/// Races `streams` against each other. The stream that produces its first
/// value (or error, or close) first becomes the sole source for every
/// subsequent pull; the others are cancelled with `return_(None)`.
pub fn race<T, E>(streams: Vec<Stream<T, E>>) -> Stream<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    Stream::new(Box::new(FixedBuffer::new(0).expect("0 is always valid")), move |push, _close, mut stop| async move {
        if streams.is_empty() {
            return Ok(None);
        }

        let futs: Vec<Pin<Box<dyn Future<Output = _> + Send>>> = streams
            .iter()
            .map(|s| {
                let s = s.clone();
                Box::pin(async move { s.next().await }) as Pin<Box<dyn Future<Output = _> + Send>>
            })
            .collect();

        let (result, winner_idx, _) = tokio::select! {
            biased;
            stop_val = &mut stop => {
                for s in &streams {
                    let _ = s.return_(None).await;
                }
                return Ok(stop_val);
            }
            raced = select_all(futs) => raced,
        };

        for (i, s) in streams.iter().enumerate() {
            if i != winner_idx {
                let _ = s.return_(None).await;
            }
        }

        let winner = streams[winner_idx].clone();
        match result {
            Ok(Some(v)) => {
                if !push.push(v).await.unwrap_or(false) {
                    let _ = winner.return_(None).await;
                    return Ok(None);
                }
            }
            Ok(None) => return Ok(None),
            Err(e) => {
                return match e.into_user() {
                    Some(user_err) => Err(user_err),
                    None => Ok(None),
                };
            }
        }

        loop {
            tokio::select! {
                biased;
                stop_val = &mut stop => {
                    let _ = winner.return_(None).await;
                    return Ok(stop_val);
                }
                next_result = winner.next() => match next_result {
                    Ok(Some(v)) => {
                        if !push.push(v).await.unwrap_or(false) {
                            let _ = winner.return_(None).await;
                            return Ok(None);
                        }
                    }
                    Ok(None) => return Ok(None),
                    Err(e) => {
                        return match e.into_user() {
                            Some(user_err) => Err(user_err),
                            None => Ok(None),
                        };
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::race;
    use crate::buffer::FixedBuffer;
    use crate::stream::Stream;

    type TestStream<T> = Stream<T, String>;

    #[tokio::test]
    async fn forwards_the_first_stream_to_produce_and_cancels_the_rest() {
        let slow: TestStream<&'static str> = Stream::new(Box::new(FixedBuffer::new(1).unwrap()), |push, close, _stop| async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            push.push("slow").await.ok();
            close.close(None);
            Ok(None)
        });
        let fast: TestStream<&'static str> = Stream::new(Box::new(FixedBuffer::new(4).unwrap()), |push, close, _stop| async move {
            push.push("fast-1").await.ok();
            push.push("fast-2").await.ok();
            close.close(None);
            Ok(None)
        });

        let raced = race(vec![slow, fast]);
        assert_eq!(raced.next().await.unwrap(), Some("fast-1"));
        assert_eq!(raced.next().await.unwrap(), Some("fast-2"));
        assert_eq!(raced.next().await.unwrap(), None);
    }
}
