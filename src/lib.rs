//! A bounded, backpressured async stream built from a callback-driven
//! producer.
//!
//! A producer closure receives three handles, `push`, `close`, and `stop`,
//! and runs lazily, spawned on first pull:
//!
//!```
//! use costream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let s: Stream<i32> = Stream::new(Box::new(FixedBuffer::new(4).unwrap()), |push, close, _stop| async move {
//!     for i in 1..=5 {
//!         if push.push(i).await.is_err() {
//!             break;
//!         }
//!     }
//!     close.close(None);
//!     Ok(None)
//! });
//!
//! while let Some(v) = s.next().await.unwrap() {
//!     println!("{v}");
//! }
//! # }
//!```
//!
//! ## How It Works
//!
//! - **Producer** runs as a spawned task, suspending on `push` whenever the
//!   [buffer](buffer) is full and no pull is waiting.
//! - **Consumer** calls [`Stream::next`], suspending whenever nothing is
//!   buffered and the producer hasn't closed.
//! - **Buffer full / empty**: governed by the chosen [`buffer::Buffer`]
//!   discipline (fixed, sliding, dropping).
//!
//! ## Synchronization
//!
//! A single [`std::sync::Mutex`] guards the coordination state in
//! [`core::Shared`]; its critical sections are exactly one push, pull, or
//! close, never spanning an `.await` of user code. Suspended operations are
//! resumed through one-shot channels ([`waiter`]) rather than re-polling.
//!
//! ## Cancellation
//!
//! Calling [`Stream::return_`] signals the producer's `stop` future and
//! waits for it to actually finish; a producer that ignores `stop` simply
//! has its later `push` calls become no-ops.

pub mod buffer;
pub(crate) mod core;
pub mod combinators;
pub mod error;
pub mod prelude;
pub mod producer;
mod stream;
pub mod waiter;

pub use crate::error::StreamError;
pub use crate::stream::Stream;
