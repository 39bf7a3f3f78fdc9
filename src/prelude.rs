//! Common imports for consumers of this crate.
//!
//! ```
//! use costream::prelude::*;
//! ```

pub use crate::buffer::{AnyBuffer, Buffer, DroppingBuffer, FixedBuffer, SlidingBuffer};
pub use crate::combinators::{merge, race};
pub use crate::error::{BoxError, CapacityError, OverflowKind, StreamError};
pub use crate::producer::{Close, Push, Stop};
pub use crate::stream::Stream;
