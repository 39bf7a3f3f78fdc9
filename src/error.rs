//! Error taxonomy for the stream coordination engine.
//!
//! Two error classes are user-observable and modeled here as
//! [`StreamError`]: overflow of a waiter queue, and the caller's own error
//! type surfacing through a close reason. A third, invalid buffer capacity,
//! is reported directly as [`CapacityError`] by the buffer constructors
//! themselves. A buffer isn't parameterized over a Stream's producer error
//! type `E`, so there is no boundary at which it could be wrapped into
//! `StreamError<E>`. The fourth class, an invariant violation, is never
//! represented as a value. It panics, since a correct implementation never
//! observes one (see [`crate::core`]).

use std::fmt;

/// Which waiter queue overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowKind {
    /// More than [`crate::waiter::MAX_QUEUE`] suspended pushes.
    Push,
    /// More than [`crate::waiter::MAX_QUEUE`] suspended pulls.
    Pull,
}

impl fmt::Display for OverflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowKind::Push => f.write_str("push"),
            OverflowKind::Pull => f.write_str("pull"),
        }
    }
}

/// A buffer capacity fell outside the range its discipline allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityError {
    /// `FixedBuffer` requires `cap >= 0`, which a `usize` always satisfies;
    /// this variant exists for disciplines that require `cap >= 1`.
    MustBePositive,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityError::MustBePositive => f.write_str("capacity must be at least 1"),
        }
    }
}

/// The crate's error type, parameterized over the caller's own producer
/// error type `E`.
///
/// `Overflow` never closes the stream; it is reported to the caller of the
/// offending operation only. `User(e)` is the one variant that *is* a close
/// reason: it is what a producer's thrown error, or an explicit
/// `close(Error(e))`/`throw(e)`, looks like once it reaches a consumer.
///
/// `User` is deliberately not `#[error(transparent)]` with `#[from]`. Both
/// would make thiserror require `E: std::error::Error` so it can implement
/// `.source()`, but this crate only ever needs `E: Clone + Send` (a
/// producer's error can be a plain `String`, as the tests do). `{0}` only
/// needs `E: Display`, and [`From`] is implemented by hand below instead of
/// derived.
#[derive(Debug, thiserror::Error)]
pub enum StreamError<E> {
    /// A waiter queue already held `MAX_QUEUE` suspended operations.
    #[error("{0} queue overflow: too many concurrent suspended operations")]
    Overflow(OverflowKind),
    /// The producer's own error, or an explicit close/throw reason.
    #[error("{0}")]
    User(E),
}

impl<E> StreamError<E> {
    /// Returns the user error, if this is a [`StreamError::User`].
    pub fn into_user(self) -> Option<E> {
        match self {
            StreamError::User(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for StreamError<E> {
    fn from(e: E) -> Self {
        StreamError::User(e)
    }
}

/// A shared, type-erased error: the default `E` for callers who don't need
/// a concrete producer error type.
///
/// `Arc`, not `Box`. An error close must deliver the same error to every
/// already-queued pull waiter and to every later `return_`/`throw` caller
/// (see [`crate::core`]), which makes `E: Clone` a requirement everywhere
/// in this crate, not just an incidental bound. `Box<dyn Error + ...>`
/// cannot be `Clone`; `Arc<dyn Error + ...>` can, at the cost of a clone
/// being a refcount bump instead of a deep copy.
pub type BoxError = std::sync::Arc<dyn std::error::Error + Send + Sync + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn user_error_displays_the_inner_error_verbatim() {
        let err: StreamError<String> = StreamError::from("oops".to_string());
        assert_eq!(err.to_string(), "oops");
        assert_eq!(err.into_user(), Some("oops".to_string()));
    }

    #[test]
    fn overflow_does_not_unwrap_to_a_user_error() {
        let err: StreamError<String> = StreamError::Overflow(OverflowKind::Push);
        assert!(err.to_string().contains("push"));
        assert_eq!(err.into_user(), None);
    }

    #[test]
    fn box_error_default_is_cloneable_and_works_as_e() {
        // `BoxError` (the default `E`) must be `Clone` since every generic
        // bound in this crate requires `E: Clone`. This is the compile-time
        // check that regressed when `BoxError` was a bare `Box<dyn Error>`.
        let boxed: BoxError = std::sync::Arc::new(Boom);
        let cloned = boxed.clone();
        let err: StreamError<BoxError> = StreamError::from(boxed);
        assert_eq!(err.to_string(), "boom");
        assert_eq!(cloned.to_string(), "boom");
    }
}
