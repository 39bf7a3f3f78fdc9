//! Bounded FIFO staging with three disciplines.
//!
//! [`Buffer`] is a capability, not a class hierarchy: `add`/`remove`/
//! `is_empty`/`is_full` is the whole contract. A custom discipline
//! (priority, deduping, ...) only has to honor it. See the trait docs for
//! the exact obligations.

use std::collections::VecDeque;

use crate::error::CapacityError;

/// A bounded, ordered container of staged values.
///
/// Implementors must uphold:
/// - `add` never panics; under the same condition that `full()` would
///   return `true` for a discipline that can reject, `add` is the one
///   allowed to discard instead of panicking.
/// - `remove` on a non-empty buffer returns the earliest-retained value.
/// - `is_empty`/`is_full` are consistent with each other at any point no
///   operation is in progress.
pub trait Buffer<T>: Send {
    /// Attempts to stage `value`. Returns `true` if the value was retained
    /// (queued or accepted per the discipline), `false` if the discipline
    /// rejected it outright (only [`FixedBuffer`] can do this).
    fn add(&mut self, value: T) -> bool;

    /// Removes and returns the oldest retained value, if any.
    fn remove(&mut self) -> Option<T>;

    /// Whether the buffer holds no values.
    fn is_empty(&self) -> bool;

    /// Whether a further `add` would be rejected outright.
    ///
    /// Only [`FixedBuffer`] can return `true`; sliding and dropping buffers
    /// always resolve a full buffer by evicting or discarding, so they
    /// report `false` unconditionally.
    fn is_full(&self) -> bool;

    /// Number of values currently retained.
    fn len(&self) -> usize;
}

/// Rejects new values once `len == cap`. `cap == 0` means every push must
/// hand off directly to a waiting pull.
#[derive(Debug)]
pub struct FixedBuffer<T> {
    values: VecDeque<T>,
    cap: usize,
}

impl<T> FixedBuffer<T> {
    /// `cap >= 0` is always satisfied by a `usize`; this constructor never
    /// actually fails, but returns `Result` to keep the three buffer
    /// constructors uniform.
    pub fn new(cap: usize) -> Result<Self, CapacityError> {
        Ok(Self {
            values: VecDeque::with_capacity(cap.min(1024)),
            cap,
        })
    }
}

impl<T: Send> Buffer<T> for FixedBuffer<T> {
    fn add(&mut self, value: T) -> bool {
        if self.values.len() >= self.cap {
            return false;
        }
        self.values.push_back(value);
        true
    }

    fn remove(&mut self) -> Option<T> {
        self.values.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn is_full(&self) -> bool {
        self.values.len() >= self.cap
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

/// Evicts the oldest retained value to make room for a new one once
/// `len == cap`. Never reports full.
#[derive(Debug)]
pub struct SlidingBuffer<T> {
    values: VecDeque<T>,
    cap: usize,
}

impl<T> SlidingBuffer<T> {
    pub fn new(cap: usize) -> Result<Self, CapacityError> {
        if cap == 0 {
            return Err(CapacityError::MustBePositive);
        }
        Ok(Self {
            values: VecDeque::with_capacity(cap),
            cap,
        })
    }
}

impl<T: Send> Buffer<T> for SlidingBuffer<T> {
    fn add(&mut self, value: T) -> bool {
        if self.values.len() >= self.cap {
            self.values.pop_front();
        }
        self.values.push_back(value);
        true
    }

    fn remove(&mut self) -> Option<T> {
        self.values.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn is_full(&self) -> bool {
        false
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

/// Discards the new value once `len == cap`, retaining what is already
/// buffered. Never reports full.
#[derive(Debug)]
pub struct DroppingBuffer<T> {
    values: VecDeque<T>,
    cap: usize,
}

impl<T> DroppingBuffer<T> {
    pub fn new(cap: usize) -> Result<Self, CapacityError> {
        if cap == 0 {
            return Err(CapacityError::MustBePositive);
        }
        Ok(Self {
            values: VecDeque::with_capacity(cap),
            cap,
        })
    }
}

impl<T: Send> Buffer<T> for DroppingBuffer<T> {
    fn add(&mut self, value: T) -> bool {
        if self.values.len() < self.cap {
            self.values.push_back(value);
        }
        true
    }

    fn remove(&mut self) -> Option<T> {
        self.values.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn is_full(&self) -> bool {
        false
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

/// A boxed buffer, used by [`crate::Stream::new`] so callers can pass any
/// of the three disciplines (or their own) without a generic parameter on
/// `Stream` itself.
pub type AnyBuffer<T> = Box<dyn Buffer<T>>;
