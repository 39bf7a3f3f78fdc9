//! Capped FIFOs of suspended pushes and pulls.
//!
//! Each queue independently caps at [`MAX_QUEUE`]; overflowing one never
//! closes the stream, it only fails the offending `push`/`next` call (see
//! [`crate::core::Inner`]).

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::error::OverflowKind;

/// Hard cap shared by both waiter queues.
pub const MAX_QUEUE: usize = 1024;

/// A producer push suspended because the buffer was full and no pull was
/// waiting. Resolved `true` once a later pull delivers `value`, `false` if
/// the stream closes first.
pub struct PushWaiter<T> {
    pub value: T,
    pub completion: oneshot::Sender<bool>,
}

/// A consumer pull suspended because nothing was available and the stream
/// was not yet closed. Resolved with the next iterator result, or a
/// rejection, once a push or a close drains it.
pub struct PullWaiter<T, E> {
    pub completion: oneshot::Sender<Result<Option<T>, E>>,
}

/// A FIFO of waiters capped at [`MAX_QUEUE`], sealed (refusing further
/// mutation) once the owning stream closes.
pub struct WaiterQueue<W> {
    entries: VecDeque<W>,
    sealed: bool,
}

impl<W> Default for WaiterQueue<W> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
            sealed: false,
        }
    }
}

impl<W> WaiterQueue<W> {
    /// Appends `waiter` to the back of the queue.
    ///
    /// # Panics
    ///
    /// Panics if the queue is already sealed. Enqueuing after close is an
    /// implementation bug, never a user-observable error.
    pub fn enqueue(&mut self, waiter: W, kind: OverflowKind) -> Result<(), OverflowKind> {
        assert!(!self.sealed, "enqueue on a sealed waiter queue");
        if self.entries.len() >= MAX_QUEUE {
            return Err(kind);
        }
        self.entries.push_back(waiter);
        Ok(())
    }

    /// Pops the front-most waiter, if any.
    pub fn dequeue(&mut self) -> Option<W> {
        self.entries.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drains every waiter in FIFO order, applying `apply` to each, then
    /// seals the queue against further enqueues.
    pub fn drain_and_seal(&mut self, mut apply: impl FnMut(W)) {
        while let Some(w) = self.entries.pop_front() {
            apply(w);
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_respects_cap() {
        let mut q: WaiterQueue<u32> = WaiterQueue::default();
        for i in 0..MAX_QUEUE as u32 {
            q.enqueue(i, OverflowKind::Pull).unwrap();
        }
        assert_eq!(q.len(), MAX_QUEUE);
        assert_eq!(q.enqueue(9999, OverflowKind::Pull), Err(OverflowKind::Pull));
    }

    #[test]
    fn dequeue_is_fifo() {
        let mut q: WaiterQueue<u32> = WaiterQueue::default();
        q.enqueue(1, OverflowKind::Push).unwrap();
        q.enqueue(2, OverflowKind::Push).unwrap();
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn drain_and_seal_visits_every_entry_in_order_then_seals() {
        let mut q: WaiterQueue<u32> = WaiterQueue::default();
        q.enqueue(1, OverflowKind::Push).unwrap();
        q.enqueue(2, OverflowKind::Push).unwrap();
        q.enqueue(3, OverflowKind::Push).unwrap();

        let mut seen = Vec::new();
        q.drain_and_seal(|w| seen.push(w));

        assert_eq!(seen, vec![1, 2, 3]);
        assert!(q.is_empty());
        assert!(q.is_sealed());
    }

    #[test]
    #[should_panic(expected = "sealed")]
    fn enqueue_after_seal_panics() {
        let mut q: WaiterQueue<u32> = WaiterQueue::default();
        q.drain_and_seal(|_| {});
        let _ = q.enqueue(1, OverflowKind::Push);
    }
}
