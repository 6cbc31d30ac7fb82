//! # Bounded Work Queue
//!
//! Fixed-capacity blocking FIFO shared by producers and a consumer thread.
//!
//! ```text
//!   Producer 1 ──┐
//!   Producer 2 ──┼──> [ capacity C ] ──> Consumer
//!   Producer N ──┘   push blocks when full, pop blocks when empty
//! ```
//!
//! Closing is the shutdown signal: once closed, `push` hands the item back
//! and `pop` keeps returning queued items until the backlog is empty, then
//! returns `None` to every consumer.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;

/// A closable bounded FIFO queue.
pub struct BoundedQueue<T> {
    /// Producer side. `None` once closed.
    sender: RwLock<Option<Sender<T>>>,
    /// Consumer side.
    receiver: Receiver<T>,
    /// Fixed capacity.
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");

        let (sender, receiver) = bounded(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
            receiver,
            capacity,
        }
    }

    /// Pushes an item, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the item if the queue has been closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        // Clone out of the lock so a blocked push never stalls `close`.
        let sender = self.sender.read().clone();
        match sender {
            Some(sender) => sender.send(item).map_err(|e| e.into_inner()),
            None => Err(item),
        }
    }

    /// Pops the oldest item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Closes the queue.
    ///
    /// Returns true if this call closed it. Items already queued (and pushes
    /// already blocked on a full queue) are still delivered.
    pub fn close(&self) -> bool {
        self.sender.write().take().is_some()
    }

    /// Returns true if the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Returns the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Returns the fixed capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
