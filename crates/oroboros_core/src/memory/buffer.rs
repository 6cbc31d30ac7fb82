//! # Heap Buffers
//!
//! Move-only byte buffers handed out by a [`Heap`](super::Heap).
//!
//! A buffer is owned by exactly one place at a time. Passing it to another
//! thread is a move, never a shared reference, so two pipeline stages can
//! never touch the same bytes at once.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::heap::AllocLedger;

/// Backing word. Buffers are stored as whole words so byte views are
/// always aligned to `align_of::<Word>()`.
pub(crate) type Word = u64;

/// Largest alignment a [`HeapBuffer`] can guarantee.
pub const MAX_ALIGNMENT: usize = std::mem::align_of::<Word>();

/// Default alignment used by the engine for byte payloads.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Ties a live buffer to the ledger of the heap that produced it.
///
/// Dropping the ticket retires the allocation from the ledger.
pub(crate) struct AllocTicket {
    pub(crate) id: u64,
    pub(crate) ledger: Arc<AllocLedger>,
}

impl Drop for AllocTicket {
    fn drop(&mut self) {
        self.ledger.retire(self.id);
    }
}

/// A zero-initialised, move-only byte buffer.
///
/// The buffer is released when dropped or when handed back through
/// [`Heap::free`](super::Heap::free).
pub struct HeapBuffer {
    /// Word storage, at least `len` bytes.
    words: Vec<Word>,
    /// Visible length in bytes.
    len: usize,
    /// Alignment requested at allocation time.
    alignment: usize,
    /// Ledger entry for tracked heaps.
    ticket: Option<AllocTicket>,
}

impl HeapBuffer {
    /// Wraps reserved word storage. Called by heap implementations.
    pub(crate) fn from_words(
        words: Vec<Word>,
        len: usize,
        alignment: usize,
        ticket: Option<AllocTicket>,
    ) -> Self {
        debug_assert!(words.len() * MAX_ALIGNMENT >= len);
        Self {
            words,
            len,
            alignment,
            ticket,
        }
    }

    /// Returns the visible length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no bytes.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the alignment the buffer was allocated with.
    #[inline]
    #[must_use]
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    /// Returns true if this buffer is recorded by a tracking heap.
    #[inline]
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.ticket.is_some()
    }

    /// Shortens the visible length. Has no effect if `len` is not smaller.
    ///
    /// The storage is kept; the ledger still accounts for the allocated size.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Returns the bytes as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &bytemuck::cast_slice::<Word, u8>(&self.words)[..self.len]
    }

    /// Returns the bytes as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut bytemuck::cast_slice_mut::<Word, u8>(&mut self.words)[..len]
    }

    /// Copies the visible bytes into a new vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Deref for HeapBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for HeapBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for HeapBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for HeapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapBuffer")
            .field("len", &self.len)
            .field("alignment", &self.alignment)
            .field("tracked", &self.ticket.is_some())
            .finish()
    }
}
