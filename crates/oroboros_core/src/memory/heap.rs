//! # Heaps
//!
//! The allocation interface every engine subsystem draws its buffers from.
//!
//! [`SystemHeap`] forwards to the global allocator. [`TrackingHeap`] keeps a
//! ledger of every live allocation with the callstack that made it, and
//! reports whatever is still alive when the heap goes away.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::buffer::{AllocTicket, HeapBuffer, Word, MAX_ALIGNMENT};
use crate::error::{MemoryError, MemoryResult};

/// Allocation interface shared across threads.
///
/// # Example
///
/// ```rust,ignore
/// let heap = TrackingHeap::new("level");
/// let mut buffer = heap.alloc(256, DEFAULT_ALIGNMENT)?;
/// buffer[0] = 7;
/// heap.free(buffer);
/// assert_eq!(heap.stats().live_allocations, 0);
/// ```
pub trait Heap: Send + Sync {
    /// Allocates a zeroed buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidAlignment`] if `alignment` is not a
    /// power of two or exceeds [`MAX_ALIGNMENT`], and
    /// [`MemoryError::OutOfMemory`] if the bytes cannot be reserved.
    fn alloc(&self, size: usize, alignment: usize) -> MemoryResult<HeapBuffer>;

    /// Releases a buffer.
    fn free(&self, buffer: HeapBuffer) {
        drop(buffer);
    }

    /// Allocates a buffer holding a copy of `data`.
    ///
    /// # Errors
    ///
    /// Same as [`Heap::alloc`].
    fn alloc_copy(&self, data: &[u8], alignment: usize) -> MemoryResult<HeapBuffer> {
        let mut buffer = self.alloc(data.len(), alignment)?;
        buffer.copy_from_slice(data);
        Ok(buffer)
    }
}

/// Reserves zeroed word storage for `size` bytes without aborting on failure.
fn reserve_words(size: usize, alignment: usize) -> MemoryResult<Vec<Word>> {
    if !alignment.is_power_of_two() || alignment > MAX_ALIGNMENT {
        return Err(MemoryError::InvalidAlignment(alignment));
    }

    let count = size.div_ceil(MAX_ALIGNMENT);
    let mut words = Vec::new();
    words
        .try_reserve_exact(count)
        .map_err(|_| MemoryError::OutOfMemory { size })?;
    words.resize(count, 0);
    Ok(words)
}

/// Untracked heap backed by the global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHeap;

impl Heap for SystemHeap {
    fn alloc(&self, size: usize, alignment: usize) -> MemoryResult<HeapBuffer> {
        let words = reserve_words(size, alignment)?;
        Ok(HeapBuffer::from_words(words, size, alignment, None))
    }
}

/// Snapshot of a tracking heap's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Allocations currently alive.
    pub live_allocations: usize,
    /// Bytes currently alive.
    pub live_bytes: usize,
    /// Allocations made over the heap's lifetime.
    pub total_allocations: u64,
    /// Highest value `live_bytes` has reached.
    pub peak_bytes: usize,
}

/// A live allocation reported as leaked.
#[derive(Clone, Debug)]
pub struct LeakReport {
    /// Size of the allocation in bytes.
    pub size: usize,
    /// Callstack captured at allocation time.
    pub callstack: String,
}

struct AllocRecord {
    size: usize,
    backtrace: Backtrace,
}

#[derive(Default)]
struct LedgerState {
    live: HashMap<u64, AllocRecord>,
    live_bytes: usize,
    peak_bytes: usize,
    total_allocations: u64,
}

/// Bookkeeping shared between a tracking heap and its live buffers.
///
/// Buffers hold the ledger through their ticket, so a buffer that outlives
/// its heap still retires cleanly.
#[derive(Default)]
pub(crate) struct AllocLedger {
    state: Mutex<LedgerState>,
    next_id: AtomicU64,
}

impl AllocLedger {
    fn admit(&self, size: usize) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = AllocRecord {
            size,
            backtrace: Backtrace::capture(),
        };

        let mut state = self.state.lock();
        state.live.insert(id, record);
        state.live_bytes += size;
        state.peak_bytes = state.peak_bytes.max(state.live_bytes);
        state.total_allocations += 1;
        id
    }

    pub(crate) fn retire(&self, id: u64) {
        let mut state = self.state.lock();
        if let Some(record) = state.live.remove(&id) {
            state.live_bytes -= record.size;
        }
    }

    fn stats(&self) -> HeapStats {
        let state = self.state.lock();
        HeapStats {
            live_allocations: state.live.len(),
            live_bytes: state.live_bytes,
            total_allocations: state.total_allocations,
            peak_bytes: state.peak_bytes,
        }
    }

    fn leaks(&self) -> Vec<LeakReport> {
        let state = self.state.lock();
        let mut records: Vec<(&u64, &AllocRecord)> = state.live.iter().collect();
        records.sort_by_key(|(id, _)| **id);
        records
            .into_iter()
            .map(|(_, record)| LeakReport {
                size: record.size,
                callstack: match record.backtrace.status() {
                    BacktraceStatus::Captured => record.backtrace.to_string(),
                    _ => "<callstack unavailable; set RUST_BACKTRACE=1>".to_string(),
                },
            })
            .collect()
    }
}

/// Heap that records every live allocation.
///
/// Dropping the heap logs each allocation that is still alive together with
/// the callstack that requested it.
pub struct TrackingHeap {
    /// Name used in leak reports.
    name: String,
    /// Ledger shared with outstanding buffers.
    ledger: Arc<AllocLedger>,
}

impl TrackingHeap {
    /// Creates a tracking heap.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ledger: Arc::new(AllocLedger::default()),
        }
    }

    /// Returns the heap's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns current statistics.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.ledger.stats()
    }

    /// Returns every allocation that is currently alive, oldest first.
    #[must_use]
    pub fn leaks(&self) -> Vec<LeakReport> {
        self.ledger.leaks()
    }
}

impl Heap for TrackingHeap {
    fn alloc(&self, size: usize, alignment: usize) -> MemoryResult<HeapBuffer> {
        let words = reserve_words(size, alignment)?;
        let ticket = AllocTicket {
            id: self.ledger.admit(size),
            ledger: Arc::clone(&self.ledger),
        };
        Ok(HeapBuffer::from_words(words, size, alignment, Some(ticket)))
    }
}

impl Drop for TrackingHeap {
    fn drop(&mut self) {
        for leak in self.leaks() {
            tracing::warn!(
                heap = %self.name,
                size = leak.size,
                "memory leak of {} bytes with callstack:\n{}",
                leak.size,
                leak.callstack
            );
        }
    }
}

impl std::fmt::Debug for TrackingHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingHeap")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DEFAULT_ALIGNMENT;

    #[test]
    fn test_alloc_is_zeroed() {
        let buffer = SystemHeap.alloc(13, DEFAULT_ALIGNMENT).unwrap();
        assert_eq!(buffer.len(), 13);
        assert!(buffer.iter().all(|&b| b == 0));
        assert!(!buffer.is_tracked());
    }

    #[test]
    fn test_zero_sized_alloc() {
        let buffer = SystemHeap.alloc(0, 1).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_rejects_bad_alignment() {
        assert_eq!(
            SystemHeap.alloc(8, 3).unwrap_err(),
            MemoryError::InvalidAlignment(3)
        );
        assert_eq!(
            SystemHeap.alloc(8, 64).unwrap_err(),
            MemoryError::InvalidAlignment(64)
        );
    }

    #[test]
    fn test_impossible_size_is_an_error() {
        let err = SystemHeap.alloc(usize::MAX - 1, DEFAULT_ALIGNMENT).unwrap_err();
        assert_eq!(err, MemoryError::OutOfMemory { size: usize::MAX - 1 });
    }

    #[test]
    fn test_tracking_counts_live_allocations() {
        let heap = TrackingHeap::new("test");
        let a = heap.alloc(100, 8).unwrap();
        let b = heap.alloc(28, 8).unwrap();

        let stats = heap.stats();
        assert_eq!(stats.live_allocations, 2);
        assert_eq!(stats.live_bytes, 128);
        assert_eq!(stats.peak_bytes, 128);

        heap.free(a);
        let stats = heap.stats();
        assert_eq!(stats.live_allocations, 1);
        assert_eq!(stats.live_bytes, 28);
        assert_eq!(stats.peak_bytes, 128);
        assert_eq!(stats.total_allocations, 2);

        drop(b);
        assert_eq!(heap.stats().live_allocations, 0);
        assert!(heap.leaks().is_empty());
    }

    #[test]
    fn test_leaks_are_reported_in_order() {
        let heap = TrackingHeap::new("leaky");
        let first = heap.alloc(10, 8).unwrap();
        let second = heap.alloc(20, 8).unwrap();

        let leaks = heap.leaks();
        assert_eq!(leaks.len(), 2);
        assert_eq!(leaks[0].size, 10);
        assert_eq!(leaks[1].size, 20);
        assert!(!leaks[0].callstack.is_empty());

        drop(first);
        drop(second);
    }

    #[test]
    fn test_buffer_outlives_heap() {
        let heap = TrackingHeap::new("short-lived");
        let buffer = heap.alloc_copy(b"survivor", 8).unwrap();
        drop(heap);
        assert_eq!(&buffer[..], b"survivor");
    }
}
