//! # OROBOROS Core Engine
//!
//! Engine-wide primitives used by every subsystem that leaves the game thread:
//! - Heaps that hand out move-only, alignment-aware byte buffers
//! - Allocation tracking with callstack leak reports
//! - Bounded blocking queues that close cleanly for shutdown
//!
//! ## Architecture Rules
//!
//! 1. **Ownership moves, data never aliases** - buffers cross threads by value
//! 2. **Backpressure is explicit** - every queue has a fixed capacity
//! 3. **Failure is a value** - allocation failure returns an error
//!
//! ## Example
//!
//! ```rust,ignore
//! use oroboros_core::{BoundedQueue, Heap, TrackingHeap, DEFAULT_ALIGNMENT};
//!
//! let heap = TrackingHeap::new("main");
//! let queue = BoundedQueue::new(8);
//! queue.push(heap.alloc(1024, DEFAULT_ALIGNMENT)?)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;
pub mod sync;

pub use error::{MemoryError, MemoryResult};
pub use memory::{
    Heap, HeapBuffer, HeapStats, LeakReport, SystemHeap, TrackingHeap, DEFAULT_ALIGNMENT,
    MAX_ALIGNMENT,
};
pub use sync::BoundedQueue;
