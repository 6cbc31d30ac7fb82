//! # Memory Management
//!
//! Heaps and the buffers they hand out.
//!
//! ## Design Philosophy
//!
//! Every byte a subsystem touches comes from a heap it was given:
//! - Buffers are move-only; ownership changes hands, data is never aliased
//! - Allocation failure is a value, never an abort
//! - Tracking heaps name every leak with the callstack that caused it

mod buffer;
mod heap;

pub use buffer::{HeapBuffer, DEFAULT_ALIGNMENT, MAX_ALIGNMENT};
pub use heap::{Heap, HeapStats, LeakReport, SystemHeap, TrackingHeap};
