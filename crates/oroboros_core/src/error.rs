//! # Core Error Types
//!
//! Errors raised by the engine's memory primitives.

use thiserror::Error;

/// Errors that can occur when requesting memory from a heap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The heap could not reserve the requested bytes.
    #[error("out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Bytes requested.
        size: usize,
    },

    /// The alignment is not a power of two or exceeds what heaps provide.
    #[error("unsupported alignment: {0}")]
    InvalidAlignment(usize),
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
