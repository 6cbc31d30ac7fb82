//! # Synchronization Primitives for Worker Pipelines
//!
//! ## The Problem
//!
//! ```text
//! Game thread:    submit request, keep rendering
//! Worker thread:  do the slow part, hand the result back
//!
//! Unbounded handoff: a burst of requests eats all memory
//! Shared buffers:    two threads touch the same bytes
//! ```
//!
//! ## The Solution
//!
//! - `BoundedQueue`: fixed capacity, producers block when it is full,
//!   closing drains the backlog and then releases the consumer
//!
//! Items move through queues by value. Nothing is shared but the queue.

mod queue;

pub use queue::BoundedQueue;
