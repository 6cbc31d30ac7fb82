//! # Work Items
//!
//! A [`WorkItem`] is the unit that travels through the stage queues. It is
//! moved from queue to queue, so exactly one stage holds it at a time, and it
//! is consumed by [`WorkItem::complete`]. An item dropped without completing
//! (a stage panicked, or a closed queue discarded its backlog) completes
//! itself with [`FsError::ShuttingDown`], so no handle waits forever.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Sender;
use oroboros_core::{Heap, HeapBuffer};

use crate::error::{FsError, FsResult};
use crate::handle::WorkHandle;
use crate::stats::FsStats;

/// Direction of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkOp {
    /// Load a file into memory.
    Read,
    /// Store a buffer into a file.
    Write,
}

impl WorkOp {
    /// Lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for WorkOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handle receives when its item completes.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) result: FsResult<()>,
    pub(crate) buffer: Option<HeapBuffer>,
    pub(crate) size: usize,
}

/// A request in flight.
pub(crate) struct WorkItem {
    pub(crate) op: WorkOp,
    /// Request path as the caller gave it.
    pub(crate) path: String,
    /// Translated path, set at submission.
    pub(crate) native: PathBuf,
    pub(crate) null_terminate: bool,
    pub(crate) use_compression: bool,
    /// Reads: the caller's heap. Writes: the file system's heap.
    pub(crate) heap: Arc<dyn Heap>,
    /// Reads: the result. Writes: the caller's data.
    pub(crate) buffer: Option<HeapBuffer>,
    /// Compressed payload between the codec and file stages.
    pub(crate) scratch: Option<HeapBuffer>,
    /// Logical byte count of `buffer`.
    pub(crate) size: usize,
    pub(crate) compressed_size: usize,
    stats: Arc<FsStats>,
    /// One-slot completion channel. Sending on it is the completion signal.
    completion: Option<Sender<Outcome>>,
}

impl WorkItem {
    /// Creates an item and the handle that will observe it.
    pub(crate) fn new(
        op: WorkOp,
        path: &str,
        heap: Arc<dyn Heap>,
        null_terminate: bool,
        use_compression: bool,
        stats: Arc<FsStats>,
    ) -> (Self, WorkHandle) {
        let (sender, receiver) = crossbeam_channel::bounded(1);

        let item = Self {
            op,
            path: path.to_string(),
            native: PathBuf::new(),
            null_terminate,
            use_compression,
            heap,
            buffer: None,
            scratch: None,
            size: 0,
            compressed_size: 0,
            stats,
            completion: Some(sender),
        };
        let handle = WorkHandle::new(op, path.to_string(), receiver);
        (item, handle)
    }

    /// Completes the item. Consumes it, so this happens once per request.
    pub(crate) fn complete(mut self, result: FsResult<()>) {
        self.finish(result);
    }

    fn finish(&mut self, result: FsResult<()>) {
        let Some(completion) = self.completion.take() else {
            return;
        };

        if let Some(scratch) = self.scratch.take() {
            self.heap.free(scratch);
        }

        match &result {
            Ok(()) => tracing::debug!(
                op = %self.op,
                path = %self.path,
                size = self.size,
                compressed = self.use_compression,
                "work item completed"
            ),
            Err(e) => tracing::warn!(
                op = %self.op,
                path = %self.path,
                code = e.code(),
                error = %e,
                "work item failed"
            ),
        }
        self.stats.record_completion(self.op, result.is_ok());

        // Writes always hand the caller's buffer back. Failed reads release
        // whatever they had allocated.
        let buffer = match (self.op, result.is_ok()) {
            (WorkOp::Read, false) => {
                if let Some(partial) = self.buffer.take() {
                    self.heap.free(partial);
                }
                None
            }
            _ => self.buffer.take(),
        };

        // A dropped handle means nobody wants the outcome; dropping it
        // releases the buffer.
        let _ = completion.send(Outcome {
            result,
            buffer,
            size: self.size,
        });
    }
}

impl Drop for WorkItem {
    fn drop(&mut self) {
        if self.completion.is_some() {
            self.finish(Err(FsError::ShuttingDown));
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("op", &self.op)
            .field("path", &self.path)
            .field("use_compression", &self.use_compression)
            .field("size", &self.size)
            .field("compressed_size", &self.compressed_size)
            .finish_non_exhaustive()
    }
}
