//! # Work Handles
//!
//! The caller's view of a submitted request. A handle can be polled with
//! [`WorkHandle::is_done`] or blocked on with [`WorkHandle::wait`]; every
//! accessor that needs the outcome waits first.
//!
//! ```rust,ignore
//! let mut handle = fs.read("save.bin", heap.clone(), false, true);
//! // ... keep simulating ...
//! if handle.is_done() {
//!     handle.result()?;
//!     load_save(handle.buffer().unwrap_or_default());
//! }
//! ```

use std::fmt;

use crossbeam_channel::Receiver;
use oroboros_core::HeapBuffer;

use crate::error::{FsError, FsResult};
use crate::work::{Outcome, WorkOp};

/// Completion handle for a read or write.
///
/// Dropping the handle is the same as [`WorkHandle::destroy`] without the
/// wait: the request still runs to completion and its buffer is released
/// when it finishes.
pub struct WorkHandle {
    op: WorkOp,
    path: String,
    receiver: Receiver<Outcome>,
    outcome: Option<Outcome>,
}

impl WorkHandle {
    pub(crate) fn new(op: WorkOp, path: String, receiver: Receiver<Outcome>) -> Self {
        Self {
            op,
            path,
            receiver,
            outcome: None,
        }
    }

    /// Whether this is a read or a write.
    #[must_use]
    pub fn op(&self) -> WorkOp {
        self.op
    }

    /// Path the request targets.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns true once the request has completed. Never blocks.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.outcome.is_some() || !self.receiver.is_empty()
    }

    /// Blocks until the request has completed.
    ///
    /// Returns immediately if it already has.
    pub fn wait(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        // Disconnected without an outcome: the item was torn down unfinished.
        let outcome = self.receiver.recv().unwrap_or(Outcome {
            result: Err(FsError::ShuttingDown),
            buffer: None,
            size: 0,
        });
        self.outcome = Some(outcome);
    }

    /// Waits, then returns the request's result.
    ///
    /// # Errors
    ///
    /// Returns the error the request failed with.
    pub fn result(&mut self) -> FsResult<()> {
        self.wait();
        self.outcome
            .as_ref()
            .map_or(Err(FsError::ShuttingDown), |o| o.result.clone())
    }

    /// Waits, then returns 0 on success or the error's nonzero code.
    pub fn result_code(&mut self) -> i32 {
        match self.result() {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }

    /// Waits, then returns the logical bytes of the buffer.
    ///
    /// For a read this is the file contents (plus the terminator, if one
    /// was requested). For a write it is the caller's data. `None` for a
    /// failed read or after [`WorkHandle::take_buffer`].
    pub fn buffer(&mut self) -> Option<&[u8]> {
        self.wait();
        let outcome = self.outcome.as_ref()?;
        let buffer = outcome.buffer.as_ref()?;
        let end = match self.op {
            WorkOp::Read => buffer.len(),
            WorkOp::Write => outcome.size.min(buffer.len()),
        };
        Some(&buffer[..end])
    }

    /// Waits, then returns the size in bytes.
    ///
    /// For a read this is the file's content length, terminator excluded.
    /// For a write it is the number of bytes requested.
    pub fn size(&mut self) -> usize {
        self.wait();
        self.outcome.as_ref().map_or(0, |o| o.size)
    }

    /// Waits, then takes ownership of the buffer.
    pub fn take_buffer(&mut self) -> Option<HeapBuffer> {
        self.wait();
        self.outcome.as_mut()?.buffer.take()
    }

    /// Waits, then returns the buffer if the request succeeded.
    ///
    /// # Errors
    ///
    /// Returns the error the request failed with.
    pub fn into_buffer(mut self) -> FsResult<HeapBuffer> {
        self.result()?;
        self.take_buffer().ok_or(FsError::ShuttingDown)
    }

    /// Waits for completion, then releases the handle.
    ///
    /// A buffer still held by the handle is dropped with it. To keep the
    /// buffer, move it out first with [`WorkHandle::take_buffer`] or use
    /// [`WorkHandle::into_buffer`]; a buffer already taken is the caller's
    /// and is not touched.
    pub fn destroy(mut self) {
        self.wait();
    }
}

impl fmt::Debug for WorkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkHandle")
            .field("op", &self.op)
            .field("path", &self.path)
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}
