//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::work::WorkOp;

/// Live counters shared by the stage threads.
#[derive(Debug, Default)]
pub(crate) struct FsStats {
    reads_completed: AtomicU64,
    writes_completed: AtomicU64,
    failures: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    bytes_compressed: AtomicU64,
    bytes_decompressed: AtomicU64,
}

impl FsStats {
    pub(crate) fn record_completion(&self, op: WorkOp, succeeded: bool) {
        let counter = match (op, succeeded) {
            (_, false) => &self.failures,
            (WorkOp::Read, true) => &self.reads_completed,
            (WorkOp::Write, true) => &self.writes_completed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn add_compressed(&self, bytes: usize) {
        self.bytes_compressed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_decompressed(&self, bytes: usize) {
        self.bytes_decompressed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FsStatsSnapshot {
        FsStatsSnapshot {
            reads_completed: self.reads_completed.load(Ordering::Relaxed),
            writes_completed: self.writes_completed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_compressed: self.bytes_compressed.load(Ordering::Relaxed),
            bytes_decompressed: self.bytes_decompressed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FsStatsSnapshot {
    /// Reads that completed successfully.
    pub reads_completed: u64,
    /// Writes that completed successfully.
    pub writes_completed: u64,
    /// Items that completed with an error.
    pub failures: u64,
    /// Bytes read from storage, frame headers included.
    pub bytes_read: u64,
    /// Bytes written to storage, frame headers included.
    pub bytes_written: u64,
    /// Uncompressed bytes fed to the compressor.
    pub bytes_compressed: u64,
    /// Bytes produced by the decompressor.
    pub bytes_decompressed: u64,
}

impl FsStatsSnapshot {
    /// Items that reached completion, successful or not.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.reads_completed + self.writes_completed + self.failures
    }
}
