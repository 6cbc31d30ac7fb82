//! # File System Error Types
//!
//! All errors a work item can complete with.

use std::io;

use oroboros_core::MemoryError;
use thiserror::Error;

/// Errors that can occur in the file system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    /// Open, read, write or metadata failed in the storage layer.
    #[error("storage error on {path}: {kind} (code {code})")]
    Storage {
        /// Path the operation targeted.
        path: String,
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// Raw OS error code, or -1 if the OS gave none.
        code: i32,
    },

    /// The path cannot be expressed as a native path.
    #[error("cannot encode path {path:?}: {reason}")]
    Encoding {
        /// Offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The heap refused an allocation.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// The compressed frame on disk is inconsistent.
    #[error("corrupt frame in {path}: {reason}")]
    CorruptFrame {
        /// File holding the frame.
        path: String,
        /// What did not add up.
        reason: String,
    },

    /// The codec rejected the data.
    #[error("codec error: {0}")]
    Codec(String),

    /// A size does not fit the 32-bit frame header.
    #[error("payload of {size} bytes does not fit a frame header")]
    FrameTooLarge {
        /// Offending size.
        size: usize,
    },

    /// A write declared more bytes than its buffer holds.
    #[error("write of {size} bytes exceeds buffer of {capacity} bytes")]
    SizeOutOfBounds {
        /// Declared size.
        size: usize,
        /// Buffer length.
        capacity: usize,
    },

    /// The pipeline was closing and could not accept the item.
    #[error("file system is shutting down")]
    ShuttingDown,

    /// A stage thread could not be started.
    #[error("failed to start {stage} worker: {reason}")]
    WorkerSpawn {
        /// Stage name.
        stage: &'static str,
        /// Reason from the OS.
        reason: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FsError {
    /// Builds a storage error for `path` from an I/O error.
    #[must_use]
    pub fn storage(path: &str, err: &io::Error) -> Self {
        Self::Storage {
            path: path.to_string(),
            kind: err.kind(),
            code: match err.raw_os_error() {
                Some(code) if code != 0 => code,
                _ => -1,
            },
        }
    }

    /// Builds a corrupt-frame error.
    #[must_use]
    pub fn corrupt(path: &str, reason: impl Into<String>) -> Self {
        Self::CorruptFrame {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns the nonzero result code reported through work handles.
    ///
    /// Storage errors carry the OS code; everything else maps to a fixed
    /// negative code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Storage { code, .. } => *code,
            Self::Encoding { .. } => -1,
            Self::Memory(_) => -2,
            Self::CorruptFrame { .. } => -3,
            Self::Codec(_) => -4,
            Self::FrameTooLarge { .. } => -5,
            Self::SizeOutOfBounds { .. } => -6,
            Self::ShuttingDown => -7,
            Self::WorkerSpawn { .. } => -8,
            Self::InvalidConfig(_) => -9,
        }
    }
}

/// Result type for file system operations.
pub type FsResult<T> = Result<T, FsError>;
