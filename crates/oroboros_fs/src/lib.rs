//! # OROBOROS File System
//!
//! Asynchronous whole-file reads and writes for the game thread, with
//! optional LZ4 compression.
//!
//! ## Pipeline
//!
//! ```text
//!             ┌──────────┐     ┌──────────┐     ┌────────────┐
//!  write(c) ─►│ compress │────►│   file   │────►│ decompress │─► done
//!             └──────────┘  ┌─►└──────────┘     └────────────┘
//!  read / write ────────────┘        └─────────────────────────► done
//! ```
//!
//! Each stage is one thread behind a bounded queue. A request is a single
//! work item moved from stage to stage; it completes exactly once, on
//! success or on the first failure, and its handle then exposes the result
//! code and buffer.
//!
//! ## Ownership
//!
//! - Read buffers come from the heap passed to [`FileSystem::read`] and
//!   belong to the caller after completion.
//! - Write buffers move into [`FileSystem::write`] and come back through
//!   the handle. The pipeline only frees the scratch buffers it allocates.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod fs;
pub mod handle;

mod stage;
mod stats;
mod storage;
mod work;

pub use codec::{Codec, Lz4Codec};
pub use config::FsConfig;
pub use error::{FsError, FsResult};
pub use frame::{FrameHeader, FRAME_HEADER_LEN};
pub use fs::FileSystem;
pub use handle::WorkHandle;
pub use stats::FsStatsSnapshot;
pub use work::WorkOp;
