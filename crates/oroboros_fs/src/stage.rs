//! # Pipeline Stages
//!
//! Three worker loops, one thread each:
//!
//! ```text
//! read  (plain)       : file                       -> done
//! read  (compressed)  : file -> decompress         -> done
//! write (plain)       : file                       -> done
//! write (compressed)  : compress -> file           -> done
//! ```
//!
//! Each loop pops until its queue is closed and drained. A failing step
//! completes the item on the spot; it never reaches a later stage.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use oroboros_core::{BoundedQueue, MemoryError, DEFAULT_ALIGNMENT};

use crate::codec::Codec;
use crate::error::{FsError, FsResult};
use crate::frame::FrameHeader;
use crate::stats::FsStats;
use crate::storage;
use crate::work::{WorkItem, WorkOp};

/// Pipeline stage identity, used for thread names and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Compress,
    File,
    Decompress,
}

impl Stage {
    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Compress => "compress",
            Self::File => "file",
            Self::Decompress => "decompress",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State shared by all stage threads.
pub(crate) struct StageContext {
    pub(crate) codec: Arc<dyn Codec>,
    pub(crate) stats: Arc<FsStats>,
    pub(crate) sync_writes: bool,
}

/// Hands an item to the next stage, completing it if that stage is closed.
fn forward(item: WorkItem, next: &BoundedQueue<WorkItem>, stage: Stage) {
    tracing::debug!(op = %item.op, path = %item.path, to = %stage, "forwarding work item");
    if let Err(item) = next.push(item) {
        item.complete(Err(FsError::ShuttingDown));
    }
}

// =============================================================================
// File stage
// =============================================================================

/// Runs the file stage until `input` is closed and drained.
pub(crate) fn run_file_stage(
    input: &BoundedQueue<WorkItem>,
    decompress: &BoundedQueue<WorkItem>,
    ctx: &StageContext,
) {
    while let Some(mut item) = input.pop() {
        match item.op {
            WorkOp::Read => {
                let result = if item.use_compression {
                    read_frame(&mut item, ctx)
                } else {
                    read_plain(&mut item, ctx)
                };
                match result {
                    Ok(()) if item.use_compression => forward(item, decompress, Stage::Decompress),
                    result => item.complete(result),
                }
            }
            WorkOp::Write => {
                let result = write_file(&mut item, ctx);
                item.complete(result);
            }
        }
    }
    tracing::debug!(stage = %Stage::File, "stage drained");
}

fn to_len(len: u64) -> FsResult<usize> {
    usize::try_from(len).map_err(|_| FsError::Memory(MemoryError::OutOfMemory { size: usize::MAX }))
}

/// Whole-file read into a buffer from the caller's heap.
fn read_plain(item: &mut WorkItem, ctx: &StageContext) -> FsResult<()> {
    let mut file = storage::open_read(&item.native, &item.path)?;
    let len = to_len(storage::file_len(&file, &item.path)?)?;
    let extra = usize::from(item.null_terminate);
    let total = len
        .checked_add(extra)
        .ok_or(MemoryError::OutOfMemory { size: usize::MAX })?;

    let mut buffer = item.heap.alloc(total, DEFAULT_ALIGNMENT)?;
    // The file may shrink between the length query and the read.
    let read = storage::read_full(&mut file, &mut buffer[..len])
        .map_err(|e| FsError::storage(&item.path, &e))?;
    if item.null_terminate {
        buffer[read] = 0;
    }
    buffer.truncate(read + extra);

    ctx.stats.add_read(read as u64);
    item.size = read;
    item.buffer = Some(buffer);
    Ok(())
}

/// Reads a frame header and its payload into scratch.
fn read_frame(item: &mut WorkItem, ctx: &StageContext) -> FsResult<()> {
    let mut file = storage::open_read(&item.native, &item.path)?;
    let file_len = storage::file_len(&file, &item.path)?;

    let header = FrameHeader::read_from(&mut file).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            FsError::corrupt(&item.path, format!("file of {file_len} bytes has no frame header"))
        }
        _ => FsError::storage(&item.path, &e),
    })?;
    header.check_file_len(&item.path, file_len)?;

    let compressed = header.compressed_size as usize;
    let decompressed = header.decompressed_size as usize;
    let bound = ctx.codec.decompress_bound(compressed);
    if decompressed > bound {
        return Err(FsError::corrupt(
            &item.path,
            format!(
                "header declares {decompressed} bytes from {compressed}, {} allows at most {bound}",
                ctx.codec.name()
            ),
        ));
    }

    let mut scratch = item.heap.alloc(compressed, DEFAULT_ALIGNMENT)?;
    file.read_exact(&mut scratch).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => FsError::corrupt(&item.path, "payload ended early"),
        _ => FsError::storage(&item.path, &e),
    })?;

    ctx.stats.add_read(header.frame_len());
    item.compressed_size = compressed;
    item.size = decompressed;
    item.scratch = Some(scratch);
    Ok(())
}

/// Writes the caller's data, or the compressed frame, to storage.
fn write_file(item: &mut WorkItem, ctx: &StageContext) -> FsResult<()> {
    let mut file = storage::open_write(&item.native, &item.path)?;

    let written = if item.use_compression {
        let scratch = item
            .scratch
            .take()
            .ok_or_else(|| FsError::corrupt(&item.path, "compressed payload missing"))?;
        let header = FrameHeader::new(scratch.len(), item.size)?;
        let result = header
            .write_to(&mut file)
            .and_then(|()| file.write_all(&scratch));
        item.heap.free(scratch);
        result.map_err(|e| FsError::storage(&item.path, &e))?;
        header.frame_len()
    } else {
        let buffer = item.buffer.as_ref().ok_or(FsError::SizeOutOfBounds {
            size: item.size,
            capacity: 0,
        })?;
        file.write_all(&buffer[..item.size])
            .map_err(|e| FsError::storage(&item.path, &e))?;
        item.size as u64
    };

    if ctx.sync_writes {
        file.sync_all().map_err(|e| FsError::storage(&item.path, &e))?;
    }
    ctx.stats.add_written(written);
    Ok(())
}

// =============================================================================
// Compress stage
// =============================================================================

/// Runs the compress stage until `input` is closed and drained.
pub(crate) fn run_compress_stage(
    input: &BoundedQueue<WorkItem>,
    file: &BoundedQueue<WorkItem>,
    ctx: &StageContext,
) {
    while let Some(mut item) = input.pop() {
        match compress(&mut item, ctx) {
            Ok(()) => forward(item, file, Stage::File),
            Err(e) => item.complete(Err(e)),
        }
    }
    tracing::debug!(stage = %Stage::Compress, "stage drained");
}

fn compress(item: &mut WorkItem, ctx: &StageContext) -> FsResult<()> {
    // Fail before compressing if the result could never be framed.
    FrameHeader::new(0, item.size)?;

    let source = item.buffer.as_ref().ok_or(FsError::SizeOutOfBounds {
        size: item.size,
        capacity: 0,
    })?;
    let mut scratch = item
        .heap
        .alloc(ctx.codec.compress_bound(item.size), DEFAULT_ALIGNMENT)?;
    let compressed = ctx.codec.compress(&source[..item.size], &mut scratch)?;
    scratch.truncate(compressed);

    ctx.stats.add_compressed(item.size);
    item.compressed_size = compressed;
    item.scratch = Some(scratch);
    Ok(())
}

// =============================================================================
// Decompress stage
// =============================================================================

/// Runs the decompress stage until `input` is closed and drained.
pub(crate) fn run_decompress_stage(input: &BoundedQueue<WorkItem>, ctx: &StageContext) {
    while let Some(mut item) = input.pop() {
        let result = decompress(&mut item, ctx);
        item.complete(result);
    }
    tracing::debug!(stage = %Stage::Decompress, "stage drained");
}

fn decompress(item: &mut WorkItem, ctx: &StageContext) -> FsResult<()> {
    let extra = usize::from(item.null_terminate);
    let mut output = item.heap.alloc(item.size + extra, DEFAULT_ALIGNMENT)?;

    let scratch = item
        .scratch
        .take()
        .ok_or_else(|| FsError::corrupt(&item.path, "compressed payload missing"))?;
    let produced = ctx.codec.decompress(&scratch, &mut output[..item.size]);
    item.heap.free(scratch);
    let produced = produced?;

    if produced != item.size {
        return Err(FsError::corrupt(
            &item.path,
            format!(
                "payload decompressed to {produced} bytes, header declares {}",
                item.size
            ),
        ));
    }
    if item.null_terminate {
        output[item.size] = 0;
    }

    ctx.stats.add_decompressed(produced);
    item.buffer = Some(output);
    Ok(())
}
