//! # File System Facade
//!
//! [`FileSystem`] owns the three stage queues and their threads. Requests
//! return a [`WorkHandle`] immediately; the calling thread only blocks if a
//! queue is full or it waits on the handle.
//!
//! ## Shutdown
//!
//! Dropping the file system (or calling [`FileSystem::shutdown`]) closes
//! and joins the stages in pipeline order: compress, then file, then
//! decompress. Each stage drains its backlog before it exits, so every item
//! it forwards still finds its next stage running, and every request
//! submitted before shutdown completes.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use oroboros_core::{BoundedQueue, Heap, HeapBuffer, DEFAULT_ALIGNMENT};

use crate::codec::{Codec, Lz4Codec};
use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::handle::WorkHandle;
use crate::stage::{self, Stage, StageContext};
use crate::stats::{FsStats, FsStatsSnapshot};
use crate::storage;
use crate::work::{WorkItem, WorkOp};

/// A stage thread and the queue that feeds it.
struct Worker {
    stage: Stage,
    queue: Arc<BoundedQueue<WorkItem>>,
    thread: Option<JoinHandle<()>>,
}

/// Asynchronous staged file system.
///
/// ## Usage
///
/// ```rust,ignore
/// let heap: Arc<dyn Heap> = Arc::new(TrackingHeap::new("fs"));
/// let fs = FileSystem::new(Arc::clone(&heap), FsConfig::default())?;
///
/// let data = heap.alloc_copy(b"hello world", DEFAULT_ALIGNMENT)?;
/// let mut write = fs.write("hello.bin", data, 11, true);
/// write.result()?;
///
/// let mut read = fs.read("hello.bin", heap, false, true);
/// assert_eq!(read.buffer(), Some(&b"hello world"[..]));
/// ```
pub struct FileSystem {
    heap: Arc<dyn Heap>,
    codec: Arc<dyn Codec>,
    config: FsConfig,
    stats: Arc<FsStats>,
    file_queue: Arc<BoundedQueue<WorkItem>>,
    compress_queue: Arc<BoundedQueue<WorkItem>>,
    /// Held in shutdown order.
    workers: Vec<Worker>,
}

impl FileSystem {
    /// Starts a file system with the LZ4 codec.
    ///
    /// `heap` backs every write-side allocation.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidConfig`] for a bad configuration or
    /// [`FsError::WorkerSpawn`] if a stage thread cannot start.
    pub fn new(heap: Arc<dyn Heap>, config: FsConfig) -> FsResult<Self> {
        Self::with_codec(heap, config, Arc::new(Lz4Codec))
    }

    /// Starts a file system with a custom codec.
    ///
    /// # Errors
    ///
    /// Same as [`FileSystem::new`].
    pub fn with_codec(
        heap: Arc<dyn Heap>,
        config: FsConfig,
        codec: Arc<dyn Codec>,
    ) -> FsResult<Self> {
        config.validate()?;

        let capacity = config.queue_capacity;
        let file_queue = Arc::new(BoundedQueue::new(capacity));
        let compress_queue = Arc::new(BoundedQueue::new(capacity));
        let decompress_queue = Arc::new(BoundedQueue::new(capacity));
        let stats = Arc::new(FsStats::default());
        let ctx = Arc::new(StageContext {
            codec: Arc::clone(&codec),
            stats: Arc::clone(&stats),
            sync_writes: config.sync_writes,
        });

        let mut workers = Vec::with_capacity(3);
        let spawned = (|| -> FsResult<()> {
            let (input, next, ctx_ref) = (
                Arc::clone(&compress_queue),
                Arc::clone(&file_queue),
                Arc::clone(&ctx),
            );
            workers.push(spawn_worker(&config, Stage::Compress, &compress_queue, move || {
                stage::run_compress_stage(&input, &next, &ctx_ref);
            })?);

            let (input, next, ctx_ref) = (
                Arc::clone(&file_queue),
                Arc::clone(&decompress_queue),
                Arc::clone(&ctx),
            );
            workers.push(spawn_worker(&config, Stage::File, &file_queue, move || {
                stage::run_file_stage(&input, &next, &ctx_ref);
            })?);

            let (input, ctx_ref) = (Arc::clone(&decompress_queue), Arc::clone(&ctx));
            workers.push(spawn_worker(&config, Stage::Decompress, &decompress_queue, move || {
                stage::run_decompress_stage(&input, &ctx_ref);
            })?);
            Ok(())
        })();

        if let Err(e) = spawned {
            stop_workers(&mut workers);
            return Err(e);
        }

        tracing::info!(
            queue_capacity = capacity,
            codec = codec.name(),
            sync_writes = config.sync_writes,
            "file system started"
        );

        Ok(Self {
            heap,
            codec,
            config,
            stats,
            file_queue,
            compress_queue,
            workers,
        })
    }

    /// Queues a whole-file read.
    ///
    /// The result buffer comes from `heap` and belongs to the caller once
    /// the handle completes. With `null_terminate` a zero byte follows the
    /// contents; it is not counted in [`WorkHandle::size`]. With
    /// `use_compression` the file must hold a compressed frame.
    ///
    /// Blocks only while the file queue is full. Failures, including an
    /// invalid path, are reported through the handle.
    pub fn read(
        &self,
        path: &str,
        heap: Arc<dyn Heap>,
        null_terminate: bool,
        use_compression: bool,
    ) -> WorkHandle {
        let (item, handle) = WorkItem::new(
            WorkOp::Read,
            path,
            heap,
            null_terminate,
            use_compression,
            Arc::clone(&self.stats),
        );
        self.submit(item, &self.file_queue);
        handle
    }

    /// Queues a write of the first `size` bytes of `buffer`.
    ///
    /// The buffer moves into the request and comes back through
    /// [`WorkHandle::take_buffer`] once it completes, successful or not.
    /// With `use_compression` the file receives a compressed frame.
    ///
    /// Blocks only while the first stage's queue is full. A `size` larger
    /// than the buffer fails with [`FsError::SizeOutOfBounds`].
    pub fn write(
        &self,
        path: &str,
        buffer: HeapBuffer,
        size: usize,
        use_compression: bool,
    ) -> WorkHandle {
        let (mut item, handle) = WorkItem::new(
            WorkOp::Write,
            path,
            Arc::clone(&self.heap),
            false,
            use_compression,
            Arc::clone(&self.stats),
        );
        let capacity = buffer.len();
        item.buffer = Some(buffer);
        item.size = size;

        if size > capacity {
            item.complete(Err(FsError::SizeOutOfBounds { size, capacity }));
            return handle;
        }

        let queue = if use_compression {
            &self.compress_queue
        } else {
            &self.file_queue
        };
        self.submit(item, queue);
        handle
    }

    /// Copies `data` into a buffer from the file system's heap and queues
    /// a write of it.
    pub fn write_bytes(&self, path: &str, data: &[u8], use_compression: bool) -> WorkHandle {
        match self.heap.alloc_copy(data, DEFAULT_ALIGNMENT) {
            Ok(buffer) => self.write(path, buffer, data.len(), use_compression),
            Err(e) => {
                let (item, handle) = WorkItem::new(
                    WorkOp::Write,
                    path,
                    Arc::clone(&self.heap),
                    false,
                    use_compression,
                    Arc::clone(&self.stats),
                );
                item.complete(Err(e.into()));
                handle
            }
        }
    }

    fn submit(&self, mut item: WorkItem, queue: &BoundedQueue<WorkItem>) {
        match storage::native_path(&item.path, self.config.max_path_len) {
            Ok(native) => item.native = native,
            Err(e) => return item.complete(Err(e)),
        }
        tracing::debug!(
            op = %item.op,
            path = %item.path,
            compressed = item.use_compression,
            "work item queued"
        );
        if let Err(item) = queue.push(item) {
            item.complete(Err(FsError::ShuttingDown));
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Returns the heap backing write-side allocations.
    #[must_use]
    pub fn heap(&self) -> &Arc<dyn Heap> {
        &self.heap
    }

    /// Returns the codec's name.
    #[must_use]
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Returns a snapshot of the pipeline counters.
    #[must_use]
    pub fn stats(&self) -> FsStatsSnapshot {
        self.stats.snapshot()
    }

    /// Drains every queued request, then stops the stage threads.
    ///
    /// Equivalent to dropping the file system.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if stop_workers(&mut self.workers) {
            let stats = self.stats.snapshot();
            tracing::info!(
                reads = stats.reads_completed,
                writes = stats.writes_completed,
                failures = stats.failures,
                "file system stopped"
            );
        }
    }
}

impl Drop for FileSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("config", &self.config)
            .field("codec", &self.codec.name())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

fn spawn_worker(
    config: &FsConfig,
    stage: Stage,
    queue: &Arc<BoundedQueue<WorkItem>>,
    body: impl FnOnce() + Send + 'static,
) -> FsResult<Worker> {
    let thread = thread::Builder::new()
        .name(format!("{}-{stage}", config.thread_name_prefix))
        .spawn(body)
        .map_err(|e| FsError::WorkerSpawn {
            stage: stage.name(),
            reason: e.to_string(),
        })?;
    Ok(Worker {
        stage,
        queue: Arc::clone(queue),
        thread: Some(thread),
    })
}

/// Closes and joins each worker in order. Returns true if any thread was
/// joined.
fn stop_workers(workers: &mut [Worker]) -> bool {
    let mut joined = false;
    for worker in workers {
        worker.queue.close();
        if let Some(thread) = worker.thread.take() {
            if thread.join().is_err() {
                tracing::error!(stage = %worker.stage, "stage thread panicked");
            }
            joined = true;
        }
    }
    joined
}
