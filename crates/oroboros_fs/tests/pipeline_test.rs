//! # Pipeline Tests
//!
//! End-to-end tests of the staged file system against real files:
//! round trips with and without compression, failure reporting, buffer
//! ownership, and shutdown draining.
//!
//! Run with: cargo test --package oroboros_fs --test pipeline_test

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use oroboros_core::{Heap, TrackingHeap, DEFAULT_ALIGNMENT};
use oroboros_fs::{
    Codec, FileSystem, FrameHeader, FsConfig, FsError, Lz4Codec, WorkOp, FRAME_HEADER_LEN,
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// HELPERS
// ============================================================================

fn temp_dir(tag: &str) -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("oroboros_fs_{tag}_{id}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn path_in(dir: &std::path::Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

fn setup(tag: &str) -> (PathBuf, Arc<TrackingHeap>, Arc<dyn Heap>, FileSystem) {
    setup_with(tag, FsConfig::default())
}

fn setup_with(
    tag: &str,
    config: FsConfig,
) -> (PathBuf, Arc<TrackingHeap>, Arc<dyn Heap>, FileSystem) {
    let dir = temp_dir(tag);
    let tracking = Arc::new(TrackingHeap::new(tag));
    let heap: Arc<dyn Heap> = Arc::clone(&tracking) as Arc<dyn Heap>;
    let fs = FileSystem::new(Arc::clone(&heap), config).unwrap();
    (dir, tracking, heap, fs)
}

fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

fn assert_no_leaks(tracking: &TrackingHeap) {
    let leaks = tracking.leaks();
    assert!(leaks.is_empty(), "{} allocations leaked", leaks.len());
}

// ============================================================================
// ROUND TRIPS
// ============================================================================

#[test]
fn plain_write_then_read() {
    let (dir, tracking, heap, fs) = setup("plain");
    let path = path_in(&dir, "hello.txt");

    let data = heap.alloc_copy(b"hello world", DEFAULT_ALIGNMENT).unwrap();
    let mut write = fs.write(&path, data, 11, false);
    assert_eq!(write.op(), WorkOp::Write);
    assert_eq!(write.result_code(), 0);
    assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

    let mut read = fs.read(&path, Arc::clone(&heap), true, false);
    assert_eq!(read.result(), Ok(()));
    assert_eq!(read.size(), 11);
    assert_eq!(read.buffer(), Some(&b"hello world\0"[..]));

    drop((write, read));
    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn compressed_write_then_read() {
    let (dir, tracking, heap, fs) = setup("compressed");
    let path = path_in(&dir, "level.bin");
    let payload = b"the quick brown fox ".repeat(50);

    let mut write = fs.write_bytes(&path, &payload, true);
    assert_eq!(write.result(), Ok(()));

    // On disk: header, then a payload much smaller than the input.
    let raw = std::fs::read(&path).unwrap();
    let mut header_bytes = [0u8; FRAME_HEADER_LEN];
    header_bytes.copy_from_slice(&raw[..FRAME_HEADER_LEN]);
    let header = FrameHeader::decode(&header_bytes);
    assert_eq!(header.decompressed_size as usize, payload.len());
    assert_eq!(raw.len(), FRAME_HEADER_LEN + header.compressed_size as usize);
    assert!(raw.len() < payload.len());

    let mut read = fs.read(&path, Arc::clone(&heap), false, true);
    assert_eq!(read.result(), Ok(()));
    assert_eq!(read.size(), payload.len());
    assert_eq!(read.buffer(), Some(payload.as_slice()));

    drop((write, read));
    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn compressed_read_with_terminator() {
    let (dir, _tracking, heap, fs) = setup("compressed_nt");
    let path = path_in(&dir, "script.lua");
    let source = b"print('oroboros')\n".repeat(10);

    fs.write_bytes(&path, &source, true).result().unwrap();

    let mut read = fs.read(&path, heap, true, true);
    assert_eq!(read.result(), Ok(()));
    assert_eq!(read.size(), source.len());
    let buffer = read.buffer().unwrap();
    assert_eq!(&buffer[..source.len()], source.as_slice());
    assert_eq!(buffer[source.len()], 0);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn random_data_roundtrips_both_ways() {
    let (dir, tracking, heap, fs) = setup("random");

    for (i, len) in [1usize, 17, 4096, 200_000].into_iter().enumerate() {
        let data = random_bytes(i as u64, len);
        for compressed in [false, true] {
            let path = path_in(&dir, &format!("r{i}_{compressed}.bin"));
            fs.write_bytes(&path, &data, compressed).result().unwrap();
            let buffer = fs
                .read(&path, Arc::clone(&heap), false, compressed)
                .into_buffer()
                .unwrap();
            assert_eq!(buffer.as_slice(), data.as_slice(), "len {len} compressed {compressed}");
        }
    }

    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn empty_file_roundtrip() {
    let (dir, _tracking, heap, fs) = setup("empty");
    let path = path_in(&dir, "empty.bin");

    fs.write_bytes(&path, &[], false).result().unwrap();

    let mut read = fs.read(&path, Arc::clone(&heap), true, false);
    assert_eq!(read.result(), Ok(()));
    assert_eq!(read.size(), 0);
    assert_eq!(read.buffer(), Some(&[0u8][..]));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn uncompressed_read_of_compressed_file_returns_frame() {
    let (dir, _tracking, heap, fs) = setup("raw_frame");
    let path = path_in(&dir, "framed.bin");
    let payload = vec![3u8; 1000];

    fs.write_bytes(&path, &payload, true).result().unwrap();

    let mut read = fs.read(&path, heap, false, false);
    assert_eq!(read.result(), Ok(()));
    let raw = read.buffer().unwrap();
    assert_eq!(&raw[4..8], &1000u32.to_le_bytes());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn compressed_read_allocates_only_from_the_read_heap() {
    let (dir, fs_heap, _heap, fs) = setup("read_heap");
    let path = path_in(&dir, "asset.bin");
    let payload = b"mesh ".repeat(1000);
    fs.write_bytes(&path, &payload, true).result().unwrap();
    let fs_allocations = fs_heap.stats().total_allocations;

    let read_tracking = Arc::new(TrackingHeap::new("reader"));
    let read_heap: Arc<dyn Heap> = Arc::clone(&read_tracking) as Arc<dyn Heap>;
    let buffer = fs.read(&path, read_heap, false, true).into_buffer().unwrap();
    assert_eq!(buffer.as_slice(), payload.as_slice());

    // Scratch and result both came from the read heap; only the result is live.
    let stats = read_tracking.stats();
    assert_eq!(stats.total_allocations, 2);
    assert_eq!(stats.live_allocations, 1);
    assert_eq!(fs_heap.stats().total_allocations, fs_allocations);

    drop(buffer);
    assert_no_leaks(&read_tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reads_frames_built_outside_the_pipeline() {
    let (dir, _tracking, heap, fs) = setup("external_frame");
    let path = path_in(&dir, "external.bin");
    let payload = b"asset bytes ".repeat(64);

    let codec = Lz4Codec;
    let mut compressed = vec![0u8; codec.compress_bound(payload.len())];
    let n = codec.compress(&payload, &mut compressed).unwrap();
    let mut file = FrameHeader::new(n, payload.len()).unwrap().encode().to_vec();
    file.extend_from_slice(&compressed[..n]);
    std::fs::write(&path, &file).unwrap();

    let buffer = fs.read(&path, heap, false, true).into_buffer().unwrap();
    assert_eq!(buffer.as_slice(), payload.as_slice());
    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn missing_file_fails_with_storage_code() {
    let (dir, tracking, heap, fs) = setup("missing");
    let path = path_in(&dir, "nope.bin");

    for compressed in [false, true] {
        let mut read = fs.read(&path, Arc::clone(&heap), false, compressed);
        read.wait();
        assert!(read.is_done());
        assert_ne!(read.result_code(), 0);
        assert!(matches!(read.result(), Err(FsError::Storage { .. })));
        assert!(read.buffer().is_none());
    }

    assert_eq!(fs.stats().failures, 2);
    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn write_into_missing_directory_returns_buffer() {
    let (dir, tracking, heap, fs) = setup("missing_dir");
    let path = path_in(&dir.join("no_such_dir"), "out.bin");

    for compressed in [false, true] {
        let data = heap.alloc_copy(b"keep me", DEFAULT_ALIGNMENT).unwrap();
        let mut write = fs.write(&path, data, 7, compressed);
        assert!(matches!(write.result(), Err(FsError::Storage { .. })));
        let buffer = write.take_buffer().unwrap();
        assert_eq!(buffer.as_slice(), b"keep me");
        heap.free(buffer);
    }

    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn header_larger_than_file_is_corrupt() {
    let (dir, tracking, heap, fs) = setup("corrupt_header");
    let path = path_in(&dir, "liar.bin");
    let mut file = FrameHeader::new(1_000_000, 4_000_000).unwrap().encode().to_vec();
    file.extend_from_slice(&[0u8; 16]);
    std::fs::write(&path, &file).unwrap();

    let mut read = fs.read(&path, Arc::clone(&heap), false, true);
    assert!(matches!(read.result(), Err(FsError::CorruptFrame { .. })));
    assert!(read.buffer().is_none());

    drop(read);
    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn file_shorter_than_header_is_corrupt() {
    let (dir, _tracking, heap, fs) = setup("short");
    let path = path_in(&dir, "short.bin");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();

    let mut read = fs.read(&path, heap, false, true);
    assert!(matches!(read.result(), Err(FsError::CorruptFrame { .. })));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn implausible_expansion_is_corrupt() {
    let (dir, _tracking, heap, fs) = setup("bomb");
    let path = path_in(&dir, "bomb.bin");
    let mut file = FrameHeader::new(4, u32::MAX as usize).unwrap().encode().to_vec();
    file.extend_from_slice(&[0u8; 4]);
    std::fs::write(&path, &file).unwrap();

    let mut read = fs.read(&path, heap, false, true);
    assert!(matches!(read.result(), Err(FsError::CorruptFrame { .. })));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn garbage_payload_fails_in_decompress() {
    let (dir, tracking, heap, fs) = setup("garbage");
    let path = path_in(&dir, "garbage.bin");
    let mut file = FrameHeader::new(4, 64).unwrap().encode().to_vec();
    file.extend_from_slice(&[0xF0, 0xFF, 0xFF, 0xFF]);
    std::fs::write(&path, &file).unwrap();

    let mut read = fs.read(&path, Arc::clone(&heap), false, true);
    assert!(matches!(read.result(), Err(FsError::Codec(_))));
    assert!(read.buffer().is_none());

    drop(read);
    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn oversized_write_is_rejected() {
    let (dir, _tracking, heap, fs) = setup("oversize");
    let path = path_in(&dir, "big.bin");

    let data = heap.alloc(4, DEFAULT_ALIGNMENT).unwrap();
    let mut write = fs.write(&path, data, 5, false);
    assert!(write.is_done());
    assert_eq!(
        write.result(),
        Err(FsError::SizeOutOfBounds { size: 5, capacity: 4 })
    );
    assert!(write.take_buffer().is_some());
    assert!(!std::path::Path::new(&path).exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn nul_thread_prefix_fails_construction() {
    let heap: Arc<dyn Heap> = Arc::new(TrackingHeap::new("prefix"));
    let config = FsConfig::default().with_thread_name_prefix("io\0fs");
    assert!(matches!(
        FileSystem::new(heap, config),
        Err(FsError::InvalidConfig(_))
    ));
}

#[test]
fn invalid_paths_fail_with_encoding() {
    let config = FsConfig::default().with_max_path_len(32);
    let (dir, tracking, heap, fs) = setup_with("encoding", config);

    let long = "x".repeat(33);
    for path in ["", "bad\0name", long.as_str()] {
        let mut read = fs.read(path, Arc::clone(&heap), false, false);
        assert!(read.is_done());
        assert!(matches!(read.result(), Err(FsError::Encoding { .. })));
        assert_eq!(read.result_code(), -1);
    }

    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// CONCURRENCY AND SHUTDOWN
// ============================================================================

#[test]
fn shutdown_completes_everything_queued() {
    let config = FsConfig::default().with_queue_capacity(2);
    let (dir, tracking, heap, fs) = setup_with("drain", config);

    let mut handles = Vec::new();
    for i in 0..32u64 {
        let path = path_in(&dir, &format!("d{i}.bin"));
        let data = random_bytes(i, 2048);
        handles.push(fs.write_bytes(&path, &data, i % 2 == 0));
    }
    fs.shutdown();

    for handle in &mut handles {
        assert!(handle.is_done(), "{} not done after shutdown", handle.path());
        assert_eq!(handle.result(), Ok(()));
    }
    drop(handles);
    drop(heap);
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn shutdown_drains_compressed_reads_through_decompress() {
    let config = FsConfig::default().with_queue_capacity(1);
    let (dir, tracking, heap, fs) = setup_with("drain_reads", config);
    let payload = b"terrain tile ".repeat(4000);

    let paths: Vec<String> = (0..8)
        .map(|i| path_in(&dir, &format!("tile{i}.bin")))
        .collect();
    for path in &paths {
        fs.write_bytes(path, &payload, true).result().unwrap();
    }

    let mut handles: Vec<_> = paths
        .iter()
        .cycle()
        .take(16)
        .map(|path| fs.read(path, Arc::clone(&heap), true, true))
        .collect();
    fs.shutdown();

    for handle in &mut handles {
        assert!(handle.is_done(), "{} not done after shutdown", handle.path());
        assert_eq!(handle.result(), Ok(()));
        assert_eq!(handle.size(), payload.len());
        let buffer = handle.buffer().unwrap();
        assert_eq!(buffer.len(), payload.len() + 1);
        assert_eq!(&buffer[..payload.len()], payload.as_slice());
        assert_eq!(buffer[payload.len()], 0);
    }
    drop(handles);
    drop(heap);
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn concurrent_callers_share_one_pipeline() {
    let config = FsConfig::default().with_queue_capacity(1);
    let (dir, tracking, heap, fs) = setup_with("concurrent", config);

    thread::scope(|scope| {
        for t in 0..4u64 {
            let fs = &fs;
            let dir = &dir;
            let heap = Arc::clone(&heap);
            scope.spawn(move || {
                for i in 0..16u64 {
                    let path = path_in(dir, &format!("t{t}_{i}.bin"));
                    let data = random_bytes(t * 100 + i, 1024 + i as usize * 37);
                    let compressed = (t + i) % 2 == 0;
                    fs.write_bytes(&path, &data, compressed).result().unwrap();
                    let buffer = fs
                        .read(&path, Arc::clone(&heap), false, compressed)
                        .into_buffer()
                        .unwrap();
                    assert_eq!(buffer.as_slice(), data.as_slice());
                }
            });
        }
    });

    let stats = fs.stats();
    assert_eq!(stats.writes_completed, 64);
    assert_eq!(stats.reads_completed, 64);
    assert_eq!(stats.failures, 0);

    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn dropped_handles_release_their_buffers() {
    let (dir, tracking, heap, fs) = setup("abandoned");
    let path = path_in(&dir, "a.bin");
    fs.write_bytes(&path, &random_bytes(7, 10_000), true)
        .result()
        .unwrap();

    for _ in 0..8 {
        drop(fs.read(&path, Arc::clone(&heap), false, true));
    }
    fs.shutdown();
    assert_no_leaks(&tracking);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn sync_writes_still_roundtrip() {
    let config = FsConfig::default().with_sync_writes(true);
    let (dir, _tracking, heap, fs) = setup_with("sync", config);
    let path = path_in(&dir, "synced.bin");

    fs.write_bytes(&path, b"durable", false).result().unwrap();
    let buffer = fs.read(&path, heap, false, false).into_buffer().unwrap();
    assert_eq!(buffer.as_slice(), b"durable");
    std::fs::remove_dir_all(&dir).ok();
}
