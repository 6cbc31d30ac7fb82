//! # File System Round Trip
//!
//! Writes a batch of files through the pipeline, reads them back and checks
//! every byte. Exits nonzero on any mismatch, failure or leak.
//!
//! Run with: cargo run --release --bin fs_roundtrip -- --files 64 --compress
//!
//! Set `RUST_LOG=oroboros_fs=debug` to trace individual work items.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use oroboros_core::{Heap, TrackingHeap};
use oroboros_fs::{FileSystem, FsConfig, WorkHandle};
use tracing_subscriber::EnvFilter;

struct Args {
    dir: PathBuf,
    files: usize,
    size: usize,
    compress: bool,
    config: Option<PathBuf>,
}

fn print_usage() {
    println!("Usage: fs_roundtrip [options]");
    println!();
    println!("Options:");
    println!("  --dir <path>      Directory for the test files (default: system temp)");
    println!("  --files <n>       Number of files (default: 16)");
    println!("  --size <bytes>    Bytes per file (default: 65536)");
    println!("  --compress        Write and read compressed frames");
    println!("  --config <path>   Load file system settings from TOML");
    println!("  --help            Show this message");
}

fn parse_args() -> Result<Option<Args>, String> {
    let mut args = Args {
        dir: std::env::temp_dir().join("oroboros_fs_roundtrip"),
        files: 16,
        size: 64 * 1024,
        compress: false,
        config: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| format!("{arg} needs a value"));
        match arg.as_str() {
            "--dir" => args.dir = PathBuf::from(value()?),
            "--files" => args.files = value()?.parse().map_err(|e| format!("--files: {e}"))?,
            "--size" => args.size = value()?.parse().map_err(|e| format!("--size: {e}"))?,
            "--config" => args.config = Some(PathBuf::from(value()?)),
            "--compress" => args.compress = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Some(args))
}

/// Deterministic file contents: a repeating record with the file index and
/// offset mixed in, so compression has something to find.
fn file_contents(index: usize, size: usize) -> Vec<u8> {
    let record = format!("chunk {index:04} ");
    (0..size)
        .map(|i| {
            let base = record.as_bytes()[i % record.len()];
            if i % 61 == 0 {
                base ^ (i / 61).to_le_bytes()[0]
            } else {
                base
            }
        })
        .collect()
}

fn run(args: &Args) -> Result<(), String> {
    let config = match &args.config {
        Some(path) => FsConfig::load(path).map_err(|e| e.to_string())?,
        None => FsConfig::default(),
    };
    std::fs::create_dir_all(&args.dir)
        .map_err(|e| format!("cannot create {}: {e}", args.dir.display()))?;

    let tracking = Arc::new(TrackingHeap::new("roundtrip"));
    let heap: Arc<dyn Heap> = Arc::clone(&tracking) as Arc<dyn Heap>;
    let fs = FileSystem::new(Arc::clone(&heap), config).map_err(|e| e.to_string())?;

    let paths: Vec<String> = (0..args.files)
        .map(|i| args.dir.join(format!("file_{i:04}.bin")).display().to_string())
        .collect();

    println!(
        "Writing {} files of {} bytes (compression: {})",
        args.files,
        args.size,
        if args.compress { fs.codec_name() } else { "off" }
    );

    let start = Instant::now();
    let mut writes: Vec<WorkHandle> = paths
        .iter()
        .enumerate()
        .map(|(i, path)| fs.write_bytes(path, &file_contents(i, args.size), args.compress))
        .collect();
    let mut failures = 0usize;
    for handle in &mut writes {
        if let Err(e) = handle.result() {
            println!("  ✗ write {}: {e}", handle.path());
            failures += 1;
        }
    }
    let write_time = start.elapsed();
    drop(writes);

    let start = Instant::now();
    let mut reads: Vec<WorkHandle> = paths
        .iter()
        .map(|path| fs.read(path, Arc::clone(&heap), false, args.compress))
        .collect();
    for (i, handle) in reads.iter_mut().enumerate() {
        let expected = file_contents(i, args.size);
        match handle.result() {
            Ok(()) if handle.buffer() == Some(expected.as_slice()) => {}
            Ok(()) => {
                println!("  ✗ read {}: contents differ", handle.path());
                failures += 1;
            }
            Err(e) => {
                println!("  ✗ read {}: {e}", handle.path());
                failures += 1;
            }
        }
    }
    let read_time = start.elapsed();
    drop(reads);

    let stats = fs.stats();
    fs.shutdown();

    println!();
    println!("┌─ ROUND TRIP ─────────────────────────────────────────────────────┐");
    println!("│ Writes:             {} in {:?}", stats.writes_completed, write_time);
    println!("│ Reads:              {} in {:?}", stats.reads_completed, read_time);
    println!("│ Failures:           {}", stats.failures);
    println!("│ Bytes written:      {}", stats.bytes_written);
    println!("│ Bytes read:         {}", stats.bytes_read);
    if args.compress && stats.bytes_compressed > 0 {
        let payload = stats.bytes_written.saturating_sub(8 * stats.writes_completed);
        #[allow(clippy::cast_precision_loss)]
        let ratio = payload as f64 / stats.bytes_compressed as f64;
        println!("│ Compression ratio:  {:.1}%", ratio * 100.0);
    }
    println!("└──────────────────────────────────────────────────────────────────┘");

    let leaks = tracking.leaks();
    if !leaks.is_empty() {
        return Err(format!("{} allocations leaked", leaks.len()));
    }
    if failures > 0 {
        return Err(format!("{failures} requests failed"));
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         OROBOROS FILE SYSTEM ROUND TRIP                          ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            println!("Error: {e}");
            println!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => {
            println!();
            println!("✓ All files round-tripped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!();
            println!("✗ {e}");
            ExitCode::FAILURE
        }
    }
}
