//! # Payload Codecs
//!
//! The compression algorithm is pluggable; the pipeline only needs a bound,
//! a compressor and a decompressor. [`Lz4Codec`] produces raw LZ4 blocks,
//! the same bytes the reference LZ4 block compressor emits.

use crate::error::{FsError, FsResult};

/// Block codec used by the compress and decompress stages.
pub trait Codec: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Worst-case compressed size for `len` input bytes.
    fn compress_bound(&self, len: usize) -> usize;

    /// Largest output `compressed_len` bytes can legitimately expand to.
    ///
    /// Used to reject corrupt headers before allocating for them.
    fn decompress_bound(&self, compressed_len: usize) -> usize {
        let _ = compressed_len;
        usize::MAX
    }

    /// Compresses `src` into `dst`, returning the compressed length.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Codec`] if `dst` is too small.
    fn compress(&self, src: &[u8], dst: &mut [u8]) -> FsResult<usize>;

    /// Decompresses `src` into `dst`, returning the decompressed length.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Codec`] if `src` is malformed or does not fit.
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> FsResult<usize>;
}

/// Raw LZ4 block codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress_bound(&self, len: usize) -> usize {
        lz4_flex::block::get_maximum_output_size(len)
    }

    fn decompress_bound(&self, compressed_len: usize) -> usize {
        // A sequence can describe at most 255 output bytes per input byte.
        compressed_len.saturating_mul(255).saturating_add(64)
    }

    fn compress(&self, src: &[u8], dst: &mut [u8]) -> FsResult<usize> {
        lz4_flex::block::compress_into(src, dst).map_err(|e| FsError::Codec(e.to_string()))
    }

    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> FsResult<usize> {
        lz4_flex::block::decompress_into(src, dst).map_err(|e| FsError::Codec(e.to_string()))
    }
}
