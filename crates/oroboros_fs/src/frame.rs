//! # Compressed File Framing
//!
//! Byte layout of every compressed file:
//!
//! ```text
//! offset 0  [compressed_size   : u32 LE]
//! offset 4  [decompressed_size : u32 LE]
//! offset 8  [payload           : compressed_size bytes]
//! ```
//!
//! Written only by compressed writes and read only by compressed reads.
//! The layout is fixed; files written by any version must read back.

use std::io::{self, Read, Write};

use crate::error::{FsError, FsResult};

/// Size of the frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 8;

/// The dual-length header that prefixes a compressed payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length on disk.
    pub compressed_size: u32,
    /// Length after decompression.
    pub decompressed_size: u32,
}

impl FrameHeader {
    /// Builds a header, checking both sizes fit in 32 bits.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::FrameTooLarge`] for the first size that does not fit.
    pub fn new(compressed_size: usize, decompressed_size: usize) -> FsResult<Self> {
        let to_u32 =
            |size: usize| u32::try_from(size).map_err(|_| FsError::FrameTooLarge { size });
        Ok(Self {
            compressed_size: to_u32(compressed_size)?,
            decompressed_size: to_u32(decompressed_size)?,
        })
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_HEADER_LEN] {
        let mut bytes = [0u8; FRAME_HEADER_LEN];
        bytes[..4].copy_from_slice(&self.compressed_size.to_le_bytes());
        bytes[4..].copy_from_slice(&self.decompressed_size.to_le_bytes());
        bytes
    }

    /// Deserializes a header.
    #[must_use]
    pub fn decode(bytes: &[u8; FRAME_HEADER_LEN]) -> Self {
        Self {
            compressed_size: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            decompressed_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    /// Reads a header from the start of `reader`.
    ///
    /// # Errors
    ///
    /// Returns the reader's error, or `UnexpectedEof` if fewer than
    /// [`FRAME_HEADER_LEN`] bytes are available.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = [0u8; FRAME_HEADER_LEN];
        reader.read_exact(&mut bytes)?;
        Ok(Self::decode(&bytes))
    }

    /// Writes the header to `writer`.
    ///
    /// # Errors
    ///
    /// Returns the writer's error.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode())
    }

    /// Total file length this frame occupies.
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        FRAME_HEADER_LEN as u64 + u64::from(self.compressed_size)
    }

    /// Checks the header against the length of the file it came from.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::CorruptFrame`] if the file is too short to hold the
    /// declared payload.
    pub fn check_file_len(&self, path: &str, file_len: u64) -> FsResult<()> {
        if file_len < self.frame_len() {
            return Err(FsError::corrupt(
                path,
                format!(
                    "header declares {} payload bytes but file holds {}",
                    self.compressed_size,
                    file_len.saturating_sub(FRAME_HEADER_LEN as u64)
                ),
            ));
        }
        Ok(())
    }
}
