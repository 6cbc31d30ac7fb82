//! Storage layer helpers: path translation and file access.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{FsError, FsResult};

/// Translates a UTF-8 request path into a native path.
///
/// Rejects paths the platform cannot represent or that exceed `max_len`
/// bytes.
pub(crate) fn native_path(path: &str, max_len: usize) -> FsResult<PathBuf> {
    let reject = |reason: String| FsError::Encoding {
        path: path.to_string(),
        reason,
    };

    if path.is_empty() {
        return Err(reject("path is empty".to_string()));
    }
    if path.len() > max_len {
        return Err(reject(format!(
            "path is {} bytes, limit is {max_len}",
            path.len()
        )));
    }
    if path.contains('\0') {
        return Err(reject("path contains a NUL byte".to_string()));
    }
    Ok(PathBuf::from(path))
}

/// Opens an existing file for reading.
pub(crate) fn open_read(native: &Path, path: &str) -> FsResult<File> {
    File::open(native).map_err(|e| FsError::storage(path, &e))
}

/// Creates a file for writing, truncating any existing contents.
pub(crate) fn open_write(native: &Path, path: &str) -> FsResult<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(native)
        .map_err(|e| FsError::storage(path, &e))
}

/// Returns the length of an open file.
pub(crate) fn file_len(file: &File, path: &str) -> FsResult<u64> {
    file.metadata()
        .map(|m| m.len())
        .map_err(|e| FsError::storage(path, &e))
}

/// Reads until `buf` is full or the file ends. Returns the bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_path_accepts_utf8() {
        let native = native_path("assets/ŝejdo/.bin", 1024).unwrap();
        assert_eq!(native, PathBuf::from("assets/ŝejdo/.bin"));
    }

    #[test]
    fn test_native_path_rejections() {
        assert!(matches!(native_path("", 16), Err(FsError::Encoding { .. })));
        assert!(matches!(native_path("a\0b", 16), Err(FsError::Encoding { .. })));
        assert!(matches!(
            native_path(&"x".repeat(17), 16),
            Err(FsError::Encoding { .. })
        ));
        assert!(native_path(&"x".repeat(16), 16).is_ok());
    }

    #[test]
    fn test_read_full_stops_at_eof() {
        let data = [1u8, 2, 3];
        let mut buf = [0u8; 8];
        let n = read_full(&mut data.as_slice(), &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], &data);
    }
}
