//! File system configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::{FsError, FsResult};

/// Configuration for a [`FileSystem`](crate::FileSystem).
///
/// Loaded once at startup, usually from TOML:
///
/// ```toml
/// queue_capacity = 16
/// max_path_len = 1024
/// sync_writes = false
/// thread_name_prefix = "oroboros-fs"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    /// Capacity of each stage queue.
    pub queue_capacity: usize,
    /// Longest accepted path, in UTF-8 bytes.
    pub max_path_len: usize,
    /// Sync each written file to disk before completing.
    pub sync_writes: bool,
    /// Prefix for stage thread names.
    pub thread_name_prefix: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8,
            max_path_len: 1024,
            sync_writes: false,
            thread_name_prefix: "oroboros-fs".to_string(),
        }
    }
}

impl FsConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidConfig`] if the document does not parse or
    /// fails validation.
    pub fn from_toml_str(source: &str) -> FsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| FsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidConfig`] if the file cannot be read, parsed
    /// or validated.
    pub fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            FsError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks the configuration for values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidConfig`] describing the first bad value.
    pub fn validate(&self) -> FsResult<()> {
        if self.queue_capacity == 0 {
            return Err(FsError::InvalidConfig(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_path_len == 0 {
            return Err(FsError::InvalidConfig(
                "max_path_len must be greater than zero".to_string(),
            ));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(FsError::InvalidConfig(
                "thread_name_prefix must not contain a NUL byte".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the path length bound.
    #[must_use]
    pub fn with_max_path_len(mut self, len: usize) -> Self {
        self.max_path_len = len;
        self
    }

    /// Enables or disables syncing writes.
    #[must_use]
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Sets the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}
