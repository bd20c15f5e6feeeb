//! Storage configuration types.

use std::path::PathBuf;

use tgrelay_shared::StorageSettings;

/// Local storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for spools, retained uploads and session files.
    pub root: PathBuf,
    /// Maximum file size in bytes.
    pub max_file_size: u64,
    /// Maximum chunk size in bytes handed to the messaging client.
    pub chunk_size: u64,
}

impl StorageConfig {
    /// Default max file size: 2 GiB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;
    /// Default chunk size: 50 MiB.
    pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

    /// Directory holding in-flight spools.
    pub const SPOOL_DIR: &'static str = "tmp";
    /// Directory holding uploads retained with `keep=true`.
    pub const UPLOADS_DIR: &'static str = "uploads";
    /// Directory holding session artifacts.
    pub const SESSIONS_DIR: &'static str = "sessions";

    /// Create a new storage config with default limits.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set maximum file size.
    #[must_use]
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Set chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = size;
        self
    }
}

impl From<&StorageSettings> for StorageConfig {
    fn from(settings: &StorageSettings) -> Self {
        Self::new(settings.data_dir.clone())
            .with_max_file_size(settings.max_file_size)
            .with_chunk_size(settings.chunk_size)
    }
}
