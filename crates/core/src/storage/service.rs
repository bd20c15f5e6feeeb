//! Local storage implementation using Apache OpenDAL.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use opendal::{ErrorKind, Operator, Writer, services};
use tracing::{debug, warn};
use uuid::Uuid;

use super::chunk::ChunkSource;
use super::config::StorageConfig;
use super::error::StorageError;

/// Local storage for spooled uploads, retained uploads and session files.
pub struct LocalStore {
    operator: Operator,
    config: StorageConfig,
    root: PathBuf,
}

impl LocalStore {
    /// Create a local store from configuration, creating the root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or the operator cannot
    /// be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.root).map_err(|e| {
            StorageError::configuration(format!(
                "cannot create storage root {}: {e}",
                config.root.display()
            ))
        })?;
        let root = std::fs::canonicalize(&config.root)?;
        let operator = Self::create_operator(&root)?;
        Ok(Self {
            operator,
            config,
            root,
        })
    }

    /// Create OpenDAL operator rooted at `root`.
    fn create_operator(root: &Path) -> Result<Operator, StorageError> {
        let builder = services::Fs::default().root(
            root.to_str()
                .ok_or_else(|| StorageError::configuration("invalid path"))?,
        );

        Ok(Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish())
    }

    /// Reject sizes above the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns `FileTooLarge` if `size` exceeds the limit.
    pub fn validate_size(&self, size: u64) -> Result<(), StorageError> {
        if size > self.config.max_file_size {
            return Err(StorageError::file_too_large(
                size,
                self.config.max_file_size,
            ));
        }
        Ok(())
    }

    /// Open a spool for an incoming upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the spool file cannot be created.
    pub async fn begin_spool(&self, filename: &str) -> Result<SpoolWriter, StorageError> {
        let id = Uuid::new_v4();
        let key = format!("{}/{id}", StorageConfig::SPOOL_DIR);
        let writer = self.operator.writer(&key).await?;
        debug!(spool = %key, filename, "Spool opened");

        Ok(SpoolWriter {
            operator: self.operator.clone(),
            writer: Some(writer),
            guard: SpoolGuard::new(self.local_path(&key)),
            id,
            key,
            filename: filename.to_string(),
            written: 0,
            max: self.config.max_file_size,
        })
    }

    /// Move a spooled upload into the retained uploads directory.
    ///
    /// Returns the absolute path of the retained file.
    ///
    /// # Errors
    ///
    /// Returns an error if the move fails. The spool is then removed on drop.
    pub async fn retain(&self, mut upload: SpooledUpload) -> Result<PathBuf, StorageError> {
        let dir = format!("{}/{}/", StorageConfig::UPLOADS_DIR, upload.id);
        let key = format!("{dir}{}", storage_filename(&upload.filename));

        self.operator.create_dir(&dir).await?;
        self.operator.rename(&upload.key, &key).await?;
        upload.guard.disarm();

        let path = self.local_path(&key);
        debug!(path = %path.display(), "Upload retained");
        Ok(path)
    }

    /// Delete a spooled upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails. The spool is then removed on drop.
    pub async fn discard(&self, mut upload: SpooledUpload) -> Result<(), StorageError> {
        self.operator.delete(&upload.key).await?;
        upload.guard.disarm();
        debug!(spool = %upload.key, "Spool discarded");
        Ok(())
    }

    /// Read a small file, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than not-found.
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.operator.read(key).await {
            Ok(buffer) => Ok(Some(buffer.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a small file, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write(&self, key: &str, content: Vec<u8>) -> Result<(), StorageError> {
        self.operator.write(key, content).await?;
        Ok(())
    }

    /// Check if a file exists in storage.
    pub async fn exists(&self, key: &str) -> bool {
        match self.operator.stat(key).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(key, error = %e, "Failed to stat storage key");
                false
            }
        }
    }

    /// Absolute filesystem path for a storage key.
    #[must_use]
    pub fn local_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Absolute storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

/// Removes a spool file on drop unless disarmed.
#[derive(Debug)]
struct SpoolGuard {
    path: PathBuf,
    armed: bool,
}

impl SpoolGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SpoolGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Abandoned spool removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove spool"),
        }
    }
}

/// Incremental writer for an incoming upload.
///
/// The running total is checked on every write, so an oversized upload is
/// rejected as soon as it crosses the limit.
pub struct SpoolWriter {
    operator: Operator,
    writer: Option<Writer>,
    guard: SpoolGuard,
    id: Uuid,
    key: String,
    filename: String,
    written: u64,
    max: u64,
}

impl SpoolWriter {
    /// Append a chunk.
    ///
    /// # Errors
    ///
    /// Returns `FileTooLarge` once the total exceeds the limit (the spool is
    /// deleted), or an operation error if the write fails.
    pub async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        self.written += chunk.len() as u64;
        if self.written > self.max {
            let size = self.written;
            self.abort().await;
            return Err(StorageError::file_too_large(size, self.max));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StorageError::operation("spool already closed"))?;
        writer.write(chunk).await?;
        Ok(())
    }

    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Close the spool and hand it over for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the spool cannot be flushed.
    pub async fn finish(mut self) -> Result<SpooledUpload, StorageError> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| StorageError::operation("spool already closed"))?;
        writer.close().await?;

        Ok(SpooledUpload {
            id: self.id,
            key: self.key,
            filename: self.filename,
            size: self.written,
            guard: self.guard,
        })
    }

    /// Abandon the spool and delete whatever was written.
    pub async fn abort(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                debug!(spool = %self.key, error = %e, "Spool writer abort failed");
            }
        }
        match self.operator.delete(&self.key).await {
            Ok(()) => self.guard.disarm(),
            Err(e) => warn!(spool = %self.key, error = %e, "Failed to delete aborted spool"),
        }
    }
}

/// A fully received upload waiting for delivery.
///
/// Dropping it without [`LocalStore::retain`] or [`LocalStore::discard`]
/// removes the spool file.
#[derive(Debug)]
pub struct SpooledUpload {
    id: Uuid,
    key: String,
    filename: String,
    size: u64,
    guard: SpoolGuard,
}

impl SpooledUpload {
    /// Filename supplied by the client.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Filesystem path of the spool.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    /// Chunked view of the spool content.
    #[must_use]
    pub fn chunks(&self, chunk_size: u64) -> ChunkSource {
        ChunkSource::new(self.guard.path.clone(), chunk_size, self.size)
    }
}

/// Sanitize filename for storage key.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
/// Leading dots are replaced so the result never names a hidden file.
fn storage_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || (c == '.' && i > 0) {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '_') {
        "upload.bin".to_string()
    } else {
        sanitized
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // Sanitized filenames only contain safe characters and never start with a dot.
    proptest! {
        #[test]
        fn prop_storage_filename_safe_chars(filename in ".*") {
            let sanitized = storage_filename(&filename);

            prop_assert!(!sanitized.is_empty());
            prop_assert!(!sanitized.starts_with('.'));
            for c in sanitized.chars() {
                let is_safe = c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_';
                prop_assert!(is_safe, "Unexpected character in sanitized filename: {}", c);
            }
        }
    }

    // Any size above the limit is rejected; any size at or below it passes.
    proptest! {
        #[test]
        fn prop_file_size_validation(
            max_size in 1024u64..10_000_000,
            file_size in 0u64..20_000_000,
        ) {
            let dir = tempfile::tempdir().expect("temp dir");
            let config = StorageConfig::new(dir.path()).with_max_file_size(max_size);
            let store = LocalStore::from_config(config).expect("should create store");

            let result = store.validate_size(file_size);

            if file_size <= max_size {
                prop_assert!(result.is_ok(), "Expected Ok for valid file size");
            } else {
                let is_too_large = matches!(result, Err(StorageError::FileTooLarge { .. }));
                prop_assert!(is_too_large, "Expected FileTooLarge error");
            }
        }
    }
}
