//! Blob store abstraction trait
//!
//! This module defines the contract of the external blob store: write a byte
//! stream under a key, read it back as a stream, delete it, and expose the
//! base URL used to build the locators persisted on documents.

use crate::keys;
use crate::FileStoreKind;
use async_trait::async_trait;
use mediacouch_core::{AppError, ByteStream};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Blob {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidArgument(msg),
            StorageError::ConfigError(msg) => AppError::Config(msg),
            other => AppError::Backend(other.to_string()),
        }
    }
}

/// Outcome of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobWritten {
    /// Key the bytes were stored under.
    pub name: String,
    pub size: u64,
}

/// External blob store trait
///
/// Implemented by the S3 and local filesystem backends. The repository selects
/// one at construction time; documents then reference blobs through
/// `<storage-url>/<key>` locators.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Consume `body` until it ends and store it under `key`.
    ///
    /// Nothing is reported as written unless the whole stream was stored.
    async fn write(
        &self,
        key: &str,
        content_type: &str,
        body: ByteStream,
    ) -> StorageResult<BlobWritten>;

    /// Stream the bytes stored under `key`.
    async fn read(&self, key: &str) -> StorageResult<ByteStream>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Base URL under which locators are built.
    fn storage_url(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> FileStoreKind;

    /// Locator persisted on documents for `key`.
    fn locator(&self, key: &str) -> String {
        keys::locator_for(self.storage_url(), key)
    }

    /// Key behind `locator`, when the locator points into this store.
    fn key_for_locator(&self, locator: &str) -> Option<String> {
        keys::key_from_locator(self.storage_url(), locator)
    }
}
