use crate::keys;
use crate::traits::{BlobStore, BlobWritten, StorageError, StorageResult};
use crate::FileStoreKind;
use async_trait::async_trait;
use futures::StreamExt;
use mediacouch_core::ByteStream;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem blob store
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for blob storage (e.g., "/var/lib/mediacouch/blobs")
    /// * `base_url` - Base URL the blobs are served under (e.g., "http://localhost:8080/blobs")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert a key to a filesystem path below the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        keys::validate_key(key)?;

        let path = self.base_path.join(key);
        if path.parent() != Some(self.base_path.as_path()) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".partial");
        PathBuf::from(name)
    }

    async fn write_to(&self, path: &Path, mut body: ByteStream) -> StorageResult<u64> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
            })?;
            file.write_all(&chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            written += chunk.len() as u64;
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(written)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write(
        &self,
        key: &str,
        _content_type: &str,
        body: ByteStream,
    ) -> StorageResult<BlobWritten> {
        let path = self.key_to_path(key)?;
        let partial = Self::partial_path(&path);
        let start = std::time::Instant::now();

        // Bytes land in a sibling file first so readers never see a truncated blob.
        let size = match self.write_to(&partial, body).await {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                tracing::error!(
                    error = %e,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local blob write failed"
                );
                return Err(e);
            }
        };

        fs::rename(&partial, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to move {} into place: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob write successful"
        );

        Ok(BlobWritten {
            name: key.to_string(),
            size,
        })
    }

    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), key = %key, "Local blob read started");

        Ok(Box::pin(tokio_util::io::ReaderStream::new(file)))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob delete successful"
        );

        Ok(())
    }

    fn storage_url(&self) -> &str {
        &self.base_url
    }

    fn backend_type(&self) -> FileStoreKind {
        FileStoreKind::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mediacouch_core::stream;
    use std::io;
    use tempfile::tempdir;

    async fn store(dir: &Path) -> LocalBlobStore {
        LocalBlobStore::new(dir, "http://localhost:8080/blobs/".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let chunks: Vec<io::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"frame-")), Ok(Bytes::from_static(b"data"))];
        let written = store
            .write("v1-video.mp4", "video/mp4", Box::pin(futures::stream::iter(chunks)))
            .await
            .unwrap();

        assert_eq!(written.name, "v1-video.mp4");
        assert_eq!(written.size, 10);

        let read = stream::collect(store.read("v1-video.mp4").await.unwrap())
            .await
            .unwrap();
        assert_eq!(read, Bytes::from_static(b"frame-data"));
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("client went away")),
        ];
        let result = store
            .write("v1-video.mp4", "video/mp4", Box::pin(futures::stream::iter(chunks)))
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        assert!(!dir.path().join("v1-video.mp4").exists());
        assert!(!dir.path().join("v1-video.mp4.partial").exists());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let result = store.read("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = store.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = store.read("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = store.delete("nested/key").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_succeeds() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        assert!(store.delete("missing-thumbnail.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let result = store.read("missing-image.jpg").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_locator_uses_trimmed_base_url() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        assert_eq!(store.storage_url(), "http://localhost:8080/blobs");
        let locator = store.locator("i1-image.jpg");
        assert_eq!(locator, "http://localhost:8080/blobs/i1-image.jpg");
        assert_eq!(store.key_for_locator(&locator).as_deref(), Some("i1-image.jpg"));
    }
}
