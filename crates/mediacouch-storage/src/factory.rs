#[cfg(feature = "storage-local")]
use crate::LocalBlobStore;
#[cfg(feature = "storage-s3")]
use crate::S3BlobStore;
use crate::{BlobStore, FileStoreKind, StorageError, StorageResult};
use mediacouch_core::Config;
use std::sync::Arc;

/// Create the external blob store named by the configuration.
///
/// Returns `None` when no file store is configured; attachments are then
/// embedded in the documents.
pub async fn create_file_store(config: &Config) -> StorageResult<Option<Arc<dyn BlobStore>>> {
    let Some(kind) = config.file_store else {
        return Ok(None);
    };

    match kind {
        #[cfg(feature = "storage-s3")]
        FileStoreKind::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config
                .s3_region
                .clone()
                .or_else(|| config.aws_region.clone())
                .ok_or_else(|| {
                    StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
                })?;

            let store = S3BlobStore::new(bucket, region, config.s3_endpoint.clone()).await?;
            Ok(Some(Arc::new(store)))
        }

        #[cfg(not(feature = "storage-s3"))]
        FileStoreKind::S3 => Err(StorageError::ConfigError(
            "S3 file store not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        FileStoreKind::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let store = LocalBlobStore::new(base_path, base_url).await?;
            Ok(Some(Arc::new(store)))
        }

        #[cfg(not(feature = "storage-local"))]
        FileStoreKind::Local => Err(StorageError::ConfigError(
            "Local file store not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_file_store_configured() {
        let config = Config::new("http://localhost:5984", "media");
        assert!(create_file_store(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_file_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new("http://localhost:5984", "media").with_local_file_store(
            dir.path().to_string_lossy().to_string(),
            "http://localhost:8080/blobs",
        );

        let store = create_file_store(&config).await.unwrap().unwrap();
        assert_eq!(store.backend_type(), FileStoreKind::Local);
        assert_eq!(store.storage_url(), "http://localhost:8080/blobs");
    }
}
