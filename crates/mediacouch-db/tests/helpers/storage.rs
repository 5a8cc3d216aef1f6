use async_trait::async_trait;
use mediacouch_core::{ByteStream, FileStoreKind};
use mediacouch_storage::{BlobStore, BlobWritten, LocalBlobStore, StorageError, StorageResult};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Test storage configuration.
pub struct TestStorage {
    pub temp_dir: TempDir,
    pub base_path: PathBuf,
    pub base_url: String,
}

impl TestStorage {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let base_path = temp_dir.path().to_path_buf();
        let base_url = "http://localhost:8080/blobs".to_string();
        Self {
            temp_dir,
            base_path,
            base_url,
        }
    }
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Local blob store that records deletions and can be told to fail them.
pub struct RecordingBlobStore {
    inner: LocalBlobStore,
    deletes: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingBlobStore {
    pub async fn new(storage: &TestStorage) -> Self {
        let inner = LocalBlobStore::new(&storage.base_path, storage.base_url.clone())
            .await
            .expect("Failed to create local blob store");
        Self {
            inner,
            deletes: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Keys passed to `delete`, including the ones that failed.
    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn fail_delete(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn write(
        &self,
        key: &str,
        content_type: &str,
        body: ByteStream,
    ) -> StorageResult<BlobWritten> {
        self.inner.write(key, content_type, body).await
    }

    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.read(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        if self.failing.lock().unwrap().contains(key) {
            return Err(StorageError::DeleteFailed(format!("injected failure for {}", key)));
        }
        self.inner.delete(key).await
    }

    fn storage_url(&self) -> &str {
        self.inner.storage_url()
    }

    fn backend_type(&self) -> FileStoreKind {
        self.inner.backend_type()
    }
}
