//! Test helpers: repositories over the in-memory store, with either the
//! embedded backend or a local blob store in a temp directory.
//!
//! Run from workspace root: `cargo test -p mediacouch-db`.

#![allow(dead_code)]

pub mod conflict;
pub mod fixtures;
pub mod storage;

use mediacouch_db::{InMemoryDocumentStore, MediaRepository};
use std::sync::Arc;

use conflict::ConflictingStore;
use storage::{RecordingBlobStore, TestStorage};

/// Repository plus handles on what it is built from.
pub struct TestRepo {
    pub repo: MediaRepository,
    pub db: InMemoryDocumentStore,
    pub blobs: Option<Arc<RecordingBlobStore>>,
    pub label: &'static str,
    _storage: Option<TestStorage>,
}

impl TestRepo {
    pub fn is_external(&self) -> bool {
        self.blobs.is_some()
    }

    /// Attachment deletions observed by whichever backend is in use.
    pub fn attachment_deletes(&self) -> usize {
        match &self.blobs {
            Some(blobs) => blobs.deletes().len(),
            None => self.db.deleted_attachments().len(),
        }
    }
}

pub fn embedded_repo() -> TestRepo {
    let db = InMemoryDocumentStore::with_design_documents();
    TestRepo {
        repo: MediaRepository::new(Arc::new(db.clone()), None),
        db,
        blobs: None,
        label: "embedded",
        _storage: None,
    }
}

pub async fn external_repo() -> TestRepo {
    external_repo_over(InMemoryDocumentStore::with_design_documents()).await
}

/// External-store repository over an existing database, as after a
/// deployment switched from embedded attachments to a blob store.
pub async fn external_repo_over(db: InMemoryDocumentStore) -> TestRepo {
    let storage = TestStorage::new();
    let blobs = Arc::new(RecordingBlobStore::new(&storage).await);
    TestRepo {
        repo: MediaRepository::new(Arc::new(db.clone()), Some(blobs.clone())),
        db,
        blobs: Some(blobs),
        label: "external",
        _storage: Some(storage),
    }
}

/// One repository per attachment backend.
pub async fn all_backends() -> Vec<TestRepo> {
    vec![embedded_repo(), external_repo().await]
}

/// Embedded repository over `db` whose bulk writes reject `conflicting` ids.
pub fn conflicting_repo(db: InMemoryDocumentStore, conflicting: &[&str]) -> MediaRepository {
    MediaRepository::new(Arc::new(ConflictingStore::new(db, conflicting)), None)
}
