//! Database wrapper whose bulk writes reject chosen documents, as when another
//! writer updated them between the read and the write.

use async_trait::async_trait;
use mediacouch_core::models::{BulkItemResult, MediaDocument, Revision};
use mediacouch_core::{AppError, ByteStream};
use mediacouch_db::{
    DatabaseAdmin, DesignDocument, DocumentAttachments, DocumentStore, InMemoryDocumentStore,
    ViewIndex, ViewQuery, ViewRow,
};
use std::collections::HashSet;

pub struct ConflictingStore {
    inner: InMemoryDocumentStore,
    conflicting: HashSet<String>,
}

impl ConflictingStore {
    pub fn new(inner: InMemoryDocumentStore, conflicting: &[&str]) -> Self {
        ConflictingStore {
            inner,
            conflicting: conflicting.iter().map(|id| id.to_string()).collect(),
        }
    }

    fn rejects(&self, doc: &MediaDocument) -> bool {
        doc.id
            .as_ref()
            .is_some_and(|id| self.conflicting.contains(id))
    }
}

#[async_trait]
impl DocumentStore for ConflictingStore {
    async fn get(&self, id: &str) -> Result<MediaDocument, AppError> {
        self.inner.get(id).await
    }

    async fn insert(&self, doc: &MediaDocument) -> Result<Revision, AppError> {
        self.inner.insert(doc).await
    }

    async fn bulk_insert(
        &self,
        docs: &[MediaDocument],
    ) -> Result<Vec<BulkItemResult>, AppError> {
        let accepted: Vec<MediaDocument> = docs
            .iter()
            .filter(|doc| !self.rejects(doc))
            .cloned()
            .collect();
        let mut written = self.inner.bulk_insert(&accepted).await?.into_iter();

        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            match (&doc.id, self.rejects(doc)) {
                (Some(id), true) => results.push(BulkItemResult::failure(
                    id.clone(),
                    "conflict",
                    "Document update conflict.",
                )),
                _ => results.extend(written.next()),
            }
        }
        Ok(results)
    }

    async fn destroy(&self, id: &str, rev: &Revision) -> Result<(), AppError> {
        self.inner.destroy(id, rev).await
    }
}

#[async_trait]
impl DocumentAttachments for ConflictingStore {
    async fn put_attachment(
        &self,
        id: &str,
        rev: Option<&Revision>,
        name: &str,
        content_type: &str,
        body: ByteStream,
    ) -> Result<Revision, AppError> {
        self.inner
            .put_attachment(id, rev, name, content_type, body)
            .await
    }

    async fn get_attachment(&self, id: &str, name: &str) -> Result<ByteStream, AppError> {
        self.inner.get_attachment(id, name).await
    }

    async fn delete_attachment(
        &self,
        id: &str,
        rev: &Revision,
        name: &str,
    ) -> Result<Revision, AppError> {
        self.inner.delete_attachment(id, rev, name).await
    }
}

#[async_trait]
impl ViewIndex for ConflictingStore {
    async fn view(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, AppError> {
        self.inner.view(design, view, query).await
    }
}

#[async_trait]
impl DatabaseAdmin for ConflictingStore {
    async fn put_design(&self, design: &DesignDocument) -> Result<(), AppError> {
        self.inner.put_design(design).await
    }
}
