//! In-process document store.
//!
//! Applies the same revision rules as the CouchDB server and evaluates the
//! views from `views::DEFINITIONS`, so the repository workflows can run
//! without a database. Used by the test suites and by `--in-memory` runs of
//! the CLI.

use async_trait::async_trait;
use bytes::Bytes;
use mediacouch_core::models::{AttachmentStub, BulkItemResult, MediaDocument, Revision};
use mediacouch_core::{stream, AppError, ByteStream};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::store::{
    DatabaseAdmin, DatabaseServer, DesignDocument, DocumentAttachments, DocumentStore,
    MediaDatabase, ViewIndex, ViewQuery, ViewRow,
};
use super::views;

const CONFLICT_REASON: &str = "Document update conflict.";

struct StoredDocument {
    doc: MediaDocument,
    blobs: BTreeMap<String, Bytes>,
}

impl StoredDocument {
    fn rev(&self) -> Option<&Revision> {
        self.doc.rev.as_ref()
    }
}

#[derive(Default)]
struct DatabaseState {
    docs: BTreeMap<String, StoredDocument>,
    designs: BTreeMap<String, DesignDocument>,
    failing_views: HashSet<(String, String)>,
    deleted_attachments: Vec<(String, String)>,
}

/// In-memory database handle. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<DatabaseState>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the media design documents already installed.
    pub fn with_design_documents() -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for design in views::design_documents() {
                state.designs.insert(design.name().to_string(), design);
            }
        }
        store
    }

    /// Make every query of `design/view` fail with a backend error.
    pub fn fail_view(&self, design: &str, view: &str) {
        self.lock()
            .failing_views
            .insert((design.to_string(), view.to_string()));
    }

    /// `(document id, attachment name)` of every attachment deleted so far.
    pub fn deleted_attachments(&self) -> Vec<(String, String)> {
        self.lock().deleted_attachments.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().docs.contains_key(id)
    }

    fn lock(&self) -> MutexGuard<'_, DatabaseState> {
        // Every critical section leaves the maps consistent; poisoning is ignored.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn next_revision(current: Option<&Revision>) -> Revision {
    let generation = current.map(Revision::generation).unwrap_or(0) + 1;
    Revision::new(format!("{}-{}", generation, Uuid::new_v4().simple()))
}

fn check_revision(
    id: &str,
    stored: Option<&Revision>,
    given: Option<&Revision>,
) -> Result<(), AppError> {
    match (stored, given) {
        (None, None) => Ok(()),
        (Some(stored), Some(given)) if stored == given => Ok(()),
        _ => Err(AppError::Conflict(format!("{}: {}", id, CONFLICT_REASON))),
    }
}

/// Apply one document write; shared by `insert` and `bulk_insert`.
fn write_document(
    state: &mut DatabaseState,
    doc: &MediaDocument,
) -> Result<(String, Revision), AppError> {
    let id = match doc.id() {
        Some(id) if !id.is_empty() => id.to_string(),
        Some(_) => return Err(AppError::InvalidArgument("Document id is empty".to_string())),
        None => Uuid::new_v4().simple().to_string(),
    };

    let stored = state.docs.get(&id);
    check_revision(&id, stored.and_then(StoredDocument::rev), doc.rev.as_ref())?;
    let revision = next_revision(stored.and_then(StoredDocument::rev));

    if doc.deleted {
        if stored.is_none() {
            return Err(AppError::NotFound(format!("Document {}", id)));
        }
        state.docs.remove(&id);
        return Ok((id, revision));
    }

    // Attachments omitted from the new body are dropped, listed ones keep
    // the bytes and the stub already stored.
    let (mut blobs, previous_stubs) = match state.docs.remove(&id) {
        Some(previous) => (previous.blobs, previous.doc.embedded_attachments),
        None => (BTreeMap::new(), BTreeMap::new()),
    };
    blobs.retain(|name, _| doc.embedded_attachments.contains_key(name));

    let mut next = doc.clone();
    next.id = Some(id.clone());
    next.rev = Some(revision.clone());
    next.embedded_attachments = previous_stubs
        .into_iter()
        .filter(|(name, _)| blobs.contains_key(name))
        .collect();

    state.docs.insert(id.clone(), StoredDocument { doc: next, blobs });
    Ok((id, revision))
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: &str) -> Result<MediaDocument, AppError> {
        self.lock()
            .docs
            .get(id)
            .map(|stored| stored.doc.clone())
            .ok_or_else(|| AppError::NotFound(format!("Document {}", id)))
    }

    async fn insert(&self, doc: &MediaDocument) -> Result<Revision, AppError> {
        let mut state = self.lock();
        write_document(&mut state, doc).map(|(_, rev)| rev)
    }

    async fn bulk_insert(
        &self,
        docs: &[MediaDocument],
    ) -> Result<Vec<BulkItemResult>, AppError> {
        let mut state = self.lock();
        Ok(docs
            .iter()
            .map(|doc| match write_document(&mut state, doc) {
                Ok((id, rev)) => BulkItemResult::success(id, rev),
                Err(e) => {
                    let id = doc.id().unwrap_or_default();
                    match e {
                        AppError::Conflict(_) => {
                            BulkItemResult::failure(id, "conflict", CONFLICT_REASON)
                        }
                        AppError::NotFound(_) => {
                            BulkItemResult::failure(id, "not_found", "missing")
                        }
                        other => {
                            BulkItemResult::failure(id, "bad_request", &other.to_string())
                        }
                    }
                }
            })
            .collect())
    }

    async fn destroy(&self, id: &str, rev: &Revision) -> Result<(), AppError> {
        let mut state = self.lock();
        let stored = state
            .docs
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Document {}", id)))?;
        check_revision(id, stored.rev(), Some(rev))?;
        state.docs.remove(id);
        Ok(())
    }
}

#[async_trait]
impl DocumentAttachments for InMemoryDocumentStore {
    async fn put_attachment(
        &self,
        id: &str,
        rev: Option<&Revision>,
        name: &str,
        content_type: &str,
        body: ByteStream,
    ) -> Result<Revision, AppError> {
        // Drain before locking; the guard must not be held across an await.
        let data = stream::collect(body).await?;

        let mut state = self.lock();
        let stored = state.docs.get(id);
        check_revision(id, stored.and_then(StoredDocument::rev), rev)?;
        let revision = next_revision(stored.and_then(StoredDocument::rev));

        let entry = state
            .docs
            .entry(id.to_string())
            .or_insert_with(|| StoredDocument {
                doc: MediaDocument {
                    id: Some(id.to_string()),
                    ..Default::default()
                },
                blobs: BTreeMap::new(),
            });
        entry.doc.embedded_attachments.insert(
            name.to_string(),
            AttachmentStub {
                content_type: content_type.to_string(),
                length: data.len() as u64,
                digest: None,
                revpos: Some(revision.generation()),
                stub: true,
            },
        );
        entry.blobs.insert(name.to_string(), data);
        entry.doc.rev = Some(revision.clone());

        Ok(revision)
    }

    async fn get_attachment(&self, id: &str, name: &str) -> Result<ByteStream, AppError> {
        let state = self.lock();
        let data = state
            .docs
            .get(id)
            .and_then(|stored| stored.blobs.get(name))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Attachment {} of {}", name, id)))?;
        Ok(stream::once(data))
    }

    async fn delete_attachment(
        &self,
        id: &str,
        rev: &Revision,
        name: &str,
    ) -> Result<Revision, AppError> {
        let mut state = self.lock();
        let stored = state
            .docs
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Document {}", id)))?;
        check_revision(id, stored.rev(), Some(rev))?;
        if stored.blobs.remove(name).is_none() {
            return Err(AppError::NotFound(format!("Attachment {} of {}", name, id)));
        }
        stored.doc.embedded_attachments.remove(name);
        let revision = next_revision(Some(rev));
        stored.doc.rev = Some(revision.clone());

        state
            .deleted_attachments
            .push((id.to_string(), name.to_string()));
        Ok(revision)
    }
}

fn row_count(rows: &[ViewRow]) -> JsonValue {
    JsonValue::from(rows.len() as u64)
}

#[async_trait]
impl ViewIndex for InMemoryDocumentStore {
    async fn view(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, AppError> {
        let state = self.lock();
        if state
            .failing_views
            .contains(&(design.to_string(), view.to_string()))
        {
            return Err(AppError::Backend(format!(
                "View {}/{} is unavailable",
                design, view
            )));
        }

        let installed = state
            .designs
            .get(design)
            .is_some_and(|d| d.views.contains_key(view));
        let definition = views::definition(design, view)
            .filter(|_| installed)
            .ok_or_else(|| AppError::NotFound(format!("View {}/{}", design, view)))?;

        let mut rows: Vec<ViewRow> = state
            .docs
            .iter()
            .flat_map(|(id, stored)| {
                definition
                    .emit(&stored.doc)
                    .into_iter()
                    .map(move |(key, value)| ViewRow {
                        id: Some(id.clone()),
                        key,
                        value,
                        doc: None,
                    })
            })
            .filter(|row| query.key.as_ref().is_none_or(|key| row.key == *key))
            .collect();
        rows.sort_by(|a, b| {
            a.key
                .to_string()
                .cmp(&b.key.to_string())
                .then_with(|| a.id.cmp(&b.id))
        });

        let reduce = query.reduce.unwrap_or(definition.has_reduce());
        if reduce && !definition.has_reduce() {
            return Err(AppError::InvalidArgument(format!(
                "View {}/{} has no reduce function",
                design, view
            )));
        }

        if !reduce {
            if query.include_docs {
                for row in rows.iter_mut() {
                    row.doc = row
                        .id
                        .as_ref()
                        .and_then(|id| state.docs.get(id))
                        .map(|stored| stored.doc.clone());
                }
            }
            return Ok(rows);
        }

        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if !query.group {
            return Ok(vec![ViewRow {
                id: None,
                key: JsonValue::Null,
                value: row_count(&rows),
                doc: None,
            }]);
        }

        let mut groups: Vec<(JsonValue, Vec<ViewRow>)> = Vec::new();
        for row in rows {
            match groups.last_mut() {
                Some((key, members)) if *key == row.key => members.push(row),
                _ => groups.push((row.key.clone(), vec![row])),
            }
        }
        Ok(groups
            .into_iter()
            .map(|(key, members)| ViewRow {
                id: None,
                key,
                value: row_count(&members),
                doc: None,
            })
            .collect())
    }
}

#[async_trait]
impl DatabaseAdmin for InMemoryDocumentStore {
    async fn put_design(&self, design: &DesignDocument) -> Result<(), AppError> {
        let mut state = self.lock();
        if state.designs.contains_key(design.name()) {
            return Err(AppError::Conflict(format!("{}: {}", design.id, CONFLICT_REASON)));
        }
        state
            .designs
            .insert(design.name().to_string(), design.clone());
        Ok(())
    }
}

/// In-memory server keeping one store per database name.
#[derive(Clone, Default)]
pub struct InMemoryServer {
    databases: Arc<Mutex<HashMap<String, InMemoryDocumentStore>>>,
}

impl InMemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store behind `name`, if it has been created or used.
    pub fn database(&self, name: &str) -> Option<InMemoryDocumentStore> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, InMemoryDocumentStore>> {
        self.databases.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DatabaseServer for InMemoryServer {
    async fn create_database(&self, name: &str) -> Result<(), AppError> {
        let mut databases = self.lock();
        if databases.contains_key(name) {
            return Err(AppError::Conflict(format!("Database {} already exists", name)));
        }
        databases.insert(name.to_string(), InMemoryDocumentStore::new());
        Ok(())
    }

    fn use_database(&self, name: &str) -> Arc<dyn MediaDatabase> {
        let store = self
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone();
        Arc::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediacouch_core::models::{MediaType, VIDEO_ATTACHMENT};
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_increasing_revisions() {
        let store = InMemoryDocumentStore::new();
        let mut doc = MediaDocument::with_id("v1", MediaType::Video);

        let first = store.insert(&doc).await.unwrap();
        assert_eq!(first.generation(), 1);

        doc.rev = Some(first);
        let second = store.insert(&doc).await.unwrap();
        assert_eq!(second.generation(), 2);
    }

    #[tokio::test]
    async fn test_stale_revision_is_conflict() {
        let store = InMemoryDocumentStore::new();
        let mut doc = MediaDocument::with_id("v1", MediaType::Video);
        let first = store.insert(&doc).await.unwrap();

        doc.rev = Some(first.clone());
        store.insert(&doc).await.unwrap();

        let err = store.insert(&doc).await.unwrap_err();
        assert!(err.is_conflict());

        let err = store.destroy("v1", &first).await.unwrap_err();
        assert!(err.is_conflict());

        let mut fresh = MediaDocument::with_id("v1", MediaType::Video);
        fresh.rev = None;
        assert!(store.insert(&fresh).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_bulk_insert_reports_per_item() {
        let store = InMemoryDocumentStore::new();
        let rev = store
            .insert(&MediaDocument::with_id("i1", MediaType::Image))
            .await
            .unwrap();
        store
            .insert(&MediaDocument::with_id("i2", MediaType::Image))
            .await
            .unwrap();

        let results = store
            .bulk_insert(&[
                MediaDocument::tombstone("i1", rev),
                MediaDocument::tombstone("i2", Revision::new("9-stale")),
            ])
            .await
            .unwrap();

        assert!(results[0].is_ok());
        assert!(results[1].is_conflict());
        assert!(!store.contains("i1"));
        assert!(store.contains("i2"));
    }

    #[tokio::test]
    async fn test_attachment_lifecycle() {
        let store = InMemoryDocumentStore::new();
        let rev = store
            .insert(&MediaDocument::with_id("v1", MediaType::Video))
            .await
            .unwrap();

        let rev = store
            .put_attachment("v1", Some(&rev), VIDEO_ATTACHMENT, "video/mp4", stream::once("abc"))
            .await
            .unwrap();
        let doc = store.get("v1").await.unwrap();
        assert_eq!(doc.attachment_size(VIDEO_ATTACHMENT), 3);
        assert_eq!(doc.rev.as_ref(), Some(&rev));

        let body = stream::collect(store.get_attachment("v1", VIDEO_ATTACHMENT).await.unwrap())
            .await
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"abc"));

        store.delete_attachment("v1", &rev, VIDEO_ATTACHMENT).await.unwrap();
        assert!(store
            .get_attachment("v1", VIDEO_ATTACHMENT)
            .await
            .err()
            .is_some_and(|e| e.is_not_found()));
        assert_eq!(
            store.deleted_attachments(),
            vec![("v1".to_string(), VIDEO_ATTACHMENT.to_string())]
        );
    }

    #[tokio::test]
    async fn test_update_keeps_listed_attachments() {
        let store = InMemoryDocumentStore::new();
        let rev = store
            .put_attachment("v1", None, VIDEO_ATTACHMENT, "video/mp4", stream::once("abc"))
            .await
            .unwrap();

        let mut doc = store.get("v1").await.unwrap();
        doc.metadata = Some(json!({ "fps": 25 }));
        assert_eq!(doc.rev.as_ref(), Some(&rev));
        store.insert(&doc).await.unwrap();

        let doc = store.get("v1").await.unwrap();
        assert_eq!(doc.attachment_size(VIDEO_ATTACHMENT), 3);
        assert!(store.get_attachment("v1", VIDEO_ATTACHMENT).await.is_ok());
    }

    #[tokio::test]
    async fn test_views_require_installed_design() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .view(views::VIDEOS, views::ALL, &ViewQuery::count())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        store
            .put_design(&views::design_documents()[0])
            .await
            .unwrap();
        assert!(store
            .view(views::VIDEOS, views::ALL, &ViewQuery::count())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_grouped_count() {
        let store = InMemoryDocumentStore::with_design_documents();
        for (id, video) in [("i1", "v1"), ("i2", "v1"), ("i3", "v2")] {
            store.insert(&MediaDocument::image_of(id, video)).await.unwrap();
        }

        let rows = store
            .view(views::IMAGES, views::TOTAL_BY_VIDEO_ID, &ViewQuery::grouped())
            .await
            .unwrap();
        let counts: Vec<(JsonValue, JsonValue)> =
            rows.into_iter().map(|r| (r.key, r.value)).collect();
        assert_eq!(counts, vec![(json!("v1"), json!(2)), (json!("v2"), json!(1))]);

        let rows = store
            .view(
                views::IMAGES,
                views::BY_VIDEO_ID,
                &ViewQuery::docs().with_key("v1"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.doc.is_some()));
    }

    #[tokio::test]
    async fn test_server_create_twice_conflicts() {
        let server = InMemoryServer::new();
        server.create_database("media").await.unwrap();
        assert!(server.create_database("media").await.unwrap_err().is_conflict());
        assert!(server.database("media").is_some());
    }
}
