//! Document store contracts
//!
//! Every workflow in the repository is written against these traits, so the
//! CouchDB client and the in-memory store are interchangeable.

use async_trait::async_trait;
use mediacouch_core::models::{BulkItemResult, MediaDocument, Revision};
use mediacouch_core::{AppError, ByteStream};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Revision-checked document CRUD.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Current version of `id`, including its revision and attachment stubs.
    async fn get(&self, id: &str) -> Result<MediaDocument, AppError>;

    /// Create or update `doc`. Updates must carry the revision last read;
    /// anything else is `AppError::Conflict`.
    async fn insert(&self, doc: &MediaDocument) -> Result<Revision, AppError>;

    /// Write several documents at once. Each item succeeds or fails on its
    /// own; a conflict on one item is reported in its result, not as an error.
    async fn bulk_insert(
        &self,
        docs: &[MediaDocument],
    ) -> Result<Vec<BulkItemResult>, AppError>;

    async fn destroy(&self, id: &str, rev: &Revision) -> Result<(), AppError>;
}

/// Attachments stored inside document records.
#[async_trait]
pub trait DocumentAttachments: Send + Sync {
    /// Store `name` on `id` and return the document's new revision. Without a
    /// revision the document is created if it does not exist yet.
    async fn put_attachment(
        &self,
        id: &str,
        rev: Option<&Revision>,
        name: &str,
        content_type: &str,
        body: ByteStream,
    ) -> Result<Revision, AppError>;

    async fn get_attachment(&self, id: &str, name: &str) -> Result<ByteStream, AppError>;

    async fn delete_attachment(
        &self,
        id: &str,
        rev: &Revision,
        name: &str,
    ) -> Result<Revision, AppError>;
}

/// Query parameters for a secondary-index lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    pub key: Option<JsonValue>,
    pub include_docs: bool,
    /// `None` lets the view decide (reduce when it defines a reduce function).
    pub reduce: Option<bool>,
    pub group: bool,
}

impl ViewQuery {
    /// Mapped rows with their documents.
    pub fn docs() -> Self {
        ViewQuery {
            include_docs: true,
            reduce: Some(false),
            ..Default::default()
        }
    }

    /// Single reduced row over the whole view.
    pub fn count() -> Self {
        ViewQuery {
            reduce: Some(true),
            ..Default::default()
        }
    }

    /// One reduced row per distinct key.
    pub fn grouped() -> Self {
        ViewQuery {
            reduce: Some(true),
            group: true,
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<JsonValue>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// One row of a view response. Reduced rows carry no `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub key: JsonValue,
    #[serde(default)]
    pub value: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<MediaDocument>,
}

/// Secondary-index queries against installed design documents.
#[async_trait]
pub trait ViewIndex: Send + Sync {
    async fn view(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> Result<Vec<ViewRow>, AppError>;
}

/// Source of a single view as installed in a design document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSource {
    pub map: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
}

/// `_design/<name>` document holding a group of views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub language: String,
    pub views: BTreeMap<String, ViewSource>,
}

impl DesignDocument {
    pub fn new(name: &str) -> Self {
        DesignDocument {
            id: format!("_design/{}", name),
            language: "javascript".to_string(),
            views: BTreeMap::new(),
        }
    }

    /// Name without the `_design/` prefix.
    pub fn name(&self) -> &str {
        self.id.strip_prefix("_design/").unwrap_or(&self.id)
    }
}

/// Schema operations on an already selected database.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    /// Install `design`; `AppError::Conflict` when it is already present.
    async fn put_design(&self, design: &DesignDocument) -> Result<(), AppError>;
}

/// Everything the repository needs from one database.
pub trait MediaDatabase: DocumentStore + DocumentAttachments + ViewIndex + DatabaseAdmin {}

impl<T> MediaDatabase for T where
    T: DocumentStore + DocumentAttachments + ViewIndex + DatabaseAdmin
{
}

/// Server holding named databases.
#[async_trait]
pub trait DatabaseServer: Send + Sync {
    /// Create `name`; `AppError::Conflict` when it already exists.
    async fn create_database(&self, name: &str) -> Result<(), AppError>;

    /// Handle that targets `name` for every subsequent operation.
    fn use_database(&self, name: &str) -> Arc<dyn MediaDatabase>;
}
