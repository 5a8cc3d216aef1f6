//! Where attachment bytes live.
//!
//! A repository picks exactly one backend when it is built: attachments are
//! either stored inside the document records (`EmbeddedAttachment`) or in an
//! external blob store under `<document-id>-<attachment-name>`
//! (`ExternalBlobStore`). The workflows only talk to the trait.

use async_trait::async_trait;
use futures::StreamExt;
use mediacouch_core::models::{ExternalAttachment, MediaDocument, Revision};
use mediacouch_core::{AppError, ByteStream, FileStoreKind};
use mediacouch_storage::{attachment_key, BlobStore};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::db::store::{DocumentAttachments, MediaDatabase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentBackendKind {
    Embedded,
    External(FileStoreKind),
}

impl Display for AttachmentBackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AttachmentBackendKind::Embedded => write!(f, "embedded"),
            AttachmentBackendKind::External(kind) => write!(f, "{}", kind),
        }
    }
}

/// Resolved location of one attachment's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentLocator {
    /// Inside the document record.
    Embedded { doc_id: String, name: String },
    /// In the configured blob store.
    Blob { key: String, url: String },
    /// Anywhere else; fetched over HTTP.
    Url(String),
}

impl Display for AttachmentLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AttachmentLocator::Embedded { doc_id, name } => write!(f, "{}/{}", doc_id, name),
            AttachmentLocator::Blob { url, .. } | AttachmentLocator::Url(url) => {
                write!(f, "{}", url)
            }
        }
    }
}

/// Result of writing attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentWrite {
    pub size: u64,
    /// New document revision, when the write itself advanced it.
    pub revision: Option<Revision>,
    /// Entry to record on the document, when the bytes live outside it.
    pub external: Option<ExternalAttachment>,
}

#[async_trait]
pub trait AttachmentBackend: Send + Sync {
    fn kind(&self) -> AttachmentBackendKind;

    /// Deterministic location of `name` on `doc_id` under this backend.
    fn locate(&self, doc_id: &str, name: &str) -> AttachmentLocator;

    async fn write(
        &self,
        doc: &MediaDocument,
        name: &str,
        content_type: &str,
        body: ByteStream,
    ) -> Result<AttachmentWrite, AppError>;

    async fn read(&self, locator: &AttachmentLocator) -> Result<ByteStream, AppError>;

    /// Remove the attachment at `locator` from a document currently at `rev`.
    /// Returns the new document revision when the removal advanced it.
    async fn delete(
        &self,
        locator: &AttachmentLocator,
        rev: &Revision,
    ) -> Result<Option<Revision>, AppError>;
}

fn wrong_locator(kind: AttachmentBackendKind, locator: &AttachmentLocator) -> AppError {
    AppError::InvalidArgument(format!(
        "Locator {} cannot be read from the {} backend",
        locator, kind
    ))
}

/// Counts bytes as they pass through `body`.
fn counting(body: ByteStream) -> (ByteStream, Arc<AtomicU64>) {
    let counter = Arc::new(AtomicU64::new(0));
    let seen = counter.clone();
    let body = body.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            seen.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        }
        chunk
    });
    (Box::pin(body), counter)
}

/// Attachments stored inside the document records.
#[derive(Clone)]
pub struct EmbeddedAttachment {
    db: Arc<dyn MediaDatabase>,
}

impl EmbeddedAttachment {
    pub fn new(db: Arc<dyn MediaDatabase>) -> Self {
        EmbeddedAttachment { db }
    }
}

#[async_trait]
impl AttachmentBackend for EmbeddedAttachment {
    fn kind(&self) -> AttachmentBackendKind {
        AttachmentBackendKind::Embedded
    }

    fn locate(&self, doc_id: &str, name: &str) -> AttachmentLocator {
        AttachmentLocator::Embedded {
            doc_id: doc_id.to_string(),
            name: name.to_string(),
        }
    }

    async fn write(
        &self,
        doc: &MediaDocument,
        name: &str,
        content_type: &str,
        body: ByteStream,
    ) -> Result<AttachmentWrite, AppError> {
        let id = doc.require_id()?;
        let (body, counter) = counting(body);
        let revision = self
            .db
            .put_attachment(id, doc.rev.as_ref(), name, content_type, body)
            .await?;

        Ok(AttachmentWrite {
            size: counter.load(Ordering::Relaxed),
            revision: Some(revision),
            external: None,
        })
    }

    async fn read(&self, locator: &AttachmentLocator) -> Result<ByteStream, AppError> {
        match locator {
            AttachmentLocator::Embedded { doc_id, name } => {
                self.db.get_attachment(doc_id, name).await
            }
            other => Err(wrong_locator(self.kind(), other)),
        }
    }

    async fn delete(
        &self,
        locator: &AttachmentLocator,
        rev: &Revision,
    ) -> Result<Option<Revision>, AppError> {
        match locator {
            AttachmentLocator::Embedded { doc_id, name } => {
                let revision = self.db.delete_attachment(doc_id, rev, name).await?;
                Ok(Some(revision))
            }
            other => Err(wrong_locator(self.kind(), other)),
        }
    }
}

/// Attachments stored in an external blob store. Documents only carry an
/// `attachments` entry pointing at the blob.
#[derive(Clone)]
pub struct ExternalBlobStore {
    store: Arc<dyn BlobStore>,
}

impl ExternalBlobStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        ExternalBlobStore { store }
    }
}

#[async_trait]
impl AttachmentBackend for ExternalBlobStore {
    fn kind(&self) -> AttachmentBackendKind {
        AttachmentBackendKind::External(self.store.backend_type())
    }

    fn locate(&self, doc_id: &str, name: &str) -> AttachmentLocator {
        let key = attachment_key(doc_id, name);
        AttachmentLocator::Blob {
            url: self.store.locator(&key),
            key,
        }
    }

    async fn write(
        &self,
        doc: &MediaDocument,
        name: &str,
        content_type: &str,
        body: ByteStream,
    ) -> Result<AttachmentWrite, AppError> {
        let id = doc.require_id()?;
        let key = attachment_key(id, name);
        let written = self.store.write(&key, content_type, body).await?;

        Ok(AttachmentWrite {
            size: written.size,
            revision: None,
            external: Some(ExternalAttachment {
                content_type: content_type.to_string(),
                length: written.size,
                locator: self.store.locator(&key),
            }),
        })
    }

    async fn read(&self, locator: &AttachmentLocator) -> Result<ByteStream, AppError> {
        match locator {
            AttachmentLocator::Blob { key, .. } => Ok(self.store.read(key).await?),
            other => Err(wrong_locator(self.kind(), other)),
        }
    }

    async fn delete(
        &self,
        locator: &AttachmentLocator,
        _rev: &Revision,
    ) -> Result<Option<Revision>, AppError> {
        match locator {
            AttachmentLocator::Blob { key, .. } => {
                self.store.delete(key).await?;
                Ok(None)
            }
            other => Err(wrong_locator(self.kind(), other)),
        }
    }
}
