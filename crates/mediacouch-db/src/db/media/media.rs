use bytes::Bytes;
use futures::TryStreamExt;
use mediacouch_core::models::{
    BatchOutcome, MediaDocument, MediaType, Revision, THUMBNAIL_ATTACHMENT,
};
use mediacouch_core::{stream, AppError, ByteStream};
use mediacouch_storage::BlobStore;
use reqwest::StatusCode;
use serde::Serialize;
use std::io;
use std::sync::Arc;

use super::attachment::{
    AttachmentBackend, AttachmentBackendKind, AttachmentLocator, EmbeddedAttachment,
    ExternalBlobStore,
};
use crate::db::store::{DocumentStore, MediaDatabase, ViewIndex, ViewQuery};
use crate::db::views::{self, IMAGES, VIDEOS};

/// A media document given either by id or as an already fetched record.
#[derive(Debug, Clone, Copy)]
pub enum MediaRef<'a> {
    Id(&'a str),
    Document(&'a MediaDocument),
}

impl<'a> MediaRef<'a> {
    pub fn id(&self) -> Result<&'a str, AppError> {
        match *self {
            MediaRef::Id(id) if !id.is_empty() => Ok(id),
            MediaRef::Id(_) => Err(AppError::InvalidArgument("Document id is empty".to_string())),
            MediaRef::Document(doc) => doc.require_id(),
        }
    }
}

impl<'a> From<&'a str> for MediaRef<'a> {
    fn from(id: &'a str) -> Self {
        MediaRef::Id(id)
    }
}

impl<'a> From<&'a String> for MediaRef<'a> {
    fn from(id: &'a String) -> Self {
        MediaRef::Id(id)
    }
}

impl<'a> From<&'a MediaDocument> for MediaRef<'a> {
    fn from(doc: &'a MediaDocument) -> Self {
        MediaRef::Document(doc)
    }
}

/// An attachment that could not be removed during a cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentFailure {
    pub doc_id: String,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Attachments left behind; the document itself is gone.
    pub attachment_failures: Vec<AttachmentFailure>,
}

impl DeleteOutcome {
    pub fn is_clean(&self) -> bool {
        self.attachment_failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoResetOutcome {
    /// Revision of the cleared video document.
    pub revision: Revision,
    pub deleted_images: BatchOutcome,
    pub attachment_failures: Vec<AttachmentFailure>,
}

impl VideoResetOutcome {
    pub fn is_complete(&self) -> bool {
        self.deleted_images.is_complete() && self.attachment_failures.is_empty()
    }
}

fn current_revision(doc: &MediaDocument) -> Result<Revision, AppError> {
    doc.rev.clone().ok_or_else(|| {
        AppError::InvalidArgument(format!(
            "Document {} has no revision",
            doc.id().unwrap_or_default()
        ))
    })
}

/// Media repository
///
/// Composes a document database with exactly one attachment backend, chosen
/// at construction: the external blob store when one is configured,
/// otherwise attachments embedded in the documents.
#[derive(Clone)]
pub struct MediaRepository {
    db: Arc<dyn MediaDatabase>,
    attachments: Arc<dyn AttachmentBackend>,
    /// Removes stubs written before the repository moved to an external store.
    embedded: EmbeddedAttachment,
    file_store: Option<Arc<dyn BlobStore>>,
    http: reqwest::Client,
}

impl MediaRepository {
    pub fn new(db: Arc<dyn MediaDatabase>, file_store: Option<Arc<dyn BlobStore>>) -> Self {
        let attachments: Arc<dyn AttachmentBackend> = match &file_store {
            Some(store) => Arc::new(ExternalBlobStore::new(store.clone())),
            None => Arc::new(EmbeddedAttachment::new(db.clone())),
        };

        tracing::debug!(backend = %attachments.kind(), "Media repository created");

        Self {
            embedded: EmbeddedAttachment::new(db.clone()),
            db,
            attachments,
            file_store,
            http: reqwest::Client::new(),
        }
    }

    /// Client used for attachments whose locator points outside the
    /// configured blob store.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn database(&self) -> &Arc<dyn MediaDatabase> {
        &self.db
    }

    pub fn backend_kind(&self) -> AttachmentBackendKind {
        self.attachments.kind()
    }

    /// Unsaved document of `media_type` with a freshly generated id.
    pub fn new_media(&self, media_type: MediaType) -> MediaDocument {
        MediaDocument::new(media_type)
    }

    #[tracing::instrument(skip(self), fields(db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: &str) -> Result<MediaDocument, AppError> {
        self.db.get(id).await
    }

    /// Create or update a document. Updates must carry the revision last read.
    #[tracing::instrument(skip(self, doc), fields(db.operation = "insert", db.record_id = ?doc.id))]
    pub async fn insert(&self, doc: &MediaDocument) -> Result<Revision, AppError> {
        self.db.insert(doc).await
    }

    /// Store `body` as attachment `name` of `doc` and return the document's
    /// new revision.
    ///
    /// With an external blob store this is two steps: the bytes are written
    /// to `<id>-<name>`, then the document is updated with the locator. If
    /// the update conflicts the blob stays in place and the caller retries
    /// with a fresh document; the next write overwrites the same key.
    #[tracing::instrument(skip(self, doc, body), fields(db.operation = "attach", db.record_id = ?doc.id, attachment = %name))]
    pub async fn attach(
        &self,
        doc: &MediaDocument,
        name: &str,
        content_type: &str,
        body: ByteStream,
    ) -> Result<Revision, AppError> {
        let id = doc.require_id()?;
        let written = self
            .attachments
            .write(doc, name, content_type, body)
            .await?;
        let size = written.size;

        let revision = match (written.external, written.revision) {
            (Some(external), _) => {
                let mut patched = doc.clone();
                patched.attachments.insert(name.to_string(), external);
                self.db.insert(&patched).await.map_err(|e| {
                    tracing::error!(
                        error = %e,
                        doc_id = %id,
                        attachment = %name,
                        "Attachment stored but document update failed"
                    );
                    e
                })?
            }
            (None, Some(revision)) => revision,
            (None, None) => {
                return Err(AppError::Internal(format!(
                    "Backend {} reported neither a revision nor a locator",
                    self.attachments.kind()
                )))
            }
        };

        tracing::info!(
            doc_id = %id,
            attachment = %name,
            size_bytes = size,
            backend = %self.attachments.kind(),
            "Attachment stored"
        );
        Ok(revision)
    }

    /// `attach` for an in-memory buffer.
    pub async fn attach_file(
        &self,
        doc: &MediaDocument,
        name: &str,
        data: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<Revision, AppError> {
        self.attach(doc, name, content_type, stream::once(data))
            .await
    }

    /// Byte length recorded on `doc` for `name`, or -1 when it has none.
    pub fn get_attachment_size(&self, doc: &MediaDocument, name: &str) -> i64 {
        doc.attachment_size(name)
    }

    /// Where `read` will look for `name`.
    ///
    /// A locator persisted on the document wins. Otherwise the configured
    /// backend derives it from the id, so an id alone never consults a
    /// persisted locator.
    pub fn attachment_locator<'a>(
        &self,
        media: impl Into<MediaRef<'a>>,
        name: &str,
    ) -> Result<AttachmentLocator, AppError> {
        let media = media.into();
        if let MediaRef::Document(doc) = media {
            if let Some(url) = doc.external_locator(name) {
                return Ok(self.resolve_url(url));
            }
        }
        Ok(self.attachments.locate(media.id()?, name))
    }

    fn resolve_url(&self, url: &str) -> AttachmentLocator {
        self.file_store
            .as_ref()
            .and_then(|store| store.key_for_locator(url))
            .map(|key| AttachmentLocator::Blob {
                key,
                url: url.to_string(),
            })
            .unwrap_or_else(|| AttachmentLocator::Url(url.to_string()))
    }

    /// Stream the bytes of attachment `name`.
    pub async fn read<'a>(
        &self,
        media: impl Into<MediaRef<'a>>,
        name: &str,
    ) -> Result<ByteStream, AppError> {
        let locator = self.attachment_locator(media, name)?;
        tracing::debug!(locator = %locator, attachment = %name, "Reading attachment");

        match &locator {
            AttachmentLocator::Url(url) => self.fetch(url).await,
            other => self.attachments.read(other).await,
        }
    }

    async fn fetch(&self, url: &str) -> Result<ByteStream, AppError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::BackendWithSource {
                message: format!("Failed to fetch {}: {}", url, e),
                source: e.into(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Attachment at {}", url)));
        }
        if !status.is_success() {
            return Err(AppError::Backend(format!(
                "Fetching {} failed with status {}",
                url, status
            )));
        }

        Ok(Box::pin(response.bytes_stream().map_err(io::Error::other)))
    }

    /// Remove `name` from wherever `doc` lists it: an embedded stub goes
    /// through the database, an external entry through the blob store its
    /// locator points into. Bytes behind a foreign locator are left in place.
    /// Returns the new revision when the removal advanced it.
    async fn remove_attachment(
        &self,
        doc: &MediaDocument,
        rev: &Revision,
        name: &str,
    ) -> Result<Option<Revision>, AppError> {
        let id = doc.require_id()?;
        let mut revision = None;

        if doc.embedded_attachments.contains_key(name) {
            let locator = AttachmentLocator::Embedded {
                doc_id: id.to_string(),
                name: name.to_string(),
            };
            revision = self.embedded.delete(&locator, rev).await?;
        }

        match doc.external_locator(name).map(|url| self.resolve_url(url)) {
            Some(AttachmentLocator::Url(url)) => {
                tracing::warn!(
                    doc_id = %id,
                    attachment = %name,
                    locator = %url,
                    "Attachment lives outside the configured store, leaving bytes in place"
                );
            }
            Some(locator) => {
                let current = revision.as_ref().unwrap_or(rev);
                if let Some(next) = self.attachments.delete(&locator, current).await? {
                    revision = Some(next);
                }
            }
            None => {}
        }

        Ok(revision)
    }

    /// Remove every attachment listed in `names`, continuing past failures.
    /// Returns the latest revision of the document together with the
    /// failures.
    async fn purge_attachments(
        &self,
        doc: &MediaDocument,
        names: &[String],
    ) -> Result<(Revision, Vec<AttachmentFailure>), AppError> {
        let id = doc.require_id()?;
        let mut rev = current_revision(doc)?;
        let mut failures = Vec::new();

        for name in names {
            match self.remove_attachment(doc, &rev, name).await {
                Ok(Some(next)) => rev = next,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        doc_id = %id,
                        attachment = %name,
                        "Failed to delete attachment"
                    );
                    failures.push(AttachmentFailure {
                        doc_id: id.to_string(),
                        name: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((rev, failures))
    }

    /// Delete a document and, best effort, all of its attachments.
    #[tracing::instrument(skip(self), fields(db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome, AppError> {
        let doc = self.db.get(id).await?;
        let (rev, attachment_failures) = self
            .purge_attachments(&doc, &doc.attachment_names())
            .await?;

        self.db.destroy(id, &rev).await?;

        tracing::info!(
            doc_id = %id,
            attachment_failures = attachment_failures.len(),
            "Document deleted"
        );
        Ok(DeleteOutcome {
            attachment_failures,
        })
    }

    /// Drop the analyzer output of an image so it is picked up again.
    #[tracing::instrument(skip(self), fields(db.operation = "update", db.record_id = %id))]
    pub async fn image_reset(&self, id: &str) -> Result<Revision, AppError> {
        let mut image = self.db.get(id).await?;
        image.clear_analysis();
        self.db.insert(&image).await
    }

    /// Return a video to its freshly uploaded state: delete its images and
    /// their attachments, drop its thumbnail, clear `metadata` and
    /// `frame_count`.
    ///
    /// Image deletion is reported per item in the outcome. Failing to remove
    /// the thumbnail aborts the reset before the video is rewritten.
    #[tracing::instrument(skip(self), fields(db.operation = "video_reset", db.record_id = %video_id))]
    pub async fn video_reset(&self, video_id: &str) -> Result<VideoResetOutcome, AppError> {
        let images = self.video_images(video_id).await?;

        let mut attachment_failures = Vec::new();
        let mut tombstones = Vec::with_capacity(images.len());
        for image in &images {
            let (rev, failures) = self
                .purge_attachments(image, &image.attachment_names())
                .await?;
            attachment_failures.extend(failures);
            tombstones.push(MediaDocument::tombstone(image.require_id()?, rev));
        }

        let deleted_images = if tombstones.is_empty() {
            BatchOutcome::default()
        } else {
            BatchOutcome::from_results(self.db.bulk_insert(&tombstones).await?)
        };
        if !deleted_images.is_complete() {
            tracing::warn!(
                video_id = %video_id,
                failed = deleted_images.failed.len(),
                "Some images of the video could not be deleted"
            );
        }

        let video = self.db.get(video_id).await?;
        if video.has_attachment(THUMBNAIL_ATTACHMENT) {
            let rev = current_revision(&video)?;
            self.remove_attachment(&video, &rev, THUMBNAIL_ATTACHMENT)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, video_id = %video_id, "Failed to delete thumbnail");
                    e
                })?;
        }

        let mut video = self.db.get(video_id).await?;
        video.clear_video_metadata();
        video.attachments.remove(THUMBNAIL_ATTACHMENT);
        let revision = self.db.insert(&video).await?;

        tracing::info!(
            video_id = %video_id,
            deleted_images = deleted_images.succeeded.len(),
            "Video reset"
        );
        Ok(VideoResetOutcome {
            revision,
            deleted_images,
            attachment_failures,
        })
    }

    /// Clear the analysis of every image of a video in one bulk write.
    #[tracing::instrument(skip(self), fields(db.operation = "video_images_reset", db.record_id = %video_id))]
    pub async fn video_images_reset(&self, video_id: &str) -> Result<BatchOutcome, AppError> {
        let mut images = self.video_images(video_id).await?;
        if images.is_empty() {
            return Ok(BatchOutcome::default());
        }

        for image in images.iter_mut() {
            image.clear_analysis();
        }

        let outcome = BatchOutcome::from_results(self.db.bulk_insert(&images).await?);
        tracing::info!(
            video_id = %video_id,
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Video images reset"
        );
        Ok(outcome)
    }

    async fn documents(
        &self,
        design: &str,
        view: &str,
        query: ViewQuery,
    ) -> Result<Vec<MediaDocument>, AppError> {
        let rows = self.db.view(design, view, &query).await?;
        Ok(rows.into_iter().filter_map(|row| row.doc).collect())
    }

    #[tracing::instrument(skip(self), fields(db.operation = "select", media_type = "video"))]
    pub async fn videos(&self) -> Result<Vec<MediaDocument>, AppError> {
        self.documents(VIDEOS, views::ALL, ViewQuery::docs()).await
    }

    #[tracing::instrument(skip(self), fields(db.operation = "select", media_type = "image"))]
    pub async fn images(&self) -> Result<Vec<MediaDocument>, AppError> {
        self.documents(IMAGES, views::ALL, ViewQuery::docs()).await
    }

    /// Images whose `video_id` is `video_id`.
    #[tracing::instrument(skip(self), fields(db.operation = "select", media_type = "image"))]
    pub async fn video_images(&self, video_id: &str) -> Result<Vec<MediaDocument>, AppError> {
        self.documents(
            IMAGES,
            views::BY_VIDEO_ID,
            ViewQuery::docs().with_key(video_id),
        )
        .await
    }

    /// Images that do not belong to any video.
    pub async fn standalone_images(&self) -> Result<Vec<MediaDocument>, AppError> {
        self.documents(IMAGES, views::STANDALONE, ViewQuery::docs())
            .await
    }

    /// Videos waiting for the analyzer.
    pub async fn videos_to_analyze(&self) -> Result<Vec<MediaDocument>, AppError> {
        self.documents(VIDEOS, views::TO_BE_ANALYZED, ViewQuery::docs())
            .await
    }

    /// Images waiting for the analyzer.
    pub async fn images_to_analyze(&self) -> Result<Vec<MediaDocument>, AppError> {
        self.documents(IMAGES, views::TO_BE_ANALYZED, ViewQuery::docs())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryDocumentStore;
    use mediacouch_core::models::IMAGE_ATTACHMENT;

    #[test]
    fn test_media_ref_id() {
        let doc = MediaDocument::with_id("i1", MediaType::Image);
        assert_eq!(MediaRef::from(&doc).id().unwrap(), "i1");
        assert_eq!(MediaRef::from("v1").id().unwrap(), "v1");
        assert!(MediaRef::from("").id().is_err());
    }

    #[test]
    fn test_id_locator_ignores_persisted_locator() {
        let repo = MediaRepository::new(Arc::new(InMemoryDocumentStore::new()), None);
        let mut doc = MediaDocument::with_id("i1", MediaType::Image);
        doc.attachments.insert(
            IMAGE_ATTACHMENT.to_string(),
            mediacouch_core::models::ExternalAttachment {
                content_type: "image/jpeg".to_string(),
                length: 3,
                locator: "http://old-host/i1-image.jpg".to_string(),
            },
        );

        assert_eq!(
            repo.attachment_locator(&doc, IMAGE_ATTACHMENT).unwrap(),
            AttachmentLocator::Url("http://old-host/i1-image.jpg".to_string())
        );
        assert_eq!(
            repo.attachment_locator("i1", IMAGE_ATTACHMENT).unwrap(),
            AttachmentLocator::Embedded {
                doc_id: "i1".to_string(),
                name: IMAGE_ATTACHMENT.to_string(),
            }
        );
    }

    #[test]
    fn test_new_media_generates_distinct_ids() {
        let repo = MediaRepository::new(Arc::new(InMemoryDocumentStore::new()), None);
        let first = repo.new_media(MediaType::Video);
        let second = repo.new_media(MediaType::Video);

        assert_eq!(first.media_type(), Some(MediaType::Video));
        assert_eq!(first.rev, None);
        assert_eq!(first.id().unwrap().len(), 32);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_embedded_backend_without_file_store() {
        let repo = MediaRepository::new(Arc::new(InMemoryDocumentStore::new()), None);
        assert_eq!(repo.backend_kind(), AttachmentBackendKind::Embedded);
    }
}
