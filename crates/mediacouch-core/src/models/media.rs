use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// Source attachment of a video document.
pub const VIDEO_ATTACHMENT: &str = "video.mp4";
/// Source attachment of an image document.
pub const IMAGE_ATTACHMENT: &str = "image.jpg";
/// Thumbnail produced for a video by the analyzer.
pub const THUMBNAIL_ATTACHMENT: &str = "thumbnail.jpg";

/// Opaque revision token identifying one version of a document.
///
/// Every read hands one out and every write must present the one it read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(value: impl Into<String>) -> Self {
        Revision(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric prefix of a `N-hash` token, 0 when the token has no such prefix.
    pub fn generation(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(n, _)| n.parse().ok())
            .unwrap_or(0)
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Media entity kinds stored in the shared collection, discriminated by `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

impl MediaType {
    /// Design document holding this kind's aggregate views.
    pub fn design_doc(&self) -> &'static str {
        match self {
            MediaType::Video => "videos",
            MediaType::Image => "images",
        }
    }

    /// Attachment that must be present before the analyzer can run.
    pub fn source_attachment(&self) -> &'static str {
        match self {
            MediaType::Video => VIDEO_ATTACHMENT,
            MediaType::Image => IMAGE_ATTACHMENT,
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Image => write!(f, "image"),
        }
    }
}

impl FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaType::Video),
            "image" => Ok(MediaType::Image),
            _ => Err(AppError::InvalidArgument(format!("Invalid media type: {}", s))),
        }
    }
}

/// Attachment stored inside the document record by the database itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentStub {
    pub content_type: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revpos: Option<u64>,
    #[serde(default)]
    pub stub: bool,
}

/// Attachment whose bytes live in the external blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAttachment {
    pub content_type: String,
    pub length: u64,
    /// `<base-url>/<document-id>-<attachment-name>`
    pub locator: String,
}

/// A video or image record.
///
/// Fields the repository does not interpret are kept in `extra` so a
/// read-modify-write cycle never drops data written by other collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
    /// Raw `type` discriminator; see [`MediaDocument::media_type`].
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(
        rename = "_attachments",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub embedded_attachments: BTreeMap<String, AttachmentStub>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, ExternalAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(rename = "_deleted", default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl MediaDocument {
    /// New document of the given kind with a generated id and no revision.
    pub fn new(media_type: MediaType) -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string(), media_type)
    }

    pub fn with_id(id: impl Into<String>, media_type: MediaType) -> Self {
        MediaDocument {
            id: Some(id.into()),
            kind: Some(media_type.to_string()),
            ..Default::default()
        }
    }

    /// New image belonging to `video_id`.
    pub fn image_of(id: impl Into<String>, video_id: impl Into<String>) -> Self {
        MediaDocument {
            video_id: Some(video_id.into()),
            ..Self::with_id(id, MediaType::Image)
        }
    }

    /// Marker written through bulk insert to delete `id` at `rev`.
    pub fn tombstone(id: impl Into<String>, rev: Revision) -> Self {
        MediaDocument {
            id: Some(id.into()),
            rev: Some(rev),
            deleted: true,
            ..Default::default()
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The id, or `InvalidArgument` for documents that were never given one.
    pub fn require_id(&self) -> Result<&str, AppError> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidArgument("Document has no id".to_string()))
    }

    /// Typed kind; `None` for a missing or unknown `type`.
    pub fn media_type(&self) -> Option<MediaType> {
        self.kind.as_deref().and_then(|k| k.parse().ok())
    }

    pub fn is_video(&self) -> bool {
        self.media_type() == Some(MediaType::Video)
    }

    pub fn is_image(&self) -> bool {
        self.media_type() == Some(MediaType::Image)
    }

    /// Images without a `video_id` back-reference.
    pub fn is_standalone(&self) -> bool {
        self.is_image() && self.video_id.is_none()
    }

    /// Whether `name` is listed in either attachment map.
    pub fn has_attachment(&self, name: &str) -> bool {
        self.embedded_attachments.contains_key(name) || self.attachments.contains_key(name)
    }

    /// Names listed in either attachment map, sorted and deduplicated.
    pub fn attachment_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .embedded_attachments
            .keys()
            .chain(self.attachments.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Byte length of `name`, or -1 when the document does not list it.
    pub fn attachment_size(&self, name: &str) -> i64 {
        if let Some(external) = self.attachments.get(name) {
            return external.length as i64;
        }
        if let Some(stub) = self.embedded_attachments.get(name) {
            return stub.length as i64;
        }
        -1
    }

    pub fn attachment_content_type(&self, name: &str) -> Option<&str> {
        self.attachments
            .get(name)
            .map(|a| a.content_type.as_str())
            .or_else(|| {
                self.embedded_attachments
                    .get(name)
                    .map(|a| a.content_type.as_str())
            })
    }

    /// Locator persisted for an externally stored attachment.
    pub fn external_locator(&self, name: &str) -> Option<&str> {
        self.attachments.get(name).map(|a| a.locator.as_str())
    }

    pub fn clear_analysis(&mut self) {
        self.analysis = None;
    }

    /// Strip what the analyzer derives from a video's source attachment.
    pub fn clear_video_metadata(&mut self) {
        self.metadata = None;
        self.frame_count = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_round_trips_couch_fields() {
        let raw = json!({
            "_id": "v1",
            "_rev": "2-abc",
            "type": "video",
            "_attachments": {
                "video.mp4": { "content_type": "video/mp4", "length": 42, "stub": true, "revpos": 2 }
            },
            "title": "holiday"
        });

        let doc: MediaDocument = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(doc.id(), Some("v1"));
        assert_eq!(doc.rev.as_ref().map(Revision::generation), Some(2));
        assert_eq!(doc.media_type(), Some(MediaType::Video));
        assert_eq!(doc.attachment_size(VIDEO_ATTACHMENT), 42);
        assert_eq!(doc.extra.get("title"), Some(&json!("holiday")));

        assert_eq!(serde_json::to_value(&doc).unwrap(), raw);
    }

    #[test]
    fn test_attachment_size_sentinel() {
        let mut doc = MediaDocument::with_id("i1", MediaType::Image);
        assert_eq!(doc.attachment_size(IMAGE_ATTACHMENT), -1);

        doc.attachments.insert(
            IMAGE_ATTACHMENT.to_string(),
            ExternalAttachment {
                content_type: "image/jpeg".to_string(),
                length: 7,
                locator: "http://blobs/i1-image.jpg".to_string(),
            },
        );
        assert_eq!(doc.attachment_size(IMAGE_ATTACHMENT), 7);
        assert_eq!(doc.attachment_content_type(IMAGE_ATTACHMENT), Some("image/jpeg"));
        assert_eq!(doc.attachment_content_type("thumbnail.jpg"), None);
        assert_eq!(doc.external_locator(IMAGE_ATTACHMENT), Some("http://blobs/i1-image.jpg"));
    }

    #[test]
    fn test_media_type_parse_is_exact() {
        assert_eq!("video".parse::<MediaType>().ok(), Some(MediaType::Video));
        assert_eq!("image".parse::<MediaType>().ok(), Some(MediaType::Image));
        assert!("Video".parse::<MediaType>().is_err());
        assert!("IMAGE".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_attachment_names_merges_both_maps() {
        let mut doc = MediaDocument::with_id("v1", MediaType::Video);
        doc.embedded_attachments.insert(
            "b.jpg".to_string(),
            AttachmentStub {
                content_type: "image/jpeg".to_string(),
                length: 1,
                digest: None,
                revpos: None,
                stub: true,
            },
        );
        doc.attachments.insert(
            "a.jpg".to_string(),
            ExternalAttachment {
                content_type: "image/jpeg".to_string(),
                length: 1,
                locator: "x".to_string(),
            },
        );
        assert_eq!(doc.attachment_names(), vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_standalone_image() {
        let standalone = MediaDocument::with_id("i1", MediaType::Image);
        let owned = MediaDocument::image_of("i2", "v1");
        assert!(standalone.is_standalone());
        assert!(!owned.is_standalone());
        assert!(!MediaDocument::with_id("v1", MediaType::Video).is_standalone());
    }

    #[test]
    fn test_tombstone_serialization() {
        let doc = MediaDocument::tombstone("i1", Revision::new("3-x"));
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({ "_id": "i1", "_rev": "3-x", "_deleted": true })
        );
    }

    #[test]
    fn test_require_id() {
        let doc = MediaDocument {
            kind: Some("video".to_string()),
            ..Default::default()
        };
        assert!(matches!(doc.require_id(), Err(AppError::InvalidArgument(_))));
        assert_eq!(MediaDocument::new(MediaType::Video).require_id().unwrap().len(), 32);
    }
}
