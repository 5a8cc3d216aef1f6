//! Aggregate views over the media collection.
//!
//! Each view is kept twice: as the JavaScript map source installed into the
//! database, and as a Rust emit function the in-memory store evaluates. Both
//! must emit the same rows for the same document.

use mediacouch_core::is_ready_to_process;
use mediacouch_core::models::MediaDocument;
use serde_json::Value as JsonValue;

use super::store::{DesignDocument, ViewSource};

pub const VIDEOS: &str = "videos";
pub const IMAGES: &str = "images";

pub const ALL: &str = "all";
pub const TO_BE_ANALYZED: &str = "to_be_analyzed";
pub const BY_VIDEO_ID: &str = "by_video_id";
pub const TOTAL_BY_VIDEO_ID: &str = "total_by_video_id";
pub const PROCESSED_BY_VIDEO_ID: &str = "processed_by_video_id";
pub const STANDALONE: &str = "standalone";

const COUNT: &str = "_count";

type EmitFn = fn(&MediaDocument) -> Vec<(JsonValue, JsonValue)>;

pub struct ViewDefinition {
    pub design: &'static str,
    pub name: &'static str,
    pub map: &'static str,
    pub reduce: Option<&'static str>,
    emit: EmitFn,
}

impl ViewDefinition {
    /// Rows this view maps `doc` to, as `(key, value)` pairs.
    pub fn emit(&self, doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
        (self.emit)(doc)
    }

    pub fn has_reduce(&self) -> bool {
        self.reduce.is_some()
    }
}

fn by_id(doc: &MediaDocument, keep: bool) -> Vec<(JsonValue, JsonValue)> {
    match (keep, doc.id()) {
        (true, Some(id)) => vec![(JsonValue::from(id), JsonValue::Null)],
        _ => Vec::new(),
    }
}

fn by_video(doc: &MediaDocument, keep: bool) -> Vec<(JsonValue, JsonValue)> {
    match (keep && doc.is_image(), doc.video_id.as_deref()) {
        (true, Some(video_id)) => vec![(JsonValue::from(video_id), JsonValue::Null)],
        _ => Vec::new(),
    }
}

fn all_videos(doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
    by_id(doc, doc.is_video())
}

fn videos_to_be_analyzed(doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
    by_id(doc, doc.is_video() && is_ready_to_process(doc))
}

fn all_images(doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
    by_id(doc, doc.is_image())
}

fn images_to_be_analyzed(doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
    by_id(doc, doc.is_image() && is_ready_to_process(doc))
}

fn images_by_video(doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
    by_video(doc, true)
}

fn processed_images_by_video(doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
    by_video(doc, doc.analysis.is_some())
}

fn standalone_images(doc: &MediaDocument) -> Vec<(JsonValue, JsonValue)> {
    by_id(doc, doc.is_standalone())
}

pub static DEFINITIONS: &[ViewDefinition] = &[
    ViewDefinition {
        design: VIDEOS,
        name: ALL,
        map: "function (doc) {\n  if (doc.type === 'video') emit(doc._id, null);\n}",
        reduce: Some(COUNT),
        emit: all_videos,
    },
    ViewDefinition {
        design: VIDEOS,
        name: TO_BE_ANALYZED,
        map: "function (doc) {\n  if (doc.type !== 'video') return;\n  var stored = (doc._attachments && doc._attachments['video.mp4']) ||\n    (doc.attachments && doc.attachments['video.mp4']);\n  if (stored && doc.metadata == null) emit(doc._id, null);\n}",
        reduce: Some(COUNT),
        emit: videos_to_be_analyzed,
    },
    ViewDefinition {
        design: IMAGES,
        name: ALL,
        map: "function (doc) {\n  if (doc.type === 'image') emit(doc._id, null);\n}",
        reduce: Some(COUNT),
        emit: all_images,
    },
    ViewDefinition {
        design: IMAGES,
        name: TO_BE_ANALYZED,
        map: "function (doc) {\n  if (doc.type !== 'image') return;\n  var stored = (doc._attachments && doc._attachments['image.jpg']) ||\n    (doc.attachments && doc.attachments['image.jpg']);\n  if (stored && doc.analysis == null) emit(doc._id, null);\n}",
        reduce: Some(COUNT),
        emit: images_to_be_analyzed,
    },
    ViewDefinition {
        design: IMAGES,
        name: BY_VIDEO_ID,
        map: "function (doc) {\n  if (doc.type === 'image' && doc.video_id != null) emit(doc.video_id, null);\n}",
        reduce: None,
        emit: images_by_video,
    },
    ViewDefinition {
        design: IMAGES,
        name: TOTAL_BY_VIDEO_ID,
        map: "function (doc) {\n  if (doc.type === 'image' && doc.video_id != null) emit(doc.video_id, null);\n}",
        reduce: Some(COUNT),
        emit: images_by_video,
    },
    ViewDefinition {
        design: IMAGES,
        name: PROCESSED_BY_VIDEO_ID,
        map: "function (doc) {\n  if (doc.type === 'image' && doc.video_id != null && doc.analysis != null) emit(doc.video_id, null);\n}",
        reduce: Some(COUNT),
        emit: processed_images_by_video,
    },
    ViewDefinition {
        design: IMAGES,
        name: STANDALONE,
        map: "function (doc) {\n  if (doc.type === 'image' && doc.video_id == null) emit(doc._id, null);\n}",
        reduce: None,
        emit: standalone_images,
    },
];

pub fn definition(design: &str, name: &str) -> Option<&'static ViewDefinition> {
    DEFINITIONS
        .iter()
        .find(|def| def.design == design && def.name == name)
}

/// Design documents to install, one per media type.
pub fn design_documents() -> Vec<DesignDocument> {
    [VIDEOS, IMAGES]
        .into_iter()
        .map(|design| {
            let mut doc = DesignDocument::new(design);
            for def in DEFINITIONS.iter().filter(|def| def.design == design) {
                doc.views.insert(
                    def.name.to_string(),
                    ViewSource {
                        map: def.map.to_string(),
                        reduce: def.reduce.map(str::to_string),
                    },
                );
            }
            doc
        })
        .collect()
}
