//! Seed documents through the repository, the way collaborators create them.

use mediacouch_core::models::{
    MediaDocument, MediaType, IMAGE_ATTACHMENT, THUMBNAIL_ATTACHMENT, VIDEO_ATTACHMENT,
};
use mediacouch_db::MediaRepository;
use serde_json::json;

pub const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42 video-frames";
pub const IMAGE_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 jpeg-bytes";
pub const THUMBNAIL_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 thumb";

/// Video with its source attachment and nothing else.
pub async fn seed_video(repo: &MediaRepository, id: &str) -> MediaDocument {
    let doc = MediaDocument::with_id(id, MediaType::Video);
    let rev = repo.insert(&doc).await.unwrap();
    let doc = MediaDocument {
        rev: Some(rev),
        ..doc
    };
    repo.attach_file(&doc, VIDEO_ATTACHMENT, VIDEO_BYTES, "video/mp4")
        .await
        .unwrap();
    repo.get(id).await.unwrap()
}

/// Video the analyzer has already processed: metadata, frame count and thumbnail.
pub async fn seed_analyzed_video(repo: &MediaRepository, id: &str) -> MediaDocument {
    let mut doc = seed_video(repo, id).await;
    doc.metadata = Some(json!({ "duration": 12.5, "fps": 25 }));
    doc.frame_count = Some(312);
    repo.insert(&doc).await.unwrap();

    let doc = repo.get(id).await.unwrap();
    repo.attach_file(&doc, THUMBNAIL_ATTACHMENT, THUMBNAIL_BYTES, "image/jpeg")
        .await
        .unwrap();
    repo.get(id).await.unwrap()
}

/// Image with its source attachment, optionally owned by a video.
pub async fn seed_image(repo: &MediaRepository, id: &str, video_id: Option<&str>) -> MediaDocument {
    let doc = match video_id {
        Some(video_id) => MediaDocument::image_of(id, video_id),
        None => MediaDocument::with_id(id, MediaType::Image),
    };
    let rev = repo.insert(&doc).await.unwrap();
    let doc = MediaDocument {
        rev: Some(rev),
        ..doc
    };
    repo.attach_file(&doc, IMAGE_ATTACHMENT, IMAGE_BYTES, "image/jpeg")
        .await
        .unwrap();
    repo.get(id).await.unwrap()
}

/// Image with analyzer output.
pub async fn seed_analyzed_image(
    repo: &MediaRepository,
    id: &str,
    video_id: Option<&str>,
) -> MediaDocument {
    let mut doc = seed_image(repo, id, video_id).await;
    doc.analysis = Some(json!({ "labels": ["beach", "sunset"] }));
    repo.insert(&doc).await.unwrap();
    repo.get(id).await.unwrap()
}
