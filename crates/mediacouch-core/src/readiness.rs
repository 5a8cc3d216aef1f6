//! "Ready to process" predicate used by the analyzer and the `to_be_analyzed` views.
//!
//! A video is ready when it carries `video.mp4` and has no `metadata`; an image
//! is ready when it carries `image.jpg` and has no `analysis`. Anything else is
//! not ready. The `type` discriminator must match exactly. The predicate
//! cannot fail.

use crate::models::{MediaDocument, MediaType};

pub fn is_ready_to_process(doc: &MediaDocument) -> bool {
    match doc.media_type() {
        Some(MediaType::Video) => {
            doc.has_attachment(MediaType::Video.source_attachment()) && doc.metadata.is_none()
        }
        Some(MediaType::Image) => {
            doc.has_attachment(MediaType::Image.source_attachment()) && doc.analysis.is_none()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttachmentStub, ExternalAttachment, IMAGE_ATTACHMENT, VIDEO_ATTACHMENT};
    use serde_json::json;

    fn stub() -> AttachmentStub {
        AttachmentStub {
            content_type: "application/octet-stream".to_string(),
            length: 3,
            digest: None,
            revpos: None,
            stub: true,
        }
    }

    #[test]
    fn test_video_ready_only_with_source_and_without_metadata() {
        let mut video = MediaDocument::with_id("v1", MediaType::Video);
        assert!(!is_ready_to_process(&video));

        video
            .embedded_attachments
            .insert(VIDEO_ATTACHMENT.to_string(), stub());
        assert!(is_ready_to_process(&video));

        video.metadata = Some(json!({ "duration": 12.5 }));
        assert!(!is_ready_to_process(&video));
    }

    #[test]
    fn test_image_ready_with_external_attachment() {
        let mut image = MediaDocument::image_of("i1", "v1");
        image.attachments.insert(
            IMAGE_ATTACHMENT.to_string(),
            ExternalAttachment {
                content_type: "image/jpeg".to_string(),
                length: 3,
                locator: "http://blobs/i1-image.jpg".to_string(),
            },
        );
        assert!(is_ready_to_process(&image));

        image.analysis = Some(json!({ "faces": [] }));
        assert!(!is_ready_to_process(&image));
    }

    #[test]
    fn test_wrong_attachment_for_kind_is_not_ready() {
        let mut image = MediaDocument::with_id("i1", MediaType::Image);
        image
            .embedded_attachments
            .insert(VIDEO_ATTACHMENT.to_string(), stub());
        assert!(!is_ready_to_process(&image));
    }

    #[test]
    fn test_unknown_type_is_not_ready() {
        let mut doc = MediaDocument {
            id: Some("x".to_string()),
            kind: Some("audio".to_string()),
            ..Default::default()
        };
        doc.embedded_attachments
            .insert(VIDEO_ATTACHMENT.to_string(), stub());
        assert!(!is_ready_to_process(&doc));
        assert!(!is_ready_to_process(&MediaDocument::default()));
    }

    #[test]
    fn test_type_discriminator_is_case_sensitive() {
        for (kind, attachment) in [("Video", VIDEO_ATTACHMENT), ("IMAGE", IMAGE_ATTACHMENT)] {
            let mut doc = MediaDocument {
                id: Some("x".to_string()),
                kind: Some(kind.to_string()),
                ..Default::default()
            };
            doc.embedded_attachments
                .insert(attachment.to_string(), stub());

            assert_eq!(doc.media_type(), None, "{kind}");
            assert!(!doc.is_video() && !doc.is_image(), "{kind}");
            assert!(!is_ready_to_process(&doc), "{kind}");
        }
    }
}
