pub mod attachment;
#[allow(clippy::module_inception)]
pub mod media;
pub mod status;

pub use attachment::{
    AttachmentBackend, AttachmentBackendKind, AttachmentLocator, AttachmentWrite,
    EmbeddedAttachment, ExternalBlobStore,
};
pub use media::{AttachmentFailure, DeleteOutcome, MediaRef, MediaRepository, VideoResetOutcome};
