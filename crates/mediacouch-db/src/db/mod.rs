//! Database access layer
//!
//! `store` holds the contracts the rest of the crate is written against;
//! `couch` and `memory` implement them. `media` contains the repository and
//! the attachment backends, `bootstrap` and `views` the one-time setup.
//
// Contracts
pub mod store;
//
// Implementations
pub mod couch;
pub mod memory;
//
// Setup
pub mod bootstrap;
pub mod views;
//
// Media repository and attachment backends
pub mod media;

pub use bootstrap::Bootstrap;
pub use couch::{CouchDocumentStore, CouchServer, RetryPolicy};
pub use media::{
    AttachmentBackend, AttachmentBackendKind, AttachmentFailure, AttachmentLocator,
    AttachmentWrite, DeleteOutcome, EmbeddedAttachment, ExternalBlobStore, MediaRef,
    MediaRepository, VideoResetOutcome,
};
pub use memory::{InMemoryDocumentStore, InMemoryServer};
pub use store::{
    DatabaseAdmin, DatabaseServer, DesignDocument, DocumentAttachments, DocumentStore,
    MediaDatabase, ViewIndex, ViewQuery, ViewRow,
};
