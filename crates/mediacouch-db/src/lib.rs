//! Mediacouch Database Library
//!
//! This crate provides the document-store contracts, the CouchDB and
//! in-memory implementations of them, the bootstrap procedure, and the
//! `MediaRepository` that layers the media lifecycle workflows on top.

pub mod db;
pub mod setup;

pub use db::{
    AttachmentBackend, AttachmentBackendKind, AttachmentFailure, AttachmentLocator,
    AttachmentWrite, Bootstrap, CouchDocumentStore, CouchServer, DatabaseAdmin, DatabaseServer,
    DeleteOutcome, DesignDocument, DocumentAttachments, DocumentStore, EmbeddedAttachment,
    ExternalBlobStore, InMemoryDocumentStore, InMemoryServer, MediaDatabase, MediaRef,
    MediaRepository, RetryPolicy, VideoResetOutcome, ViewIndex, ViewQuery, ViewRow,
};
pub use setup::connect;
