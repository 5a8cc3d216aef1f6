//! Mediacouch Storage Library
//!
//! This crate provides the external blob store used for attachments when a
//! file store is configured: the `BlobStore` trait and implementations for S3
//! and the local filesystem.
//!
//! # Key format
//!
//! Every attachment lives under the deterministic key
//! `<document-id>-<attachment-name>`, and the locator persisted on the
//! document is `<storage-url>/<key>`. Keys must not contain `..` or a leading
//! `/`. Key generation is centralized in the `keys` module so all backends
//! and the repository agree.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_file_store;
pub use keys::attachment_key;
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
pub use mediacouch_core::FileStoreKind;
#[cfg(feature = "storage-s3")]
pub use s3::S3BlobStore;
pub use traits::{BlobStore, BlobWritten, StorageError, StorageResult};
