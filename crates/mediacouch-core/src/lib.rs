//! Mediacouch Core Library
//!
//! This crate provides the document model, error types, configuration and the
//! readiness predicate shared by every Mediacouch component.

pub mod config;
pub mod error;
pub mod models;
pub mod readiness;
pub mod storage_types;
pub mod stream;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use readiness::is_ready_to_process;
pub use storage_types::FileStoreKind;
pub use stream::ByteStream;
