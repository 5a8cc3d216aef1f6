//! Shared key generation for blob stores.
//!
//! Key format: `<document-id>-<attachment-name>`.

use crate::traits::{StorageError, StorageResult};

/// Deterministic blob key for an attachment of a document.
pub fn attachment_key(doc_id: &str, attachment_name: &str) -> String {
    format!("{}-{}", doc_id, attachment_name)
}

/// Public locator of `key` under a store's base URL.
pub fn locator_for(storage_url: &str, key: &str) -> String {
    format!("{}/{}", storage_url.trim_end_matches('/'), key)
}

/// Key addressed by `locator` when it lives under `storage_url`.
pub fn key_from_locator(storage_url: &str, locator: &str) -> Option<String> {
    let base = storage_url.trim_end_matches('/');
    locator
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
        .map(String::from)
}

/// Reject keys that could escape the store's namespace.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}
