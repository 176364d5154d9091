//! Object storage seam. Objects live under keys of the form
//! `{post_id}/{millis}-{index}.{ext}` and are reachable through a public URL.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

pub mod local;
pub mod supabase;

pub use local::LocalStorage;
pub use supabase::SupabaseStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage responded {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("object already exists: {0}")]
    AlreadyExists(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key` without overwriting and return the public URL.
    async fn upload(&self, key: &str, bytes: &[u8], content_type: &str)
        -> Result<String, StorageError>;

    /// Remove the object under `key`. Removing a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Recover the object key from a public URL produced by `upload`.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

/// Build a collision-resistant key namespaced by the owning post, keeping the
/// file extension when it is plain ASCII alphanumerics and `bin` otherwise,
/// so keys survive the trip through a URL unchanged.
pub fn object_key(post_id: Uuid, stamp_millis: i64, index: usize, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("bin");
    format!("{}/{}-{}.{}", post_id, stamp_millis, index, ext)
}

/// Keys are relative, slash-separated and may not escape their namespace.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub fn content_type_for(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Strip `prefix` from `url` and return the remainder if it is a valid key.
pub(crate) fn key_after_prefix(url: &str, prefix: &str) -> Option<String> {
    let key = url.strip_prefix(prefix)?;
    let key = key.split(['?', '#']).next().unwrap_or(key);
    validate_key(key).ok()?;
    Some(key.to_string())
}
