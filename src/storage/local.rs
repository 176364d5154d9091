use super::{key_after_prefix, validate_key, ObjectStorage, StorageError};
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Filesystem-backed bucket: objects are files under `root`, served by
/// something else under `public_url`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: Url,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Result<Self, StorageError> {
        let mut base = public_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let public_url = Url::parse(&base).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            root: root.into(),
            public_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    #[instrument(skip_all, fields(key = %key))]
    async fn upload(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(key.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(bytes).await?;
        file.flush().await?;

        let url = self
            .public_url
            .join(key)
            .map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        debug!(path = %path.display(), size = bytes.len(), "stored object");
        Ok(url.to_string())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        key_after_prefix(url, self.public_url.as_str())
    }
}
