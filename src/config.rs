//! Configuration loader and validator for the listings service.
use crate::session::StaticSession;
use crate::storage::{LocalStorage, ObjectStorage, StorageError, SupabaseStorage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub storage: Storage,
    #[serde(default)]
    pub session: Session,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
}

fn default_max_images() -> usize {
    crate::wizard::DEFAULT_MAX_IMAGES
}

/// Object storage settings. Without a `supabase` block, objects are written
/// under `{data_dir}/storage/{bucket}` and served from `public_url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    pub bucket: String,
    #[serde(default)]
    pub public_url: String,
    #[serde(default)]
    pub supabase: Option<Supabase>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Supabase {
    pub url: String,
    pub service_key: String,
}

/// Identity the CLI acts as. No user means anonymous.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)?;
        if self.storage.supabase.is_none() {
            fs::create_dir_all(self.storage_root())?;
        }
        Ok(())
    }

    /// `DATABASE_URL` when set, otherwise a SQLite file in the data dir.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.default_database_url())
    }

    pub fn default_database_url(&self) -> String {
        format!(
            "sqlite://{}/toca.db?mode=rwc",
            self.app.data_dir.trim_end_matches('/')
        )
    }

    pub fn storage_root(&self) -> PathBuf {
        Path::new(&self.app.data_dir)
            .join("storage")
            .join(&self.storage.bucket)
    }

    /// Build the configured storage backend.
    pub fn object_storage(&self) -> Result<Arc<dyn ObjectStorage>, StorageError> {
        match &self.storage.supabase {
            Some(sb) => Ok(Arc::new(SupabaseStorage::new(
                &sb.url,
                &self.storage.bucket,
                &sb.service_key,
            )?)),
            None => Ok(Arc::new(LocalStorage::new(
                self.storage_root(),
                &self.storage.public_url,
            )?)),
        }
    }

    pub fn session(&self) -> StaticSession {
        match self.session.user_id {
            Some(id) => StaticSession::signed_in(id),
            None => StaticSession::anonymous(),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.max_images == 0 {
        return Err(ConfigError::Invalid("app.max_images must be > 0"));
    }

    if cfg.storage.bucket.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.bucket must be non-empty"));
    }
    if cfg.storage.bucket.contains('/') {
        return Err(ConfigError::Invalid("storage.bucket must not contain '/'"));
    }
    match &cfg.storage.supabase {
        Some(sb) => {
            if sb.url.trim().is_empty() {
                return Err(ConfigError::Invalid("storage.supabase.url must be non-empty"));
            }
            if sb.service_key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.supabase.service_key must be non-empty",
                ));
            }
        }
        None => {
            if cfg.storage.public_url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "storage.public_url must be non-empty for local storage",
                ));
            }
        }
    }

    Ok(())
}

/// Reference configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  max_images: 5

storage:
  bucket: "post-images"
  public_url: "http://localhost:8080/post-images/"
  # supabase:
  #   url: "https://YOUR_PROJECT.supabase.co"
  #   service_key: "YOUR_SERVICE_ROLE_KEY"

session:
  user_id: "6f1c2b9e-3d4a-4e8f-9a51-0c2d7e8b4f10"
"#
}
