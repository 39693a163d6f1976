//! Local storage for uploaded PDFs and generated audio.
//!
//! Files live under the public directory, which the router serves at
//! `/public`. Keys are paths relative to that directory, e.g.
//! `uploads/20240501T101500Z-1b4e28ba.pdf`.

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub const UPLOADS_DIR: &str = "uploads";
pub const AUDIO_DIR: &str = "audio";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("File not found: {0}")]
    NotFound(String),
}

/// Filesystem storage rooted at the public directory.
pub struct StorageService {
    root: PathBuf,
}

impl StorageService {
    /// Create the storage root and its `uploads/` and `audio/` subdirectories.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        for dir in [UPLOADS_DIR, AUDIO_DIR] {
            tokio::fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a new file.
    ///
    /// Fails rather than overwrite when `key` already exists.
    ///
    /// # Returns
    /// The key that was written
    pub async fn save_file(&self, key: &str, content: &[u8]) -> Result<String, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(content).await?;
        file.flush().await?;

        tracing::info!(key, bytes = content.len(), "Stored file");
        Ok(key.to_string())
    }

    pub async fn read_file(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_file(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key, "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a file, logging instead of failing.
    ///
    /// # Returns
    /// true if the file was removed
    pub async fn delete_file_best_effort(&self, key: &str) -> bool {
        match self.delete_file(key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Could not delete stored file");
                false
            }
        }
    }

    pub async fn file_exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Normalise a client-supplied key, rejecting anything that could escape the root.
    ///
    /// A leading `/public/` is stripped so stored URLs are accepted too.
    pub fn validate_key(key: &str) -> Result<String, StorageError> {
        let key = key.trim_start_matches("/public/");
        let safe = !key.is_empty()
            && Path::new(key)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(key.to_string())
    }

    /// Map a key to a path under the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(Self::validate_key(key)?))
    }

    /// Generate a collision-free key.
    ///
    /// Format: `{dir}/{timestamp}-{uuid}.{extension}`
    pub fn make_key(dir: &str, extension: &str) -> String {
        format!(
            "{}/{}-{}.{}",
            dir,
            Utc::now().format("%Y%m%dT%H%M%SZ"),
            Uuid::new_v4().simple(),
            extension.trim_start_matches('.')
        )
    }

    /// URL path the router serves a key under.
    pub fn public_url(key: &str) -> String {
        format!("/public/{}", key.trim_start_matches("/public/").trim_start_matches('/'))
    }
}
