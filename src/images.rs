//! Product image blobs in a flat namespace.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid image filename: {0:?}")]
    InvalidFilename(String),
    #[error("image is empty")]
    Empty,
    #[error("image storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stores `bytes` under `filename`, replacing any blob of the same name.
    /// Returns the stored filename.
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ImageError>;
    async fn delete(&self, filename: &str) -> Result<(), ImageError>;
    fn public_url(&self, filename: &str) -> String;
}

/// Trimmed filename with no path components.
pub fn validate_filename(filename: &str) -> Result<String, ImageError> {
    let name = filename.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ImageError::InvalidFilename(filename.to_string()));
    }
    Ok(name.to_string())
}

/// Image directory on local disk, served statically under `base_url`.
pub struct FsImageStore {
    dir: PathBuf,
    base_url: String,
}

impl FsImageStore {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self { dir: dir.into(), base_url: base_url.into() }
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ImageError> {
        let name = validate_filename(filename)?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&name), &bytes).await?;
        tracing::debug!(filename = %name, size = bytes.len(), "image stored");
        Ok(name)
    }

    async fn delete(&self, filename: &str) -> Result<(), ImageError> {
        let name = validate_filename(filename)?;
        match tokio::fs::remove_file(self.dir.join(&name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), urlencoding::encode(filename))
    }
}
