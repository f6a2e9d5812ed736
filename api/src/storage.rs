//! Asset storage on local disk or in an S3 bucket.
//!
//! Video records only hold a pointer string. Local assets are stored as their
//! public URL; bucket objects as `bucket,key`, which is turned into a presigned
//! URL whenever the record leaves the server.

use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::videos::Video;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("local storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("object store request failed: {0}")]
    ObjectStore(String),
    #[error("failed to presign {0}")]
    Presign(String),
    #[error("invalid asset key: {0}")]
    InvalidKey(String),
    #[error("pointer {0} cannot be resolved by the configured backend")]
    Unsupported(String),
}

/// Where a stored pointer leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    Url(String),
    Bucket { bucket: String, key: String },
}

impl AssetLocation {
    pub fn parse(pointer: &str) -> Self {
        match pointer.split(',').collect::<Vec<_>>().as_slice() {
            [bucket, key] => AssetLocation::Bucket {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => AssetLocation::Url(pointer.to_string()),
        }
    }

    pub fn to_pointer(&self) -> String {
        match self {
            AssetLocation::Url(url) => url.clone(),
            AssetLocation::Bucket { bucket, key } => format!("{},{}", bucket, key),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    pub assets_root: PathBuf,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    presign_expiry: Duration,
}

#[derive(Debug, Clone)]
pub enum Storage {
    Local(LocalStorage),
    S3(S3Storage),
}

/// Reject keys that could escape the asset root
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\0')
        || key.split('/').any(|segment| segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl LocalStorage {
    pub fn new(assets_root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            assets_root: assets_root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn disk_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.assets_root.join(key))
    }

    pub fn url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Asset key behind a URL produced by this backend
    fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.base_url)?.strip_prefix('/')
    }

    async fn prepare(&self, key: &str) -> Result<PathBuf, StorageError> {
        let full_path = self.disk_path(key)?;
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(full_path)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let full_path = self.disk_path(key)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>, presign_expiry: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            presign_expiry,
        }
    }

    /// Build a client from the ambient AWS credentials chain
    pub async fn connect(bucket: &str, region: &str, presign_expiry: Duration) -> Self {
        let config = aws_config::from_env()
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(S3Client::new(&config), bucket, presign_expiry)
    }

    async fn put(&self, key: &str, body: ByteStream, content_type: &str) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        Ok(AssetLocation::Bucket {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
        .to_pointer())
    }

    async fn presign(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        let config = PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| {
                StorageError::Presign(format!("{}/{}: {}", bucket, key, DisplayErrorContext(&e)))
            })?;

        Ok(request.uri().to_string())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

impl Storage {
    /// Create the local asset directory if it does not exist yet
    pub async fn ensure_ready(&self) -> Result<(), StorageError> {
        if let Storage::Local(local) = self {
            tokio::fs::create_dir_all(&local.assets_root).await?;
        }
        Ok(())
    }

    /// Root directory when assets live on local disk
    pub fn local_root(&self) -> Option<&Path> {
        match self {
            Storage::Local(local) => Some(&local.assets_root),
            Storage::S3(_) => None,
        }
    }

    /// Store the file at `source` under `key`; returns the pointer to persist
    pub async fn put_file(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> Result<String, StorageError> {
        match self {
            Storage::Local(local) => {
                let full_path = local.prepare(key).await?;
                tokio::fs::copy(source, &full_path).await?;
                tracing::debug!(path = %full_path.display(), "stored local asset");
                Ok(local.url(key))
            }
            Storage::S3(s3) => {
                let body = ByteStream::from_path(source)
                    .await
                    .map_err(|e| StorageError::ObjectStore(e.to_string()))?;
                s3.put(key, body, content_type).await
            }
        }
    }

    /// Store an in-memory payload under `key`; returns the pointer to persist
    pub async fn put_bytes(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        match self {
            Storage::Local(local) => {
                let full_path = local.prepare(key).await?;
                tokio::fs::write(&full_path, &data).await?;
                tracing::debug!(path = %full_path.display(), bytes = data.len(), "stored local asset");
                Ok(local.url(key))
            }
            Storage::S3(s3) => s3.put(key, ByteStream::from(data), content_type).await,
        }
    }

    /// Client-facing URL for a stored pointer
    pub async fn resolve(&self, pointer: &str) -> Result<String, StorageError> {
        match (AssetLocation::parse(pointer), self) {
            (AssetLocation::Url(url), _) => Ok(url),
            (AssetLocation::Bucket { bucket, key }, Storage::S3(s3)) => {
                s3.presign(&bucket, &key).await
            }
            (AssetLocation::Bucket { .. }, Storage::Local(_)) => {
                Err(StorageError::Unsupported(pointer.to_string()))
            }
        }
    }

    /// Remove the asset a pointer refers to. Pointers this backend did not
    /// produce are left alone.
    pub async fn delete(&self, pointer: &str) -> Result<(), StorageError> {
        match (AssetLocation::parse(pointer), self) {
            (AssetLocation::Url(url), Storage::Local(local)) => match local.key_for_url(&url) {
                Some(key) => local.remove(key).await,
                None => {
                    tracing::debug!(%url, "not a local asset, skipping delete");
                    Ok(())
                }
            },
            (AssetLocation::Bucket { bucket, key }, Storage::S3(s3)) if bucket == s3.bucket => {
                s3.remove(&bucket, &key).await
            }
            _ => {
                tracing::debug!(%pointer, "pointer not owned by this backend, skipping delete");
                Ok(())
            }
        }
    }

    /// Replace stored pointers with URLs a client can fetch
    pub async fn sign_video(&self, mut video: Video) -> Result<Video, StorageError> {
        if let Some(pointer) = video.video_url.take() {
            video.video_url = Some(self.resolve(&pointer).await?);
        }
        if let Some(pointer) = video.thumbnail_url.take() {
            video.thumbnail_url = Some(self.resolve(&pointer).await?);
        }
        Ok(video)
    }
}
