use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::storage::config::BucketEndpointConfig;

/// Progress callback, receives the completed fraction in `[0, 1]`
///
/// May be invoked from a background I/O task.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// An object as reported by a listing, a HEAD request, or synthesized
/// locally right after an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    /// Full key within the bucket, prefix included
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl S3Object {
    /// Last path segment of the key
    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub content_hash: Option<String>,
    /// Local stand-in for the uploaded object until the next listing
    pub object: S3Object,
}

/// Broad error categories callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Protocol,
    Filesystem,
}

/// Storage client error type
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Request failed with status {status}: {body}")]
    Protocol { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Filesystem(String),
}

impl StorageError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StorageError::Configuration(_) => ErrorCategory::Configuration,
            StorageError::Transport(_) => ErrorCategory::Transport,
            StorageError::Protocol { .. } | StorageError::MalformedResponse(_) => {
                ErrorCategory::Protocol
            }
            StorageError::Filesystem(_) => ErrorCategory::Filesystem,
        }
    }

    /// The missing-credentials error every operation fails fast with
    pub(crate) fn not_configured() -> Self {
        StorageError::Configuration(
            "access key id, secret access key and bucket are required".to_string(),
        )
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Filesystem(e.to_string())
    }
}

/// Object storage operations, one per HTTP verb
///
/// Every call carries its own configuration; implementations hold no
/// per-bucket state.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads `body` under the already-computed storage `key`
    async fn put_object(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<(), StorageError>;

    /// Lists objects, most recently modified first
    async fn list_objects(
        &self,
        config: &BucketEndpointConfig,
        max_keys: Option<u32>,
    ) -> Result<Vec<S3Object>, StorageError>;

    /// Downloads `key` to `destination`, returning the path actually written
    async fn download_object(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
        destination: &Path,
        overwrite: bool,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PathBuf, StorageError>;

    async fn delete_object(&self, config: &BucketEndpointConfig, key: &str)
        -> Result<(), StorageError>;

    async fn head_object(
        &self,
        config: &BucketEndpointConfig,
        key: &str,
    ) -> Result<S3Object, StorageError>;
}
