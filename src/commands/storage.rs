// Bucket operations for callers holding a fully resolved configuration
// All I/O goes through the shared storage manager; reconfiguring it never
// waits for calls already in flight

use std::path::{Path, PathBuf};

use crate::storage::{
    configure_storage_manager, get_storage_manager, BucketEndpointConfig, ClientOptions,
    ProgressCallback, S3Object, StorageError, UploadResult,
};
use crate::upload::{self, BatchProgressCallback, ResolvedUrl, UploadSource};

/// Replaces the shared client's HTTP options
pub async fn configure(options: ClientOptions) -> Result<(), StorageError> {
    configure_storage_manager(options).await
}

/// Uploads `file_bytes` under a key chosen by the configuration's rename policy
pub async fn upload(
    file_bytes: Vec<u8>,
    filename: &str,
    config: &BucketEndpointConfig,
    on_progress: Option<ProgressCallback>,
) -> Result<UploadResult, StorageError> {
    let manager = get_storage_manager().await?;
    manager.upload(file_bytes, filename, config, on_progress).await
}

pub async fn upload_file(
    path: &Path,
    config: &BucketEndpointConfig,
    on_progress: Option<ProgressCallback>,
) -> Result<UploadResult, StorageError> {
    let manager = get_storage_manager().await?;
    manager.upload_file(path, config, on_progress).await
}

/// One result per source, in order; see [`upload::upload_batch`]
pub async fn upload_batch(
    sources: Vec<UploadSource>,
    config: &BucketEndpointConfig,
    concurrency: usize,
    on_progress: Option<BatchProgressCallback>,
) -> Result<Vec<Result<UploadResult, StorageError>>, StorageError> {
    let manager = get_storage_manager().await?;
    Ok(upload::upload_batch(&manager, sources, config, concurrency, on_progress).await)
}

/// Objects under the key prefix, newest first
pub async fn list(config: &BucketEndpointConfig) -> Result<Vec<S3Object>, StorageError> {
    let manager = get_storage_manager().await?;
    manager.list(config).await
}

/// Downloads `key`; returns the path written, which differs from
/// `destination` when that name was taken and `overwrite` is false
pub async fn download(
    key: &str,
    destination: &Path,
    config: &BucketEndpointConfig,
    overwrite: bool,
    on_progress: Option<ProgressCallback>,
) -> Result<PathBuf, StorageError> {
    let manager = get_storage_manager().await?;
    manager
        .download(key, destination, config, overwrite, on_progress)
        .await
}

pub async fn delete(key: &str, config: &BucketEndpointConfig) -> Result<(), StorageError> {
    let manager = get_storage_manager().await?;
    manager.delete(key, config).await
}

pub async fn head(key: &str, config: &BucketEndpointConfig) -> Result<S3Object, StorageError> {
    let manager = get_storage_manager().await?;
    manager.head(key, config).await
}

/// Checks credentials and endpoint without needing list permission
pub async fn verify(config: &BucketEndpointConfig) -> Result<(), StorageError> {
    let manager = get_storage_manager().await?;
    manager.verify(config).await
}

pub async fn presign_url(
    key: &str,
    config: &BucketEndpointConfig,
    expires_in_seconds: i64,
) -> Result<String, StorageError> {
    let manager = get_storage_manager().await?;
    manager.presign_url(key, config, expires_in_seconds)
}

/// Shareable URL for `key`; no I/O
pub fn build_url(key: &str, config: &BucketEndpointConfig, template: Option<&str>) -> String {
    upload::build_url(key, config, template)
}

pub fn resolve_all(key: &str, config: &BucketEndpointConfig) -> Vec<ResolvedUrl> {
    upload::resolve_all(key, config)
}
