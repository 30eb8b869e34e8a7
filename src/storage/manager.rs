use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};

use super::config::{BucketEndpointConfig, ClientOptions};
use super::s3_client::S3Client;
use super::traits::{ProgressCallback, S3Object, StorageError, UploadResult};
use crate::upload::rename::{compute_key, storage_key};
use crate::upload::template;

/// Shared client plus a cap on concurrent transfers
pub struct StorageManager {
    client: S3Client,
    // uploads and downloads hold a permit for their whole duration
    request_semaphore: Arc<Semaphore>,
}

impl StorageManager {
    pub fn new(client: S3Client) -> Self {
        let permits = client.options().max_concurrent_transfers.max(1);
        Self {
            client,
            request_semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn from_options(options: ClientOptions) -> Result<Self, StorageError> {
        Ok(Self::new(S3Client::new(options)?))
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }

    async fn acquire_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>, StorageError> {
        self.request_semaphore.acquire().await.map_err(|_| {
            StorageError::Transport("Transfer semaphore acquisition failed".to_string())
        })
    }

    /// Names, uploads and addresses one file
    pub async fn upload(
        &self,
        file_bytes: Vec<u8>,
        filename: &str,
        config: &BucketEndpointConfig,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<UploadResult, StorageError> {
        config.ensure_configured()?;

        let now = self.client.now();
        let outcome = compute_key(filename, &file_bytes, &config.rename_policy, now);
        let key = storage_key(config, &outcome.basename);
        let content_type = mime_guess::from_path(&key)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let size = file_bytes.len() as u64;

        {
            let _permit = self.acquire_permit().await?;
            self.client
                .upload(config, &key, file_bytes, &content_type, progress_callback)
                .await?;
        }
        log::info!("Uploaded {} ({} bytes) to {}", filename, size, key);

        let url = template::build_url(&key, config, None);
        Ok(UploadResult {
            object: S3Object {
                key: key.clone(),
                size,
                last_modified: now,
                etag: None,
            },
            key,
            url,
            content_type,
            content_hash: outcome.content_hash,
        })
    }

    /// Reads `path` and uploads it under its file name
    pub async fn upload_file(
        &self,
        path: &Path,
        config: &BucketEndpointConfig,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<UploadResult, StorageError> {
        config.ensure_configured()?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StorageError::Filesystem(format!("Not a file path: {}", path.display()))
            })?;
        let file_bytes = tokio::fs::read(path).await.map_err(|e| {
            StorageError::Filesystem(format!("Failed to read {}: {}", path.display(), e))
        })?;
        self.upload(file_bytes, &filename, config, progress_callback).await
    }

    pub async fn download(
        &self,
        key: &str,
        destination: &Path,
        config: &BucketEndpointConfig,
        overwrite: bool,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PathBuf, StorageError> {
        let _permit = self.acquire_permit().await?;
        self.client
            .download(config, key, destination, overwrite, progress_callback)
            .await
    }

    pub async fn list(&self, config: &BucketEndpointConfig) -> Result<Vec<S3Object>, StorageError> {
        self.client.list(config, None).await
    }

    pub async fn delete(&self, key: &str, config: &BucketEndpointConfig) -> Result<(), StorageError> {
        self.client.delete(config, key).await
    }

    pub async fn head(&self, key: &str, config: &BucketEndpointConfig) -> Result<S3Object, StorageError> {
        self.client.head(config, key).await
    }

    pub async fn verify(&self, config: &BucketEndpointConfig) -> Result<(), StorageError> {
        self.client.verify(config).await
    }

    pub fn presign_url(
        &self,
        key: &str,
        config: &BucketEndpointConfig,
        expires_in_seconds: i64,
    ) -> Result<String, StorageError> {
        self.client.presign_url(config, key, expires_in_seconds)
    }
}

// the lock only guards swapping the Arc; callers never hold it across I/O
static STORAGE_MANAGER: tokio::sync::OnceCell<RwLock<Arc<StorageManager>>> =
    tokio::sync::OnceCell::const_new();

async fn shared_slot() -> Result<&'static RwLock<Arc<StorageManager>>, StorageError> {
    STORAGE_MANAGER
        .get_or_try_init(|| async {
            let manager = StorageManager::from_options(ClientOptions::default())?;
            Ok::<_, StorageError>(RwLock::new(Arc::new(manager)))
        })
        .await
}

/// The process-wide manager, created with default options on first use
pub async fn get_storage_manager() -> Result<Arc<StorageManager>, StorageError> {
    let slot = shared_slot().await?;
    let manager = slot.read().await.clone();
    Ok(manager)
}

/// Rebuilds the shared client with `options`
///
/// Later calls to [`get_storage_manager`] see the new client. Operations that
/// already hold the previous one finish on it.
pub async fn configure_storage_manager(options: ClientOptions) -> Result<(), StorageError> {
    let manager = Arc::new(StorageManager::from_options(options)?);
    let slot = shared_slot().await?;
    *slot.write().await = manager;
    log::debug!("Shared storage manager reconfigured");
    Ok(())
}
