use futures_util::stream::{self, StreamExt};
use std::path::PathBuf;

use crate::storage::config::BucketEndpointConfig;
use crate::storage::manager::StorageManager;
use crate::storage::traits::{ProgressCallback, StorageError, UploadResult};

/// One file of a batch
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes { filename: String, bytes: Vec<u8> },
    Path(PathBuf),
}

impl UploadSource {
    pub fn bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadSource::Bytes {
            filename: filename.into(),
            bytes,
        }
    }

    fn describe(&self) -> String {
        match self {
            UploadSource::Bytes { filename, .. } => filename.clone(),
            UploadSource::Path(path) => path.display().to_string(),
        }
    }
}

/// Per-item progress: `(index in the batch, fraction)`
pub type BatchProgressCallback = std::sync::Arc<dyn Fn(usize, f64) + Send + Sync>;

/// Uploads `sources` with at most `concurrency` in flight
///
/// Returns one result per source, in input order. A failed item never stops
/// the others.
pub async fn upload_batch(
    manager: &StorageManager,
    sources: Vec<UploadSource>,
    config: &BucketEndpointConfig,
    concurrency: usize,
    progress_callback: Option<BatchProgressCallback>,
) -> Vec<Result<UploadResult, StorageError>> {
    let total = sources.len();
    log::debug!("Uploading batch of {} files, {} at a time", total, concurrency.max(1));

    let results: Vec<_> = stream::iter(sources.into_iter().enumerate())
        .map(|(index, source)| {
            let item_progress: Option<ProgressCallback> = progress_callback.clone().map(|cb| {
                let forward: ProgressCallback = std::sync::Arc::new(move |f| cb(index, f));
                forward
            });
            async move {
                let name = source.describe();
                let result = match source {
                    UploadSource::Bytes { filename, bytes } => {
                        manager.upload(bytes, &filename, config, item_progress).await
                    }
                    UploadSource::Path(path) => {
                        manager.upload_file(&path, config, item_progress).await
                    }
                };
                if let Err(ref e) = result {
                    log::warn!("Batch item {} ({}) failed: {}", index, name, e);
                }
                result
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    log::info!("Batch finished: {} uploaded, {} failed", total - failed, failed);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::ClientOptions;
    use crate::storage::s3_client::S3Client;
    use crate::test_server::{Reply, TestServer};
    use axum::http::Method;
    use std::sync::{Arc, Mutex};

    fn manager() -> StorageManager {
        StorageManager::new(S3Client::new(ClientOptions::default()).unwrap())
    }

    #[tokio::test]
    async fn failures_are_isolated_and_order_is_kept() -> anyhow::Result<()> {
        let server = TestServer::builder()
            .route(Method::PUT, "/bucket/a.txt", Reply::status(200))
            .route(Method::PUT, "/bucket/b.txt", Reply::status(403).body("denied"))
            .route(Method::PUT, "/bucket/c.txt", Reply::status(200))
            .start()
            .await;
        let config = BucketEndpointConfig::new("AKID", "secret", "bucket", "auto")
            .with_endpoint(server.url());

        let dir = tempfile::tempdir()?;
        let sources = vec![
            UploadSource::bytes("a.txt", b"a".to_vec()),
            UploadSource::bytes("b.txt", b"b".to_vec()),
            UploadSource::Path(dir.path().join("missing.txt")),
            UploadSource::bytes("c.txt", b"c".to_vec()),
        ];

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: BatchProgressCallback =
            Arc::new(move |index, fraction| sink.lock().unwrap().push((index, fraction)));

        let results = upload_batch(&manager(), sources, &config, 2, Some(progress)).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().key, "a.txt");
        assert!(matches!(results[1], Err(StorageError::Protocol { status: 403, .. })));
        assert!(matches!(results[2], Err(StorageError::Filesystem(_))));
        assert_eq!(results[3].as_ref().unwrap().key, "c.txt");

        let mut completed: Vec<usize> = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, f)| *f == 1.0)
            .map(|(i, _)| *i)
            .collect();
        completed.sort_unstable();
        assert_eq!(completed, [0, 3]);
        assert_eq!(server.requests().len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_yields_nothing() {
        let config = BucketEndpointConfig::new("AKID", "secret", "bucket", "auto");
        let results = upload_batch(&manager(), Vec::new(), &config, 0, None).await;
        assert!(results.is_empty());
    }
}
