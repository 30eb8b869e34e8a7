use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::download::progress::ProgressTracker;
use crate::storage::traits::{ProgressCallback, StorageError};
use crate::utils::path_utils::PathUtils;

/// Streams HTTP response bodies to disk
pub struct HttpDownloader;

impl HttpDownloader {
    /// Writes a successful response body to `destination`
    ///
    /// The body lands in a hidden `.part` file next to the destination and is
    /// moved into place once complete. With `overwrite == false` an existing
    /// file is never replaced; the first free `name (n).ext` is claimed
    /// instead. With `overwrite == true` the existing file stays intact until
    /// the new one replaces it.
    ///
    /// Returns the path actually written.
    pub async fn download_to(
        response: reqwest::Response,
        destination: &Path,
        overwrite: bool,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<PathBuf, StorageError> {
        let tracker = ProgressTracker::new(progress_callback, response.content_length());

        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StorageError::Filesystem(format!(
                    "Destination has no file name: {}",
                    destination.display()
                ))
            })?;
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Filesystem(format!("Failed to create directory: {}", e))
            })?;
        }

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let part_path = destination.with_file_name(format!(".{}.{}.part", file_name, &suffix[..8]));

        let written = match Self::stream_to_file(response, &part_path, &tracker).await {
            Ok(written) => written,
            Err(e) => {
                // Leave nothing half-written behind
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        // with overwrite the destination is never deleted first; rename
        // replaces it in one step
        let final_path = if overwrite {
            destination.to_path_buf()
        } else {
            match PathUtils::claim_free_path(destination).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&part_path).await;
                    return Err(StorageError::Filesystem(format!(
                        "Failed to reserve destination name: {}",
                        e
                    )));
                }
            }
        };

        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            if !overwrite {
                // drop the empty placeholder we claimed
                let _ = tokio::fs::remove_file(&final_path).await;
            }
            return Err(StorageError::Filesystem(format!(
                "Failed to move download into place: {}",
                e
            )));
        }

        log::debug!("Downloaded {} bytes to {}", written, final_path.display());
        tracker.finish();
        Ok(final_path)
    }

    /// Copies the body chunk by chunk into `save_path`
    async fn stream_to_file(
        response: reqwest::Response,
        save_path: &Path,
        tracker: &ProgressTracker,
    ) -> Result<u64, StorageError> {
        let mut file = tokio::fs::File::create(save_path)
            .await
            .map_err(|e| StorageError::Filesystem(format!("Failed to create file: {}", e)))?;

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;

        while let Some(chunk_result) = stream.next().await {
            let bytes = chunk_result
                .map_err(|e| StorageError::Transport(format!("Stream error: {}", e)))?;

            file.write_all(&bytes)
                .await
                .map_err(|e| StorageError::Filesystem(format!("Failed to write data: {}", e)))?;

            downloaded += bytes.len() as u64;
            tracker.advance(bytes.len());
        }

        file.flush()
            .await
            .map_err(|e| StorageError::Filesystem(format!("Failed to flush file: {}", e)))?;

        Ok(downloaded)
    }
}
