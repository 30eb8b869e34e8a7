use crate::storage::traits::StorageError;
use std::path::{Path, PathBuf};

/// Path helpers for download destinations
pub struct PathUtils;

impl PathUtils {
    /// Expands a leading `~` to the user's home directory
    ///
    /// ```text
    /// "~"              -> "/Users/username"
    /// "~/Downloads/a"  -> "/Users/username/Downloads/a"
    /// "/absolute/path" -> "/absolute/path"
    /// ```
    pub fn expand_home_dir(path: &Path) -> Result<PathBuf, StorageError> {
        let Some(raw) = path.to_str() else {
            return Ok(path.to_path_buf());
        };
        if !raw.starts_with('~') {
            return Ok(path.to_path_buf());
        }

        let home_dir = dirs::home_dir().ok_or_else(|| {
            StorageError::Filesystem("Cannot determine home directory".to_string())
        })?;
        if raw == "~" {
            Ok(home_dir)
        } else if let Some(stripped) = raw.strip_prefix("~/") {
            Ok(home_dir.join(stripped))
        } else {
            // ~username is left alone
            Ok(path.to_path_buf())
        }
    }

    /// `dir/name (n).ext` for the `n`-th collision
    pub fn numbered_path(path: &Path, n: u32) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match path.extension() {
            Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
            None => format!("{} ({})", stem, n),
        };
        path.with_file_name(file_name)
    }

    /// Creates an empty file at the first free name among `path`,
    /// `name (1).ext`, `name (2).ext`, ... and returns that name
    ///
    /// Each candidate is created with `create_new`, so two callers racing for
    /// the same name never both get it.
    pub async fn claim_free_path(path: &Path) -> std::io::Result<PathBuf> {
        let mut n = 0;
        loop {
            let candidate = if n == 0 {
                path.to_path_buf()
            } else {
                Self::numbered_path(path, n)
            };
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}
