// src/core/cache/store.rs

//! Defines the `CacheStore`, which persists raw origin responses as one file
//! per storage key inside the cache directory.

use crate::core::ProxyError;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// The blob name used for the root path.
pub const DEFAULT_STORAGE_KEY: &str = "index.html";

/// Prefix for in-flight writes, renamed away once the bytes are synced.
const TEMP_PREFIX: &str = ".tmp-";

/// Derives the on-disk name for a request path: leading and trailing slashes
/// are stripped, inner slashes become underscores, and the root maps to
/// `index.html`.
pub fn storage_key(path: &str) -> String {
    let key = path.trim_matches('/').replace('/', "_");
    if key.is_empty() {
        DEFAULT_STORAGE_KEY.to_string()
    } else {
        key
    }
}

/// Blob persistence keyed by storage key.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the cache directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), ProxyError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Returns the final path of the blob for `storage_key`.
    pub fn blob_path(&self, storage_key: &str) -> PathBuf {
        self.root.join(storage_key)
    }

    /// Writes `body` under `storage_key`.
    ///
    /// The bytes go to a uniquely named temporary file first, which is synced and
    /// then renamed over the final name. A failed write leaves whatever blob was
    /// previously stored under that name intact.
    pub async fn write(&self, storage_key: &str, body: &[u8]) -> Result<(), ProxyError> {
        let final_path = self.blob_path(storage_key);
        let temp_path = self
            .root
            .join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));

        let result: std::io::Result<()> = async {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
                .await?;
            file.write_all(body).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp_path, &final_path).await
        }
        .await;

        if let Err(e) = result {
            // Best effort: the temp file may not exist if `open` failed.
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(ProxyError::CacheWrite(format!(
                "'{}': {e}",
                final_path.display()
            )));
        }

        debug!(
            "Stored {} bytes at '{}'",
            body.len(),
            final_path.display()
        );
        Ok(())
    }

    /// Reads the blob stored under `storage_key`.
    pub async fn read(&self, storage_key: &str) -> Result<Bytes, ProxyError> {
        match tokio::fs::read(self.blob_path(storage_key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ProxyError::BlobNotFound(storage_key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the blob stored under `storage_key`. A missing blob is not an error.
    pub async fn remove(&self, storage_key: &str) -> Result<(), ProxyError> {
        match tokio::fs::remove_file(self.blob_path(storage_key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
