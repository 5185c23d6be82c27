use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use walkdir::WalkDir;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory standing in for the bucket (e.g., "/var/lib/goldenhour")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys with path traversal sequences that could escape the base
    /// storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        Ok(self.base_path.join(storage_key))
    }

    /// Convert a path under the base directory back to a `/`-separated key
    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn download_range(
        &self,
        storage_key: &str,
        range: Range<u64>,
    ) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let mut file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        file.seek(SeekFrom::Start(range.start)).await?;

        let len = range.end.saturating_sub(range.start);
        let mut data = Vec::with_capacity(len.min(1 << 20) as usize);
        file.take(len).read_to_end(&mut data).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %storage_key,
            range_start = range.start,
            range_end = range.end,
            size_bytes = data.len(),
            "Local storage range download successful"
        );

        Ok(data)
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload_with_key successful"
        );

        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        if prefix.contains("..") || prefix.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage prefix contains invalid characters".to_string(),
            ));
        }

        let base_path = self.base_path.clone();
        let storage = self.clone();
        let prefix_owned = prefix.to_string();

        // walkdir is blocking; keep it off the async workers.
        let keys = tokio::task::spawn_blocking(move || -> StorageResult<Vec<String>> {
            let mut keys = Vec::new();
            for entry in WalkDir::new(&base_path) {
                let entry = entry.map_err(|e| StorageError::ListFailed(e.to_string()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(key) = storage.path_to_key(entry.path()) {
                    if key.starts_with(&prefix_owned) {
                        keys.push(key);
                    }
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|e| StorageError::BackendError(format!("List task failed: {}", e)))??;

        tracing::debug!(prefix = %prefix, count = keys.len(), "Local storage list successful");

        Ok(keys)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let data = b"test data".to_vec();
        storage
            .upload_with_key("albums/a/test.jpg", data.clone(), "image/jpeg")
            .await
            .unwrap();

        let downloaded = storage.download("albums/a/test.jpg").await.unwrap();
        assert_eq!(data, downloaded);
    }

    #[tokio::test]
    async fn test_download_range_truncates_at_end_of_file() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage
            .upload_with_key("albums/a/raw.jpg", b"0123456789".to_vec(), "image/jpeg")
            .await
            .unwrap();

        let head = storage.download_range("albums/a/raw.jpg", 0..4).await.unwrap();
        assert_eq!(head, b"0123");

        let middle = storage.download_range("albums/a/raw.jpg", 6..65536).await.unwrap();
        assert_eq!(middle, b"6789");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.download("albums/a/missing.jpg").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));

        let result = storage.download_range("albums/a/missing.jpg", 0..10).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.download("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));


        let result = storage.download_range("/etc/passwd", 0..16).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.list("../").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_scoped_to_prefix() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        for key in [
            "albums/a/IMG_2.jpg",
            "albums/a/IMG_1.jpg",
            "albums/a/thumb_IMG_1.jpg",
            "albums/b/IMG_9.jpg",
        ] {
            storage
                .upload_with_key(key, b"x".to_vec(), "image/jpeg")
                .await
                .unwrap();
        }

        let keys = storage.list("albums/a/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "albums/a/IMG_1.jpg".to_string(),
                "albums/a/IMG_2.jpg".to_string(),
                "albums/a/thumb_IMG_1.jpg".to_string(),
            ]
        );

        assert!(storage.list("albums/missing/").await.unwrap().is_empty());
    }
}
