//! Mock Storage implementation for testing

use crate::{Storage, StorageBackend, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock storage implementation that stores objects in memory
///
/// Objects are kept in a sorted map so `list` returns keys in order without extra work.
#[derive(Clone, Default)]
pub struct MockStorage {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    content_types: Arc<Mutex<BTreeMap<String, String>>>,
    failing_downloads: Arc<Mutex<HashSet<String>>>,
    failing_uploads: Arc<Mutex<HashSet<String>>>,
    failing_lists: Arc<Mutex<HashSet<String>>>,
    uploads: Arc<AtomicUsize>,
    full_downloads: Arc<AtomicUsize>,
    range_downloads: Arc<AtomicUsize>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a file in the mock storage
    pub fn set_file(&self, key: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(key.to_string(), data);
    }

    /// Check if a file exists in the mock storage
    pub fn has_file(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    /// Get file data (for test assertions)
    pub fn get_file(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).cloned()
    }

    /// Content type recorded by the last upload to `key`
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.content_types.lock().unwrap().get(key).cloned()
    }

    /// Make every download (full or ranged) of `key` fail
    pub fn fail_downloads_for(&self, key: &str) {
        self.failing_downloads
            .lock()
            .unwrap()
            .insert(key.to_string());
    }

    /// Make uploads to `key` fail
    pub fn fail_uploads_for(&self, key: &str) {
        self.failing_uploads.lock().unwrap().insert(key.to_string());
    }

    /// Make listings of `prefix` fail
    pub fn fail_list_for(&self, prefix: &str) {
        self.failing_lists.lock().unwrap().insert(prefix.to_string());
    }

    /// Clear every injected failure
    pub fn clear_failures(&self) {
        self.failing_downloads.lock().unwrap().clear();
        self.failing_uploads.lock().unwrap().clear();
        self.failing_lists.lock().unwrap().clear();
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn full_download_count(&self) -> usize {
        self.full_downloads.load(Ordering::SeqCst)
    }

    pub fn range_download_count(&self) -> usize {
        self.range_downloads.load(Ordering::SeqCst)
    }

    fn check_download(&self, key: &str) -> StorageResult<Vec<u8>> {
        if self.failing_downloads.lock().unwrap().contains(key) {
            return Err(StorageError::DownloadFailed(format!(
                "injected download failure for {}",
                key
            )));
        }
        self.get_file(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.full_downloads.fetch_add(1, Ordering::SeqCst);
        self.check_download(storage_key)
    }

    async fn download_range(
        &self,
        storage_key: &str,
        range: Range<u64>,
    ) -> StorageResult<Vec<u8>> {
        self.range_downloads.fetch_add(1, Ordering::SeqCst);
        let data = self.check_download(storage_key)?;
        let start = (range.start as usize).min(data.len());
        let end = (range.end as usize).min(data.len()).max(start);
        Ok(data[start..end].to_vec())
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        if self.failing_uploads.lock().unwrap().contains(storage_key) {
            return Err(StorageError::UploadFailed(format!(
                "injected upload failure for {}",
                storage_key
            )));
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.set_file(storage_key, data);
        self.content_types
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), content_type.to_string());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        if self.failing_lists.lock().unwrap().contains(prefix) {
            return Err(StorageError::ListFailed(format!(
                "injected list failure for {}",
                prefix
            )));
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_storage_range_and_failures() {
        let storage = MockStorage::new();
        storage.set_file("albums/a/1.jpg", b"abcdef".to_vec());

        assert_eq!(
            storage.download_range("albums/a/1.jpg", 0..3).await.unwrap(),
            b"abc"
        );
        assert_eq!(
            storage.download_range("albums/a/1.jpg", 4..100).await.unwrap(),
            b"ef"
        );

        storage.fail_downloads_for("albums/a/1.jpg");
        assert!(storage.download("albums/a/1.jpg").await.is_err());

        storage.clear_failures();
        assert_eq!(storage.download("albums/a/1.jpg").await.unwrap(), b"abcdef");
        assert_eq!(storage.full_download_count(), 2);
        assert_eq!(storage.range_download_count(), 2);
    }
}
