//! Mock AlbumStore implementation for testing

use crate::store::{
    AlbumPage, AlbumStore, AlbumStoreError, AlbumStoreResult, InvalidAlbum, ManifestUpdate,
};
use async_trait::async_trait;
use goldenhour_core::{Album, ContinuationToken};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory album store with keyset pagination and failure injection
#[derive(Clone, Default)]
pub struct MockAlbumStore {
    albums: Arc<Mutex<BTreeMap<String, Album>>>,
    invalid: Arc<Mutex<BTreeMap<String, String>>>,
    failing_updates: Arc<Mutex<HashSet<String>>>,
    conflicting_updates: Arc<Mutex<HashSet<String>>>,
    fail_scan_on_call: Arc<Mutex<Option<usize>>>,
    scan_calls: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
    visits: Arc<Mutex<Vec<String>>>,
}

impl MockAlbumStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_albums(albums: impl IntoIterator<Item = Album>) -> Self {
        let store = Self::new();
        for album in albums {
            store.insert(album);
        }
        store
    }

    pub fn insert(&self, album: Album) {
        self.albums
            .lock()
            .unwrap()
            .insert(album.album_id.clone(), album);
    }

    /// Add a record whose manifest cannot be decoded
    pub fn insert_invalid(&self, album_id: &str, message: &str) {
        self.invalid
            .lock()
            .unwrap()
            .insert(album_id.to_string(), message.to_string());
    }

    pub fn get(&self, album_id: &str) -> Option<Album> {
        self.albums.lock().unwrap().get(album_id).cloned()
    }

    /// Simulate another writer touching the album
    pub fn bump_revision(&self, album_id: &str) {
        if let Some(album) = self.albums.lock().unwrap().get_mut(album_id) {
            album.revision += 1;
        }
    }

    /// Make updates of `album_id` fail with a backend error
    pub fn fail_updates_for(&self, album_id: &str) {
        self.failing_updates
            .lock()
            .unwrap()
            .insert(album_id.to_string());
    }

    /// Make updates of `album_id` report a concurrent modification
    pub fn conflict_updates_for(&self, album_id: &str) {
        self.conflicting_updates
            .lock()
            .unwrap()
            .insert(album_id.to_string());
    }

    /// Make the n-th scan call (1-based) fail
    pub fn fail_scan_on_call(&self, call: usize) {
        *self.fail_scan_on_call.lock().unwrap() = Some(call);
    }

    pub fn clear_failures(&self) {
        self.failing_updates.lock().unwrap().clear();
        self.conflicting_updates.lock().unwrap().clear();
        *self.fail_scan_on_call.lock().unwrap() = None;
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Album ids returned by scans, in order
    pub fn visited(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlbumStore for MockAlbumStore {
    async fn scan_page(
        &self,
        token: Option<&ContinuationToken>,
        limit: u32,
    ) -> AlbumStoreResult<AlbumPage> {
        let call = self.scan_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_scan_on_call.lock().unwrap() == Some(call) {
            return Err(AlbumStoreError::Backend(format!(
                "injected scan failure on call {}",
                call
            )));
        }

        let albums = self.albums.lock().unwrap();
        let invalid = self.invalid.lock().unwrap();
        let lower = match token {
            Some(t) => Bound::Excluded(t.as_str().to_string()),
            None => Bound::Unbounded,
        };
        let limit = limit.max(1) as usize;

        // Valid and undecodable records share one keyspace, as rows of one table do.
        let mut records: BTreeMap<&String, Option<&Album>> = albums
            .range((lower.clone(), Bound::Unbounded))
            .map(|(id, album)| (id, Some(album)))
            .collect();
        records.extend(
            invalid
                .range((lower, Bound::Unbounded))
                .map(|(id, _)| (id, None)),
        );

        let mut rows: Vec<(&String, Option<&Album>)> =
            records.into_iter().take(limit + 1).collect();
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_token = if has_more {
            rows.last().map(|(id, _)| ContinuationToken::new(id.as_str()))
        } else {
            None
        };

        self.visits
            .lock()
            .unwrap()
            .extend(rows.iter().map(|(id, _)| id.to_string()));

        let mut page = AlbumPage {
            next_token,
            ..Default::default()
        };
        for (id, album) in rows {
            match album {
                Some(album) => page.albums.push(album.clone()),
                None => page.invalid.push(InvalidAlbum {
                    album_id: id.clone(),
                    error: AlbumStoreError::Serialization(invalid[id].clone()),
                }),
            }
        }

        Ok(page)
    }

    async fn update_images(
        &self,
        album_id: &str,
        update: ManifestUpdate,
    ) -> AlbumStoreResult<()> {
        if self.failing_updates.lock().unwrap().contains(album_id) {
            return Err(AlbumStoreError::Backend(format!(
                "injected update failure for {}",
                album_id
            )));
        }

        if self.conflicting_updates.lock().unwrap().contains(album_id) {
            return Err(AlbumStoreError::Conflict(album_id.to_string()));
        }

        let mut albums = self.albums.lock().unwrap();
        let album = albums
            .get_mut(album_id)
            .ok_or_else(|| AlbumStoreError::NotFound(album_id.to_string()))?;

        if album.revision != update.expected_revision {
            return Err(AlbumStoreError::Conflict(album_id.to_string()));
        }

        album.images = update.images;
        album.cover_thumb_key = update.cover_thumb_key;
        album.cover_blurhash = update.cover_blurhash;
        album.revision += 1;
        self.updates.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album(id: &str) -> Album {
        Album {
            album_id: id.to_string(),
            title: format!("Album {}", id),
            s3_prefix: None,
            images: vec![],
            cover_thumb_key: None,
            cover_blurhash: None,
            revision: 0,
        }
    }

    #[tokio::test]
    async fn test_pages_until_exhausted() {
        let store = MockAlbumStore::with_albums(["a", "b", "c"].map(album));

        let first = store.scan_page(None, 2).await.unwrap();
        assert_eq!(first.albums.len(), 2);
        let token = first.next_token.expect("second page");

        let second = store.scan_page(Some(&token), 2).await.unwrap();
        assert_eq!(second.albums.len(), 1);
        assert!(second.next_token.is_none());
        assert_eq!(store.visited(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_invalid_records_page_like_valid_ones() {
        let store = MockAlbumStore::with_albums(["a", "c"].map(album));
        store.insert_invalid("b", "missing field `rawKey`");

        let first = store.scan_page(None, 2).await.unwrap();
        assert_eq!(first.albums.len(), 1);
        assert_eq!(first.invalid.len(), 1);
        assert_eq!(first.invalid[0].album_id, "b");

        let token = first.next_token.expect("second page");
        let second = store.scan_page(Some(&token), 2).await.unwrap();
        assert_eq!(second.albums[0].album_id, "c");
        assert!(second.invalid.is_empty());
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_update_checks_revision_and_keeps_title() {
        let store = MockAlbumStore::with_albums([album("a")]);
        store.bump_revision("a");

        let update = ManifestUpdate {
            expected_revision: 0,
            images: vec![],
            cover_thumb_key: Some("albums/a/thumb_1.jpg".to_string()),
            cover_blurhash: None,
        };
        let result = store.update_images("a", update.clone()).await;
        assert!(matches!(result, Err(AlbumStoreError::Conflict(_))));

        store
            .update_images(
                "a",
                ManifestUpdate {
                    expected_revision: 1,
                    ..update
                },
            )
            .await
            .unwrap();

        let stored = store.get("a").unwrap();
        assert_eq!(stored.title, "Album a");
        assert_eq!(stored.cover_thumb_key.as_deref(), Some("albums/a/thumb_1.jpg"));
        assert_eq!(stored.revision, 2);
    }
}
