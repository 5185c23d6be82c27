//! Album store abstraction
//!
//! The migration job only needs to page through every album and overwrite one
//! album's manifest at a time. Keeping that behind a trait lets tests run against
//! an in-memory store.

use async_trait::async_trait;
use goldenhour_core::{Album, ContinuationToken, ErrorMetadata, ImageEntry, LogLevel};
use thiserror::Error;

/// Album store errors
#[derive(Debug, Error)]
pub enum AlbumStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid continuation token: {0}")]
    InvalidToken(String),

    #[error("Album not found: {0}")]
    NotFound(String),

    #[error("Album {0} was modified concurrently")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type AlbumStoreResult<T> = Result<T, AlbumStoreError>;

impl ErrorMetadata for AlbumStoreError {
    fn error_code(&self) -> &'static str {
        match self {
            AlbumStoreError::Database(_) => "DATABASE_ERROR",
            AlbumStoreError::InvalidToken(_) => "INVALID_CONTINUATION_TOKEN",
            AlbumStoreError::NotFound(_) => "ALBUM_NOT_FOUND",
            AlbumStoreError::Conflict(_) => "ALBUM_CONFLICT",
            AlbumStoreError::Serialization(_) => "SERIALIZATION_ERROR",
            AlbumStoreError::Backend(_) => "STORE_BACKEND_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AlbumStoreError::InvalidToken(_) | AlbumStoreError::Serialization(_)
        )
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AlbumStoreError::Conflict(_)
            | AlbumStoreError::NotFound(_)
            | AlbumStoreError::Serialization(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// A scanned record whose manifest could not be decoded.
#[derive(Debug)]
pub struct InvalidAlbum {
    pub album_id: String,
    pub error: AlbumStoreError,
}

/// One page of a full album scan.
#[derive(Debug, Default)]
pub struct AlbumPage {
    pub albums: Vec<Album>,
    /// Records on this page that could not be read. They do not stop the scan.
    pub invalid: Vec<InvalidAlbum>,
    /// Absent when this was the last page.
    pub next_token: Option<ContinuationToken>,
}

/// Replacement of an album's enrichment-relevant fields.
#[derive(Debug, Clone)]
pub struct ManifestUpdate {
    /// Revision the manifest was read at. The write is rejected if the album moved on.
    pub expected_revision: i64,
    pub images: Vec<ImageEntry>,
    pub cover_thumb_key: Option<String>,
    pub cover_blurhash: Option<String>,
}

#[async_trait]
pub trait AlbumStore: Send + Sync {
    /// Fetch the page after `token` (or the first page when `None`).
    async fn scan_page(
        &self,
        token: Option<&ContinuationToken>,
        limit: u32,
    ) -> AlbumStoreResult<AlbumPage>;

    /// Overwrite `images`, `coverThumbKey` and `coverBlurhash` of one album in a
    /// single conditional write. No other field is touched.
    async fn update_images(&self, album_id: &str, update: ManifestUpdate)
        -> AlbumStoreResult<()>;
}
