//! Per-image enrichment
//!
//! Fetches a raw upload, derives its thumbnail, placeholder hash, dimensions and
//! camera metadata, and stores the thumbnail next to the original.

use crate::metadata::{extract_exif, EXIF_HEADER_BYTES};
use crate::thumbnail::{ThumbnailError, ThumbnailHasher};
use goldenhour_core::{EnrichedImage, ErrorMetadata, ExifData, FailureKind, LogLevel};
use goldenhour_storage::{thumbnail_key, Storage, StorageError};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Failed to fetch {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Unprocessable image {key}: {source}")]
    Unprocessable {
        key: String,
        #[source]
        source: ThumbnailError,
    },

    #[error("Failed to upload thumbnail {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Thumbnail task for {key} did not complete: {message}")]
    Task { key: String, message: String },
}

impl EnrichError {
    /// How this failure is reported in the migration summary.
    pub fn kind(&self) -> FailureKind {
        match self {
            EnrichError::Fetch { .. } | EnrichError::Upload { .. } => FailureKind::TransientIo,
            EnrichError::Unprocessable { .. } | EnrichError::Task { .. } => {
                FailureKind::UnprocessableImage
            }
        }
    }
}

impl ErrorMetadata for EnrichError {
    fn error_code(&self) -> &'static str {
        match self {
            EnrichError::Fetch { .. } => "ENRICH_FETCH_FAILED",
            EnrichError::Unprocessable { .. } => "ENRICH_UNPROCESSABLE_IMAGE",
            EnrichError::Upload { .. } => "ENRICH_UPLOAD_FAILED",
            EnrichError::Task { .. } => "ENRICH_TASK_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            EnrichError::Fetch { source, .. } | EnrichError::Upload { source, .. } => {
                source.is_recoverable()
            }
            EnrichError::Unprocessable { .. } | EnrichError::Task { .. } => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

/// Turns a raw image key into an `EnrichedImage`.
#[derive(Clone)]
pub struct ImageEnricher {
    storage: Arc<dyn Storage>,
    hasher: ThumbnailHasher,
}

impl ImageEnricher {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_hasher(storage, ThumbnailHasher::default())
    }

    pub fn with_hasher(storage: Arc<dyn Storage>, hasher: ThumbnailHasher) -> Self {
        Self { storage, hasher }
    }

    /// Enrich one raw image and upload its thumbnail.
    ///
    /// EXIF problems never fail the call; `exif` is simply left out.
    #[tracing::instrument(skip(self))]
    pub async fn enrich(&self, raw_key: &str) -> Result<EnrichedImage, EnrichError> {
        let start = Instant::now();

        let exif = self.read_exif(raw_key).await;

        let data = self
            .storage
            .download(raw_key)
            .await
            .map_err(|source| EnrichError::Fetch {
                key: raw_key.to_string(),
                source,
            })?;
        let source_bytes = data.len();

        let hasher = self.hasher;
        let output = tokio::task::spawn_blocking(move || hasher.process(&data))
            .await
            .map_err(|e| EnrichError::Task {
                key: raw_key.to_string(),
                message: e.to_string(),
            })?
            .map_err(|source| EnrichError::Unprocessable {
                key: raw_key.to_string(),
                source,
            })?;

        let thumb_key = thumbnail_key(raw_key);
        let thumb_bytes = output.thumbnail.len();
        self.storage
            .upload_with_key(&thumb_key, output.thumbnail, THUMBNAIL_CONTENT_TYPE)
            .await
            .map_err(|source| EnrichError::Upload {
                key: thumb_key.clone(),
                source,
            })?;

        tracing::info!(
            raw_key = %raw_key,
            thumb_key = %thumb_key,
            width = output.width,
            height = output.height,
            thumb_width = output.thumbnail_width,
            thumb_height = output.thumbnail_height,
            source_bytes,
            thumb_bytes,
            has_exif = exif.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image enriched"
        );

        Ok(EnrichedImage {
            thumb_key,
            blurhash: output.blurhash,
            width: output.width,
            height: output.height,
            exif,
        })
    }

    /// Best-effort camera metadata from the leading bytes of the object.
    pub async fn read_exif(&self, raw_key: &str) -> Option<ExifData> {
        let head = match self
            .storage
            .download_range(raw_key, 0..EXIF_HEADER_BYTES)
            .await
        {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!(raw_key = %raw_key, error = %e, "EXIF range read failed");
                return None;
            }
        };

        match extract_exif(&head) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::debug!(raw_key = %raw_key, error = %e, "No usable EXIF");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::{camera_fields, jpeg_with_exif};
    use crate::thumbnail::tests::gradient_png;
    use goldenhour_storage::test_helpers::MockStorage;

    fn enricher(storage: &MockStorage) -> ImageEnricher {
        ImageEnricher::new(Arc::new(storage.clone()))
    }

    #[tokio::test]
    async fn test_enrich_uploads_thumbnail_next_to_original() {
        let storage = MockStorage::new();
        storage.set_file("albums/a/IMG_1.png", gradient_png(1600, 1200));

        let enriched = enricher(&storage).enrich("albums/a/IMG_1.png").await.unwrap();

        assert_eq!(enriched.thumb_key, "albums/a/thumb_IMG_1.png");
        assert_eq!((enriched.width, enriched.height), (1600, 1200));
        assert!(!enriched.blurhash.is_empty());
        assert_eq!(enriched.exif, None);
        assert!(storage.has_file("albums/a/thumb_IMG_1.png"));
        assert_eq!(
            storage.content_type("albums/a/thumb_IMG_1.png").as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(storage.range_download_count(), 1);
        assert_eq!(storage.full_download_count(), 1);
    }

    #[tokio::test]
    async fn test_enrich_reads_exif() {
        let storage = MockStorage::new();
        storage.set_file("albums/a/DSCF0001.jpg", jpeg_with_exif(&camera_fields()));

        let enriched = enricher(&storage).enrich("albums/a/DSCF0001.jpg").await.unwrap();
        let exif = enriched.exif.expect("exif decoded");

        assert_eq!(exif.model.as_deref(), Some("X100V"));
        assert_eq!(exif.focal_ratio.as_deref(), Some("f/2.8"));
        assert_eq!(exif.shutter_speed.as_deref(), Some("1/250s"));
        assert_eq!(exif.iso.as_deref(), Some("ISO 400"));
    }

    #[tokio::test]
    async fn test_rerun_writes_same_thumbnail_key() {
        let storage = MockStorage::new();
        storage.set_file("albums/a/IMG_2.png", gradient_png(300, 200));
        let enricher = enricher(&storage);

        let first = enricher.enrich("albums/a/IMG_2.png").await.unwrap();
        let second = enricher.enrich("albums/a/IMG_2.png").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.upload_count(), 2);
        assert_eq!(storage.list("albums/a/").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unprocessable_image() {
        let storage = MockStorage::new();
        storage.set_file("albums/a/broken.jpg", b"\xff\xd8 not really a jpeg".to_vec());

        let err = enricher(&storage)
            .enrich("albums/a/broken.jpg")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::UnprocessableImage);
        assert!(!storage.has_file("albums/a/thumb_broken.jpg"));
    }

    #[tokio::test]
    async fn test_missing_object_is_transient_io() {
        let storage = MockStorage::new();
        let err = enricher(&storage)
            .enrich("albums/a/missing.jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::Fetch { .. }));
        assert_eq!(err.kind(), FailureKind::TransientIo);
    }

    #[tokio::test]
    async fn test_upload_failure_fails_the_image() {
        let storage = MockStorage::new();
        storage.set_file("albums/a/IMG_3.png", gradient_png(64, 64));
        storage.fail_uploads_for("albums/a/thumb_IMG_3.png");

        let err = enricher(&storage)
            .enrich("albums/a/IMG_3.png")
            .await
            .unwrap_err();

        assert!(matches!(err, EnrichError::Upload { .. }));
        assert_eq!(err.error_code(), "ENRICH_UPLOAD_FAILED");
    }
}
