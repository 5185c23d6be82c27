//! Album migration orchestrator
//!
//! One pass over every album: page through the store, work out which images still
//! need a thumbnail, enrich them, and write the new manifest back with a single
//! conditional update per album.
//!
//! Failure scope is deliberately narrow. A failed image stays pending in the manifest
//! (or is left out, if this pass only found it by listing), a failed album is left as
//! it was, and only a failing scan ends the run.
//! Thumbnail keys are derived from raw keys, so re-running after any interruption
//! overwrites the same objects and never forks the manifest.

use crate::report::{AlbumOutcome, AlbumStatus, MigrationFailure, MigrationReport};
use futures::stream::{self, StreamExt};
use goldenhour_core::{
    Album, ContinuationToken, ErrorMetadata, FailureKind, ImageEntry, LogLevel, MigrationConfig,
};
use goldenhour_db::{AlbumPage, AlbumStore, AlbumStoreError, InvalidAlbum, ManifestUpdate};
use goldenhour_processing::ImageEnricher;
use goldenhour_storage::{is_raw_image_key, Storage};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

const DEFAULT_ALBUM_CONCURRENCY: usize = 4;
const DEFAULT_IMAGE_CONCURRENCY: usize = 1;
const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Album scan failed after {pages_completed} page(s): {source}")]
    Scan {
        pages_completed: usize,
        #[source]
        source: AlbumStoreError,
        partial: Box<MigrationReport>,
    },

    #[error("Album scan returned the same continuation token twice: {token}")]
    StalledScan {
        token: ContinuationToken,
        partial: Box<MigrationReport>,
    },
}

impl MigrationError {
    /// Summary of the albums handled before the run stopped.
    pub fn partial_report(&self) -> &MigrationReport {
        match self {
            MigrationError::Scan { partial, .. } | MigrationError::StalledScan { partial, .. } => {
                partial
            }
        }
    }
}

impl ErrorMetadata for MigrationError {
    fn error_code(&self) -> &'static str {
        match self {
            MigrationError::Scan { .. } => "MIGRATION_SCAN_FAILED",
            MigrationError::StalledScan { .. } => "MIGRATION_SCAN_STALLED",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            MigrationError::Scan { source, .. } => source.is_recoverable(),
            MigrationError::StalledScan { .. } => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }
}

/// Tuning for a migration run.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Albums processed in parallel within a page.
    pub album_concurrency: usize,
    /// Images enriched in parallel within an album.
    pub image_concurrency: usize,
    pub page_size: u32,
    /// List the album prefix and pick up raw uploads missing from the manifest.
    pub reconcile_prefix: bool,
    /// Classify albums without enriching or writing anything.
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            album_concurrency: DEFAULT_ALBUM_CONCURRENCY,
            image_concurrency: DEFAULT_IMAGE_CONCURRENCY,
            page_size: DEFAULT_PAGE_SIZE,
            reconcile_prefix: true,
            dry_run: false,
        }
    }
}

impl MigrationOptions {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            album_concurrency: config.album_concurrency,
            image_concurrency: config.image_concurrency,
            page_size: config.page_size,
            reconcile_prefix: config.reconcile_prefix,
            dry_run: false,
        }
    }
}

pub struct MigrationOrchestrator {
    albums: Arc<dyn AlbumStore>,
    storage: Arc<dyn Storage>,
    enricher: ImageEnricher,
    options: MigrationOptions,
}

impl MigrationOrchestrator {
    pub fn new(
        albums: Arc<dyn AlbumStore>,
        storage: Arc<dyn Storage>,
        enricher: ImageEnricher,
        options: MigrationOptions,
    ) -> Self {
        Self {
            albums,
            storage,
            enricher,
            options,
        }
    }

    /// Run one full pass over the album set.
    pub async fn run(&self) -> Result<MigrationReport, MigrationError> {
        let start = Instant::now();
        let mut report = MigrationReport::start(self.options.dry_run);
        let mut token: Option<ContinuationToken> = None;

        tracing::info!(
            album_concurrency = self.options.album_concurrency,
            image_concurrency = self.options.image_concurrency,
            page_size = self.options.page_size,
            reconcile_prefix = self.options.reconcile_prefix,
            dry_run = self.options.dry_run,
            "Starting album migration"
        );

        loop {
            let AlbumPage {
                albums,
                invalid,
                next_token,
            } = match self
                .albums
                .scan_page(token.as_ref(), self.options.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        pages_completed = report.pages_scanned,
                        "Album scan failed, aborting migration"
                    );
                    report.finish();
                    return Err(MigrationError::Scan {
                        pages_completed: report.pages_scanned,
                        source: e,
                        partial: Box::new(report),
                    });
                }
            };
            report.pages_scanned += 1;

            tracing::debug!(
                page = report.pages_scanned,
                albums = albums.len(),
                invalid = invalid.len(),
                has_more = next_token.is_some(),
                "Scanned album page"
            );

            for record in invalid {
                report.record(Self::unreadable_album(record));
            }

            let outcomes: Vec<AlbumOutcome> = stream::iter(albums)
                .map(|album| self.migrate_album(album))
                .buffer_unordered(self.options.album_concurrency.max(1))
                .collect()
                .await;

            for outcome in outcomes {
                report.record(outcome);
            }

            match next_token {
                Some(next) if token.as_ref() == Some(&next) => {
                    tracing::error!(token = %next, "Album scan is not advancing, aborting migration");
                    report.finish();
                    return Err(MigrationError::StalledScan {
                        token: next,
                        partial: Box::new(report),
                    });
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        report.finish();

        tracing::info!(
            pages = report.pages_scanned,
            albums_scanned = report.albums_scanned,
            albums_skipped = report.albums_skipped,
            albums_committed = report.albums_committed,
            albums_failed = report.albums_failed,
            images_enriched = report.images_enriched,
            images_failed = report.images_failed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Album migration finished"
        );

        Ok(report)
    }

    /// An album whose record could not be read fails on its own; the scan goes on.
    fn unreadable_album(record: InvalidAlbum) -> AlbumOutcome {
        tracing::warn!(
            album_id = %record.album_id,
            error = %record.error,
            error_code = record.error.error_code(),
            "Album manifest unreadable, album left untouched"
        );
        let mut outcome = AlbumOutcome::new(&record.album_id, AlbumStatus::Failed);
        outcome.failures.push(MigrationFailure {
            album_id: record.album_id.clone(),
            item_id: record.album_id,
            kind: FailureKind::InvalidManifest,
            message: record.error.to_string(),
        });
        outcome
    }

    /// Classify, enrich and commit a single album. Never fails the run.
    #[tracing::instrument(skip(self, album), fields(album_id = %album.album_id))]
    async fn migrate_album(&self, album: Album) -> AlbumOutcome {
        let album_id = album.album_id.clone();
        tracing::debug!(
            images = album.images.len(),
            pending = album.pending_count(),
            "Classifying album"
        );

        let manifest = match self.working_manifest(&album).await {
            Ok(manifest) => manifest,
            Err(failure) => {
                let mut outcome = AlbumOutcome::new(&album_id, AlbumStatus::Failed);
                outcome.failures.push(failure);
                return outcome;
            }
        };

        let pending: Vec<usize> = manifest
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_enriched())
            .map(|(idx, _)| idx)
            .collect();

        if pending.is_empty() {
            tracing::info!(images = manifest.len(), "Album already migrated, skipping");
            return AlbumOutcome::new(&album_id, AlbumStatus::Skipped);
        }

        if self.options.dry_run {
            tracing::info!(pending = pending.len(), "Dry run: album would be migrated");
            let mut outcome = AlbumOutcome::new(&album_id, AlbumStatus::Planned);
            outcome.images_pending = pending.len();
            return outcome;
        }

        tracing::info!(
            pending = pending.len(),
            images = manifest.len(),
            "Migrating album"
        );

        // `buffered` keeps results in manifest order.
        let results: Vec<_> = stream::iter(pending)
            .map(|idx| {
                let raw_key = manifest[idx].raw_key.clone();
                async move { (idx, self.enricher.enrich(&raw_key).await) }
            })
            .buffered(self.options.image_concurrency.max(1))
            .collect()
            .await;

        let mut outcome = AlbumOutcome::new(&album_id, AlbumStatus::Failed);
        let mut enriched: Vec<Option<ImageEntry>> = vec![None; manifest.len()];
        let mut succeeded = 0;

        for (idx, result) in results {
            let entry = &manifest[idx];
            match result {
                Ok(image) => {
                    let mut new_entry = image.into_entry(entry.raw_key.clone());
                    // Keep metadata captured at upload time when the new read found none.
                    new_entry.exif = new_entry.exif.or_else(|| entry.exif.clone());
                    new_entry.extra = entry.extra.clone();
                    enriched[idx] = Some(new_entry);
                    succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        raw_key = %entry.raw_key,
                        error = %e,
                        error_code = e.error_code(),
                        "Image enrichment failed, leaving it for the next run"
                    );
                    outcome.images_failed += 1;
                    outcome.failures.push(MigrationFailure {
                        album_id: album_id.clone(),
                        item_id: entry.raw_key.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if succeeded == 0 {
            tracing::warn!(
                failed = outcome.images_failed,
                "No image enriched, album left untouched"
            );
            return outcome;
        }

        // New results replace their pending entry. Entries the album already listed are
        // kept as they are, so a failed one stays pending for the next run. Failed
        // entries found only by listing are dropped; the next listing finds them again.
        let stored_len = album.images.len();
        let images: Vec<ImageEntry> = manifest
            .into_iter()
            .zip(enriched)
            .enumerate()
            .filter_map(|(idx, (entry, replacement))| match replacement {
                Some(new_entry) => Some(new_entry),
                None if idx < stored_len || entry.is_enriched() => Some(entry),
                None => None,
            })
            .collect();

        let cover = images.iter().find(|e| e.is_enriched());
        let update = ManifestUpdate {
            expected_revision: album.revision,
            cover_thumb_key: cover.and_then(|e| e.thumb_key()).map(String::from),
            cover_blurhash: cover.and_then(|e| e.blurhash()).map(String::from),
            images,
        };
        let image_count = update.images.len();

        match self.albums.update_images(&album_id, update).await {
            Ok(()) => {
                tracing::info!(
                    images = image_count,
                    enriched = succeeded,
                    failed = outcome.images_failed,
                    "Album manifest committed"
                );
                outcome.status = AlbumStatus::Committed;
                outcome.images_enriched = succeeded;
            }
            Err(e) => {
                let kind = match &e {
                    AlbumStoreError::Conflict(_) => FailureKind::CommitConflict,
                    _ => FailureKind::CommitFailed,
                };
                tracing::error!(
                    error = %e,
                    error_code = e.error_code(),
                    "Album commit failed, album left in its previous state"
                );
                outcome.failures.push(MigrationFailure {
                    album_id: album_id.clone(),
                    item_id: album_id.clone(),
                    kind,
                    message: e.to_string(),
                });
            }
        }

        outcome
    }

    /// The album's manifest plus, when reconciling, raw uploads it does not list yet.
    async fn working_manifest(&self, album: &Album) -> Result<Vec<ImageEntry>, MigrationFailure> {
        let mut manifest = album.images.clone();

        if !self.options.reconcile_prefix && !manifest.is_empty() {
            return Ok(manifest);
        }

        let prefix = album.storage_prefix();
        let keys = self.storage.list(&prefix).await.map_err(|e| {
            tracing::warn!(
                prefix = %prefix,
                error = %e,
                "Listing album prefix failed, leaving album for the next run"
            );
            MigrationFailure {
                album_id: album.album_id.clone(),
                item_id: album.album_id.clone(),
                kind: FailureKind::TransientIo,
                message: e.to_string(),
            }
        })?;

        let known: HashSet<String> = manifest.iter().map(|e| e.raw_key.clone()).collect();
        let discovered: Vec<ImageEntry> = keys
            .into_iter()
            .filter(|key| is_raw_image_key(key) && !known.contains(key))
            .map(ImageEntry::pending)
            .collect();

        if !discovered.is_empty() {
            tracing::debug!(
                prefix = %prefix,
                discovered = discovered.len(),
                "Found raw uploads missing from the manifest"
            );
        }

        manifest.extend(discovered);
        Ok(manifest)
    }
}
