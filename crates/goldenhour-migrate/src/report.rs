//! Migration run summary

use chrono::{DateTime, Utc};
use goldenhour_core::FailureKind;
use serde::Serialize;

/// One image or album that could not be migrated in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFailure {
    pub album_id: String,
    /// Raw image key for image failures, album id for album failures.
    pub item_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// What happened to a single album.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumStatus {
    /// Nothing to enrich.
    Skipped,
    /// New manifest written.
    Committed,
    /// Left untouched because of failures; retried on the next run.
    Failed,
    /// Dry run: would have been enriched.
    Planned,
}

#[derive(Debug, Clone)]
pub struct AlbumOutcome {
    pub album_id: String,
    pub status: AlbumStatus,
    pub images_enriched: usize,
    pub images_failed: usize,
    pub images_pending: usize,
    pub failures: Vec<MigrationFailure>,
}

impl AlbumOutcome {
    pub fn new(album_id: impl Into<String>, status: AlbumStatus) -> Self {
        Self {
            album_id: album_id.into(),
            status,
            images_enriched: 0,
            images_failed: 0,
            images_pending: 0,
            failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub pages_scanned: usize,
    pub albums_scanned: usize,
    pub albums_skipped: usize,
    pub albums_committed: usize,
    pub albums_failed: usize,
    /// Albums a dry run found work in.
    pub albums_planned: usize,
    pub images_enriched: usize,
    pub images_failed: usize,
    /// Images a dry run would have enriched.
    pub images_planned: usize,
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    pub fn start(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            pages_scanned: 0,
            albums_scanned: 0,
            albums_skipped: 0,
            albums_committed: 0,
            albums_failed: 0,
            albums_planned: 0,
            images_enriched: 0,
            images_failed: 0,
            images_planned: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: AlbumOutcome) {
        self.albums_scanned += 1;
        match outcome.status {
            AlbumStatus::Skipped => self.albums_skipped += 1,
            AlbumStatus::Committed => self.albums_committed += 1,
            AlbumStatus::Failed => self.albums_failed += 1,
            AlbumStatus::Planned => {
                self.albums_planned += 1;
                self.images_planned += outcome.images_pending;
            }
        }
        self.images_enriched += outcome.images_enriched;
        self.images_failed += outcome.images_failed;
        self.failures.extend(outcome.failures);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_images_and_albums() {
        let mut report = MigrationReport::start(false);

        let mut committed = AlbumOutcome::new("a", AlbumStatus::Committed);
        committed.images_enriched = 2;
        committed.images_failed = 1;
        committed.failures.push(MigrationFailure {
            album_id: "a".to_string(),
            item_id: "albums/a/bad.jpg".to_string(),
            kind: FailureKind::UnprocessableImage,
            message: "decode failed".to_string(),
        });
        report.record(committed);

        let mut failed = AlbumOutcome::new("b", AlbumStatus::Failed);
        failed.failures.push(MigrationFailure {
            album_id: "b".to_string(),
            item_id: "b".to_string(),
            kind: FailureKind::CommitFailed,
            message: "connection reset".to_string(),
        });
        report.record(failed);

        report.record(AlbumOutcome::new("c", AlbumStatus::Skipped));
        report.finish();

        assert_eq!(report.albums_scanned, 3);
        assert_eq!(report.albums_committed, 1);
        assert_eq!(report.albums_failed, 1);
        assert_eq!(report.albums_skipped, 1);
        assert_eq!(report.images_enriched, 2);
        assert_eq!(report.images_failed, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = MigrationReport::start(true);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["dryRun"], true);
        assert_eq!(value["albumsCommitted"], 0);
        assert!(value["failures"].as_array().unwrap().is_empty());
    }
}
