//! Error types module
//!
//! Each crate defines its own `thiserror` enum. This module holds the shared vocabulary
//! those enums implement so the migration report and logs classify failures the same way.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected misses like an absent EXIF block
    Debug,
    /// Warning level - for per-item failures the run tolerates
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be logged and reported
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "STORAGE_NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (a later run may succeed)
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Classification of a per-item failure surfaced in the migration report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The image bytes could not be decoded or re-encoded.
    UnprocessableImage,
    /// An object-store or metadata-store call failed.
    TransientIo,
    /// The final album write failed.
    CommitFailed,
    /// The album changed between read and write.
    CommitConflict,
    /// The stored manifest could not be decoded.
    InvalidManifest,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnprocessableImage => "unprocessable_image",
            FailureKind::TransientIo => "transient_io",
            FailureKind::CommitFailed => "commit_failed",
            FailureKind::CommitConflict => "commit_conflict",
            FailureKind::InvalidManifest => "invalid_manifest",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
