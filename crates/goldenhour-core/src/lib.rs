//! GoldenHour Core Library
//!
//! This crate provides the album manifest models, error vocabulary and configuration
//! shared by the storage, database, processing and migration crates.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::MigrationConfig;
pub use error::{ErrorMetadata, FailureKind, LogLevel};
pub use models::{
    Album, ContinuationToken, EnrichedImage, ExifData, ImageEnrichment, ImageEntry,
};
pub use storage_types::StorageBackend;
