//! Test helpers for crates that depend on storage
//!
//! Provides an in-memory `Storage` so enrichment and migration can be tested
//! without S3 or a filesystem.

pub mod mock_storage;

pub use mock_storage::*;
