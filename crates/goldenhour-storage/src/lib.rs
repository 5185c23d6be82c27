//! GoldenHour Storage Library
//!
//! Object-store abstraction used by the enrichment pipeline, with S3 and local
//! filesystem backends.
//!
//! # Storage key format
//!
//! Raw uploads live under an album prefix (`albums/{album_id}/{filename}` unless the
//! album record names another prefix). Derived thumbnails sit next to their original
//! as `thumb_{filename}`. Key derivation is centralized in the `keys` module so every
//! run writes the same thumbnail key for the same raw key.
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use goldenhour_core::StorageBackend;
pub use keys::{is_raw_image_key, is_thumbnail_key, thumbnail_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
