//! GoldenHour Database Library
//!
//! Metadata-store access for album records: the `AlbumStore` capability, its
//! PostgreSQL implementation and pool setup.

pub mod postgres;
pub mod setup;
pub mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use postgres::PgAlbumRepository;
pub use setup::{create_pool, run_migrations};
pub use store::{
    AlbumPage, AlbumStore, AlbumStoreError, AlbumStoreResult, InvalidAlbum, ManifestUpdate,
};
