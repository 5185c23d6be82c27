//! Test helpers for crates that depend on the album store

pub mod mock_album_store;

pub use mock_album_store::*;
