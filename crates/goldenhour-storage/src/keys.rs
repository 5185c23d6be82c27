//! Shared key derivation for storage backends.
//!
//! Key format: a thumbnail lives next to its original as `{dir}/thumb_{filename}`.

/// File name prefix marking a derived thumbnail.
pub const THUMBNAIL_PREFIX: &str = "thumb_";

/// Derive the thumbnail key for a raw image key.
///
/// Deterministic: the same raw key always yields the same thumbnail key, so a
/// re-run overwrites the earlier upload instead of leaving a second copy.
pub fn thumbnail_key(raw_key: &str) -> String {
    match raw_key.rsplit_once('/') {
        Some((dir, filename)) => format!("{}/{}{}", dir, THUMBNAIL_PREFIX, filename),
        None => format!("{}{}", THUMBNAIL_PREFIX, raw_key),
    }
}

/// Whether `key` names a derived thumbnail.
pub fn is_thumbnail_key(key: &str) -> bool {
    let filename = key.rsplit('/').next().unwrap_or(key);
    filename.starts_with(THUMBNAIL_PREFIX)
}

/// Whether a listed key is an original upload worth enriching.
///
/// Folder markers (keys ending in `/`) and thumbnails are not.
pub fn is_raw_image_key(key: &str) -> bool {
    !key.is_empty() && !key.ends_with('/') && !is_thumbnail_key(key)
}
