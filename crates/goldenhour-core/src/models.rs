//! Album manifest models
//!
//! Field names serialize in camelCase because gallery clients read the manifest
//! verbatim. Optional fields are omitted rather than written as `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Prefix used when an album record carries no explicit `s3Prefix`.
const DEFAULT_ALBUM_PREFIX: &str = "albums";

/// An album record as held by the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub album_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_prefix: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_thumb_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_blurhash: Option<String>,
    /// Store revision, bumped on every write. Guards conditional updates.
    #[serde(default)]
    pub revision: i64,
}

impl Album {
    /// Object-store prefix under which this album's raw images live.
    ///
    /// Always ends with `/` so it can be used directly in a prefix listing.
    pub fn storage_prefix(&self) -> String {
        match self.s3_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => {
                if prefix.ends_with('/') {
                    prefix.to_string()
                } else {
                    format!("{}/", prefix)
                }
            }
            _ => format!("{}/{}/", DEFAULT_ALBUM_PREFIX, self.album_id),
        }
    }

    /// Number of entries that still need a thumbnail.
    pub fn pending_count(&self) -> usize {
        self.images.iter().filter(|img| !img.is_enriched()).count()
    }
}

/// The derived fields written by enrichment.
///
/// Kept as one struct so an entry either has all of them or none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEnrichment {
    pub thumb_key: String,
    pub blurhash: String,
    pub width: u32,
    pub height: u32,
}

/// One image in an album manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    /// Older manifests stored the original under `key`.
    #[serde(alias = "key")]
    pub raw_key: String,
    #[serde(flatten)]
    pub enrichment: Option<ImageEnrichment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifData>,
    /// Fields written by other clients (e.g. a legacy `url`). Carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageEntry {
    /// An entry that has not been enriched yet.
    pub fn pending(raw_key: impl Into<String>) -> Self {
        Self {
            raw_key: raw_key.into(),
            enrichment: None,
            exif: None,
            extra: Map::new(),
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }

    pub fn thumb_key(&self) -> Option<&str> {
        self.enrichment.as_ref().map(|e| e.thumb_key.as_str())
    }

    pub fn blurhash(&self) -> Option<&str> {
        self.enrichment.as_ref().map(|e| e.blurhash.as_str())
    }
}

/// Camera metadata decoded from the embedded EXIF block.
///
/// Every field is independent; absent tags are absent keys, never empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
}

impl ExifData {
    pub fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.lens.is_none()
            && self.focal_ratio.is_none()
            && self.shutter_speed.is_none()
            && self.iso.is_none()
    }
}

/// Result of enriching a single raw image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedImage {
    pub thumb_key: String,
    pub blurhash: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifData>,
}

impl EnrichedImage {
    /// Build the manifest entry for `raw_key` from this result.
    pub fn into_entry(self, raw_key: impl Into<String>) -> ImageEntry {
        ImageEntry {
            raw_key: raw_key.into(),
            enrichment: Some(ImageEnrichment {
                thumb_key: self.thumb_key,
                blurhash: self.blurhash,
                width: self.width,
                height: self.height,
            }),
            exif: self.exif,
            extra: Map::new(),
        }
    }
}

/// Opaque cursor returned by a paginated album scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
