//! GoldenHour Processing Library
//!
//! Image enrichment: EXIF decoding, thumbnail and blurhash generation, and the
//! enricher that ties them to object storage.

pub mod enricher;
pub mod metadata;
pub mod thumbnail;

// Re-export commonly used types
pub use enricher::{EnrichError, ImageEnricher};
pub use metadata::{
    extract_exif, format_minimal_decimal, read_raw_tags, ExifError, ExifTag, RationalTagDecoder,
    RawExifTags, RawTagValue, EXIF_HEADER_BYTES,
};
pub use thumbnail::{ThumbnailError, ThumbnailHasher, ThumbnailOutput};
