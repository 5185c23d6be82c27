//! Thumbnail and placeholder hash generation
//!
//! CPU-bound; callers on an async runtime should run it inside `spawn_blocking`.

use goldenhour_core::{ErrorMetadata, LogLevel};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader, Limits};
use std::io::Cursor;
use thiserror::Error;

/// Longest side of a display thumbnail.
pub const THUMBNAIL_MAX_DIM: u32 = 800;

/// JPEG quality for thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 85;

/// Size to downscale to before computing the blurhash.
const BLURHASH_SAMPLE_SIZE: u32 = 32;

/// Horizontal blurhash components. Vertical components follow the aspect ratio.
const BLURHASH_COMPONENTS_X: u32 = 4;
const BLURHASH_MAX_COMPONENTS_Y: u32 = 4;

/// Maximum image dimension (width or height) to prevent decompression bombs.
const MAX_IMAGE_DIMENSION: u32 = 30000;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    #[error("Image has zero width or height")]
    EmptyImage,

    #[error("Blurhash encoding failed: {0}")]
    BlurhashFailed(String),

    #[error("Thumbnail encoding failed: {0}")]
    EncodeFailed(String),
}

impl ErrorMetadata for ThumbnailError {
    fn error_code(&self) -> &'static str {
        match self {
            ThumbnailError::DecodeFailed(_) => "IMAGE_DECODE_FAILED",
            ThumbnailError::EmptyImage => "IMAGE_EMPTY",
            ThumbnailError::BlurhashFailed(_) => "BLURHASH_FAILED",
            ThumbnailError::EncodeFailed(_) => "THUMBNAIL_ENCODE_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

/// Output of a successful run: JPEG thumbnail, placeholder hash and source dimensions.
#[derive(Debug, Clone)]
pub struct ThumbnailOutput {
    pub thumbnail: Vec<u8>,
    pub blurhash: String,
    /// Width of the source image, not the thumbnail.
    pub width: u32,
    /// Height of the source image, not the thumbnail.
    pub height: u32,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ThumbnailHasher {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl Default for ThumbnailHasher {
    fn default() -> Self {
        Self {
            max_dimension: THUMBNAIL_MAX_DIM,
            jpeg_quality: THUMBNAIL_JPEG_QUALITY,
        }
    }
}

impl ThumbnailHasher {
    pub fn new(max_dimension: u32, jpeg_quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Decode `data`, hash it and produce the thumbnail. No partial output on error.
    pub fn process(&self, data: &[u8]) -> Result<ThumbnailOutput, ThumbnailError> {
        let img = decode(data)?;
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ThumbnailError::EmptyImage);
        }

        // Three channels only, so alpha or 16-bit sources hash and encode the same way.
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        drop(img);

        let blurhash = generate_blurhash(&rgb)?;

        let (thumb_width, thumb_height) =
            thumbnail_dimensions(width, height, self.max_dimension);
        let thumb = if (thumb_width, thumb_height) == (width, height) {
            rgb
        } else {
            rgb.resize_exact(thumb_width, thumb_height, FilterType::Lanczos3)
        };

        let mut thumbnail = Vec::new();
        thumb
            .write_with_encoder(JpegEncoder::new_with_quality(
                &mut thumbnail,
                self.jpeg_quality,
            ))
            .map_err(|e| ThumbnailError::EncodeFailed(e.to_string()))?;

        Ok(ThumbnailOutput {
            thumbnail,
            blurhash,
            width,
            height,
            thumbnail_width: thumb_width,
            thumbnail_height: thumb_height,
        })
    }
}

fn decode(data: &[u8]) -> Result<DynamicImage, ThumbnailError> {
    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ThumbnailError::DecodeFailed(e.to_string()))?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    reader.limits(limits);

    reader
        .decode()
        .map_err(|e| ThumbnailError::DecodeFailed(e.to_string()))
}

/// Thumbnail size for a `width` x `height` source.
///
/// If either side exceeds `max_dim` the longer side becomes exactly `max_dim` and the
/// other is scaled proportionally (rounded, at least 1). Never upscales.
pub fn thumbnail_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }

    let scale_side = |side: u32, longest: u32| -> u32 {
        let scaled = (u64::from(side) * u64::from(max_dim) + u64::from(longest) / 2)
            / u64::from(longest);
        (scaled as u32).clamp(1, max_dim)
    };

    if width >= height {
        (max_dim, scale_side(height, width))
    } else {
        (scale_side(width, height), max_dim)
    }
}

/// Vertical blurhash component count: `clamp(round(4 * height / width), 1, 4)`.
///
/// Halves round to even.
pub fn blurhash_components_y(width: u32, height: u32) -> u32 {
    if width == 0 {
        return 1;
    }
    let ratio = f64::from(BLURHASH_COMPONENTS_X) * f64::from(height) / f64::from(width);
    (ratio.round_ties_even() as u32).clamp(1, BLURHASH_MAX_COMPONENTS_Y)
}

/// Generate a blurhash from a small downscaled sample of the image.
fn generate_blurhash(img: &DynamicImage) -> Result<String, ThumbnailError> {
    let (width, height) = img.dimensions();
    let components_y = blurhash_components_y(width, height);

    let sample = if width > BLURHASH_SAMPLE_SIZE || height > BLURHASH_SAMPLE_SIZE {
        img.thumbnail(BLURHASH_SAMPLE_SIZE, BLURHASH_SAMPLE_SIZE)
    } else {
        img.clone()
    };
    let (w, h) = sample.dimensions();
    let rgba = sample.to_rgba8();

    blurhash::encode(BLURHASH_COMPONENTS_X, components_y, w, h, rgba.as_raw())
        .map_err(|e| ThumbnailError::BlurhashFailed(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    /// A gradient PNG so resampling and hashing have real content to work on.
    pub(crate) fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn decoded_dimensions(jpeg: &[u8]) -> (u32, u32) {
        image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
            .unwrap()
            .dimensions()
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let output = ThumbnailHasher::default()
            .process(&gradient_png(400, 300))
            .unwrap();

        assert_eq!((output.width, output.height), (400, 300));
        assert_eq!(decoded_dimensions(&output.thumbnail), (400, 300));
    }

    #[test]
    fn test_large_landscape_is_bounded_to_800() {
        let output = ThumbnailHasher::default()
            .process(&gradient_png(4000, 2000))
            .unwrap();

        // Recorded dimensions are the source's.
        assert_eq!((output.width, output.height), (4000, 2000));
        assert_eq!(decoded_dimensions(&output.thumbnail), (800, 400));
    }

    #[test]
    fn test_thumbnail_dimensions() {
        assert_eq!(thumbnail_dimensions(400, 300, 800), (400, 300));
        assert_eq!(thumbnail_dimensions(800, 800, 800), (800, 800));
        assert_eq!(thumbnail_dimensions(4000, 2000, 800), (800, 400));
        assert_eq!(thumbnail_dimensions(2000, 4000, 800), (400, 800));
        assert_eq!(thumbnail_dimensions(1200, 1200, 800), (800, 800));
        assert_eq!(thumbnail_dimensions(10000, 3, 800), (800, 1));
        assert_eq!(thumbnail_dimensions(900, 599, 800), (800, 532));
    }

    #[test]
    fn test_blurhash_components_follow_aspect_ratio() {
        assert_eq!(blurhash_components_y(4000, 2000), 2);
        assert_eq!(blurhash_components_y(1000, 1000), 4);
        assert_eq!(blurhash_components_y(1000, 3000), 4);
        assert_eq!(blurhash_components_y(10000, 100), 1);
        // 4 * 5 / 8 = 2.5 rounds to even.
        assert_eq!(blurhash_components_y(8, 5), 2);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let data = gradient_png(640, 480);
        let hasher = ThumbnailHasher::default();

        let first = hasher.process(&data).unwrap();
        let second = hasher.process(&data).unwrap();

        assert!(!first.blurhash.is_empty());
        assert_eq!(first.blurhash, second.blurhash);
        assert_eq!(first.thumbnail, second.thumbnail);
    }

    #[test]
    fn test_alpha_channel_is_discarded() {
        let img = RgbaImage::from_pixel(50, 50, Rgba([200, 10, 10, 0]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();

        let output = ThumbnailHasher::default().process(&buf.into_inner()).unwrap();
        assert_eq!((output.width, output.height), (50, 50));
        assert_eq!(decoded_dimensions(&output.thumbnail), (50, 50));
    }

    #[test]
    fn test_tiny_image_still_hashes() {
        let output = ThumbnailHasher::default().process(&gradient_png(3, 2)).unwrap();
        assert!(!output.blurhash.is_empty());
    }

    #[test]
    fn test_invalid_bytes_are_unprocessable() {
        let result = ThumbnailHasher::default().process(b"not an image at all");
        assert!(matches!(result, Err(ThumbnailError::DecodeFailed(_))));
    }

    #[test]
    fn test_truncated_image_is_unprocessable() {
        let mut data = gradient_png(200, 200);
        data.truncate(data.len() / 3);
        assert!(ThumbnailHasher::default().process(&data).is_err());
    }
}
