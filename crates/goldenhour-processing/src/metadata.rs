//! EXIF camera metadata extraction
//!
//! Reading is split in two: `read_raw_tags` pulls the handful of tags we care about
//! out of an EXIF container, and `RationalTagDecoder` turns them into display
//! strings. Each tag is decoded on its own, so one malformed tag never hides the others.

use goldenhour_core::{ErrorMetadata, ExifData, LogLevel};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

/// Number of leading bytes fetched for EXIF parsing.
pub const EXIF_HEADER_BYTES: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum ExifError {
    #[error("No EXIF block found")]
    Missing,

    #[error("Malformed EXIF block: {0}")]
    Malformed(String),
}

impl ErrorMetadata for ExifError {
    fn error_code(&self) -> &'static str {
        match self {
            ExifError::Missing => "EXIF_MISSING",
            ExifError::Malformed(_) => "EXIF_MALFORMED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

/// The tags surfaced in an image manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExifTag {
    Model,
    LensModel,
    FNumber,
    ExposureTime,
    IsoSpeed,
}

impl ExifTag {
    pub const ALL: [ExifTag; 5] = [
        ExifTag::Model,
        ExifTag::LensModel,
        ExifTag::FNumber,
        ExifTag::ExposureTime,
        ExifTag::IsoSpeed,
    ];

    fn to_kamadak(self) -> exif::Tag {
        match self {
            ExifTag::Model => exif::Tag::Model,
            ExifTag::LensModel => exif::Tag::LensModel,
            ExifTag::FNumber => exif::Tag::FNumber,
            ExifTag::ExposureTime => exif::Tag::ExposureTime,
            ExifTag::IsoSpeed => exif::Tag::PhotographicSensitivity,
        }
    }
}

/// A tag value as stored in the EXIF block, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTagValue {
    Text(String),
    Rational { num: u32, den: u32 },
    Integer(u64),
}

pub type RawExifTags = HashMap<ExifTag, RawTagValue>;

/// Render `num / den` with the shortest decimal that round-trips.
///
/// `28/10` is `2.8`, `2/1` is `2`, `3/2` is `1.5`. Returns `None` for a zero
/// denominator instead of producing `inf` or `NaN`.
pub fn format_minimal_decimal(num: u32, den: u32) -> Option<String> {
    if den == 0 {
        return None;
    }
    let value = f64::from(num) / f64::from(den);
    Some(format!("{}", value))
}

/// Decodes raw EXIF tag values into `ExifData` display strings.
pub struct RationalTagDecoder;

impl RationalTagDecoder {
    pub fn decode(tags: &RawExifTags) -> ExifData {
        ExifData {
            model: tags.get(&ExifTag::Model).and_then(Self::text),
            lens: tags.get(&ExifTag::LensModel).and_then(Self::text),
            focal_ratio: tags.get(&ExifTag::FNumber).and_then(Self::focal_ratio),
            shutter_speed: tags
                .get(&ExifTag::ExposureTime)
                .and_then(Self::shutter_speed),
            iso: tags.get(&ExifTag::IsoSpeed).and_then(Self::iso),
        }
    }

    fn text(value: &RawTagValue) -> Option<String> {
        match value {
            RawTagValue::Text(s) => {
                let trimmed = s.trim_matches(|c: char| c.is_whitespace() || c == '\0');
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            _ => None,
        }
    }

    fn focal_ratio(value: &RawTagValue) -> Option<String> {
        match *value {
            RawTagValue::Rational { num, den } => {
                format_minimal_decimal(num, den).map(|v| format!("f/{}", v))
            }
            _ => None,
        }
    }

    fn shutter_speed(value: &RawTagValue) -> Option<String> {
        match *value {
            RawTagValue::Rational { num, den } if num != 0 && den != 0 => {
                if num >= den {
                    format_minimal_decimal(num, den).map(|v| format!("{}s", v))
                } else {
                    // Sub-second exposures keep the fraction as the camera wrote it.
                    Some(format!("{}/{}s", num, den))
                }
            }
            _ => None,
        }
    }

    fn iso(value: &RawTagValue) -> Option<String> {
        match value {
            RawTagValue::Integer(n) => Some(format!("ISO {}", n)),
            RawTagValue::Text(s) if !s.trim().is_empty() => Some(format!("ISO {}", s.trim())),
            _ => None,
        }
    }
}

/// Extract the tags in `ExifTag::ALL` from an image container (or its leading bytes).
///
/// Tags with an unexpected shape are left out rather than failing the read.
pub fn read_raw_tags(data: &[u8]) -> Result<RawExifTags, ExifError> {
    let mut cursor = Cursor::new(data);
    let parsed = exif::Reader::new()
        .read_from_container(&mut cursor)
        .map_err(|e| match e {
            exif::Error::NotFound(_) => ExifError::Missing,
            other => ExifError::Malformed(other.to_string()),
        })?;

    let mut tags = RawExifTags::new();
    for tag in ExifTag::ALL {
        let Some(field) = parsed.get_field(tag.to_kamadak(), exif::In::PRIMARY) else {
            continue;
        };
        match raw_value(&field.value) {
            Some(value) => {
                tags.insert(tag, value);
            }
            None => {
                tracing::debug!(tag = ?tag, "Skipping EXIF tag with unexpected value type");
            }
        }
    }

    Ok(tags)
}

fn raw_value(value: &exif::Value) -> Option<RawTagValue> {
    match value {
        exif::Value::Ascii(vecs) => vecs
            .iter()
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .find(|s| !s.trim().is_empty())
            .map(RawTagValue::Text),
        exif::Value::Rational(v) => v.first().map(|r| RawTagValue::Rational {
            num: r.num,
            den: r.denom,
        }),
        exif::Value::SRational(v) => v.first().and_then(|r| {
            let num = u32::try_from(r.num).ok()?;
            let den = u32::try_from(r.denom).ok()?;
            Some(RawTagValue::Rational { num, den })
        }),
        exif::Value::Short(v) => v.first().map(|n| RawTagValue::Integer(u64::from(*n))),
        exif::Value::Long(v) => v.first().map(|n| RawTagValue::Integer(u64::from(*n))),
        _ => None,
    }
}

/// Read and decode camera metadata. `None` when there is nothing to show.
pub fn extract_exif(data: &[u8]) -> Result<Option<ExifData>, ExifError> {
    let tags = read_raw_tags(data)?;
    let decoded = RationalTagDecoder::decode(&tags);
    Ok((!decoded.is_empty()).then_some(decoded))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::{Field, In, Rational, Tag, Value};
    use image::{DynamicImage, ImageFormat};
    use img_parts::jpeg::Jpeg;
    use img_parts::ImageEXIF;

    fn rational(num: u32, den: u32) -> RawTagValue {
        RawTagValue::Rational { num, den }
    }

    fn tags(entries: Vec<(ExifTag, RawTagValue)>) -> RawExifTags {
        entries.into_iter().collect()
    }

    /// A small JPEG carrying an EXIF block with the given fields.
    pub(crate) fn jpeg_with_exif(fields: &[Field]) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(64, 48);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();

        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut exif_buf = Cursor::new(Vec::new());
        writer.write(&mut exif_buf, false).unwrap();

        let mut jpeg = Jpeg::from_bytes(buf.into_inner().into()).unwrap();
        jpeg.set_exif(Some(exif_buf.into_inner().into()));
        jpeg.encoder().bytes().to_vec()
    }

    pub(crate) fn camera_fields() -> Vec<Field> {
        vec![
            Field {
                tag: Tag::Model,
                ifd_num: In::PRIMARY,
                value: Value::Ascii(vec![b"X100V  ".to_vec()]),
            },
            Field {
                tag: Tag::FNumber,
                ifd_num: In::PRIMARY,
                value: Value::Rational(vec![Rational { num: 28, denom: 10 }]),
            },
            Field {
                tag: Tag::ExposureTime,
                ifd_num: In::PRIMARY,
                value: Value::Rational(vec![Rational { num: 1, denom: 250 }]),
            },
            Field {
                tag: Tag::PhotographicSensitivity,
                ifd_num: In::PRIMARY,
                value: Value::Short(vec![400]),
            },
        ]
    }

    #[test]
    fn test_focal_ratio_minimal_decimal() {
        let exif = RationalTagDecoder::decode(&tags(vec![(ExifTag::FNumber, rational(28, 10))]));
        assert_eq!(exif.focal_ratio.as_deref(), Some("f/2.8"));

        let exif = RationalTagDecoder::decode(&tags(vec![(ExifTag::FNumber, rational(80, 10))]));
        assert_eq!(exif.focal_ratio.as_deref(), Some("f/8"));
    }

    #[test]
    fn test_shutter_speed_formats() {
        let cases = [
            (rational(1, 250), "1/250s"),
            (rational(2, 1), "2s"),
            (rational(3, 2), "1.5s"),
            (rational(10, 10), "1s"),
            // Not reduced: the tag's own fraction is shown.
            (rational(10, 1250), "10/1250s"),
        ];
        for (value, expected) in cases {
            let exif = RationalTagDecoder::decode(&tags(vec![(ExifTag::ExposureTime, value)]));
            assert_eq!(exif.shutter_speed.as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_zero_denominator_is_omitted() {
        let exif = RationalTagDecoder::decode(&tags(vec![
            (ExifTag::FNumber, rational(28, 0)),
            (ExifTag::ExposureTime, rational(1, 0)),
        ]));
        assert_eq!(exif.focal_ratio, None);
        assert_eq!(exif.shutter_speed, None);
        assert!(exif.is_empty());
    }

    #[test]
    fn test_zero_exposure_is_omitted() {
        let exif = RationalTagDecoder::decode(&tags(vec![(ExifTag::ExposureTime, rational(0, 1))]));
        assert_eq!(exif.shutter_speed, None);
    }

    #[test]
    fn test_text_is_trimmed_and_blank_is_absent() {
        let exif = RationalTagDecoder::decode(&tags(vec![
            (ExifTag::Model, RawTagValue::Text("  ILCE-7M3 \0".to_string())),
            (ExifTag::LensModel, RawTagValue::Text("   ".to_string())),
        ]));
        assert_eq!(exif.model.as_deref(), Some("ILCE-7M3"));
        assert_eq!(exif.lens, None);
    }

    #[test]
    fn test_type_mismatch_only_drops_that_tag() {
        let exif = RationalTagDecoder::decode(&tags(vec![
            (ExifTag::FNumber, RawTagValue::Text("2.8".to_string())),
            (ExifTag::Model, rational(1, 2)),
            (ExifTag::IsoSpeed, RawTagValue::Integer(800)),
        ]));
        assert_eq!(exif.focal_ratio, None);
        assert_eq!(exif.model, None);
        assert_eq!(exif.iso.as_deref(), Some("ISO 800"));
    }

    #[test]
    fn test_format_minimal_decimal() {
        assert_eq!(format_minimal_decimal(28, 10).as_deref(), Some("2.8"));
        assert_eq!(format_minimal_decimal(2, 1).as_deref(), Some("2"));
        assert_eq!(format_minimal_decimal(1, 3).as_deref(), Some("0.3333333333333333"));
        assert_eq!(format_minimal_decimal(1, 0), None);
    }

    #[test]
    fn test_extract_exif_from_jpeg() {
        let data = jpeg_with_exif(&camera_fields());
        let exif = extract_exif(&data).unwrap().expect("camera metadata");

        assert_eq!(exif.model.as_deref(), Some("X100V"));
        assert_eq!(exif.lens, None);
        assert_eq!(exif.focal_ratio.as_deref(), Some("f/2.8"));
        assert_eq!(exif.shutter_speed.as_deref(), Some("1/250s"));
        assert_eq!(exif.iso.as_deref(), Some("ISO 400"));
    }

    #[test]
    fn test_jpeg_without_exif_is_missing() {
        let img = DynamicImage::new_rgb8(16, 16);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();

        let result = extract_exif(&buf.into_inner());
        assert!(matches!(result, Err(ExifError::Missing)));
    }

    #[test]
    fn test_garbage_is_an_error_not_a_panic() {
        assert!(extract_exif(b"definitely not an image").is_err());
    }
}
