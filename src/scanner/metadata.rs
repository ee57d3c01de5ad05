use anyhow::Result;
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::db::{Column, NewPhoto};

/// Values read from an image file, already formatted for the `photo` table.
/// Unset fields fall back to the column defaults on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub color: Option<String>,

    pub date_taken: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub exposure_time: Option<String>,
    pub sensitivity: Option<String>,
}

impl ImageMetadata {
    pub fn into_new_photo(self, filename: Option<String>, uid: Option<String>) -> NewPhoto {
        NewPhoto {
            filename,
            uid,
            width: self.width,
            height: self.height,
            color: self.color,
            title: None,
            date_taken: self.date_taken,
            camera_model: self.camera_model,
            lens_model: self.lens_model,
            focal_length: self.focal_length,
            aperture: self.aperture,
            exposure_time: self.exposure_time,
            sensitivity: self.sensitivity,
        }
    }
}

pub fn extract_metadata(path: &Path) -> Result<ImageMetadata> {
    let mut metadata = ImageMetadata::default();

    // Dimensions come from the header, no full decode needed
    if let Ok(reader) = image::ImageReader::open(path) {
        if let Ok((w, h)) = reader.into_dimensions() {
            metadata.width = i32::try_from(w).ok();
            metadata.height = i32::try_from(h).ok();
        }
    }

    metadata.color = dominant_color(path).ok();

    if let Ok(file) = File::open(path) {
        let mut bufreader = BufReader::new(file);
        if let Ok(exif) = exif::Reader::new().read_from_container(&mut bufreader) {
            read_exif(&exif, &mut metadata);
        }
    }

    Ok(metadata)
}

fn read_exif(exif: &exif::Exif, metadata: &mut ImageMetadata) {
    let text = |tag: exif::Tag| -> Option<String> {
        exif.get_field(tag, exif::In::PRIMARY)
            .map(|field| field.display_value().to_string().trim_matches('"').trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let rational = |tag: exif::Tag| -> Option<(u32, u32)> {
        match exif.get_field(tag, exif::In::PRIMARY).map(|f| &f.value) {
            Some(exif::Value::Rational(v)) => v.first().map(|r| (r.num, r.denom)),
            _ => None,
        }
    };

    metadata.date_taken = text(exif::Tag::DateTimeOriginal)
        .or_else(|| text(exif::Tag::DateTime))
        .map(|raw| format_date_taken(&raw));

    metadata.camera_model = text(exif::Tag::Model).map(|s| Column::CameraModel.clip(&s));
    metadata.lens_model = text(exif::Tag::LensModel).map(|s| Column::LensModel.clip(&s));

    metadata.focal_length = rational(exif::Tag::FocalLength)
        .and_then(|(n, d)| ratio(n, d))
        .map(format_focal_length);

    metadata.aperture = rational(exif::Tag::FNumber)
        .and_then(|(n, d)| ratio(n, d))
        .map(format_aperture);

    metadata.exposure_time = rational(exif::Tag::ExposureTime)
        .and_then(|(n, d)| format_exposure_time(n, d));

    metadata.sensitivity = exif
        .get_field(exif::Tag::PhotographicSensitivity, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .map(format_sensitivity);
}

fn ratio(num: u32, denom: u32) -> Option<f64> {
    if denom == 0 {
        None
    } else {
        Some(num as f64 / denom as f64)
    }
}

/// Mean color of a small thumbnail as six lowercase hex digits.
pub fn dominant_color(path: &Path) -> Result<String> {
    let img = image::open(path)?;
    let small = if img.width() > 32 || img.height() > 32 {
        img.thumbnail(32, 32)
    } else {
        img
    };
    let rgb = small.to_rgb8();

    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for pixel in rgb.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += channel as u64;
        }
        count += 1;
    }
    if count == 0 {
        anyhow::bail!("Image has no pixels: {}", path.display());
    }

    Ok(format!(
        "{:02x}{:02x}{:02x}",
        sums[0] / count,
        sums[1] / count,
        sums[2] / count
    ))
}

/// EXIF `YYYY:MM:DD HH:MM:SS` becomes `YYYY-MM-DD HH:MM`, which fits the
/// 16 character column. Anything unparseable is kept as-is, clipped.
pub fn format_date_taken(raw: &str) -> String {
    let raw = raw.trim();
    for pattern in ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    Column::DateTaken.clip(raw)
}

pub fn format_focal_length(mm: f64) -> String {
    Column::FocalLength.clip(&format!("{} mm", short_number(mm)))
}

pub fn format_aperture(f_number: f64) -> String {
    Column::Aperture.clip(&format!("f/{}", short_number(f_number)))
}

/// Exact unit fractions as `1/n`, everything else in seconds. Fractions too
/// small to show in tenths of a second stay as `n/d`.
pub fn format_exposure_time(num: u32, denom: u32) -> Option<String> {
    if num == 0 || denom == 0 {
        return None;
    }
    let divisor = gcd(num, denom);
    let (num, denom) = (num / divisor, denom / divisor);
    let seconds = num as f64 / denom as f64;
    let value = if num == 1 && denom > 1 {
        format!("1/{}", denom)
    } else if seconds < 0.1 {
        format!("{}/{}", num, denom)
    } else {
        format!("{} s", short_number(seconds))
    };
    Some(Column::ExposureTime.clip(&value))
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn format_sensitivity(iso: u32) -> String {
    format!("ISO {}", iso)
}

/// At most one decimal, no trailing `.0`.
fn short_number(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date_taken() {
        assert_eq!(format_date_taken("2021:07:14 20:31:05"), "2021-07-14 20:31");
        assert_eq!(format_date_taken("2021-07-14 20:31:05"), "2021-07-14 20:31");
        assert_eq!(format_date_taken("sometime in July 2021"), "sometime in July");
        assert!(format_date_taken("0000:00:00 00:00:00").chars().count() <= 16);
    }

    #[test]
    fn test_format_exposure_fields() {
        assert_eq!(format_focal_length(23.0), "23 mm");
        assert_eq!(format_focal_length(4.25), "4.3 mm");
        assert_eq!(format_aperture(2.8), "f/2.8");
        assert_eq!(format_aperture(8.0), "f/8");
        assert_eq!(format_exposure_time(1, 250).as_deref(), Some("1/250"));
        assert_eq!(format_exposure_time(10, 2500).as_deref(), Some("1/250"));
        assert_eq!(format_exposure_time(5, 2).as_deref(), Some("2.5 s"));
        assert_eq!(format_exposure_time(1, 1).as_deref(), Some("1 s"));
        assert_eq!(format_exposure_time(0, 1), None);
        assert_eq!(format_exposure_time(1, 0), None);
    }

    #[test]
    fn test_format_exposure_time_keeps_value() {
        // 3/10 s is not 1/3 s
        assert_eq!(format_exposure_time(3, 10).as_deref(), Some("0.3 s"));
        assert_eq!(format_exposure_time(6, 10).as_deref(), Some("0.6 s"));
        assert_eq!(format_exposure_time(10, 30).as_deref(), Some("1/3"));
        assert_eq!(format_exposure_time(3, 100).as_deref(), Some("3/100"));
        assert_eq!(format_exposure_time(13, 10).as_deref(), Some("1.3 s"));
        assert_eq!(format_sensitivity(160), "ISO 160");
    }

    #[test]
    fn test_extract_from_plain_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        image::RgbImage::from_pixel(4, 3, image::Rgb([255, 0, 0]))
            .save(&path)
            .unwrap();

        let metadata = extract_metadata(&path).unwrap();
        assert_eq!(metadata.width, Some(4));
        assert_eq!(metadata.height, Some(3));
        assert_eq!(metadata.color.as_deref(), Some("ff0000"));
        // No EXIF in a generated PNG
        assert_eq!(metadata.date_taken, None);
        assert_eq!(metadata.camera_model, None);
    }

    fn ascii(tag: exif::Tag, text: &str) -> exif::Field {
        exif::Field {
            tag,
            ifd_num: exif::In::PRIMARY,
            value: exif::Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    fn rational(tag: exif::Tag, num: u32, denom: u32) -> exif::Field {
        exif::Field {
            tag,
            ifd_num: exif::In::PRIMARY,
            value: exif::Value::Rational(vec![exif::Rational { num, denom }]),
        }
    }

    /// Write a bare TIFF container holding only the given EXIF fields.
    fn write_exif(path: &Path, fields: &[exif::Field]) {
        let mut writer = exif::experimental::Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut buf = std::io::Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        std::fs::write(path, buf.into_inner()).unwrap();
    }

    #[test]
    fn test_extract_exif_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.tif");
        let long_model = "M".repeat(300);
        let fields = vec![
            ascii(exif::Tag::DateTime, "2020:01:01 00:00:00"),
            ascii(exif::Tag::DateTimeOriginal, "2021:07:14 20:31:05"),
            ascii(exif::Tag::Model, &long_model),
            ascii(exif::Tag::LensModel, "XF16-55mmF2.8 R LM WR"),
            rational(exif::Tag::FocalLength, 23, 1),
            rational(exif::Tag::FNumber, 28, 10),
            rational(exif::Tag::ExposureTime, 1, 250),
            exif::Field {
                tag: exif::Tag::PhotographicSensitivity,
                ifd_num: exif::In::PRIMARY,
                value: exif::Value::Short(vec![160]),
            },
        ];
        write_exif(&path, &fields);

        let metadata = extract_metadata(&path).unwrap();
        assert_eq!(metadata.date_taken.as_deref(), Some("2021-07-14 20:31"));
        assert_eq!(metadata.camera_model, Some("M".repeat(255)));
        assert_eq!(metadata.lens_model.as_deref(), Some("XF16-55mmF2.8 R LM WR"));
        assert_eq!(metadata.focal_length.as_deref(), Some("23 mm"));
        assert_eq!(metadata.aperture.as_deref(), Some("f/2.8"));
        assert_eq!(metadata.exposure_time.as_deref(), Some("1/250"));
        assert_eq!(metadata.sensitivity.as_deref(), Some("ISO 160"));
    }

    #[test]
    fn test_extract_exif_date_falls_back_to_datetime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.tif");
        let fields = vec![
            ascii(exif::Tag::DateTime, "2019:03:02 08:15:00"),
            rational(exif::Tag::ExposureTime, 3, 10),
        ];
        write_exif(&path, &fields);

        let metadata = extract_metadata(&path).unwrap();
        assert_eq!(metadata.date_taken.as_deref(), Some("2019-03-02 08:15"));
        assert_eq!(metadata.exposure_time.as_deref(), Some("0.3 s"));
        assert_eq!(metadata.camera_model, None);
        assert_eq!(metadata.focal_length, None);
        assert_eq!(metadata.sensitivity, None);
    }

    #[test]
    fn test_extract_from_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let metadata = extract_metadata(&path).unwrap();
        assert_eq!(metadata, ImageMetadata::default());
    }

    #[test]
    fn test_into_new_photo_leaves_title_default() {
        let metadata = ImageMetadata {
            width: Some(10),
            aperture: Some("f/4".to_string()),
            ..Default::default()
        };
        let new = metadata.into_new_photo(Some("a.jpg".to_string()), Some("abc".to_string()));
        assert_eq!(new.width, Some(10));
        assert_eq!(new.aperture.as_deref(), Some("f/4"));
        assert_eq!(new.title, None);
        assert_eq!(new.color, None);
    }
}
