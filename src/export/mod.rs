use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::db::{Column, Database, Photo, PhotoQuery};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// Guess the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => anyhow::bail!("Unknown export format: {}", other),
        }
    }
}

/// Export every photo, ordered by id, to a file. Returns the row count.
pub fn export_photos(db: &Database, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let photos = db.list_photos(&PhotoQuery::default())?;
    let count = photos.len();

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    match format {
        ExportFormat::Json => write_json(&photos, writer)?,
        ExportFormat::Csv => write_csv(&photos, writer)?,
    }

    Ok(count)
}

pub fn write_json<W: Write>(photos: &[Photo], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, photos)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// One header row of column names, then one row per photo. NULL is an empty cell.
pub fn write_csv<W: Write>(photos: &[Photo], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(Column::ALL.iter().map(|c| c.name()))?;

    for photo in photos {
        wtr.write_record(
            Column::ALL
                .iter()
                .map(|&c| photo.value(c).unwrap_or_default()),
        )?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewPhoto;

    fn sample_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db.insert_photo(&NewPhoto {
            filename: Some("IMG_1.JPG".to_string()),
            title: Some("Pier, morning".to_string()),
            width: Some(800),
            ..Default::default()
        })
        .unwrap();
        db.insert_photo(&NewPhoto::default()).unwrap();
        db
    }

    #[test]
    fn test_export_csv() {
        let db = sample_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.csv");

        let count = export_photos(&db, &path, ExportFormat::Csv).unwrap();
        assert_eq!(count, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "id,filename,uid,width,height,color,title,date_taken,camera_model,lens_model,focal_length,aperture,exposure_time,sensitivity"
        );
        assert_eq!(lines[1], "1,IMG_1.JPG,,800,,000000,\"Pier, morning\",,,,,,,");
        assert_eq!(lines[2], "2,,,,,000000,,,,,,,,");
    }

    #[test]
    fn test_export_json_round_trips() {
        let db = sample_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.json");

        export_photos(&db, &path, ExportFormat::Json).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Photo> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, db.list_photos(&PhotoQuery::default()).unwrap());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("html".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::from_path(Path::new("out.csv")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Json);
        assert_eq!(ExportFormat::Csv.extension(), "csv");
    }
}
