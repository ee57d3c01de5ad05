//! Types for the `photo` table: the stored record, its column catalogue, and
//! the value sets used to create and patch rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder color stored when none is supplied.
pub const DEFAULT_COLOR: &str = "000000";

/// Errors raised before any SQL is executed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhotoError {
    #[error("value for `{column}` is {actual} characters, limit is {max}")]
    TooLong {
        column: Column,
        max: usize,
        actual: usize,
    },

    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    #[error("invalid assignment: {0}")]
    InvalidAssignment(String),
}

/// A row of the `photo` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub filename: Option<String>,
    pub uid: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub color: String,
    pub title: String,
    pub date_taken: String,
    pub camera_model: String,
    pub lens_model: String,
    pub focal_length: String,
    pub aperture: String,
    pub exposure_time: String,
    pub sensitivity: String,
}

impl Photo {
    /// Value of a column rendered as text, `None` for NULL.
    pub fn value(&self, column: Column) -> Option<String> {
        match column {
            Column::Id => Some(self.id.to_string()),
            Column::Filename => self.filename.clone(),
            Column::Uid => self.uid.clone(),
            Column::Width => self.width.map(|v| v.to_string()),
            Column::Height => self.height.map(|v| v.to_string()),
            Column::Color => Some(self.color.clone()),
            Column::Title => Some(self.title.clone()),
            Column::DateTaken => Some(self.date_taken.clone()),
            Column::CameraModel => Some(self.camera_model.clone()),
            Column::LensModel => Some(self.lens_model.clone()),
            Column::FocalLength => Some(self.focal_length.clone()),
            Column::Aperture => Some(self.aperture.clone()),
            Column::ExposureTime => Some(self.exposure_time.clone()),
            Column::Sensitivity => Some(self.sensitivity.clone()),
        }
    }
}

/// The fourteen columns of the `photo` table, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Filename,
    Uid,
    Width,
    Height,
    Color,
    Title,
    DateTaken,
    CameraModel,
    LensModel,
    FocalLength,
    Aperture,
    ExposureTime,
    Sensitivity,
}

impl Column {
    pub const ALL: [Column; 14] = [
        Column::Id,
        Column::Filename,
        Column::Uid,
        Column::Width,
        Column::Height,
        Column::Color,
        Column::Title,
        Column::DateTaken,
        Column::CameraModel,
        Column::LensModel,
        Column::FocalLength,
        Column::Aperture,
        Column::ExposureTime,
        Column::Sensitivity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Filename => "filename",
            Column::Uid => "uid",
            Column::Width => "width",
            Column::Height => "height",
            Column::Color => "color",
            Column::Title => "title",
            Column::DateTaken => "date_taken",
            Column::CameraModel => "camera_model",
            Column::LensModel => "lens_model",
            Column::FocalLength => "focal_length",
            Column::Aperture => "aperture",
            Column::ExposureTime => "exposure_time",
            Column::Sensitivity => "sensitivity",
        }
    }

    /// Maximum length in characters for bounded text columns.
    pub fn max_len(&self) -> Option<usize> {
        match self {
            Column::Uid
            | Column::Color
            | Column::DateTaken
            | Column::FocalLength
            | Column::Aperture
            | Column::ExposureTime
            | Column::Sensitivity => Some(16),
            Column::Title | Column::CameraModel | Column::LensModel => Some(255),
            Column::Id | Column::Filename | Column::Width | Column::Height => None,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            Column::Filename | Column::Uid | Column::Width | Column::Height
        )
    }

    /// Declared default for NOT NULL text columns.
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            Column::Color => Some(DEFAULT_COLOR),
            Column::Title
            | Column::DateTaken
            | Column::CameraModel
            | Column::LensModel
            | Column::FocalLength
            | Column::Aperture
            | Column::ExposureTime
            | Column::Sensitivity => Some(""),
            _ => None,
        }
    }

    /// Reject `value` if it exceeds this column's character limit.
    pub fn check_len(&self, value: &str) -> Result<(), PhotoError> {
        if let Some(max) = self.max_len() {
            let actual = value.chars().count();
            if actual > max {
                return Err(PhotoError::TooLong {
                    column: *self,
                    max,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Cut `value` down to this column's limit on a char boundary.
    pub fn clip(&self, value: &str) -> String {
        match self.max_len() {
            Some(max) => value.chars().take(max).collect(),
            None => value.to_string(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = PhotoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PhotoError::UnknownColumn(s.to_string()))
    }
}

/// A backend-neutral value bound to one column in an INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Int(Option<i32>),
}

/// Values supplied when creating a row. `None` leaves the column out of the
/// INSERT so the table default (or NULL) applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoto {
    pub filename: Option<String>,
    pub uid: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub color: Option<String>,
    pub title: Option<String>,
    pub date_taken: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub exposure_time: Option<String>,
    pub sensitivity: Option<String>,
}

impl NewPhoto {
    pub fn validate(&self) -> Result<(), PhotoError> {
        for (column, value) in self.assignments() {
            if let FieldValue::Text(Some(ref text)) = value {
                column.check_len(text)?;
            }
        }
        Ok(())
    }

    /// Supplied columns with their values, in declaration order.
    pub fn assignments(&self) -> Vec<(Column, FieldValue)> {
        let mut out = Vec::new();
        let mut text = |column: Column, value: &Option<String>| {
            if let Some(v) = value {
                out.push((column, FieldValue::Text(Some(v.clone()))));
            }
        };
        text(Column::Filename, &self.filename);
        text(Column::Uid, &self.uid);
        text(Column::Color, &self.color);
        text(Column::Title, &self.title);
        text(Column::DateTaken, &self.date_taken);
        text(Column::CameraModel, &self.camera_model);
        text(Column::LensModel, &self.lens_model);
        text(Column::FocalLength, &self.focal_length);
        text(Column::Aperture, &self.aperture);
        text(Column::ExposureTime, &self.exposure_time);
        text(Column::Sensitivity, &self.sensitivity);

        if let Some(w) = self.width {
            out.push((Column::Width, FieldValue::Int(Some(w))));
        }
        if let Some(h) = self.height {
            out.push((Column::Height, FieldValue::Int(Some(h))));
        }
        out.sort_by_key(|(c, _)| Column::ALL.iter().position(|x| x == c));
        out
    }
}

/// A partial update. Nullable columns use `Option<Option<_>>`: the outer
/// `None` leaves the column untouched, `Some(None)` writes NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoUpdate {
    pub filename: Option<Option<String>>,
    pub uid: Option<Option<String>>,
    pub width: Option<Option<i32>>,
    pub height: Option<Option<i32>>,
    pub color: Option<String>,
    pub title: Option<String>,
    pub date_taken: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub exposure_time: Option<String>,
    pub sensitivity: Option<String>,
}

impl PhotoUpdate {
    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }

    pub fn validate(&self) -> Result<(), PhotoError> {
        for (column, value) in self.assignments() {
            if let FieldValue::Text(Some(ref text)) = value {
                column.check_len(text)?;
            }
        }
        Ok(())
    }

    /// Set one column from its textual form, as typed on a command line.
    /// The literal `null` clears nullable columns.
    pub fn set(&mut self, column: Column, raw: &str) -> Result<(), PhotoError> {
        let null = raw.eq_ignore_ascii_case("null");
        if null && !column.is_nullable() {
            return Err(PhotoError::InvalidAssignment(format!(
                "`{}` cannot be null",
                column
            )));
        }
        column.check_len(raw)?;

        let int = |raw: &str| -> Result<Option<i32>, PhotoError> {
            if null {
                return Ok(None);
            }
            raw.trim().parse::<i32>().map(Some).map_err(|_| {
                PhotoError::InvalidAssignment(format!("`{}` expects an integer, got `{}`", column, raw))
            })
        };
        let nullable_text = || if null { None } else { Some(raw.to_string()) };

        match column {
            Column::Id => {
                return Err(PhotoError::InvalidAssignment(
                    "`id` is assigned by the database".to_string(),
                ))
            }
            Column::Filename => self.filename = Some(nullable_text()),
            Column::Uid => self.uid = Some(nullable_text()),
            Column::Width => self.width = Some(int(raw)?),
            Column::Height => self.height = Some(int(raw)?),
            Column::Color => self.color = Some(raw.to_string()),
            Column::Title => self.title = Some(raw.to_string()),
            Column::DateTaken => self.date_taken = Some(raw.to_string()),
            Column::CameraModel => self.camera_model = Some(raw.to_string()),
            Column::LensModel => self.lens_model = Some(raw.to_string()),
            Column::FocalLength => self.focal_length = Some(raw.to_string()),
            Column::Aperture => self.aperture = Some(raw.to_string()),
            Column::ExposureTime => self.exposure_time = Some(raw.to_string()),
            Column::Sensitivity => self.sensitivity = Some(raw.to_string()),
        }
        Ok(())
    }

    /// Columns to write with their new values, in declaration order.
    pub fn assignments(&self) -> Vec<(Column, FieldValue)> {
        let mut out = Vec::new();
        if let Some(ref v) = self.filename {
            out.push((Column::Filename, FieldValue::Text(v.clone())));
        }
        if let Some(ref v) = self.uid {
            out.push((Column::Uid, FieldValue::Text(v.clone())));
        }
        if let Some(v) = self.width {
            out.push((Column::Width, FieldValue::Int(v)));
        }
        if let Some(v) = self.height {
            out.push((Column::Height, FieldValue::Int(v)));
        }
        let required = [
            (Column::Color, &self.color),
            (Column::Title, &self.title),
            (Column::DateTaken, &self.date_taken),
            (Column::CameraModel, &self.camera_model),
            (Column::LensModel, &self.lens_model),
            (Column::FocalLength, &self.focal_length),
            (Column::Aperture, &self.aperture),
            (Column::ExposureTime, &self.exposure_time),
            (Column::Sensitivity, &self.sensitivity),
        ];
        for (column, value) in required {
            if let Some(v) = value {
                out.push((column, FieldValue::Text(Some(v.clone()))));
            }
        }
        out
    }
}

/// Catalog changes applied together in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSync {
    pub insert: Vec<NewPhoto>,
    /// `(uid, filename)`: rows with this uid get the new filename.
    pub rename: Vec<(String, String)>,
    /// Uids whose rows are deleted.
    pub remove: Vec<String>,
}

impl CatalogSync {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.rename.is_empty() && self.remove.is_empty()
    }
}

/// What a `CatalogSync` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub inserted: Vec<Photo>,
    pub renamed: usize,
    pub removed: usize,
}

/// Ordering and paging for `list_photos`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoQuery {
    /// Sort columns, most significant first. Empty sorts by `id`.
    pub sort: Vec<Column>,
    pub reverse: bool,
    pub limit: Option<usize>,
}

impl PhotoQuery {
    /// Render the `ORDER BY ... [LIMIT n]` tail shared by both backends.
    /// Column names come from `Column`, never from caller text.
    pub(crate) fn order_clause(&self) -> String {
        let direction = if self.reverse { "DESC" } else { "ASC" };
        let mut columns: Vec<Column> = self.sort.clone();
        if !columns.contains(&Column::Id) {
            // Tie-break on id so equal keys keep insertion order
            columns.push(Column::Id);
        }
        let mut sql = format!(
            "ORDER BY {}",
            columns
                .iter()
                .map(|c| format!("{} {}", c.name(), direction))
                .collect::<Vec<_>>()
                .join(", ")
        );
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }
}

/// Comma-separated column list matching `Column::ALL`, for SELECT statements.
pub(crate) fn select_columns() -> String {
    Column::ALL
        .iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ")
}
