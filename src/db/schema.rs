pub const SCHEMA: &str = r#"
-- Photo metadata. Text limits are declared as VARCHAR(n); SQLite does not
-- enforce them, the store validates lengths before writing.
CREATE TABLE IF NOT EXISTS photo (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT,
    uid VARCHAR(16),
    width INTEGER,
    height INTEGER,
    color VARCHAR(16) NOT NULL DEFAULT '000000',
    title VARCHAR(255) NOT NULL DEFAULT '',
    date_taken VARCHAR(16) NOT NULL DEFAULT '',

    -- EXIF display strings
    camera_model VARCHAR(255) NOT NULL DEFAULT '',
    lens_model VARCHAR(255) NOT NULL DEFAULT '',
    focal_length VARCHAR(16) NOT NULL DEFAULT '',
    aperture VARCHAR(16) NOT NULL DEFAULT '',
    exposure_time VARCHAR(16) NOT NULL DEFAULT '',
    sensitivity VARCHAR(16) NOT NULL DEFAULT ''
);
"#;

/// Statements run after `SCHEMA` on every open. Each must be idempotent.
pub const MIGRATIONS: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_photo_uid ON photo(uid)",
];
