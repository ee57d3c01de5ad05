pub const POSTGRES_SCHEMA: &str = r#"
-- PostgreSQL schema for photocat

CREATE TABLE IF NOT EXISTS photo (
    id BIGSERIAL PRIMARY KEY,
    filename TEXT,
    uid VARCHAR(16),
    width INTEGER,
    height INTEGER,
    color VARCHAR(16) NOT NULL DEFAULT '000000',
    title VARCHAR(255) NOT NULL DEFAULT '',
    date_taken VARCHAR(16) NOT NULL DEFAULT '',
    camera_model VARCHAR(255) NOT NULL DEFAULT '',
    lens_model VARCHAR(255) NOT NULL DEFAULT '',
    focal_length VARCHAR(16) NOT NULL DEFAULT '',
    aperture VARCHAR(16) NOT NULL DEFAULT '',
    exposure_time VARCHAR(16) NOT NULL DEFAULT '',
    sensitivity VARCHAR(16) NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_photo_uid ON photo(uid);
"#;
