//! SQLite-to-PostgreSQL migration tool.
//!
//! Reads the `photo` table from the SQLite database and bulk-inserts it into
//! PostgreSQL. Preserves original IDs and resets the PostgreSQL sequence
//! afterward so new rows continue after the copied ones.

use anyhow::{Context, Result};
use postgres::NoTls;
use rusqlite::Connection;
use tracing::info;

use super::photo::{select_columns, Photo};
use super::sqlite::row_to_photo;
use super::postgres_schema::POSTGRES_SCHEMA;

/// Migrate all photos from a SQLite database to a PostgreSQL database.
/// Returns the number of rows copied.
pub fn migrate_sqlite_to_postgres(sqlite_path: &std::path::Path, postgres_url: &str) -> Result<u64> {
    let sqlite = Connection::open(sqlite_path)
        .with_context(|| format!("Failed to open SQLite database: {}", sqlite_path.display()))?;

    let mut pg = postgres::Client::connect(postgres_url, NoTls)
        .with_context(|| "Failed to connect to PostgreSQL")?;

    info!("Creating PostgreSQL schema");
    pg.batch_execute(POSTGRES_SCHEMA)
        .with_context(|| "Failed to create PostgreSQL schema")?;

    let count = migrate_photos(&sqlite, &mut pg)?;
    reset_sequence(&mut pg)?;

    info!("Migration complete, {} photos copied", count);
    Ok(count)
}

/// Every row of the SQLite `photo` table, ordered by id.
fn read_sqlite_photos(sqlite: &Connection) -> Result<Vec<Photo>> {
    let mut stmt = sqlite.prepare(&format!("SELECT {} FROM photo ORDER BY id", select_columns()))?;
    let photos = stmt
        .query_map([], row_to_photo)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(photos)
}

fn migrate_photos(sqlite: &Connection, pg: &mut postgres::Client) -> Result<u64> {
    let photos = read_sqlite_photos(sqlite)?;

    let mut tx = pg.transaction()?;
    let insert = format!(
        "INSERT INTO photo ({}) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
         ON CONFLICT (id) DO NOTHING",
        select_columns()
    );

    // Rows already present are skipped by ON CONFLICT and not counted
    let mut count = 0u64;
    for p in &photos {
        count += tx.execute(
            insert.as_str(),
            &[
                &p.id, &p.filename, &p.uid, &p.width, &p.height,
                &p.color, &p.title, &p.date_taken,
                &p.camera_model, &p.lens_model,
                &p.focal_length, &p.aperture, &p.exposure_time, &p.sensitivity,
            ],
        )?;
    }
    tx.commit()?;

    info!("photo: {} of {} rows migrated", count, photos.len());
    Ok(count)
}

fn reset_sequence(pg: &mut postgres::Client) -> Result<()> {
    let row = pg.query_one("SELECT COALESCE(MAX(id), 0) FROM photo", &[])?;
    let max_id: i64 = row.get(0);
    if max_id > 0 {
        pg.execute("SELECT setval('photo_id_seq', $1)", &[&max_id])?;
    }

    info!("Sequence photo_id_seq reset to {}", max_id);
    Ok(())
}
