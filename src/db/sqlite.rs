//! SQLite backend implementation.

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

use super::photo::{
    select_columns, CatalogSync, FieldValue, NewPhoto, Photo, PhotoQuery, PhotoUpdate, SyncOutcome,
};
use super::schema::{MIGRATIONS, SCHEMA};

pub struct SqliteDb {
    pub(crate) conn: Connection,
}

impl SqliteDb {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        if !self.has_photo_table()? {
            info!("Database is empty, creating photo schema");
        }
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        for migration in MIGRATIONS {
            self.conn
                .execute(migration, [])
                .with_context(|| format!("Migration failed: {}", migration))?;
        }
        Ok(())
    }

    pub fn has_photo_table(&self) -> Result<bool> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'photo'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(name.is_some())
    }

    // ========================================================================
    // Photo operations
    // ========================================================================

    pub fn insert_photo(&self, photo: &NewPhoto) -> Result<Photo> {
        photo.validate()?;
        let id = insert_row(&self.conn, photo)?;
        debug!("Inserted photo {}", id);
        self.get_photo(id)?
            .ok_or_else(|| anyhow::anyhow!("Photo {} vanished after insert", id))
    }

    pub fn insert_photos(&self, photos: &[NewPhoto]) -> Result<Vec<Photo>> {
        for photo in photos {
            photo.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(photos.len());
        for photo in photos {
            ids.push(insert_row(&tx, photo)?);
        }
        tx.commit()?;
        debug!("Inserted {} photos", ids.len());

        let mut inserted = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(photo) = self.get_photo(id)? {
                inserted.push(photo);
            }
        }
        Ok(inserted)
    }

    pub fn get_photo(&self, id: i64) -> Result<Option<Photo>> {
        let sql = format!("SELECT {} FROM photo WHERE id = ?", select_columns());
        let result = self.conn.query_row(&sql, [id], row_to_photo);
        match result {
            Ok(photo) => Ok(Some(photo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_photo_by_uid(&self, uid: &str) -> Result<Option<Photo>> {
        let sql = format!(
            "SELECT {} FROM photo WHERE uid = ? ORDER BY id LIMIT 1",
            select_columns()
        );
        let photo = self.conn.query_row(&sql, [uid], row_to_photo).optional()?;
        Ok(photo)
    }

    pub fn existing_uids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid FROM photo WHERE uid IS NOT NULL ORDER BY id")?;
        let uids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(uids)
    }

    pub fn list_photos(&self, query: &PhotoQuery) -> Result<Vec<Photo>> {
        let sql = format!(
            "SELECT {} FROM photo {}",
            select_columns(),
            query.order_clause()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let photos = stmt
            .query_map([], row_to_photo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn update_photo(&self, id: i64, update: &PhotoUpdate) -> Result<Option<Photo>> {
        update.validate()?;
        let assignments = update.assignments();
        if assignments.is_empty() {
            return self.get_photo(id);
        }

        let set_clause = assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE photo SET {} WHERE id = ?", set_clause);

        let mut values: Vec<Value> = assignments.iter().map(|(_, v)| to_sql_value(v)).collect();
        values.push(Value::Integer(id));

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Ok(None);
        }
        debug!("Updated {} column(s) of photo {}", assignments.len(), id);
        self.get_photo(id)
    }

    pub fn remove_photo(&self, id: i64) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM photo WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    pub fn remove_photos_by_uid(&self, uids: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM photo WHERE uid = ?")?;
            for uid in uids {
                removed += stmt.execute([uid])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Insert, rename and remove in one transaction. Nothing is written if
    /// any insert fails validation.
    pub fn sync_photos(&self, sync: &CatalogSync) -> Result<SyncOutcome> {
        for photo in &sync.insert {
            photo.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(sync.insert.len());
        for photo in &sync.insert {
            ids.push(insert_row(&tx, photo)?);
        }
        let mut outcome = SyncOutcome::default();
        {
            let mut rename = tx.prepare("UPDATE photo SET filename = ? WHERE uid = ?")?;
            for (uid, filename) in &sync.rename {
                outcome.renamed += rename.execute([filename, uid])?;
            }
            let mut remove = tx.prepare("DELETE FROM photo WHERE uid = ?")?;
            for uid in &sync.remove {
                outcome.removed += remove.execute([uid])?;
            }
        }
        tx.commit()?;
        debug!(
            "Synced catalog: {} inserted, {} renamed, {} removed",
            ids.len(),
            outcome.renamed,
            outcome.removed
        );

        for id in ids {
            if let Some(photo) = self.get_photo(id)? {
                outcome.inserted.push(photo);
            }
        }
        Ok(outcome)
    }

    pub fn count_photos(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM photo", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Insert the supplied columns only, leaving the rest to the table defaults.
fn insert_row(conn: &Connection, photo: &NewPhoto) -> Result<i64> {
    let assignments = photo.assignments();
    if assignments.is_empty() {
        conn.execute("INSERT INTO photo DEFAULT VALUES", [])?;
    } else {
        let columns = assignments
            .iter()
            .map(|(column, _)| column.name())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; assignments.len()].join(", ");
        let sql = format!("INSERT INTO photo ({}) VALUES ({})", columns, placeholders);
        conn.execute(
            &sql,
            params_from_iter(assignments.iter().map(|(_, v)| to_sql_value(v))),
        )?;
    }
    Ok(conn.last_insert_rowid())
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(Some(s)) => Value::Text(s.clone()),
        FieldValue::Int(Some(i)) => Value::Integer(i64::from(*i)),
        FieldValue::Text(None) | FieldValue::Int(None) => Value::Null,
    }
}

/// Deserialize a row selected with `select_columns()`.
pub(crate) fn row_to_photo(row: &Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        filename: row.get(1)?,
        uid: row.get(2)?,
        width: row.get(3)?,
        height: row.get(4)?,
        color: row.get(5)?,
        title: row.get(6)?,
        date_taken: row.get(7)?,
        camera_model: row.get(8)?,
        lens_model: row.get(9)?,
        focal_length: row.get(10)?,
        aperture: row.get(11)?,
        exposure_time: row.get(12)?,
        sensitivity: row.get(13)?,
    })
}
