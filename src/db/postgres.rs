//! PostgreSQL backend implementation.

use anyhow::Result;
use postgres::types::ToSql;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use tracing::{debug, info};

use super::photo::{
    select_columns, CatalogSync, FieldValue, NewPhoto, Photo, PhotoQuery, PhotoUpdate, SyncOutcome,
};
use super::postgres_schema::POSTGRES_SCHEMA;

/// Only the schema on the search path counts.
const PHOTO_TABLE_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM information_schema.tables
     WHERE table_schema = current_schema() AND table_name = 'photo')";

pub struct PgDb {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

/// Helper to parse a postgres Row selected with `select_columns()`.
fn row_to_photo(row: &postgres::Row) -> Photo {
    Photo {
        id: row.get(0),
        filename: row.get(1),
        uid: row.get(2),
        width: row.get(3),
        height: row.get(4),
        color: row.get(5),
        title: row.get(6),
        date_taken: row.get(7),
        camera_model: row.get(8),
        lens_model: row.get(9),
        focal_length: row.get(10),
        aperture: row.get(11),
        exposure_time: row.get(12),
        sensitivity: row.get(13),
    }
}

fn to_sql_param(value: &FieldValue) -> Box<dyn ToSql + Sync> {
    match value {
        FieldValue::Text(v) => Box::new(v.clone()),
        FieldValue::Int(v) => Box::new(*v),
    }
}

/// `$1, $2, ...` for `count` parameters starting at `first`.
fn placeholders(first: usize, count: usize) -> Vec<String> {
    (first..first + count).map(|i| format!("${}", i)).collect()
}

fn insert_row(client: &mut impl postgres::GenericClient, photo: &NewPhoto) -> Result<Photo> {
    let assignments = photo.assignments();
    let sql = if assignments.is_empty() {
        format!("INSERT INTO photo DEFAULT VALUES RETURNING {}", select_columns())
    } else {
        let columns = assignments
            .iter()
            .map(|(column, _)| column.name())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO photo ({}) VALUES ({}) RETURNING {}",
            columns,
            placeholders(1, assignments.len()).join(", "),
            select_columns()
        )
    };

    let params: Vec<Box<dyn ToSql + Sync>> =
        assignments.iter().map(|(_, v)| to_sql_param(v)).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
    let row = client.query_one(sql.as_str(), &refs)?;
    Ok(row_to_photo(&row))
}

impl PgDb {
    pub fn open(url: &str, pool_size: u32) -> Result<Self> {
        let manager = PostgresConnectionManager::new(url.parse()?, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)?;
        Ok(Self { pool })
    }

    pub fn initialize(&self) -> Result<()> {
        if !self.has_photo_table()? {
            info!("Database is empty, creating photo schema");
        }
        let mut client = self.pool.get()?;
        client.batch_execute(POSTGRES_SCHEMA)?;
        Ok(())
    }

    pub fn has_photo_table(&self) -> Result<bool> {
        let mut client = self.pool.get()?;
        let row = client.query_one(PHOTO_TABLE_EXISTS, &[])?;
        Ok(row.get(0))
    }

    // ========================================================================
    // Photo operations
    // ========================================================================

    pub fn insert_photo(&self, photo: &NewPhoto) -> Result<Photo> {
        photo.validate()?;
        let mut client = self.pool.get()?;
        let inserted = insert_row(&mut *client, photo)?;
        debug!("Inserted photo {}", inserted.id);
        Ok(inserted)
    }

    pub fn insert_photos(&self, photos: &[NewPhoto]) -> Result<Vec<Photo>> {
        for photo in photos {
            photo.validate()?;
        }
        let mut client = self.pool.get()?;
        let mut tx = client.transaction()?;
        let mut inserted = Vec::with_capacity(photos.len());
        for photo in photos {
            inserted.push(insert_row(&mut tx, photo)?);
        }
        tx.commit()?;
        debug!("Inserted {} photos", inserted.len());
        Ok(inserted)
    }

    pub fn get_photo(&self, id: i64) -> Result<Option<Photo>> {
        let mut client = self.pool.get()?;
        let sql = format!("SELECT {} FROM photo WHERE id = $1", select_columns());
        let row = client.query_opt(sql.as_str(), &[&id])?;
        Ok(row.as_ref().map(row_to_photo))
    }

    pub fn get_photo_by_uid(&self, uid: &str) -> Result<Option<Photo>> {
        let mut client = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM photo WHERE uid = $1 ORDER BY id LIMIT 1",
            select_columns()
        );
        let row = client.query_opt(sql.as_str(), &[&uid])?;
        Ok(row.as_ref().map(row_to_photo))
    }

    pub fn existing_uids(&self) -> Result<Vec<String>> {
        let mut client = self.pool.get()?;
        let rows = client.query("SELECT uid FROM photo WHERE uid IS NOT NULL ORDER BY id", &[])?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    pub fn list_photos(&self, query: &PhotoQuery) -> Result<Vec<Photo>> {
        let mut client = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM photo {}",
            select_columns(),
            query.order_clause()
        );
        let rows = client.query(sql.as_str(), &[])?;
        Ok(rows.iter().map(row_to_photo).collect())
    }

    pub fn update_photo(&self, id: i64, update: &PhotoUpdate) -> Result<Option<Photo>> {
        update.validate()?;
        let assignments = update.assignments();
        if assignments.is_empty() {
            return self.get_photo(id);
        }

        let set_clause = assignments
            .iter()
            .zip(placeholders(1, assignments.len()))
            .map(|((column, _), p)| format!("{} = {}", column.name(), p))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE photo SET {} WHERE id = ${} RETURNING {}",
            set_clause,
            assignments.len() + 1,
            select_columns()
        );

        let mut params: Vec<Box<dyn ToSql + Sync>> =
            assignments.iter().map(|(_, v)| to_sql_param(v)).collect();
        params.push(Box::new(id));
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();

        let mut client = self.pool.get()?;
        let row = client.query_opt(sql.as_str(), &refs)?;
        Ok(row.as_ref().map(row_to_photo))
    }

    pub fn remove_photo(&self, id: i64) -> Result<bool> {
        let mut client = self.pool.get()?;
        let changed = client.execute("DELETE FROM photo WHERE id = $1", &[&id])?;
        Ok(changed > 0)
    }

    pub fn remove_photos_by_uid(&self, uids: &[String]) -> Result<usize> {
        let mut client = self.pool.get()?;
        let mut tx = client.transaction()?;
        let mut removed = 0u64;
        for uid in uids {
            removed += tx.execute("DELETE FROM photo WHERE uid = $1", &[uid])?;
        }
        tx.commit()?;
        Ok(removed as usize)
    }

    pub fn sync_photos(&self, sync: &CatalogSync) -> Result<SyncOutcome> {
        for photo in &sync.insert {
            photo.validate()?;
        }
        let mut client = self.pool.get()?;
        let mut tx = client.transaction()?;
        let mut outcome = SyncOutcome::default();
        for photo in &sync.insert {
            outcome.inserted.push(insert_row(&mut tx, photo)?);
        }
        for (uid, filename) in &sync.rename {
            outcome.renamed += tx.execute(
                "UPDATE photo SET filename = $1 WHERE uid = $2",
                &[filename, uid],
            )? as usize;
        }
        for uid in &sync.remove {
            outcome.removed += tx.execute("DELETE FROM photo WHERE uid = $1", &[uid])? as usize;
        }
        tx.commit()?;
        debug!(
            "Synced catalog: {} inserted, {} renamed, {} removed",
            outcome.inserted.len(),
            outcome.renamed,
            outcome.removed
        );
        Ok(outcome)
    }

    pub fn count_photos(&self) -> Result<i64> {
        let mut client = self.pool.get()?;
        let row = client.query_one("SELECT COUNT(*) FROM photo", &[])?;
        Ok(row.get(0))
    }
}
