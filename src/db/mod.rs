mod schema;
pub mod photo;
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod postgres_schema;
#[cfg(feature = "postgres")]
pub mod migrate;

use anyhow::Result;
use tracing::info;

pub use photo::{
    CatalogSync, Column, NewPhoto, Photo, PhotoError, PhotoQuery, PhotoUpdate, SyncOutcome,
    DEFAULT_COLOR,
};
pub use schema::{MIGRATIONS, SCHEMA};

use crate::config::DatabaseConfig;
#[cfg(feature = "postgres")]
use crate::config::DatabaseType;

/// Macro to dispatch a method call to the active backend variant.
macro_rules! dispatch {
    // No arguments beyond self
    ($self:expr, $method:ident()) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method(),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method(),
        }
    };
    // With arguments
    ($self:expr, $method:ident($($arg:expr),+ $(,)?)) => {
        match &$self.inner {
            DatabaseInner::Sqlite(db) => db.$method($($arg),+),
            #[cfg(feature = "postgres")]
            DatabaseInner::Postgres(db) => db.$method($($arg),+),
        }
    };
}

enum DatabaseInner {
    Sqlite(sqlite::SqliteDb),
    #[cfg(feature = "postgres")]
    Postgres(postgres::PgDb),
}

/// Handle on the photo catalog, backed by whichever engine the config selects.
pub struct Database {
    inner: DatabaseInner,
}

impl Database {
    /// Open a database connection based on the provided configuration.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        #[cfg(feature = "postgres")]
        {
            if config.backend == DatabaseType::Postgresql {
                let url = config.postgresql_url.as_deref()
                    .ok_or_else(|| anyhow::anyhow!("PostgreSQL URL not configured"))?;
                let pool_size = config.pool_size.unwrap_or(10);
                let pg = postgres::PgDb::open(url, pool_size)?;
                info!("Opened PostgreSQL database");
                return Ok(Self { inner: DatabaseInner::Postgres(pg) });
            }
        }

        let db = sqlite::SqliteDb::open(&config.sqlite_path)?;
        info!("Opened SQLite database at {:?}", config.sqlite_path);
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    /// Open a throwaway SQLite database that lives in memory.
    pub fn open_in_memory() -> Result<Self> {
        let db = sqlite::SqliteDb::open_in_memory()?;
        Ok(Self { inner: DatabaseInner::Sqlite(db) })
    }

    pub fn initialize(&self) -> Result<()> {
        dispatch!(self, initialize())
    }

    pub fn has_photo_table(&self) -> Result<bool> {
        dispatch!(self, has_photo_table())
    }

    // ========================================================================
    // Photo operations
    // ========================================================================

    pub fn insert_photo(&self, photo: &NewPhoto) -> Result<Photo> {
        dispatch!(self, insert_photo(photo))
    }

    pub fn insert_photos(&self, photos: &[NewPhoto]) -> Result<Vec<Photo>> {
        dispatch!(self, insert_photos(photos))
    }

    pub fn get_photo(&self, id: i64) -> Result<Option<Photo>> {
        dispatch!(self, get_photo(id))
    }

    pub fn get_photo_by_uid(&self, uid: &str) -> Result<Option<Photo>> {
        dispatch!(self, get_photo_by_uid(uid))
    }

    pub fn existing_uids(&self) -> Result<Vec<String>> {
        dispatch!(self, existing_uids())
    }

    pub fn list_photos(&self, query: &PhotoQuery) -> Result<Vec<Photo>> {
        dispatch!(self, list_photos(query))
    }

    pub fn update_photo(&self, id: i64, update: &PhotoUpdate) -> Result<Option<Photo>> {
        dispatch!(self, update_photo(id, update))
    }

    pub fn remove_photo(&self, id: i64) -> Result<bool> {
        dispatch!(self, remove_photo(id))
    }

    pub fn remove_photos_by_uid(&self, uids: &[String]) -> Result<usize> {
        dispatch!(self, remove_photos_by_uid(uids))
    }

    pub fn sync_photos(&self, sync: &CatalogSync) -> Result<SyncOutcome> {
        dispatch!(self, sync_photos(sync))
    }

    pub fn count_photos(&self) -> Result<i64> {
        dispatch!(self, count_photos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_sqlite_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            sqlite_path: dir.path().join("photocat.db"),
            ..Default::default()
        };

        let db = Database::open(&config).unwrap();
        db.initialize().unwrap();
        let photo = db
            .insert_photo(&NewPhoto {
                filename: Some("a.jpg".to_string()),
                ..Default::default()
            })
            .unwrap();
        drop(db);

        // Data survives reopening the file
        let db = Database::open(&config).unwrap();
        db.initialize().unwrap();
        assert_eq!(db.get_photo(photo.id).unwrap(), Some(photo));
    }
}
