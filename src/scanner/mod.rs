pub mod discovery;
pub mod hashing;
pub mod metadata;

use anyhow::Result;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::db::{CatalogSync, Database, NewPhoto, Photo, PhotoQuery};

pub use discovery::discover_images;
pub use hashing::file_uid;
pub use metadata::{extract_metadata, ImageMetadata};

#[derive(Debug, Clone)]
pub enum ImportProgress {
    Started { total_files: usize },
    Scanned { current: usize, total: usize, path: String },
    Skipped { path: String },
    Renamed { uid: String, filename: String },
    Error { message: String },
    Completed {
        imported: usize,
        skipped: usize,
        renamed: usize,
        removed: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub found: usize,
    pub imported: usize,
    /// Files whose uid was already catalogued.
    pub skipped: usize,
    /// Catalogued rows whose filename changed.
    pub renamed: usize,
    /// Rows dropped because their file is gone (prune mode only).
    pub removed: usize,
    pub failed: usize,
}

/// Read a single image into the values of a new `photo` row.
pub fn scan_file(path: &Path) -> Result<NewPhoto> {
    let uid = file_uid(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    let metadata = extract_metadata(path)?;
    Ok(metadata.into_new_photo(filename, Some(uid)))
}

pub struct Importer {
    extensions: Vec<String>,
    prune: bool,
}

impl Importer {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            extensions: config.image_extensions.clone(),
            prune: false,
        }
    }

    /// Also remove catalogued photos whose uid is not found under the
    /// imported directory.
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Import every image under `directory` and bring the catalog in line
    /// with it. New uids are inserted. A known uid found under a different
    /// filename gets its filename updated. With pruning on, rows whose uid was
    /// not found are removed. All changes are written in one transaction.
    /// Unreadable files are reported and skipped; if any file fails, nothing
    /// is pruned.
    pub fn import_directory(
        &self,
        directory: &Path,
        db: &Database,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> Result<ImportResult> {
        let send = |event: ImportProgress| {
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(event);
            }
        };

        let image_paths = discover_images(directory, &self.extensions)?;
        let total = image_paths.len();
        info!("Found {} images under {:?}", total, directory);
        send(ImportProgress::Started { total_files: total });

        // Hashing and decoding run in parallel, writes stay on this thread
        let scanned: Vec<(PathBuf, Result<NewPhoto>)> = image_paths
            .par_iter()
            .map(|path| (path.clone(), scan_file(path)))
            .collect();

        // uid -> stored filename, lowest id wins
        let mut catalogued: HashMap<String, Option<String>> = HashMap::new();
        for photo in db.list_photos(&PhotoQuery::default())? {
            if let Some(uid) = photo.uid {
                catalogued.entry(uid).or_insert(photo.filename);
            }
        }

        let mut result = ImportResult {
            found: total,
            ..Default::default()
        };
        let mut sync = CatalogSync::default();
        // Filenames seen on disk for each catalogued uid, in path order
        let mut on_disk: HashMap<String, Vec<String>> = HashMap::new();
        let mut queued: HashSet<String> = HashSet::new();

        for (index, (path, scan)) in scanned.into_iter().enumerate() {
            let path_str = path.to_string_lossy().to_string();
            match scan {
                Ok(photo) => {
                    send(ImportProgress::Scanned {
                        current: index + 1,
                        total,
                        path: path_str.clone(),
                    });
                    let uid = photo.uid.clone().unwrap_or_default();
                    if catalogued.contains_key(&uid) {
                        on_disk
                            .entry(uid)
                            .or_default()
                            .extend(photo.filename.clone());
                    } else if queued.insert(uid) {
                        sync.insert.push(photo);
                        continue;
                    }
                    debug!("Skipping already catalogued {}", path_str);
                    result.skipped += 1;
                    send(ImportProgress::Skipped { path: path_str });
                }
                Err(e) => {
                    warn!("Error scanning {}: {}", path_str, e);
                    result.failed += 1;
                    send(ImportProgress::Error {
                        message: format!("Error scanning {}: {}", path_str, e),
                    });
                }
            }
        }

        for (uid, names) in &on_disk {
            let stored = catalogued.get(uid).cloned().flatten();
            if stored.as_ref().is_some_and(|s| names.contains(s)) {
                continue;
            }
            if let Some(first) = names.first() {
                debug!("Photo {} moved from {:?} to {}", uid, stored, first);
                sync.rename.push((uid.clone(), first.clone()));
            }
        }
        sync.rename.sort();

        if self.prune {
            if result.failed == 0 {
                sync.remove = catalogued
                    .keys()
                    .filter(|uid| !on_disk.contains_key(*uid))
                    .cloned()
                    .collect();
                sync.remove.sort();
            } else {
                warn!(
                    "Not pruning: {} files under {:?} could not be read",
                    result.failed, directory
                );
            }
        }

        let outcome = db.sync_photos(&sync)?;
        result.imported = outcome.inserted.len();
        result.renamed = outcome.renamed;
        result.removed = outcome.removed;
        for (uid, filename) in sync.rename {
            send(ImportProgress::Renamed { uid, filename });
        }
        info!(
            "Import finished: {} imported, {} skipped, {} renamed, {} removed, {} failed",
            result.imported, result.skipped, result.renamed, result.removed, result.failed
        );

        send(ImportProgress::Completed {
            imported: result.imported,
            skipped: result.skipped,
            renamed: result.renamed,
            removed: result.removed,
            failed: result.failed,
        });

        Ok(result)
    }

    /// Import one file. Returns `None` when its uid is already catalogued.
    pub fn import_file(&self, path: &Path, db: &Database, title: Option<String>) -> Result<Option<Photo>> {
        let mut photo = scan_file(path)?;
        if let Some(ref uid) = photo.uid {
            if db.get_photo_by_uid(uid)?.is_some() {
                debug!("Skipping already catalogued {:?}", path);
                return Ok(None);
            }
        }
        photo.title = title;
        let inserted = db.insert_photo(&photo)?;
        info!("Imported {:?} as photo {}", path, inserted.id);
        Ok(Some(inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_png(path: &Path, color: [u8; 3], width: u32, height: u32) {
        image::RgbImage::from_pixel(width, height, image::Rgb(color))
            .save(path)
            .unwrap();
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn importer() -> Importer {
        Importer::new(&ScannerConfig::default())
    }

    #[test]
    fn test_import_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("red.png"), [255, 0, 0], 4, 3);
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_png(&dir.path().join("sub/blue.png"), [0, 0, 255], 2, 2);
        fs::write(dir.path().join("readme.txt"), b"ignored").unwrap();

        let db = test_db();
        let (tx, rx) = mpsc::channel();
        let result = importer()
            .import_directory(dir.path(), &db, Some(tx))
            .unwrap();

        assert_eq!(
            result,
            ImportResult {
                found: 2,
                imported: 2,
                skipped: 0,
                renamed: 0,
                removed: 0,
                failed: 0
            }
        );

        let events: Vec<ImportProgress> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ImportProgress::Started { total_files: 2 })));
        assert!(matches!(
            events.last(),
            Some(ImportProgress::Completed { imported: 2, .. })
        ));

        let photos = db.list_photos(&Default::default()).unwrap();
        let red = photos
            .iter()
            .find(|p| p.filename.as_deref() == Some("red.png"))
            .unwrap();
        assert_eq!(red.width, Some(4));
        assert_eq!(red.height, Some(3));
        assert_eq!(red.color, "ff0000");
        assert_eq!(red.title, "");
        assert_eq!(red.uid.as_ref().map(|u| u.len()), Some(16));
    }

    #[test]
    fn test_reimport_skips_known_uids() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), [10, 20, 30], 2, 2);
        // Same bytes under another name share a uid
        fs::copy(dir.path().join("a.png"), dir.path().join("copy.png")).unwrap();

        let db = test_db();
        let first = importer().import_directory(dir.path(), &db, None).unwrap();
        assert_eq!(first.imported, 1);
        assert_eq!(first.skipped, 1);

        let second = importer().import_directory(dir.path(), &db, None).unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(db.count_photos().unwrap(), 1);
    }

    #[test]
    fn test_reimport_follows_renamed_file() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("old.png"), [200, 100, 50], 3, 3);

        let db = test_db();
        let first = importer().import_directory(dir.path(), &db, None).unwrap();
        assert_eq!(first.imported, 1);
        let original = db.list_photos(&PhotoQuery::default()).unwrap().remove(0);

        fs::rename(dir.path().join("old.png"), dir.path().join("new.png")).unwrap();
        let (tx, rx) = mpsc::channel();
        let second = importer()
            .import_directory(dir.path(), &db, Some(tx))
            .unwrap();

        assert_eq!(
            second,
            ImportResult {
                found: 1,
                imported: 0,
                skipped: 1,
                renamed: 1,
                removed: 0,
                failed: 0
            }
        );
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, ImportProgress::Renamed { ref filename, .. } if filename == "new.png")));

        let photos = db.list_photos(&PhotoQuery::default()).unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, original.id);
        assert_eq!(photos[0].filename.as_deref(), Some("new.png"));
        assert_eq!(photos[0].color, original.color);
    }

    #[test]
    fn test_prune_removes_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("keep.png"), [1, 2, 3], 2, 2);
        write_png(&dir.path().join("drop.png"), [4, 5, 6], 2, 2);

        let db = test_db();
        importer().import_directory(dir.path(), &db, None).unwrap();
        // Rows without a uid are never pruned
        db.insert_photo(&NewPhoto {
            title: Some("manual entry".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(db.count_photos().unwrap(), 3);

        fs::remove_file(dir.path().join("drop.png")).unwrap();

        // Without pruning the orphan stays
        let plain = importer().import_directory(dir.path(), &db, None).unwrap();
        assert_eq!(plain.removed, 0);
        assert_eq!(db.count_photos().unwrap(), 3);

        let pruned = importer()
            .with_prune(true)
            .import_directory(dir.path(), &db, None)
            .unwrap();
        assert_eq!(pruned.removed, 1);
        assert_eq!(pruned.skipped, 1);

        let filenames: Vec<Option<String>> = db
            .list_photos(&PhotoQuery::default())
            .unwrap()
            .into_iter()
            .map(|p| p.filename)
            .collect();
        assert_eq!(filenames, vec![Some("keep.png".to_string()), None]);
    }

    #[test]
    fn test_prune_empty_directory_clears_catalogued_files() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("only.png"), [9, 9, 9], 2, 2);

        let db = test_db();
        importer().import_directory(dir.path(), &db, None).unwrap();
        fs::remove_file(dir.path().join("only.png")).unwrap();

        let result = importer()
            .with_prune(true)
            .import_directory(dir.path(), &db, None)
            .unwrap();
        assert_eq!(result.found, 0);
        assert_eq!(result.removed, 1);
        assert_eq!(db.count_photos().unwrap(), 0);
    }

    #[test]
    fn test_import_file_with_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("green.png");
        write_png(&path, [0, 255, 0], 5, 5);

        let db = test_db();
        let photo = importer()
            .import_file(&path, &db, Some("Lawn".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(photo.title, "Lawn");
        assert_eq!(photo.color, "00ff00");
        assert_eq!(photo.filename.as_deref(), Some("green.png"));

        assert!(importer().import_file(&path, &db, None).unwrap().is_none());
    }
}
