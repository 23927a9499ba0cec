use std::backtrace::Backtrace;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::vtab::array;
use rusqlite::{Connection, ErrorCode, OpenFlags};

use crate::db_migrations::migrate_db;
use crate::model::error::store_errors::StoreError;
use crate::model::{FolderRecord, Tag, TagGroup, TrackedFile};

pub mod file_repository;
pub mod folder_repository;
pub mod metadata_repository;
pub mod tag_repository;

/// total number of times an operation is attempted before a transient failure becomes fatal
const MAX_ATTEMPTS: u32 = 6;
/// pause between attempts while the database is write-locked
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Durable CRUD over the schema, with transient-failure resilience.
///
/// Every operation opens its own connection, executes, and closes it; no
/// transaction spans operations. When the database is only transiently
/// unwritable (another reader/writer holds the write lock) the whole operation
/// is retried up to 5 more times at [`RETRY_PAUSE`] intervals before the
/// failure surfaces as [`StoreError::Busy`]. Constraint violations and schema
/// errors are never retried.
pub struct PersistentStore {
    db_location: PathBuf,
}

impl PersistentStore {
    /// opens a store over the database file at `db_location`, creating or
    /// migrating the schema as needed
    pub fn open(db_location: impl Into<PathBuf>) -> Result<PersistentStore, StoreError> {
        let store = PersistentStore {
            db_location: db_location.into(),
        };
        store.initialize_db()?;
        Ok(store)
    }

    /// creates a new connection and returns it, but panics if the connection could not be created
    fn open_connection(&self) -> Connection {
        let con = match Connection::open_with_flags(&self.db_location, OpenFlags::default()) {
            Ok(con) => con,
            Err(error) => panic!("Failed to get a connection to the database!: {error}"),
        };
        // cascading deletes depend on this, and sqlite leaves it off per-connection
        if let Err(error) = con.pragma_update(None, "foreign_keys", true) {
            panic!("Failed to enable foreign keys on the connection!: {error}");
        }
        if let Err(error) = array::load_module(&con) {
            panic!("Failed to load the array module on the connection!: {error}");
        }
        con
    }

    /// handles checking if the database exists and is at the correct version.
    /// If not, it either creates or upgrades the database accordingly
    fn initialize_db(&self) -> Result<(), StoreError> {
        self.run(|con| {
            let table_version = match metadata_repository::get_version(con) {
                Ok(value) => value.parse::<u64>().unwrap(),
                Err(_) => {
                    // tables haven't been created yet
                    con.execute_batch(include_str!("../assets/init.sql"))?;
                    1
                }
            };
            migrate_db(con, table_version)
        })
    }

    /// runs `op` against a fresh connection, retrying while the database is
    /// only transiently unavailable
    fn run<T>(
        &self,
        op: impl Fn(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let mut attempt: u32 = 1;
        loop {
            let con = self.open_connection();
            let result = op(&con);
            if let Err((_, e)) = con.close() {
                log::warn!("Failed to cleanly close the database connection: {e:?}");
            }
            match result {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "The database is locked; retrying (attempt {attempt} of {MAX_ATTEMPTS})..."
                    );
                    attempt += 1;
                    thread::sleep(RETRY_PAUSE);
                }
                Err(e) => return Err(classify(e)),
            }
        }
    }

    /// inserts a folder row for `path` and returns its generated id. The path must
    /// not already be tracked; the unique constraint surfaces as [`StoreError::Constraint`]
    pub fn add_folder(&self, path: &str) -> Result<i64, StoreError> {
        self.run(|con| folder_repository::create_folder(path, con))
    }

    /// deletes the folder rows for `paths`, cascading to their files and file tags.
    /// Returns the ids of only the folders that actually existed
    pub fn delete_folders(&self, paths: &[String]) -> Result<Vec<i64>, StoreError> {
        self.run(|con| {
            let folders = folder_repository::get_folders_by_paths(paths, con)?;
            let ids: Vec<i64> = folders.iter().map(|folder| folder.id).collect();
            folder_repository::delete_folders_by_ids(&ids, con)?;
            Ok(ids)
        })
    }

    /// inserts one file row; path uniqueness is enforced by the schema
    pub fn add_file(
        &self,
        path: &str,
        folder_id: i64,
        thumbnail: Option<&str>,
    ) -> Result<(), StoreError> {
        self.run(|con| file_repository::create_file(path, folder_id, thumbnail, con))
    }

    /// upserts the tag row if missing (attached to its group by name, falling back
    /// to the default group), then upserts one file association per path. Duplicate
    /// `(file, name, value)` triples are silently ignored
    pub fn add_tag(&self, tag: &Tag, paths: &[String]) -> Result<(), StoreError> {
        self.run(|con| {
            tag_repository::create_tag(tag, con)?;
            for path in paths {
                tag_repository::add_tag_to_file(path, tag, con)?;
            }
            Ok(())
        })
    }

    /// removes the `(name, value)` association from every path in `paths`
    pub fn delete_tag(&self, tag: &Tag, paths: &[String]) -> Result<(), StoreError> {
        self.run(|con| tag_repository::remove_tag_from_files(tag, paths, con))
    }

    /// deletes every tag left with zero file associations
    pub fn delete_unused_tags(&self) -> Result<(), StoreError> {
        self.run(tag_repository::delete_unused_tags)
    }

    /// insert-or-ignore by name; returns whether a row was actually inserted
    pub fn add_tag_group(&self, group: &TagGroup) -> Result<bool, StoreError> {
        self.run(|con| tag_repository::create_tag_group(group, con))
    }

    /// renames/recolors the row currently named `original_name`; returns whether
    /// such a row existed
    pub fn update_tag_group(
        &self,
        original_name: &str,
        updated: &TagGroup,
    ) -> Result<bool, StoreError> {
        self.run(|con| tag_repository::update_tag_group(original_name, updated, con))
    }

    /// single UPDATE plus read-back. Returns the file's new projection without its
    /// tag set, or `None` when the path is unknown
    pub fn update_description(
        &self,
        description: &str,
        path: &str,
    ) -> Result<Option<TrackedFile>, StoreError> {
        self.run(|con| {
            let updated_rows = file_repository::update_description(description, path, con)?;
            if updated_rows == 0 {
                return Ok(None);
            }
            file_repository::get_file_by_path(path, con)
        })
    }

    /// reads every tracked file, optionally limited to `folders`, with its full tag set
    pub fn get_files(&self, folders: &[String]) -> Result<Vec<TrackedFile>, StoreError> {
        self.run(|con| file_repository::get_files_with_tags(folders, con))
    }

    /// the full tag catalog; catalog tags carry no value
    pub fn get_tags(&self) -> Result<Vec<Tag>, StoreError> {
        self.run(tag_repository::get_all_tags)
    }

    pub fn get_tag_groups(&self) -> Result<Vec<TagGroup>, StoreError> {
        self.run(tag_repository::get_tag_groups)
    }

    pub fn get_tracked_folders(&self) -> Result<Vec<FolderRecord>, StoreError> {
        self.run(folder_repository::get_all_folders)
    }
}

fn is_transient(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(failure, _)
        if failure.code == ErrorCode::DatabaseBusy || failure.code == ErrorCode::DatabaseLocked)
}

fn classify(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::DatabaseBusy
                || failure.code == ErrorCode::DatabaseLocked =>
        {
            log::error!("The database is still locked after {MAX_ATTEMPTS} attempts!");
            StoreError::Busy
        }
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Constraint
        }
        _ => {
            log::error!(
                "Database operation failed! Error is {e:?}\n{}",
                Backtrace::force_capture()
            );
            StoreError::Db
        }
    }
}

/// builds an `rarray()` parameter from string values
pub(crate) fn text_array(values: &[String]) -> array::Array {
    Rc::new(values.iter().cloned().map(Value::from).collect())
}

/// builds an `rarray()` parameter from row ids
pub(crate) fn id_array(ids: &[i64]) -> array::Array {
    Rc::new(ids.iter().copied().map(Value::from).collect())
}

#[cfg(test)]
mod persistent_store_tests {
    use std::time::Instant;

    use super::{PersistentStore, MAX_ATTEMPTS};
    use crate::model::error::store_errors::StoreError;
    use crate::test::{cleanup, test_db_path, test_store};

    #[test]
    fn open_is_idempotent() {
        let store = test_store();
        store.add_folder("/photos").unwrap();
        drop(store);
        // re-opening the same file must neither recreate the schema nor lose data
        let store = PersistentStore::open(test_db_path()).unwrap();
        let folders = store.get_tracked_folders().unwrap();
        assert_eq!(1, folders.len());
        assert_eq!("/photos", folders[0].path);
        cleanup();
    }

    #[test]
    fn duplicate_folder_is_a_constraint_violation_without_retries() {
        let store = test_store();
        store.add_folder("/photos").unwrap();
        let started = Instant::now();
        let result = store.add_folder("/photos");
        assert_eq!(Err(StoreError::Constraint), result);
        // constraint violations must fail fast, not burn the retry budget
        assert!(started.elapsed().as_millis() < 100);
        cleanup();
    }

    #[test]
    fn exhausted_retries_surface_as_busy() {
        let store = test_store();
        store.add_folder("/photos").unwrap();
        // hold the write lock on a second connection so every attempt sees SQLITE_BUSY
        let blocker = store.open_connection();
        blocker.execute_batch("begin exclusive;").unwrap();
        let started = Instant::now();
        let result = store.add_folder("/other");
        let elapsed = started.elapsed();
        blocker.execute_batch("rollback;").unwrap();
        assert_eq!(Err(StoreError::Busy), result);
        // 6 attempts with a 100ms pause between each means at least 500ms of waiting
        assert!(elapsed.as_millis() >= 500, "elapsed {elapsed:?}");
        assert!(u128::from(MAX_ATTEMPTS) * 150 > elapsed.as_millis());
        cleanup();
    }

    #[test]
    fn operation_succeeds_once_the_lock_clears() {
        let store = test_store();
        let blocker = store.open_connection();
        blocker.execute_batch("begin exclusive;").unwrap();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(250));
            blocker.execute_batch("rollback;").unwrap();
        });
        // first attempts fail transiently, a later one lands
        let result = store.add_folder("/photos");
        handle.join().unwrap();
        assert!(result.is_ok());
        cleanup();
    }
}
