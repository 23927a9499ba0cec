use std::fs;
use std::fs::{remove_dir_all, remove_file};
use std::path::Path;

use rusqlite::Connection;

use crate::listing::DiskLister;
use crate::previews::ImageThumbnailer;
use crate::repository::PersistentStore;
use crate::service::metadata_service::MetadataService;

/// each test thread works against its own database file and directories so the
/// whole suite can run in parallel
pub fn current_thread_name() -> String {
    let current_thread = std::thread::current();
    current_thread.name().unwrap().replace("::", "_")
}

pub fn test_db_path() -> String {
    format!("./{}.sqlite", current_thread_name())
}

/// directory this test thread can freely fill with source files
pub fn test_source_dir() -> String {
    format!("./{}_src", current_thread_name())
}

pub fn test_thumbnail_dir() -> String {
    format!("./{}_thumbs", current_thread_name())
}

/// a fresh store over this thread's database file
pub fn test_store() -> PersistentStore {
    remove_file(Path::new(&test_db_path())).unwrap_or(());
    PersistentStore::open(test_db_path()).unwrap()
}

/// a fresh service over this thread's database file with the on-disk collaborators
pub fn test_service() -> MetadataService {
    MetadataService::new(
        test_store(),
        Box::new(DiskLister),
        Box::new(ImageThumbnailer::default()),
        test_thumbnail_dir(),
    )
    .unwrap()
}

/// in-memory connection with the schema applied, for repository-level tests
pub fn open_memory_connection() -> Connection {
    let con = Connection::open_in_memory().unwrap();
    con.pragma_update(None, "foreign_keys", true).unwrap();
    rusqlite::vtab::array::load_module(&con).unwrap();
    con.execute_batch(include_str!("../assets/init.sql")).unwrap();
    con
}

/// writes a file into this thread's source directory, returning its path
pub fn create_source_file(name: &str, contents: &[u8]) -> String {
    fs::create_dir_all(Path::new(&test_source_dir())).unwrap();
    let path = format!("{}/{name}", test_source_dir());
    fs::write(Path::new(&path), contents).unwrap();
    path
}

/// writes a decodable png into this thread's source directory, returning its path
pub fn create_source_png(name: &str, width: u32, height: u32) -> String {
    fs::create_dir_all(Path::new(&test_source_dir())).unwrap();
    let path = format!("{}/{name}", test_source_dir());
    image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height))
        .save(Path::new(&path))
        .unwrap();
    path
}

pub fn cleanup() {
    remove_file(Path::new(&test_db_path())).unwrap_or(());
    remove_dir_all(Path::new(&test_source_dir())).unwrap_or(());
    remove_dir_all(Path::new(&test_thumbnail_dir())).unwrap_or(());
}
