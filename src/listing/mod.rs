use std::fs;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};

/// a file seen on disk during folder enumeration
#[derive(Debug, PartialEq, Clone)]
pub struct FileRef {
    pub path: String,
    pub name: String,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
}

/// why a folder could not be enumerated
#[derive(Debug, PartialEq)]
pub enum ListError {
    /// the path does not exist or is not a directory
    NotFound,
    /// the path exists but could not be read (permissions, IO)
    Unavailable,
}

/// filesystem enumeration seam consumed by the metadata service and the visible-files index
pub trait FileLister: Send + Sync {
    fn list_files(&self, path: &str) -> Result<Vec<FileRef>, ListError>;
    fn list_subdirectories(&self, path: &str) -> Result<Vec<String>, ListError>;
}

/// lists straight from the local disk. Listing is non-recursive; subfolders are
/// tracked individually
pub struct DiskLister;

impl FileLister for DiskLister {
    fn list_files(&self, path: &str) -> Result<Vec<FileRef>, ListError> {
        let mut files: Vec<FileRef> = Vec::new();
        for entry in read_entries(path)? {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let metadata = entry.metadata().ok();
            files.push(FileRef {
                path: entry.path().to_string_lossy().to_string(),
                name: entry.file_name().to_string_lossy().to_string(),
                created: metadata
                    .as_ref()
                    .and_then(|m| m.created().ok())
                    .map(to_local_time),
                modified: metadata
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .map(to_local_time),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn list_subdirectories(&self, path: &str) -> Result<Vec<String>, ListError> {
        let mut directories: Vec<String> = Vec::new();
        for entry in read_entries(path)? {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                directories.push(entry.path().to_string_lossy().to_string());
            }
        }
        directories.sort();
        Ok(directories)
    }
}

fn read_entries(path: &str) -> Result<Vec<fs::DirEntry>, ListError> {
    let dir = Path::new(path);
    if !dir.is_dir() {
        return Err(ListError::NotFound);
    }
    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries.filter_map(|entry| entry.ok()).collect()),
        Err(e) => {
            log::error!("Failed to read directory {path}! Error is {e:?}");
            Err(ListError::Unavailable)
        }
    }
}

fn to_local_time(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}
