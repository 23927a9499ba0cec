//! A personal file-tagging index.
//!
//! Tracks user-selected folders, persists per-file metadata (tags,
//! descriptions, thumbnails) in an embedded sqlite store, and exposes a live,
//! queryable view of the currently visible files that updates incrementally
//! from a change-event stream instead of re-querying the store on every
//! mutation.

pub mod config;
pub mod events;
pub mod index;
pub mod listing;
pub mod logging;
pub mod model;
pub mod previews;
pub mod repository;
pub mod search;
pub mod service;

mod db_migrations;

#[cfg(test)]
mod test;

pub use events::{ChangeEvent, EventBus, SubscriptionId, TrackProgress};
pub use index::{IndexDiff, ViewScope, VisibleFile, VisibleFilesIndex};
pub use listing::{DiskLister, FileLister, FileRef, ListError};
pub use model::{Tag, TagGroup, TrackedFile, UntrackedFile};
pub use previews::{ImageThumbnailer, Thumbnail, ThumbnailGenerator};
pub use repository::PersistentStore;
pub use search::SearchPredicate;
pub use service::metadata_service::MetadataService;
