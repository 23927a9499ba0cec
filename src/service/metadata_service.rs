use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use itertools::Itertools;

use crate::config::FILE_TAGGER_CONFIG;
use crate::events::{ChangeEvent, EventBus, ObservableSet, SubscriptionId, TrackProgress};
use crate::listing::{DiskLister, FileLister, FileRef, ListError};
use crate::model::error::folder_errors::TrackFolderError;
use crate::model::error::store_errors::StoreError;
use crate::model::error::tag_errors::{AddTagError, UpdateTagGroupError};
use crate::model::{Tag, TagGroup, TrackedFile, DEFAULT_GROUP_NAME};
use crate::previews::{sanitize_file_name, ImageThumbnailer, Thumbnail, ThumbnailGenerator};
use crate::repository::PersistentStore;
use crate::search::SearchPredicate;

/// name of the built-in tag holding a file's creation timestamp
pub static CREATED_TAG: &str = "DateCreated";
/// name of the built-in tag holding a file's last-modified timestamp
pub static MODIFIED_TAG: &str = "DateModified";
/// name of the built-in tag holding a decodable image's pixel width
pub static WIDTH_TAG: &str = "Width";
/// name of the built-in tag holding a decodable image's pixel height
pub static HEIGHT_TAG: &str = "Height";

/// The single writer of the [PersistentStore].
///
/// Owns the tracked-folder reactive set and the change-event stream that keeps
/// derived caches consistent without full reloads. Collaborators are injected
/// through the constructor; there is no ambient registry. All operations block
/// until the underlying write is durable, so call them off any
/// latency-sensitive thread.
pub struct MetadataService {
    store: PersistentStore,
    lister: Box<dyn FileLister>,
    thumbnailer: Box<dyn ThumbnailGenerator>,
    thumbnail_root: PathBuf,
    tracked: ObservableSet,
    changes: EventBus<ChangeEvent>,
    progress: EventBus<TrackProgress>,
}

impl MetadataService {
    /// builds a service over `store` with explicit collaborators. The tracked-folder
    /// set is seeded from the store
    pub fn new(
        store: PersistentStore,
        lister: Box<dyn FileLister>,
        thumbnailer: Box<dyn ThumbnailGenerator>,
        thumbnail_root: impl Into<PathBuf>,
    ) -> Result<MetadataService, StoreError> {
        let tracked = ObservableSet::new(
            store
                .get_tracked_folders()?
                .into_iter()
                .map(|folder| folder.path),
        );
        Ok(MetadataService {
            store,
            lister,
            thumbnailer,
            thumbnail_root: thumbnail_root.into(),
            tracked,
            changes: EventBus::new(),
            progress: EventBus::new(),
        })
    }

    /// builds a service from [FILE_TAGGER_CONFIG] with the on-disk collaborators
    pub fn from_config() -> Result<MetadataService, StoreError> {
        let config = FILE_TAGGER_CONFIG.clone();
        MetadataService::new(
            PersistentStore::open(config.database.location)?,
            Box::new(DiskLister),
            Box::new(ImageThumbnailer::new(config.thumbnails.size)),
            config.thumbnails.location,
        )
    }

    /// Starts tracking `path`: lists it, persists a folder row plus one file row
    /// per listed file (with default metadata tags and, for images, a thumbnail),
    /// emits one [ChangeEvent::FileAdded] per file, and finally marks the path
    /// tracked.
    ///
    /// Tracking an already-tracked path is a logged no-op. A listing failure
    /// aborts before any row is written. A store failure partway through leaves
    /// the files persisted so far in place; nothing is rolled back.
    pub fn track_folder(&self, path: &str) -> Result<(), TrackFolderError> {
        if self.is_tracked(path) {
            log::warn!("Folder {path} is already tracked; nothing to do");
            return Ok(());
        }
        let listed = match self.lister.list_files(path) {
            Ok(files) => files,
            Err(e) => {
                log::error!("Failed to list folder {path}, not tracking it! Error is {e:?}");
                return Err(TrackFolderError::SourceUnavailable);
            }
        };
        let folder_id = self.store.add_folder(path)?;
        for file_ref in listed {
            let file = self.track_file(&file_ref, folder_id)?;
            self.changes.publish(&ChangeEvent::FileAdded(file));
        }
        self.tracked.insert(path);
        Ok(())
    }

    /// tracks each folder in order, publishing advisory progress after each one
    pub fn track_folders(&self, paths: &[String]) -> Result<(), TrackFolderError> {
        let total = paths.len();
        for (index, path) in paths.iter().enumerate() {
            self.track_folder(path)?;
            self.progress.publish(&TrackProgress {
                completed: index + 1,
                total,
            });
        }
        Ok(())
    }

    fn track_file(&self, file_ref: &FileRef, folder_id: i64) -> Result<TrackedFile, StoreError> {
        let thumbnail = self.generate_thumbnail(file_ref, folder_id);
        let thumbnail_path = thumbnail.as_ref().map(|thumb| thumb.path.clone());
        self.store
            .add_file(&file_ref.path, folder_id, thumbnail_path.as_deref())?;
        let tags = default_metadata_tags(file_ref, thumbnail.as_ref());
        for tag in &tags {
            self.store
                .add_tag(tag, std::slice::from_ref(&file_ref.path))?;
        }
        Ok(TrackedFile {
            path: file_ref.path.clone(),
            folder_id,
            thumbnail: thumbnail_path,
            description: None,
            tags,
        })
    }

    fn generate_thumbnail(&self, file_ref: &FileRef, folder_id: i64) -> Option<Thumbnail> {
        let file_name = sanitize_file_name(&file_ref.name);
        let destination = self
            .thumbnail_root
            .join(folder_id.to_string())
            .join(format!("{file_name}.png"));
        self.thumbnailer
            .generate(Path::new(&file_ref.path), &destination)
    }

    /// Stops tracking every folder in `paths`. Dependent views hear about it first
    /// through the tracked-folder stream, then the rows (cascading to files and
    /// file tags) are deleted, one [ChangeEvent::FolderRemoved] fires per path,
    /// each folder's thumbnail directory is removed, and finally orphaned tags
    /// are pruned from the catalog
    pub fn untrack_folders(&self, paths: &[String]) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        self.tracked.remove_all(paths);
        let deleted_ids = self.store.delete_folders(paths)?;
        for path in paths {
            self.changes
                .publish(&ChangeEvent::FolderRemoved { path: path.clone() });
        }
        for folder_id in deleted_ids {
            let directory = self.thumbnail_root.join(folder_id.to_string());
            if directory.exists() {
                if let Err(e) = fs::remove_dir_all(&directory) {
                    log::warn!(
                        "Failed to delete thumbnail directory {}! Error is {e:?}",
                        directory.display()
                    );
                }
            }
        }
        self.store.delete_unused_tags()?;
        Ok(())
    }

    /// Attaches `tag` to every path in `paths`, then emits a single
    /// [ChangeEvent::TagAdded] batching all affected paths. Attaching a
    /// `(name, value)` pair a file already holds changes nothing
    pub fn add_tag(&self, tag: &Tag, paths: &[String]) -> Result<(), AddTagError> {
        if paths.is_empty() {
            return Ok(());
        }
        if tag.name.trim().is_empty() {
            log::error!("Tag names can never be blank!");
            return Err(AddTagError::BlankName);
        }
        let paths: Vec<String> = paths.iter().unique().cloned().collect();
        self.store.add_tag(tag, &paths)?;
        self.changes.publish(&ChangeEvent::TagAdded {
            tag: tag.clone(),
            paths,
        });
        Ok(())
    }

    /// Removes every tag in `tags` from every path in `paths`, one
    /// [ChangeEvent::TagRemoved] per tag, then prunes tags left with no file
    /// associations at all
    pub fn delete_tags(&self, tags: &[Tag], paths: &[String]) -> Result<(), StoreError> {
        if tags.is_empty() || paths.is_empty() {
            return Ok(());
        }
        for tag in tags {
            self.store.delete_tag(tag, paths)?;
            self.changes.publish(&ChangeEvent::TagRemoved {
                tag: tag.clone(),
                paths: paths.to_vec(),
            });
        }
        self.store.delete_unused_tags()?;
        Ok(())
    }

    /// creates `group` unless a group with its name already exists;
    /// [ChangeEvent::TagGroupAdded] fires only when a row was actually inserted
    pub fn create_tag_group(&self, group: &TagGroup) -> Result<(), StoreError> {
        let inserted = self.store.add_tag_group(group)?;
        if inserted {
            self.changes
                .publish(&ChangeEvent::TagGroupAdded(group.clone()));
        } else {
            log::warn!("Tag group {} already exists; nothing to do", group.name);
        }
        Ok(())
    }

    /// Renames/recolors the group currently named `original.name`. The reserved
    /// default group can never be renamed to or from. The emitted
    /// [ChangeEvent::TagGroupUpdated] carries the pre-edit group so subscribers
    /// can locate-and-replace by old name
    pub fn update_tag_group(
        &self,
        original: &TagGroup,
        updated: &TagGroup,
    ) -> Result<(), UpdateTagGroupError> {
        if original.name == DEFAULT_GROUP_NAME || updated.name == DEFAULT_GROUP_NAME {
            log::error!(
                "The {DEFAULT_GROUP_NAME} tag group is reserved and cannot be renamed to or from!"
            );
            return Err(UpdateTagGroupError::ReservedGroup);
        }
        let updated_rows = self.store.update_tag_group(&original.name, updated)?;
        if !updated_rows {
            return Err(UpdateTagGroupError::GroupNotFound);
        }
        self.changes.publish(&ChangeEvent::TagGroupUpdated {
            original: original.clone(),
            updated: updated.clone(),
        });
        Ok(())
    }

    /// Sets the description of the file at `path`, returning the file's new
    /// projection without its tag set (tag changes travel only on tag events).
    /// An unknown path returns `Ok(None)` and emits nothing
    pub fn update_description(
        &self,
        description: &str,
        path: &str,
    ) -> Result<Option<TrackedFile>, StoreError> {
        let updated = self.store.update_description(description, path)?;
        if let Some(file) = &updated {
            self.changes.publish(&ChangeEvent::FileUpdated(file.clone()));
        }
        Ok(updated)
    }

    /// reads tracked files, optionally limited to `folders`, then applies
    /// `predicates` in the application layer; filters are never pushed into SQL
    pub fn get_files(
        &self,
        predicates: &[SearchPredicate],
        folders: &[String],
    ) -> Result<Vec<TrackedFile>, StoreError> {
        let files = self.store.get_files(folders)?;
        if predicates.is_empty() {
            return Ok(files);
        }
        Ok(files
            .into_iter()
            .filter(|file| SearchPredicate::matches_all(predicates, &file.tags))
            .collect())
    }

    pub fn get_all_tags(&self) -> Result<Vec<Tag>, StoreError> {
        self.store.get_tags()
    }

    pub fn get_tag_groups(&self) -> Result<Vec<TagGroup>, StoreError> {
        self.store.get_tag_groups()
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.tracked.contains(path)
    }

    pub fn tracked_folders(&self) -> Vec<String> {
        self.tracked.snapshot()
    }

    /// registers `callback` on the tracked-folder stream; it immediately receives
    /// the membership as of subscribe time, exactly once
    pub fn subscribe_tracked_folders(
        &self,
        callback: Box<dyn Fn(&[String]) + Send>,
    ) -> SubscriptionId {
        self.tracked.subscribe(callback)
    }

    pub fn unsubscribe_tracked_folders(&self, id: SubscriptionId) {
        self.tracked.unsubscribe(id);
    }

    /// registers `callback` on the change-event stream. Events arrive in emit
    /// order; the callback must not call back into this service
    pub fn subscribe_changes(&self, callback: Box<dyn Fn(&ChangeEvent) + Send>) -> SubscriptionId {
        self.changes.subscribe(callback)
    }

    pub fn unsubscribe_changes(&self, id: SubscriptionId) {
        self.changes.unsubscribe(id);
    }

    /// registers `callback` on the advisory folder-tracking progress stream
    pub fn subscribe_progress(
        &self,
        callback: Box<dyn Fn(&TrackProgress) + Send>,
    ) -> SubscriptionId {
        self.progress.subscribe(callback)
    }

    pub fn unsubscribe_progress(&self, id: SubscriptionId) {
        self.progress.unsubscribe(id);
    }

    /// filesystem passthrough used by views that merge untracked files
    pub fn list_folder(&self, path: &str) -> Result<Vec<FileRef>, ListError> {
        self.lister.list_files(path)
    }

    /// filesystem passthrough for folder pickers
    pub fn subdirectories(&self, path: &str) -> Result<Vec<String>, ListError> {
        self.lister.list_subdirectories(path)
    }
}

/// built-in tags recorded for every tracked file; image dimensions come along
/// whenever a thumbnail could be generated
fn default_metadata_tags(file_ref: &FileRef, thumbnail: Option<&Thumbnail>) -> Vec<Tag> {
    let mut tags = Vec::new();
    if let Some(created) = file_ref.created {
        tags.push(Tag::new(CREATED_TAG, Some(format_timestamp(created))));
    }
    if let Some(modified) = file_ref.modified {
        tags.push(Tag::new(MODIFIED_TAG, Some(format_timestamp(modified))));
    }
    if let Some(thumbnail) = thumbnail {
        tags.push(Tag::new(WIDTH_TAG, Some(thumbnail.width.to_string())));
        tags.push(Tag::new(HEIGHT_TAG, Some(thumbnail.height.to_string())));
    }
    tags
}

fn format_timestamp(time: NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod track_folder_tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use crate::events::ChangeEvent;
    use crate::listing::{FileLister, ListError};
    use crate::model::error::folder_errors::TrackFolderError;
    use crate::service::metadata_service::{HEIGHT_TAG, WIDTH_TAG};
    use crate::test::{
        cleanup, create_source_file, create_source_png, test_service, test_source_dir,
        test_thumbnail_dir,
    };

    /// lister standing in for an unreadable directory
    struct UnavailableLister;

    impl FileLister for UnavailableLister {
        fn list_files(&self, _: &str) -> Result<Vec<crate::listing::FileRef>, ListError> {
            Err(ListError::Unavailable)
        }

        fn list_subdirectories(&self, _: &str) -> Result<Vec<String>, ListError> {
            Err(ListError::Unavailable)
        }
    }

    #[test]
    fn tracking_persists_files_with_metadata_tags() {
        create_source_png("a.png", 8, 6);
        create_source_file("b.txt", b"hello");
        let service = test_service();
        service.track_folder(&test_source_dir()).unwrap();
        assert!(service.is_tracked(&test_source_dir()));

        let files = service.get_files(&[], &[]).unwrap();
        assert_eq!(2, files.len());
        let image = files
            .iter()
            .find(|file| file.name() == "a.png")
            .unwrap();
        let text = files.iter().find(|file| file.name() == "b.txt").unwrap();
        // the image got a thumbnail and dimension tags, the text file neither
        assert!(image.thumbnail.is_some());
        assert!(Path::new(image.thumbnail.as_ref().unwrap()).exists());
        assert!(image.tags.iter().any(|tag| tag.name == WIDTH_TAG
            && tag.value.as_deref() == Some("8")));
        assert!(image.tags.iter().any(|tag| tag.name == HEIGHT_TAG
            && tag.value.as_deref() == Some("6")));
        assert_eq!(None, text.thumbnail);
        assert!(!text.tags.iter().any(|tag| tag.name == WIDTH_TAG));
        cleanup();
    }

    #[test]
    fn tracking_twice_changes_nothing() {
        create_source_file("a.txt", b"a");
        let service = test_service();
        service.track_folder(&test_source_dir()).unwrap();
        let before = service.get_files(&[], &[]).unwrap();
        let tags_before = service.get_all_tags().unwrap();
        // second call is a warning-level no-op, not an error
        service.track_folder(&test_source_dir()).unwrap();
        assert_eq!(before, service.get_files(&[], &[]).unwrap());
        assert_eq!(tags_before, service.get_all_tags().unwrap());
        assert_eq!(vec![test_source_dir()], service.tracked_folders());
        cleanup();
    }

    #[test]
    fn listing_failure_aborts_without_side_effects() {
        let service = test_service_with_lister(Box::new(UnavailableLister));
        let result = service.track_folder("/unreadable");
        assert_eq!(Err(TrackFolderError::SourceUnavailable), result);
        assert!(!service.is_tracked("/unreadable"));
        assert!(service.get_files(&[], &[]).unwrap().is_empty());
        assert!(service.tracked_folders().is_empty());
        cleanup();
    }

    #[test]
    fn one_file_added_event_fires_per_file() {
        create_source_file("a.txt", b"a");
        create_source_file("b.txt", b"b");
        let service = test_service();
        let seen: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&seen);
        service.subscribe_changes(Box::new(move |event| {
            writer.lock().unwrap().push(event.clone())
        }));
        service.track_folder(&test_source_dir()).unwrap();
        let events = seen.lock().unwrap();
        let added: Vec<&ChangeEvent> = events
            .iter()
            .filter(|event| matches!(event, ChangeEvent::FileAdded(_)))
            .collect();
        assert_eq!(2, added.len());
        cleanup();
    }

    #[test]
    fn progress_is_published_per_folder() {
        use crate::events::TrackProgress;

        create_source_file("a.txt", b"a");
        let nested = format!("{}/nested", test_source_dir());
        std::fs::create_dir_all(Path::new(&nested)).unwrap();
        let service = test_service();
        let seen: Arc<Mutex<Vec<TrackProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&seen);
        service.subscribe_progress(Box::new(move |progress| {
            writer.lock().unwrap().push(*progress)
        }));
        service
            .track_folders(&[test_source_dir(), nested])
            .unwrap();
        let progress = seen.lock().unwrap();
        assert_eq!(
            vec![
                TrackProgress {
                    completed: 1,
                    total: 2
                },
                TrackProgress {
                    completed: 2,
                    total: 2
                },
            ],
            *progress
        );
        cleanup();
    }

    fn test_service_with_lister(
        lister: Box<dyn FileLister>,
    ) -> crate::service::metadata_service::MetadataService {
        crate::service::metadata_service::MetadataService::new(
            crate::test::test_store(),
            lister,
            Box::new(crate::previews::ImageThumbnailer::default()),
            test_thumbnail_dir(),
        )
        .unwrap()
    }
}



#[cfg(test)]
mod tag_group_tests {
    use std::sync::{Arc, Mutex};

    use crate::events::ChangeEvent;
    use crate::model::error::tag_errors::UpdateTagGroupError;
    use crate::model::TagGroup;
    use crate::test::{cleanup, test_service};

    #[test]
    fn group_events_fire_only_for_real_changes() {
        let service = test_service();
        let seen: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&seen);
        service.subscribe_changes(Box::new(move |event| {
            writer.lock().unwrap().push(event.clone())
        }));

        let group = TagGroup::new("colors", "#ff0000");
        service.create_tag_group(&group).unwrap();
        // creating it again inserts nothing, so no event
        service.create_tag_group(&group).unwrap();
        let renamed = TagGroup::new("palette", "#00ff00");
        service.update_tag_group(&group, &renamed).unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(
            vec![
                ChangeEvent::TagGroupAdded(group.clone()),
                ChangeEvent::TagGroupUpdated {
                    original: group,
                    updated: renamed
                },
            ],
            *events
        );
        cleanup();
    }

    #[test]
    fn the_reserved_group_cannot_be_renamed_to_or_from() {
        let service = test_service();
        let none = TagGroup::default_group();
        let other = TagGroup::new("other", "#112233");
        service.create_tag_group(&other).unwrap();
        assert_eq!(
            Err(UpdateTagGroupError::ReservedGroup),
            service.update_tag_group(&none, &other)
        );
        assert_eq!(
            Err(UpdateTagGroupError::ReservedGroup),
            service.update_tag_group(&other, &none)
        );
        cleanup();
    }

    #[test]
    fn renaming_a_missing_group_reports_not_found() {
        let service = test_service();
        assert_eq!(
            Err(UpdateTagGroupError::GroupNotFound),
            service.update_tag_group(
                &TagGroup::new("ghost", "#000000"),
                &TagGroup::new("solid", "#ffffff")
            )
        );
        cleanup();
    }
}
