use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::events::{lock_or_recover, ChangeEvent, EventBus, SubscriptionId};
use crate::model::error::store_errors::StoreError;
use crate::model::{TrackedFile, UntrackedFile};
use crate::search::SearchPredicate;
use crate::service::metadata_service::MetadataService;

/// the folders, predicates and untracked-merge flag deciding which files a
/// [VisibleFilesIndex] holds. An empty `source_folders` list means every tracked
/// file regardless of folder, and contributes no untracked listings
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ViewScope {
    pub source_folders: Vec<String>,
    pub predicates: Vec<SearchPredicate>,
    pub include_untracked: bool,
}

/// one entry of the merged view. A tracked entry always wins over an untracked
/// entry with the same path
#[derive(Debug, PartialEq, Clone)]
pub enum VisibleFile {
    Tracked(TrackedFile),
    Untracked(UntrackedFile),
}

impl VisibleFile {
    pub fn path(&self) -> &str {
        match self {
            VisibleFile::Tracked(file) => &file.path,
            VisibleFile::Untracked(file) => &file.path,
        }
    }
}

/// delta pushed to index observers; never a whole-collection copy
#[derive(Debug, PartialEq, Clone)]
pub enum IndexDiff {
    Inserted(VisibleFile),
    Updated(VisibleFile),
    Removed(String),
}

struct IndexState {
    scope: ViewScope,
    entries: BTreeMap<String, VisibleFile>,
}

/// The live merged set of files for one [ViewScope].
///
/// Loads tracked files once, merges in untracked files from the filesystem when
/// asked to, and afterwards keeps itself correct purely from the metadata
/// service's change events - the store is never re-queried for a mutation it
/// already announced. Scope changes reload no more than they have to.
///
/// Dropping the index unsubscribes it from the change stream. Diff callbacks
/// run while the cache lock is held and must not call back into the index.
pub struct VisibleFilesIndex {
    service: Arc<MetadataService>,
    state: Arc<Mutex<IndexState>>,
    diffs: Arc<EventBus<IndexDiff>>,
    subscription: SubscriptionId,
}

impl VisibleFilesIndex {
    /// builds the index for `scope` and subscribes it to the service's change
    /// stream for its whole lifetime
    pub fn new(
        service: Arc<MetadataService>,
        scope: ViewScope,
    ) -> Result<VisibleFilesIndex, StoreError> {
        let entries = load_scope(&service, &scope)?;
        let state = Arc::new(Mutex::new(IndexState { scope, entries }));
        let diffs: Arc<EventBus<IndexDiff>> = Arc::new(EventBus::new());
        let subscription = {
            let state = Arc::clone(&state);
            let diffs = Arc::clone(&diffs);
            service.subscribe_changes(Box::new(move |event| {
                let mut state = lock_or_recover(&state);
                apply_event(&mut state, event, &diffs);
            }))
        };
        Ok(VisibleFilesIndex {
            service,
            state,
            diffs,
            subscription,
        })
    }

    /// replaces the predicate set and reloads the whole scope
    pub fn set_search_parameters(
        &self,
        predicates: Vec<SearchPredicate>,
    ) -> Result<(), StoreError> {
        let mut state = lock_or_recover(&self.state);
        state.scope.predicates = predicates;
        self.reload(&mut state)
    }

    /// adds `path` as a source folder, loading only that directory's files
    pub fn add_directory(&self, path: &str) -> Result<(), StoreError> {
        let mut state = lock_or_recover(&self.state);
        if state.scope.source_folders.iter().any(|folder| folder == path) {
            log::warn!("Folder {path} is already part of this view; nothing to do");
            return Ok(());
        }
        state.scope.source_folders.push(path.to_string());
        let folder = vec![path.to_string()];
        let files = self.service.get_files(&state.scope.predicates, &folder)?;
        for file in files {
            upsert(&mut state, VisibleFile::Tracked(file), &self.diffs);
        }
        if state.scope.include_untracked && state.scope.predicates.is_empty() {
            self.merge_untracked(&mut state, path);
        }
        Ok(())
    }

    /// removes `path` as a source folder, evicting only that directory's entries
    pub fn remove_directory(&self, path: &str) {
        let mut state = lock_or_recover(&self.state);
        state.scope.source_folders.retain(|folder| folder != path);
        evict_directory(&mut state, path, &self.diffs);
    }

    /// clears the source folder list, widening the view to every tracked file
    pub fn show_all_tracked_files(&self) -> Result<(), StoreError> {
        let mut state = lock_or_recover(&self.state);
        state.scope.source_folders.clear();
        self.reload(&mut state)
    }

    /// a point-in-time copy of the visible files, keyed order (by path)
    pub fn files(&self) -> Vec<VisibleFile> {
        let state = lock_or_recover(&self.state);
        state.entries.values().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<VisibleFile> {
        let state = lock_or_recover(&self.state);
        state.entries.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        lock_or_recover(&self.state).entries.is_empty()
    }

    pub fn scope(&self) -> ViewScope {
        lock_or_recover(&self.state).scope.clone()
    }

    /// registers `callback` for pushed diffs. The callback runs under the cache
    /// lock and must not call back into this index
    pub fn subscribe_diffs(&self, callback: Box<dyn Fn(&IndexDiff) + Send>) -> SubscriptionId {
        self.diffs.subscribe(callback)
    }

    pub fn unsubscribe_diffs(&self, id: SubscriptionId) {
        self.diffs.unsubscribe(id);
    }

    /// reloads the whole scope and pushes only the delta between the generations
    fn reload(&self, state: &mut IndexState) -> Result<(), StoreError> {
        let fresh = load_scope(&self.service, &state.scope)?;
        let previous = std::mem::replace(&mut state.entries, fresh);
        for path in previous.keys() {
            if !state.entries.contains_key(path) {
                self.diffs.publish(&IndexDiff::Removed(path.clone()));
            }
        }
        for (path, entry) in state.entries.iter() {
            match previous.get(path) {
                None => self.diffs.publish(&IndexDiff::Inserted(entry.clone())),
                Some(old) if old != entry => {
                    self.diffs.publish(&IndexDiff::Updated(entry.clone()))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn merge_untracked(&self, state: &mut IndexState, folder: &str) {
        let listed = match self.service.list_folder(folder) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Failed to list {folder} for untracked files! Error is {e:?}");
                return;
            }
        };
        for file_ref in listed {
            if !state.entries.contains_key(&file_ref.path) {
                let entry = VisibleFile::Untracked(UntrackedFile {
                    path: file_ref.path,
                    name: file_ref.name,
                });
                state.entries.insert(entry.path().to_string(), entry.clone());
                self.diffs.publish(&IndexDiff::Inserted(entry));
            }
        }
    }
}

impl Drop for VisibleFilesIndex {
    fn drop(&mut self) {
        self.service.unsubscribe_changes(self.subscription);
    }
}

/// loads everything `scope` covers: tracked files first, then untracked files
/// from each source folder (tag predicates can never match a tag-less untracked
/// file, so listing is skipped entirely while predicates are active)
fn load_scope(
    service: &MetadataService,
    scope: &ViewScope,
) -> Result<BTreeMap<String, VisibleFile>, StoreError> {
    let mut entries: BTreeMap<String, VisibleFile> = BTreeMap::new();
    let files = service.get_files(&scope.predicates, &scope.source_folders)?;
    for file in files {
        entries.insert(file.path.clone(), VisibleFile::Tracked(file));
    }
    if scope.include_untracked && scope.predicates.is_empty() {
        for folder in &scope.source_folders {
            let listed = match service.list_folder(folder) {
                Ok(listed) => listed,
                Err(e) => {
                    log::warn!("Failed to list {folder} for untracked files! Error is {e:?}");
                    continue;
                }
            };
            for file_ref in listed {
                // tracked entries always win over untracked entries for the same path
                entries.entry(file_ref.path.clone()).or_insert_with(|| {
                    VisibleFile::Untracked(UntrackedFile {
                        path: file_ref.path,
                        name: file_ref.name,
                    })
                });
            }
        }
    }
    Ok(entries)
}

fn apply_event(state: &mut IndexState, event: &ChangeEvent, diffs: &EventBus<IndexDiff>) {
    match event {
        ChangeEvent::TagAdded { tag, paths } => {
            for path in paths {
                // a file already in view stays in view even if the new tag makes it
                // stop matching the active predicates; tag-add only ever adds
                if let Some(VisibleFile::Tracked(file)) = state.entries.get(path) {
                    if file.tags.iter().any(|existing| existing.same_instance(tag)) {
                        continue;
                    }
                    let mut patched = file.clone();
                    patched.tags.push(tag.clone());
                    upsert(state, VisibleFile::Tracked(patched), diffs);
                }
            }
        }
        ChangeEvent::FileAdded(file) => {
            if !folder_in_scope(&state.scope, &file.path) {
                return;
            }
            if !SearchPredicate::matches_all(&state.scope.predicates, &file.tags) {
                return;
            }
            upsert(state, VisibleFile::Tracked(file.clone()), diffs);
        }
        ChangeEvent::FileUpdated(file) => {
            // only the description travels on this event; the tag set stays as-is
            if let Some(VisibleFile::Tracked(existing)) = state.entries.get(&file.path) {
                let mut patched = existing.clone();
                patched.description = file.description.clone();
                upsert(state, VisibleFile::Tracked(patched), diffs);
            }
        }
        ChangeEvent::FolderRemoved { path } => {
            evict_directory(state, path, diffs);
        }
        // tag removal and group changes never alter view membership
        ChangeEvent::TagRemoved { .. }
        | ChangeEvent::TagGroupAdded(_)
        | ChangeEvent::TagGroupUpdated { .. } => {}
    }
}

fn upsert(state: &mut IndexState, entry: VisibleFile, diffs: &EventBus<IndexDiff>) {
    let previous = state
        .entries
        .insert(entry.path().to_string(), entry.clone());
    let diff = if previous.is_some() {
        IndexDiff::Updated(entry)
    } else {
        IndexDiff::Inserted(entry)
    };
    diffs.publish(&diff);
}

fn evict_directory(state: &mut IndexState, directory: &str, diffs: &EventBus<IndexDiff>) {
    let evicted: Vec<String> = state
        .entries
        .keys()
        .filter(|path| parent_directory(path).as_deref() == Some(directory))
        .cloned()
        .collect();
    for path in evicted {
        state.entries.remove(&path);
        diffs.publish(&IndexDiff::Removed(path));
    }
}

fn folder_in_scope(scope: &ViewScope, file_path: &str) -> bool {
    if scope.source_folders.is_empty() {
        return true;
    }
    match parent_directory(file_path) {
        Some(parent) => scope
            .source_folders
            .iter()
            .any(|folder| *folder == parent),
        None => false,
    }
}

fn parent_directory(path: &str) -> Option<String> {
    Path::new(path)
        .parent()
        .map(|parent| parent.to_string_lossy().to_string())
}
