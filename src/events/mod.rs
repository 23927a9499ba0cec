use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use crate::model::{Tag, TagGroup, TrackedFile};

/// notification emitted by the metadata service after each durable mutation.
/// Every variant carries owned clones so each derived cache applies its own
/// copy-on-write update instead of sharing a mutable collection
#[derive(Debug, PartialEq, Clone)]
pub enum ChangeEvent {
    /// a file gained a persisted row while its folder was being tracked
    FileAdded(TrackedFile),
    /// a file's description changed. The tag set on this payload is always empty;
    /// tag changes travel on the tag events only
    FileUpdated(TrackedFile),
    /// one tag was attached to every path in `paths`
    TagAdded { tag: Tag, paths: Vec<String> },
    /// one tag was removed from every path in `paths`
    TagRemoved { tag: Tag, paths: Vec<String> },
    TagGroupAdded(TagGroup),
    /// `original` carries the pre-edit group so subscribers can locate-and-replace by old name
    TagGroupUpdated { original: TagGroup, updated: TagGroup },
    /// a folder was untracked; its file rows are already gone from the store
    FolderRemoved { path: String },
}

/// advisory progress notification while tracking a batch of folders
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TrackProgress {
    pub completed: usize,
    pub total: usize,
}

/// handle returned by the subscribe functions, used to unsubscribe later
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SubscriptionId(u64);

/// locks `mutex`, recovering the inner value if a panicking thread poisoned it
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("A lock was poisoned by a panicking thread! Continuing...");
            poisoned.into_inner()
        }
    }
}

struct Subscriber<T> {
    id: u64,
    callback: Box<dyn Fn(&T) + Send>,
}

struct BusState<T> {
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
}

/// in-process publish/subscribe registry with ordered, synchronous delivery.
///
/// Publishing holds the registry lock for the whole delivery round, so every
/// subscriber sees events in publish order and a derived cache updated from a
/// callback is never observed mid-update. Callbacks must not call back into
/// the same bus.
pub struct EventBus<T> {
    state: Mutex<BusState<T>>,
}

impl<T> EventBus<T> {
    pub fn new() -> EventBus<T> {
        EventBus {
            state: Mutex::new(BusState {
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn subscribe(&self, callback: Box<dyn Fn(&T) + Send>) -> SubscriptionId {
        let mut state = lock_or_recover(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push(Subscriber { id, callback });
        SubscriptionId(id)
    }

    /// removes a subscriber. Unknown ids are ignored
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = lock_or_recover(&self.state);
        state.subscribers.retain(|subscriber| subscriber.id != id.0);
    }

    pub fn publish(&self, event: &T) {
        let state = lock_or_recover(&self.state);
        for subscriber in state.subscribers.iter() {
            (subscriber.callback)(event);
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        EventBus::new()
    }
}

struct SetSubscriber {
    id: u64,
    callback: Box<dyn Fn(&[String]) + Send>,
}

struct ObservableSetState {
    values: BTreeSet<String>,
    next_id: u64,
    subscribers: Vec<SetSubscriber>,
}

/// a set of paths whose membership can be observed.
///
/// Mutation and subscription take the same lock, so a new subscriber receives
/// exactly one snapshot of the membership as of subscribe time and then every
/// later change - nothing is missed and nothing arrives twice.
pub struct ObservableSet {
    state: Mutex<ObservableSetState>,
}

impl ObservableSet {
    pub fn new(initial: impl IntoIterator<Item = String>) -> ObservableSet {
        ObservableSet {
            state: Mutex::new(ObservableSetState {
                values: initial.into_iter().collect(),
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        lock_or_recover(&self.state).values.contains(value)
    }

    pub fn snapshot(&self) -> Vec<String> {
        lock_or_recover(&self.state).values.iter().cloned().collect()
    }

    /// adds `value`, notifying subscribers when the membership actually changed
    pub fn insert(&self, value: &str) -> bool {
        let mut state = lock_or_recover(&self.state);
        let changed = state.values.insert(value.to_string());
        if changed {
            notify(&state);
        }
        changed
    }

    /// removes every path in `values`, notifying subscribers when the membership actually changed
    pub fn remove_all(&self, values: &[String]) -> bool {
        let mut state = lock_or_recover(&self.state);
        let mut changed = false;
        for value in values {
            changed |= state.values.remove(value);
        }
        if changed {
            notify(&state);
        }
        changed
    }

    /// registers `callback` and immediately delivers the current membership to it
    pub fn subscribe(&self, callback: Box<dyn Fn(&[String]) + Send>) -> SubscriptionId {
        let mut state = lock_or_recover(&self.state);
        let current: Vec<String> = state.values.iter().cloned().collect();
        callback(&current);
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push(SetSubscriber { id, callback });
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = lock_or_recover(&self.state);
        state.subscribers.retain(|subscriber| subscriber.id != id.0);
    }
}

fn notify(state: &ObservableSetState) {
    let current: Vec<String> = state.values.iter().cloned().collect();
    for subscriber in state.subscribers.iter() {
        (subscriber.callback)(&current);
    }
}
