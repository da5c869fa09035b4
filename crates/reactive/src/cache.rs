//! The authoritative observable keyed collection.
//!
//! Values are stored under the key produced by the cache's key selector and
//! are always enumerated in key order, which makes snapshots deterministic.

use crate::filter::{FilteredObserver, KeyedFilter, Predicate};
use crate::hub::{self, Hub};
use crate::stream::{Observer, Stream};
use crate::subscription::Subscription;
use crate::KeyedChangeStream;
use ripple_core::{Error, KeyedChange, KeyedChangeSet, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

type KeySelector<K, V> = Arc<dyn Fn(&V) -> K + Send + Sync>;

struct CacheState<K, V> {
    items: BTreeMap<K, V>,
    key_of: KeySelector<K, V>,
}

type CacheHub<K, V> = Hub<CacheState<K, V>, KeyedChangeSet<K, V>>;

/// The mutable view of a `SourceCache` during an edit session.
pub struct CacheEditor<'a, K, V> {
    items: &'a mut BTreeMap<K, V>,
    key_of: &'a KeySelector<K, V>,
    changes: KeyedChangeSet<K, V>,
    /// Previous value per touched key, oldest first.
    journal: Vec<(K, Option<V>)>,
}

impl<'a, K: Ord + Clone, V: Clone> CacheEditor<'a, K, V> {
    fn new(state: &'a mut CacheState<K, V>) -> Self {
        Self {
            items: &mut state.items,
            key_of: &state.key_of,
            changes: KeyedChangeSet::empty(),
            journal: Vec::new(),
        }
    }

    /// Inserts `value` under its key, replacing any existing value.
    pub fn add_or_update(&mut self, value: V) {
        let key = (self.key_of)(&value);
        match self.items.insert(key.clone(), value.clone()) {
            Some(previous) => {
                self.changes
                    .push(KeyedChange::update(key.clone(), value, previous.clone()));
                self.journal.push((key, Some(previous)));
            }
            None => {
                self.changes.push(KeyedChange::add(key.clone(), value));
                self.journal.push((key, None));
            }
        }
    }

    pub fn add_or_update_many<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = V>,
    {
        for value in values {
            self.add_or_update(value);
        }
    }

    /// Removes the value stored under `key`.
    pub fn remove_key(&mut self, key: &K) -> Option<V> {
        let removed = self.items.remove(key)?;
        self.changes
            .push(KeyedChange::remove(key.clone(), removed.clone()));
        self.journal.push((key.clone(), Some(removed.clone())));
        Some(removed)
    }

    /// Removes every listed key that is present. Returns the number removed.
    pub fn remove_keys<'k, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'k K>,
        K: 'k,
    {
        keys.into_iter()
            .filter(|key| self.remove_key(key).is_some())
            .count()
    }

    /// Signals that the value under `key` should be re-evaluated downstream.
    pub fn refresh_key(&mut self, key: &K) -> Result<()> {
        let value = self.items.get(key).ok_or(Error::ItemNotFound)?;
        self.changes
            .push(KeyedChange::refresh(key.clone(), value.clone()));
        Ok(())
    }

    /// Mutates the value under `key` in place and records a refresh.
    ///
    /// The mutation must not change the value's key.
    pub fn modify<F>(&mut self, key: &K, f: F) -> Result<()>
    where
        F: FnOnce(&mut V),
    {
        let value = self.items.get_mut(key).ok_or(Error::ItemNotFound)?;
        // Journaled first: `f` may panic halfway through.
        self.journal.push((key.clone(), Some(value.clone())));
        f(value);
        if (self.key_of)(value) != *key {
            if let Some((_, Some(before))) = self.journal.pop() {
                *value = before;
            }
            return Err(Error::invalid_operation("modify must not change the key"));
        }
        let current = value.clone();
        self.changes.push(KeyedChange::refresh(key.clone(), current));
        Ok(())
    }

    /// Removes every value.
    pub fn clear(&mut self) {
        for (key, value) in std::mem::take(&mut *self.items) {
            self.changes
                .push(KeyedChange::remove(key.clone(), value.clone()));
            self.journal.push((key, Some(value)));
        }
    }

    pub fn lookup(&self, key: &K) -> Option<&V> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.items.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.items.values()
    }

    fn finish(self) -> KeyedChangeSet<K, V> {
        self.changes
    }

    fn rollback(&mut self) {
        for (key, previous) in self.journal.drain(..).rev() {
            match previous {
                Some(value) => {
                    self.items.insert(key, value);
                }
                None => {
                    self.items.remove(&key);
                }
            }
        }
        self.changes = KeyedChangeSet::empty();
    }
}

/// An observable keyed collection of record.
pub struct SourceCache<K, V> {
    hub: Arc<CacheHub<K, V>>,
}

impl<K, V> Clone for SourceCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<K, V> SourceCache<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache that stores each value under `key_of(value)`.
    pub fn new<F>(key_of: F) -> Self
    where
        F: Fn(&V) -> K + Send + Sync + 'static,
    {
        Self {
            hub: Arc::new(Hub::new(CacheState {
                items: BTreeMap::new(),
                key_of: Arc::new(key_of),
            })),
        }
    }

    /// Runs one edit session. On `Err` the session is rolled back and
    /// nothing is published.
    ///
    /// # Panics
    ///
    /// A panic inside `mutator` rolls the session back and is then resumed.
    /// This includes reading the cache itself from inside `mutator`.
    pub fn edit<R, E, F>(&self, mutator: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut CacheEditor<'_, K, V>) -> std::result::Result<R, E>,
    {
        self.run_session(mutator, false)
    }

    /// Runs one edit session; on failure the applied changes are kept and
    /// published, then `on_error` receives the error.
    pub fn edit_with<E, F, H>(&self, mutator: F, on_error: H)
    where
        F: FnOnce(&mut CacheEditor<'_, K, V>) -> std::result::Result<(), E>,
        H: FnOnce(E),
    {
        if let Err(error) = self.run_session(mutator, true) {
            on_error(error);
        }
    }

    fn run_session<R, E, F>(&self, mutator: F, keep_partial: bool) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut CacheEditor<'_, K, V>) -> std::result::Result<R, E>,
    {
        self.hub.session(|state| {
            let mut editor = CacheEditor::new(state);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| mutator(&mut editor)));
            match outcome {
                Ok(Ok(value)) => {
                    let changes = editor.finish();
                    debug!(%changes, "cache edit session committed");
                    (Ok(value), non_empty(changes))
                }
                Ok(Err(error)) if keep_partial => {
                    let changes = editor.finish();
                    warn!(%changes, "cache edit session failed; keeping applied changes");
                    (Err(error), non_empty(changes))
                }
                Ok(Err(error)) => {
                    editor.rollback();
                    (Err(error), None)
                }
                Err(payload) => {
                    editor.rollback();
                    warn!("cache edit session panicked; rolled back");
                    panic::resume_unwind(payload)
                }
            }
        })
    }

    /// Connects to the cache. Each subscriber first receives one `Add` per
    /// entry, in key order.
    ///
    /// # Panics
    ///
    /// Subscribing to the stream from inside one of this cache's own edit
    /// sessions panics.
    pub fn connect(&self) -> KeyedChangeStream<K, V> {
        let weak = Arc::downgrade(&self.hub);
        Stream::new(move |observer: Arc<dyn Observer<KeyedChangeSet<K, V>>>| {
            let Some(hub) = weak.upgrade() else {
                observer.on_completed();
                return Subscription::empty();
            };
            hub::attach(&hub, |state: &CacheState<K, V>| (observer, snapshot(&state.items)))
        })
    }

    /// Connects to the values matching `predicate`.
    ///
    /// # Panics
    ///
    /// Same as [`connect`](Self::connect).
    pub fn connect_where<P>(&self, predicate: P) -> KeyedChangeStream<K, V>
    where
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(&self.hub);
        let predicate: Predicate<V> = Arc::new(predicate);
        Stream::new(move |observer: Arc<dyn Observer<KeyedChangeSet<K, V>>>| {
            let Some(hub) = weak.upgrade() else {
                observer.on_completed();
                return Subscription::empty();
            };
            let filter = KeyedFilter::new(Arc::clone(&predicate));
            hub::attach(&hub, |state: &CacheState<K, V>| {
                let filtered: Arc<dyn Observer<KeyedChangeSet<K, V>>> =
                    Arc::new(FilteredObserver::new(filter, observer));
                (filtered, snapshot(&state.items))
            })
        })
    }

    /// Returns a copy of the committed value under `key`.
    ///
    /// # Panics
    ///
    /// Panics when called from inside one of this cache's own edit sessions.
    /// Use [`CacheEditor::lookup`] there; the same holds for every reader
    /// below.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.hub.read(|state| state.items.get(key).cloned())
    }

    /// Returns the values in key order.
    ///
    /// # Panics
    ///
    /// Same as [`lookup`](Self::lookup).
    pub fn items(&self) -> Vec<V> {
        self.hub.read(|state| state.items.values().cloned().collect())
    }

    /// Returns the keys in order.
    ///
    /// # Panics
    ///
    /// Same as [`lookup`](Self::lookup).
    pub fn keys(&self) -> Vec<K> {
        self.hub.read(|state| state.items.keys().cloned().collect())
    }

    /// # Panics
    ///
    /// Same as [`lookup`](Self::lookup).
    pub fn len(&self) -> usize {
        self.hub.read(|state| state.items.len())
    }

    /// # Panics
    ///
    /// Same as [`lookup`](Self::lookup).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or replaces one value in its own session.
    pub fn add_or_update(&self, value: V) {
        let _ = self.edit(|editor| {
            editor.add_or_update(value);
            Ok::<_, Error>(())
        });
    }

    /// Removes one key in its own session.
    pub fn remove_key(&self, key: &K) -> Option<V> {
        self.edit(|editor| Ok::<_, Error>(editor.remove_key(key)))
            .ok()
            .flatten()
    }

    /// Completes every subscriber; new connections complete immediately.
    pub fn dispose(&self) {
        debug!("cache disposed");
        self.hub.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.hub.is_disposed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn downgrade(&self) -> WeakSourceCache<K, V> {
        WeakSourceCache {
            hub: Arc::downgrade(&self.hub),
        }
    }
}

impl<K, V> fmt::Debug for SourceCache<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCache")
            .field("len", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A non-owning handle to a `SourceCache`.
pub struct WeakSourceCache<K, V> {
    hub: Weak<CacheHub<K, V>>,
}

impl<K, V> Clone for WeakSourceCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            hub: Weak::clone(&self.hub),
        }
    }
}

impl<K, V> WeakSourceCache<K, V> {
    pub fn upgrade(&self) -> Option<SourceCache<K, V>> {
        self.hub.upgrade().map(|hub| SourceCache { hub })
    }
}

fn snapshot<K: Clone, V: Clone>(items: &BTreeMap<K, V>) -> Option<KeyedChangeSet<K, V>> {
    non_empty(KeyedChangeSet::from_changes(
        items
            .iter()
            .map(|(key, value)| KeyedChange::add(key.clone(), value.clone())),
    ))
}

fn non_empty<K, V>(changes: KeyedChangeSet<K, V>) -> Option<KeyedChangeSet<K, V>> {
    (!changes.is_empty()).then_some(changes)
}
