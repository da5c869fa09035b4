//! Bounded-size eviction.
//!
//! A `SizeLimiter` watches a store and, once per scheduler tick, evicts the
//! items that have been current the longest until the store is back within
//! capacity. Change sets arriving between ticks are queued and folded in
//! together, so a burst of edits costs at most one eviction edit.

use crate::scheduler::{ImmediateScheduler, Scheduler};
use hashbrown::HashMap;
use parking_lot::Mutex;
use ripple_core::{Change, ChangeReason, ChangeSet, Error, KeyedChangeSet, Result};
use ripple_reactive::{Observer, SourceCache, SourceList, Stream, Subscription, WeakSourceCache, WeakSourceList};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for a size limit.
#[derive(Clone)]
pub struct SizeLimiter {
    capacity: usize,
    window: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl std::fmt::Debug for SizeLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeLimiter")
            .field("capacity", &self.capacity)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl SizeLimiter {
    /// Creates a limiter keeping at most `capacity` items.
    ///
    /// Evictions run synchronously after each edit unless another scheduler
    /// is supplied.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::configuration(
                "capacity",
                "size limit must be greater than zero",
            ));
        }
        Ok(Self {
            capacity,
            window: Duration::ZERO,
            scheduler: Arc::new(ImmediateScheduler::new()),
        })
    }

    /// Delays each eviction pass by `window`, coalescing the edits made in
    /// the meantime.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Runs eviction passes on `scheduler`.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Limits `list`. Evictions stop when the returned subscription is
    /// disposed or the list is dropped.
    pub fn attach_list<T>(&self, list: &SourceList<T>) -> Subscription
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        self.attach(&list.connect(), ListTracker::new(), list.downgrade())
    }

    /// Limits `cache`, evicting the least recently added or updated keys.
    pub fn attach_cache<K, V>(&self, cache: &SourceCache<K, V>) -> Subscription
    where
        K: Ord + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.attach(&cache.connect(), KeyTracker::new(), cache.downgrade())
    }

    fn attach<C, Tr, S>(&self, changes: &Stream<C>, tracker: Tr, store: S) -> Subscription
    where
        C: Clone + Send + 'static,
        Tr: Tracker<Changes = C> + 'static,
        S: Evict<Victim = Tr::Victim> + 'static,
    {
        let core = Arc::new(LimiterCore {
            capacity: self.capacity,
            window: self.window,
            scheduler: Arc::clone(&self.scheduler),
            state: Mutex::new(LimiterState {
                pending: Vec::new(),
                tracker,
            }),
            tick_scheduled: AtomicBool::new(false),
            store,
        });
        changes.subscribe_observer(Arc::new(LimiterObserver(core)))
    }
}

/// Tracks the order in which the items of a store became current.
trait Tracker: Send {
    type Changes;
    type Victim: Send;

    fn track(&mut self, changes: &Self::Changes);

    fn len(&self) -> usize;

    /// The `count` items that have been current the longest.
    fn oldest(&self, count: usize) -> Vec<Self::Victim>;
}

/// A store the limiter can evict from.
trait Evict: Send + Sync {
    type Victim;

    /// Opens one edit session, asks `select` for the victims and removes
    /// them. Returns the number of items removed.
    fn evict<F>(&self, select: F) -> usize
    where
        F: FnOnce() -> Vec<Self::Victim>;
}

struct ListTracker<T> {
    /// Mirror of the list with the sequence at which each item arrived.
    entries: Vec<(u64, T)>,
    /// Sequences of the live entries, oldest first.
    ages: BTreeSet<u64>,
    next_seq: u64,
}

impl<T> ListTracker<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            ages: BTreeSet::new(),
            next_seq: 0,
        }
    }

    fn stamp(&mut self, item: T) -> (u64, T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.ages.insert(seq);
        (seq, item)
    }
}

impl<T: Clone + Send> Tracker for ListTracker<T> {
    type Changes = ChangeSet<T>;
    /// The item and its position in the list.
    type Victim = (usize, T);

    fn track(&mut self, changes: &ChangeSet<T>) {
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let entry = self.stamp(item.clone());
                    self.entries.insert(*index, entry);
                }
                Change::AddRange { items, index } => {
                    let stamped: Vec<(u64, T)> =
                        items.iter().map(|item| self.stamp(item.clone())).collect();
                    self.entries.splice(*index..*index, stamped);
                }
                Change::Replace { current, index, .. } => {
                    let entry = self.stamp(current.clone());
                    let (seq, _) = std::mem::replace(&mut self.entries[*index], entry);
                    self.ages.remove(&seq);
                }
                Change::Refresh { item, index } => self.entries[*index].1 = item.clone(),
                Change::Remove { index, .. } => {
                    let (seq, _) = self.entries.remove(*index);
                    self.ages.remove(&seq);
                }
                Change::RemoveRange { items, index } => {
                    for (seq, _) in self.entries.drain(*index..*index + items.len()) {
                        self.ages.remove(&seq);
                    }
                }
                Change::Moved {
                    previous_index,
                    current_index,
                    ..
                } => {
                    let entry = self.entries.remove(*previous_index);
                    self.entries.insert(*current_index, entry);
                }
                Change::Clear { .. } => {
                    self.entries.clear();
                    self.ages.clear();
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Victims come back in list order.
    fn oldest(&self, count: usize) -> Vec<(usize, T)> {
        let Some(&cutoff) = self.ages.iter().take(count).last() else {
            return Vec::new();
        };
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (seq, _))| *seq <= cutoff)
            .map(|(index, (_, item))| (index, item.clone()))
            .collect()
    }
}

struct KeyTracker<K, V> {
    seqs: HashMap<K, u64>,
    /// The same keys ordered by their sequence.
    by_age: BTreeMap<u64, K>,
    next_seq: u64,
    _values: PhantomData<fn() -> V>,
}

impl<K, V> KeyTracker<K, V> {
    fn new() -> Self {
        Self {
            seqs: HashMap::new(),
            by_age: BTreeMap::new(),
            next_seq: 0,
            _values: PhantomData,
        }
    }
}

impl<K, V> Tracker for KeyTracker<K, V>
where
    K: Hash + Eq + Clone + Send,
{
    type Changes = KeyedChangeSet<K, V>;
    type Victim = K;

    fn track(&mut self, changes: &KeyedChangeSet<K, V>) {
        for change in changes {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    if let Some(previous) = self.seqs.insert(change.key.clone(), seq) {
                        self.by_age.remove(&previous);
                    }
                    self.by_age.insert(seq, change.key.clone());
                }
                ChangeReason::Remove => {
                    if let Some(previous) = self.seqs.remove(&change.key) {
                        self.by_age.remove(&previous);
                    }
                }
                ChangeReason::Refresh => {}
            }
        }
    }

    fn len(&self) -> usize {
        self.seqs.len()
    }

    fn oldest(&self, count: usize) -> Vec<K> {
        self.by_age.values().take(count).cloned().collect()
    }
}

impl<T> Evict for WeakSourceList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Victim = (usize, T);

    fn evict<F>(&self, select: F) -> usize
    where
        F: FnOnce() -> Vec<Self::Victim>,
    {
        let Some(list) = self.upgrade() else {
            return 0;
        };
        list.edit(|editor| {
            let mut positions = Vec::new();
            let mut moved = Vec::new();
            for (index, item) in select() {
                if editor.get(index) == Some(&item) {
                    positions.push(index);
                } else {
                    moved.push(item);
                }
            }
            // Positions go stale only when a change is still queued for
            // delivery behind the one being handled.
            let removed = editor.remove_at_many(positions)?;
            Ok::<_, Error>(removed + editor.remove_many(&moved))
        })
        .unwrap_or_default()
    }
}

impl<K, V> Evict for WeakSourceCache<K, V>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Victim = K;

    fn evict<F>(&self, select: F) -> usize
    where
        F: FnOnce() -> Vec<Self::Victim>,
    {
        let Some(cache) = self.upgrade() else {
            return 0;
        };
        cache
            .edit(|editor| Ok::<_, Error>(editor.remove_keys(&select())))
            .unwrap_or_default()
    }
}

/// Change sets waiting for the next tick, and the tracker they fold into.
/// Kept under one lock so batches are folded in arrival order.
struct LimiterState<C, Tr> {
    pending: Vec<C>,
    tracker: Tr,
}

impl<C, Tr: Tracker<Changes = C>> LimiterState<C, Tr> {
    /// Folds the queued change sets and returns how many items are over
    /// `capacity`.
    fn catch_up(&mut self, capacity: usize) -> usize {
        for changes in self.pending.drain(..) {
            self.tracker.track(&changes);
        }
        self.tracker.len().saturating_sub(capacity)
    }
}

struct LimiterCore<C, Tr, S> {
    capacity: usize,
    window: Duration,
    scheduler: Arc<dyn Scheduler>,
    state: Mutex<LimiterState<C, Tr>>,
    tick_scheduled: AtomicBool,
    store: S,
}

impl<C, Tr, S> LimiterCore<C, Tr, S>
where
    C: Send + 'static,
    Tr: Tracker<Changes = C> + 'static,
    S: Evict<Victim = Tr::Victim> + 'static,
{
    fn enqueue(self: &Arc<Self>, changes: C) {
        self.state.lock().pending.push(changes);
        if self.tick_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let core = Arc::downgrade(self);
        self.scheduler.schedule(
            self.window,
            Box::new(move || {
                if let Some(core) = core.upgrade() {
                    core.tick();
                }
            }),
        );
    }

    fn tick(&self) {
        self.tick_scheduled.store(false, Ordering::Release);
        let surplus = self.state.lock().catch_up(self.capacity);
        if surplus == 0 {
            return;
        }
        // Victims are picked again inside the eviction session: an edit from
        // another thread may have landed since the check above.
        let evicted = self.store.evict(|| {
            let mut state = self.state.lock();
            let surplus = state.catch_up(self.capacity);
            state.tracker.oldest(surplus)
        });
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "evicted surplus items");
        }
    }
}

struct LimiterObserver<C, Tr, S>(Arc<LimiterCore<C, Tr, S>>);

impl<C, Tr, S> Observer<C> for LimiterObserver<C, Tr, S>
where
    C: Clone + Send + 'static,
    Tr: Tracker<Changes = C> + 'static,
    S: Evict<Victim = Tr::Victim> + 'static,
{
    fn on_next(&self, changes: &C) {
        self.0.enqueue(changes.clone());
    }
}

/// Attaches a size limit directly to a store.
pub trait LimitSizeExt {
    /// Keeps the store at or below `capacity` items, evicting on `scheduler`.
    ///
    /// Fails with a configuration error when `capacity` is zero.
    fn limit_size_to(&self, capacity: usize, scheduler: Arc<dyn Scheduler>) -> Result<Subscription>;
}

impl<T> LimitSizeExt for SourceList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn limit_size_to(&self, capacity: usize, scheduler: Arc<dyn Scheduler>) -> Result<Subscription> {
        Ok(SizeLimiter::new(capacity)?
            .with_scheduler(scheduler)
            .attach_list(self))
    }
}

impl<K, V> LimitSizeExt for SourceCache<K, V>
where
    K: Ord + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn limit_size_to(&self, capacity: usize, scheduler: Arc<dyn Scheduler>) -> Result<Subscription> {
        Ok(SizeLimiter::new(capacity)?
            .with_scheduler(scheduler)
            .attach_cache(self))
    }
}
