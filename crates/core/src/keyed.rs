//! Keyed changes for cache-style collections.
//!
//! Keyed changes address items by key rather than by position, so they carry
//! no indices.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;

/// The reason a keyed change was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    Add,
    Update,
    Remove,
    /// The value was mutated in place.
    Refresh,
}

/// One atomic edit to a keyed collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedChange<K, V> {
    pub reason: ChangeReason,
    pub key: K,
    /// The value after the change; for `Remove`, the removed value.
    pub current: V,
    /// The replaced value, present only for `Update`.
    pub previous: Option<V>,
}

impl<K, V> KeyedChange<K, V> {
    #[inline]
    pub fn add(key: K, current: V) -> Self {
        Self {
            reason: ChangeReason::Add,
            key,
            current,
            previous: None,
        }
    }

    #[inline]
    pub fn update(key: K, current: V, previous: V) -> Self {
        Self {
            reason: ChangeReason::Update,
            key,
            current,
            previous: Some(previous),
        }
    }

    #[inline]
    pub fn remove(key: K, current: V) -> Self {
        Self {
            reason: ChangeReason::Remove,
            key,
            current,
            previous: None,
        }
    }

    #[inline]
    pub fn refresh(key: K, current: V) -> Self {
        Self {
            reason: ChangeReason::Refresh,
            key,
            current,
            previous: None,
        }
    }
}

/// An ordered batch of keyed changes with running counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedChangeSet<K, V> {
    changes: Vec<KeyedChange<K, V>>,
    adds: usize,
    updates: usize,
    removes: usize,
    refreshes: usize,
}

impl<K, V> Default for KeyedChangeSet<K, V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K, V> KeyedChangeSet<K, V> {
    /// The empty keyed change set.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            changes: Vec::new(),
            adds: 0,
            updates: 0,
            removes: 0,
            refreshes: 0,
        }
    }

    /// Creates a keyed change set from a sequence of changes.
    pub fn from_changes<I>(changes: I) -> Self
    where
        I: IntoIterator<Item = KeyedChange<K, V>>,
    {
        let mut set = Self::empty();
        set.extend(changes);
        set
    }

    /// Appends a change and updates the counters.
    pub fn push(&mut self, change: KeyedChange<K, V>) {
        match change.reason {
            ChangeReason::Add => self.adds += 1,
            ChangeReason::Update => self.updates += 1,
            ChangeReason::Remove => self.removes += 1,
            ChangeReason::Refresh => self.refreshes += 1,
        }
        self.changes.push(change);
    }

    #[inline]
    pub fn adds(&self) -> usize {
        self.adds
    }

    #[inline]
    pub fn updates(&self) -> usize {
        self.updates
    }

    #[inline]
    pub fn removes(&self) -> usize {
        self.removes
    }

    #[inline]
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<&KeyedChange<K, V>> {
        self.changes.last()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, KeyedChange<K, V>> {
        self.changes.iter()
    }
}

impl<K: Ord + Clone, V: Clone> KeyedChangeSet<K, V> {
    /// Replays the changes against a key-ordered mirror.
    pub fn apply_to(&self, target: &mut BTreeMap<K, V>) {
        for change in &self.changes {
            match change.reason {
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {
                    target.insert(change.key.clone(), change.current.clone());
                }
                ChangeReason::Remove => {
                    target.remove(&change.key);
                }
            }
        }
    }
}

impl<K, V> Extend<KeyedChange<K, V>> for KeyedChangeSet<K, V> {
    fn extend<I: IntoIterator<Item = KeyedChange<K, V>>>(&mut self, iter: I) {
        for change in iter {
            self.push(change);
        }
    }
}

impl<K, V> IntoIterator for KeyedChangeSet<K, V> {
    type Item = KeyedChange<K, V>;
    type IntoIter = alloc::vec::IntoIter<KeyedChange<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a KeyedChangeSet<K, V> {
    type Item = &'a KeyedChange<K, V>;
    type IntoIter = core::slice::Iter<'a, KeyedChange<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl<K, V> fmt::Display for KeyedChangeSet<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyedChangeSet. Count={} (adds={}, updates={}, removes={})",
            self.changes.len(),
            self.adds,
            self.updates,
            self.removes
        )
    }
}
