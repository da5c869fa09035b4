//! Change set for list edits.
//!
//! A `ChangeSet` is the ordered batch of changes produced by one edit session,
//! together with aggregate counters that always match a fold over its changes.

use crate::change::{Change, ListChangeReason};
use crate::error::Result;
use alloc::vec::Vec;
use core::fmt;

/// An ordered batch of list changes with running counters.
///
/// Changes can only be appended; the counters are updated in the same step so
/// they never need recomputing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet<T> {
    changes: Vec<Change<T>>,
    adds: usize,
    removes: usize,
    replaced: usize,
    moves: usize,
    refreshes: usize,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> ChangeSet<T> {
    /// The empty change set.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            changes: Vec::new(),
            adds: 0,
            removes: 0,
            replaced: 0,
            moves: 0,
            refreshes: 0,
        }
    }

    /// Creates an empty change set with room for `capacity` changes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: Vec::with_capacity(capacity),
            ..Self::empty()
        }
    }

    /// Creates a change set from a sequence of changes, counting in one pass.
    pub fn from_changes<I>(changes: I) -> Self
    where
        I: IntoIterator<Item = Change<T>>,
    {
        let mut set = Self::empty();
        set.extend(changes);
        set
    }

    /// Appends a change and updates the counters.
    pub fn push(&mut self, change: Change<T>) {
        let count = change.cardinality();
        match change.reason() {
            ListChangeReason::Add | ListChangeReason::AddRange => self.adds += count,
            ListChangeReason::Remove | ListChangeReason::RemoveRange | ListChangeReason::Clear => {
                self.removes += count
            }
            ListChangeReason::Replace => self.replaced += 1,
            ListChangeReason::Moved => self.moves += 1,
            ListChangeReason::Refresh => self.refreshes += 1,
        }
        self.changes.push(change);
    }

    /// Appends every change of `other`.
    pub fn append(&mut self, other: ChangeSet<T>) {
        self.changes.reserve(other.changes.len());
        self.adds += other.adds;
        self.removes += other.removes;
        self.replaced += other.replaced;
        self.moves += other.moves;
        self.refreshes += other.refreshes;
        self.changes.extend(other.changes);
    }

    /// Number of items added.
    #[inline]
    pub fn adds(&self) -> usize {
        self.adds
    }

    /// Number of items removed, including cleared items.
    #[inline]
    pub fn removes(&self) -> usize {
        self.removes
    }

    /// Number of replacements.
    #[inline]
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Number of moves.
    #[inline]
    pub fn moves(&self) -> usize {
        self.moves
    }

    /// Number of in-place refreshes.
    #[inline]
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    /// Total number of atomic item edits across all changes.
    #[inline]
    pub fn total_changes(&self) -> usize {
        self.adds + self.removes + self.replaced + self.moves + self.refreshes
    }

    /// Number of recorded changes (a range counts once).
    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the most recently appended change.
    #[inline]
    pub fn last(&self) -> Option<&Change<T>> {
        self.changes.last()
    }

    /// Returns the change at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Change<T>> {
        self.changes.get(index)
    }

    /// Iterates the changes in the order they were applied.
    pub fn iter(&self) -> core::slice::Iter<'_, Change<T>> {
        self.changes.iter()
    }

    /// Returns the changes as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Change<T>] {
        &self.changes
    }

    /// Maps every item to a new type.
    pub fn map<U, F>(self, mut f: F) -> ChangeSet<U>
    where
        F: FnMut(T) -> U,
    {
        let ChangeSet {
            changes,
            adds,
            removes,
            replaced,
            moves,
            refreshes,
        } = self;
        ChangeSet {
            changes: changes.into_iter().map(|c| c.map(&mut f)).collect(),
            adds,
            removes,
            replaced,
            moves,
            refreshes,
        }
    }
}

impl<T: Clone> ChangeSet<T> {
    /// Creates a change set describing `items` as the initial contents.
    pub fn initial(items: Vec<T>) -> Self {
        let mut set = Self::with_capacity(1);
        if !items.is_empty() {
            set.push(Change::AddRange { items, index: 0 });
        }
        set
    }

    /// Replays every change, in order, against `target`.
    ///
    /// Stops at the first change that does not fit the target.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<()> {
        for change in &self.changes {
            change.apply_to(target)?;
        }
        Ok(())
    }
}

impl<T> Extend<Change<T>> for ChangeSet<T> {
    fn extend<I: IntoIterator<Item = Change<T>>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.changes.reserve(iter.size_hint().0);
        for change in iter {
            self.push(change);
        }
    }
}

impl<T> FromIterator<Change<T>> for ChangeSet<T> {
    fn from_iter<I: IntoIterator<Item = Change<T>>>(iter: I) -> Self {
        Self::from_changes(iter)
    }
}

impl<T> IntoIterator for ChangeSet<T> {
    type Item = Change<T>;
    type IntoIter = alloc::vec::IntoIter<Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ChangeSet<T> {
    type Item = &'a Change<T>;
    type IntoIter = core::slice::Iter<'a, Change<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl<T> fmt::Display for ChangeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChangeSet<{}>. Count={}",
            short_type_name::<T>(),
            self.changes.len()
        )
    }
}

fn short_type_name<T>() -> &'static str {
    let name = core::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}
