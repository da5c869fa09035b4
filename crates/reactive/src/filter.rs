//! Predicate-filtered connections.
//!
//! A filtered connection keeps, per subscriber, which source items currently
//! pass the predicate and rewrites every incoming change set into the
//! coordinates of the filtered view.

use crate::stream::Observer;
use parking_lot::Mutex;
use ripple_core::{Change, ChangeReason, ChangeSet, KeyedChange, KeyedChangeSet};
use std::collections::BTreeSet;
use std::sync::Arc;

pub(crate) type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Rewrites change records of the source into change records of a view.
pub(crate) trait Translate<C>: Send {
    /// Returns `None` when nothing in `changes` is visible in the view.
    fn translate(&mut self, changes: &C) -> Option<C>;
}

/// Forwards translated change sets to the downstream observer.
pub(crate) struct FilteredObserver<F, C> {
    filter: Mutex<F>,
    downstream: Arc<dyn Observer<C>>,
}

impl<F, C> FilteredObserver<F, C> {
    pub(crate) fn new(filter: F, downstream: Arc<dyn Observer<C>>) -> Self {
        Self {
            filter: Mutex::new(filter),
            downstream,
        }
    }
}

impl<F, C> Observer<C> for FilteredObserver<F, C>
where
    F: Translate<C>,
{
    fn on_next(&self, changes: &C) {
        let translated = self.filter.lock().translate(changes);
        if let Some(translated) = translated {
            self.downstream.on_next(&translated);
        }
    }

    fn on_completed(&self) {
        self.downstream.on_completed();
    }
}

/// Filter state for list connections: one pass/fail flag per source item.
pub(crate) struct ListFilter<T> {
    predicate: Predicate<T>,
    mask: Vec<bool>,
}

impl<T> ListFilter<T> {
    pub(crate) fn new(predicate: Predicate<T>) -> Self {
        Self {
            predicate,
            mask: Vec::new(),
        }
    }

    /// Position in the filtered view of the source position `index`.
    fn filtered_index(&self, index: usize) -> usize {
        self.mask[..index].iter().filter(|pass| **pass).count()
    }
}

impl<T: Clone + Send> Translate<ChangeSet<T>> for ListFilter<T> {
    fn translate(&mut self, changes: &ChangeSet<T>) -> Option<ChangeSet<T>> {
        let mut out = ChangeSet::empty();
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let pass = (self.predicate)(item);
                    let filtered = self.filtered_index(*index);
                    self.mask.insert(*index, pass);
                    if pass {
                        out.push(Change::Add {
                            item: item.clone(),
                            index: filtered,
                        });
                    }
                }
                Change::AddRange { items, index } => {
                    let filtered = self.filtered_index(*index);
                    let passes: Vec<bool> = items.iter().map(|item| (self.predicate)(item)).collect();
                    let passing = select(items, &passes);
                    self.mask.splice(*index..*index, passes);
                    push_added(&mut out, passing, filtered);
                }
                Change::Replace {
                    previous,
                    current,
                    index,
                } => {
                    let was = self.mask[*index];
                    let now = (self.predicate)(current);
                    let filtered = self.filtered_index(*index);
                    self.mask[*index] = now;
                    match (was, now) {
                        (true, true) => out.push(Change::Replace {
                            previous: previous.clone(),
                            current: current.clone(),
                            index: filtered,
                        }),
                        (true, false) => out.push(Change::Remove {
                            item: previous.clone(),
                            index: filtered,
                        }),
                        (false, true) => out.push(Change::Add {
                            item: current.clone(),
                            index: filtered,
                        }),
                        (false, false) => {}
                    }
                }
                Change::Refresh { item, index } => {
                    let was = self.mask[*index];
                    let now = (self.predicate)(item);
                    let filtered = self.filtered_index(*index);
                    self.mask[*index] = now;
                    let item = item.clone();
                    match (was, now) {
                        (true, true) => out.push(Change::Refresh {
                            item,
                            index: filtered,
                        }),
                        (true, false) => out.push(Change::Remove {
                            item,
                            index: filtered,
                        }),
                        (false, true) => out.push(Change::Add {
                            item,
                            index: filtered,
                        }),
                        (false, false) => {}
                    }
                }
                Change::Remove { item, index } => {
                    let filtered = self.filtered_index(*index);
                    if self.mask.remove(*index) {
                        out.push(Change::Remove {
                            item: item.clone(),
                            index: filtered,
                        });
                    }
                }
                Change::RemoveRange { items, index } => {
                    let filtered = self.filtered_index(*index);
                    let passes: Vec<bool> = self.mask.drain(*index..*index + items.len()).collect();
                    let mut passing = select(items, &passes);
                    match passing.len() {
                        0 => {}
                        1 => out.push(Change::Remove {
                            item: passing.remove(0),
                            index: filtered,
                        }),
                        _ => out.push(Change::RemoveRange {
                            items: passing,
                            index: filtered,
                        }),
                    }
                }
                Change::Moved {
                    item,
                    previous_index,
                    current_index,
                } => {
                    let pass = self.mask[*previous_index];
                    let from = self.filtered_index(*previous_index);
                    self.mask.remove(*previous_index);
                    self.mask.insert(*current_index, pass);
                    let to = self.filtered_index(*current_index);
                    if pass && from != to {
                        out.push(Change::Moved {
                            item: item.clone(),
                            previous_index: from,
                            current_index: to,
                        });
                    }
                }
                Change::Clear { items } => {
                    let passing = select(items, &self.mask);
                    self.mask.clear();
                    if !passing.is_empty() {
                        out.push(Change::Clear { items: passing });
                    }
                }
            }
        }
        (!out.is_empty()).then_some(out)
    }
}

fn select<T: Clone>(items: &[T], passes: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(passes)
        .filter(|(_, pass)| **pass)
        .map(|(item, _)| item.clone())
        .collect()
}

fn push_added<T>(out: &mut ChangeSet<T>, mut items: Vec<T>, index: usize) {
    match items.len() {
        0 => {}
        1 => out.push(Change::Add {
            item: items.remove(0),
            index,
        }),
        _ => out.push(Change::AddRange { items, index }),
    }
}

/// Filter state for cache connections: the keys currently passing.
pub(crate) struct KeyedFilter<K, V> {
    predicate: Predicate<V>,
    passing: BTreeSet<K>,
}

impl<K, V> KeyedFilter<K, V> {
    pub(crate) fn new(predicate: Predicate<V>) -> Self {
        Self {
            predicate,
            passing: BTreeSet::new(),
        }
    }
}

impl<K, V> Translate<KeyedChangeSet<K, V>> for KeyedFilter<K, V>
where
    K: Ord + Clone + Send,
    V: Clone,
{
    fn translate(&mut self, changes: &KeyedChangeSet<K, V>) -> Option<KeyedChangeSet<K, V>> {
        let mut out = KeyedChangeSet::empty();
        for change in changes {
            let key = change.key.clone();
            let current = change.current.clone();
            let was = self.passing.contains(&key);
            match change.reason {
                ChangeReason::Remove => {
                    if self.passing.remove(&key) {
                        out.push(KeyedChange::remove(key, current));
                    }
                    continue;
                }
                ChangeReason::Add | ChangeReason::Update | ChangeReason::Refresh => {}
            }

            let now = (self.predicate)(&current);
            if now {
                self.passing.insert(key.clone());
            } else {
                self.passing.remove(&key);
            }
            match (was, now, change.reason) {
                (true, true, ChangeReason::Refresh) => out.push(KeyedChange::refresh(key, current)),
                (true, true, _) => match change.previous.clone() {
                    Some(previous) => out.push(KeyedChange::update(key, current, previous)),
                    None => out.push(KeyedChange::refresh(key, current)),
                },
                (true, false, _) => {
                    let visible = change.previous.clone().unwrap_or(current);
                    out.push(KeyedChange::remove(key, visible));
                }
                (false, true, _) => out.push(KeyedChange::add(key, current)),
                (false, false, _) => {}
            }
        }
        (!out.is_empty()).then_some(out)
    }
}
