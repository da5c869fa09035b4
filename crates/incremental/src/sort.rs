//! Incremental sort.
//!
//! `Sorter` maintains a sorted projection of an upstream list and translates
//! every upstream change set into the minimal change set against that
//! projection, using binary search instead of re-sorting.

use crate::comparer::SortComparer;
use crate::operator::Transform;
use core::cmp::Ordering;
use core::fmt;
use ripple_core::{Change, ChangeSet};

#[derive(Clone, Debug)]
struct Entry<T> {
    /// Arrival order; breaks ties between items the comparer deems equal.
    seq: u64,
    item: T,
}

/// Sorted projection of an upstream list.
pub struct Sorter<T> {
    comparer: SortComparer<T>,
    /// Upstream order, so upstream indices can be resolved to items.
    source: Vec<Entry<T>>,
    sorted: Vec<Entry<T>>,
    next_seq: u64,
}

impl<T: Clone + 'static> Sorter<T> {
    pub fn new(comparer: SortComparer<T>) -> Self {
        Self {
            comparer,
            source: Vec::new(),
            sorted: Vec::new(),
            next_seq: 0,
        }
    }

    /// Returns the sorted items.
    pub fn items(&self) -> Vec<T> {
        self.sorted.iter().map(|entry| entry.item.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Folds an upstream change set into the projection and returns the
    /// changes it caused downstream.
    ///
    /// Panics if `changes` does not apply to the upstream state this sorter
    /// has seen.
    pub fn process(&mut self, changes: &ChangeSet<T>) -> ChangeSet<T> {
        let mut out = ChangeSet::with_capacity(changes.len());
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let entry = self.new_entry(item.clone());
                    self.source.insert(*index, entry.clone());
                    self.insert_sorted(entry, &mut out);
                }
                Change::AddRange { items, index } => {
                    let entries: Vec<Entry<T>> =
                        items.iter().map(|item| self.new_entry(item.clone())).collect();
                    self.source.splice(*index..*index, entries.iter().cloned());
                    if self.sorted.is_empty() {
                        self.sorted = entries;
                        let comparer = &self.comparer;
                        self.sorted.sort_by(|a, b| compare_entries(comparer, a, b));
                        out.push(Change::AddRange {
                            items: self.items(),
                            index: 0,
                        });
                    } else {
                        for entry in entries {
                            self.insert_sorted(entry, &mut out);
                        }
                    }
                }
                Change::Replace {
                    previous,
                    current,
                    index,
                } => {
                    let (from, to) = self.update(*index, current);
                    out.push(Change::Replace {
                        previous: previous.clone(),
                        current: current.clone(),
                        index: from,
                    });
                    push_move(&mut out, current, from, to);
                }
                Change::Refresh { item, index } => {
                    let (from, to) = self.update(*index, item);
                    out.push(Change::Refresh {
                        item: item.clone(),
                        index: from,
                    });
                    push_move(&mut out, item, from, to);
                }
                Change::Remove { index, .. } => {
                    self.check_source(*index, 1);
                    let entry = self.source.remove(*index);
                    let position = self.locate(&entry);
                    let removed = self.sorted.remove(position);
                    out.push(Change::Remove {
                        item: removed.item,
                        index: position,
                    });
                }
                Change::RemoveRange { items, index } => {
                    self.check_source(*index, items.len());
                    let removed: Vec<Entry<T>> =
                        self.source.drain(*index..*index + items.len()).collect();
                    if removed.len() == self.sorted.len() {
                        self.clear_into(&mut out);
                        continue;
                    }
                    for entry in removed {
                        let position = self.locate(&entry);
                        let removed = self.sorted.remove(position);
                        out.push(Change::Remove {
                            item: removed.item,
                            index: position,
                        });
                    }
                }
                Change::Moved {
                    previous_index,
                    current_index,
                    ..
                } => {
                    // Upstream order does not affect the projection.
                    self.check_source(*previous_index, 1);
                    let entry = self.source.remove(*previous_index);
                    self.source.insert(*current_index, entry);
                }
                Change::Clear { .. } => {
                    self.source.clear();
                    self.clear_into(&mut out);
                }
            }
        }
        out
    }

    fn new_entry(&mut self, item: T) -> Entry<T> {
        let seq = self.next_seq;
        self.next_seq += 1;
        Entry { seq, item }
    }

    /// Replaces the item at upstream `index`, keeping its arrival order.
    /// Returns its sorted position before and after.
    fn update(&mut self, index: usize, item: &T) -> (usize, usize) {
        self.check_source(index, 1);
        let seq = self.source[index].seq;
        let from = self.locate(&self.source[index]);
        self.source[index].item = item.clone();
        self.sorted.remove(from);
        let entry = Entry {
            seq,
            item: item.clone(),
        };
        let to = self.insertion_point(&entry);
        self.sorted.insert(to, entry);
        (from, to)
    }

    fn check_source(&self, index: usize, count: usize) {
        if index + count > self.source.len() {
            desync(format_args!(
                "upstream range {}..{} exceeds {} items",
                index,
                index + count,
                self.source.len()
            ));
        }
    }

    fn insert_sorted(&mut self, entry: Entry<T>, out: &mut ChangeSet<T>) {
        let position = self.insertion_point(&entry);
        out.push(Change::Add {
            item: entry.item.clone(),
            index: position,
        });
        self.sorted.insert(position, entry);
    }

    fn clear_into(&mut self, out: &mut ChangeSet<T>) {
        if self.sorted.is_empty() {
            return;
        }
        let items = self.sorted.drain(..).map(|entry| entry.item).collect();
        out.push(Change::Clear { items });
    }

    fn insertion_point(&self, entry: &Entry<T>) -> usize {
        let comparer = &self.comparer;
        self.sorted
            .binary_search_by(|probe| compare_entries(comparer, probe, entry))
            .unwrap_or_else(|position| position)
    }

    /// Sorted position of an entry known to be in the projection.
    fn locate(&self, entry: &Entry<T>) -> usize {
        let comparer = &self.comparer;
        match self
            .sorted
            .binary_search_by(|probe| compare_entries(comparer, probe, entry))
        {
            Ok(position) => position,
            Err(_) => desync(format_args!("entry #{} not found", entry.seq)),
        }
    }
}

impl<T: Clone + Send + 'static> Transform<ChangeSet<T>> for Sorter<T> {
    type Out = ChangeSet<T>;

    fn apply(&mut self, changes: &ChangeSet<T>) -> Option<ChangeSet<T>> {
        let out = self.process(changes);
        (!out.is_empty()).then_some(out)
    }
}

fn compare_entries<T: 'static>(comparer: &SortComparer<T>, a: &Entry<T>, b: &Entry<T>) -> Ordering {
    comparer
        .compare(&a.item, &b.item)
        .then_with(|| a.seq.cmp(&b.seq))
}

fn desync(detail: fmt::Arguments<'_>) -> ! {
    panic!("sorted projection is out of sync with its source: {detail}")
}

fn push_move<T: Clone>(out: &mut ChangeSet<T>, item: &T, from: usize, to: usize) {
    if from != to {
        out.push(Change::Moved {
            item: item.clone(),
            previous_index: from,
            current_index: to,
        });
    }
}
