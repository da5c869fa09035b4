//! Mutable handle used inside list edit sessions.
//!
//! Every structural operation is applied to the list immediately, recorded in
//! the session's change set, and journaled so a failed session can be rolled
//! back.

use ripple_core::{Change, ChangeSet, Error, Result};
use std::mem;

/// Inverse of one applied operation.
#[derive(Debug)]
enum Undo<T> {
    /// Remove `count` items starting at `index`.
    Remove { index: usize, count: usize },
    /// Reinsert `items` at `index`.
    Insert { index: usize, items: Vec<T> },
    /// Put `item` back at `index`.
    Restore { index: usize, item: T },
    /// Move the item at `from` back to `to`.
    Move { from: usize, to: usize },
}

/// The mutable view of a `SourceList` during an edit session.
pub struct ListEditor<'a, T> {
    items: &'a mut Vec<T>,
    changes: ChangeSet<T>,
    journal: Vec<Undo<T>>,
}

impl<'a, T: Clone> ListEditor<'a, T> {
    pub(crate) fn new(items: &'a mut Vec<T>) -> Self {
        Self {
            items,
            changes: ChangeSet::empty(),
            journal: Vec::new(),
        }
    }

    /// Returns the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns the current items.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the changes recorded so far in this session.
    #[inline]
    pub fn changes(&self) -> &ChangeSet<T> {
        &self.changes
    }

    /// Appends an item.
    pub fn add(&mut self, item: T) {
        let index = self.items.len();
        self.items.push(item.clone());
        self.changes.push(Change::Add { item, index });
        self.journal.push(Undo::Remove { index, count: 1 });
    }

    /// Appends a range of items as one change.
    pub fn add_range<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let index = self.items.len();
        // Appending is always in range.
        let _ = self.insert_range(items, index);
    }

    /// Inserts an item at `index`.
    pub fn insert(&mut self, index: usize, item: T) -> Result<()> {
        check_insert(index, self.items.len())?;
        self.items.insert(index, item.clone());
        self.changes.push(Change::Add { item, index });
        self.journal.push(Undo::Remove { index, count: 1 });
        Ok(())
    }

    /// Inserts a contiguous range starting at `index` as one change.
    pub fn insert_range<I>(&mut self, items: I, index: usize) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        check_insert(index, self.items.len())?;
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return Ok(());
        }
        let count = items.len();
        self.items.splice(index..index, items.iter().cloned());
        self.changes.push(Change::AddRange { items, index });
        self.journal.push(Undo::Remove { index, count });
        Ok(())
    }

    /// Removes and returns the item at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        check_index(index, self.items.len())?;
        let item = self.items.remove(index);
        self.changes.push(Change::Remove {
            item: item.clone(),
            index,
        });
        self.journal.push(Undo::Insert {
            index,
            items: vec![item.clone()],
        });
        Ok(item)
    }

    /// Removes `count` items starting at `index` as one change.
    pub fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        let len = self.items.len();
        let end = index
            .checked_add(count)
            .filter(|end| *end <= len)
            .ok_or_else(|| Error::index_out_of_range(index.saturating_add(count), len))?;
        if count == 0 {
            return Ok(());
        }
        let removed: Vec<T> = self.items.drain(index..end).collect();
        self.changes.push(Change::RemoveRange {
            items: removed.clone(),
            index,
        });
        self.journal.push(Undo::Insert {
            index,
            items: removed,
        });
        Ok(())
    }

    /// Replaces the item at `index`, returning the previous value.
    pub fn replace_at(&mut self, index: usize, item: T) -> Result<T> {
        check_index(index, self.items.len())?;
        let previous = mem::replace(&mut self.items[index], item.clone());
        self.changes.push(Change::Replace {
            previous: previous.clone(),
            current: item,
            index,
        });
        self.journal.push(Undo::Restore {
            index,
            item: previous.clone(),
        });
        Ok(previous)
    }

    /// Signals that the item at `index` should be re-evaluated downstream.
    pub fn refresh_at(&mut self, index: usize) -> Result<()> {
        self.modify_at(index, |_| {})
    }

    /// Mutates the item at `index` in place and records a refresh.
    pub fn modify_at<F>(&mut self, index: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        check_index(index, self.items.len())?;
        // Journaled first: `f` may panic halfway through.
        self.journal.push(Undo::Restore {
            index,
            item: self.items[index].clone(),
        });
        f(&mut self.items[index]);
        self.changes.push(Change::Refresh {
            item: self.items[index].clone(),
            index,
        });
        Ok(())
    }

    /// Moves the item at `from` so that it ends up at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.items.len();
        if len == 0 {
            return Err(Error::invalid_operation("cannot move within an empty list"));
        }
        check_index(from, len)?;
        check_index(to, len)?;
        if from == to {
            return Ok(());
        }
        let item = self.items.remove(from);
        self.items.insert(to, item.clone());
        self.changes.push(Change::Moved {
            item,
            previous_index: from,
            current_index: to,
        });
        self.journal.push(Undo::Move { from: to, to: from });
        Ok(())
    }

    /// Removes every item as one change.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let items = mem::take(&mut *self.items);
        self.changes.push(Change::Clear {
            items: items.clone(),
        });
        self.journal.push(Undo::Insert { index: 0, items });
    }

    /// Ends the session, returning the recorded changes.
    pub(crate) fn finish(self) -> ChangeSet<T> {
        self.changes
    }

    /// Undoes every operation of this session, newest first.
    pub(crate) fn rollback(&mut self) {
        for undo in self.journal.drain(..).rev() {
            match undo {
                Undo::Remove { index, count } => {
                    self.items.drain(index..index + count);
                }
                Undo::Insert { index, items } => {
                    self.items.splice(index..index, items);
                }
                Undo::Restore { index, item } => self.items[index] = item,
                Undo::Move { from, to } => {
                    let item = self.items.remove(from);
                    self.items.insert(to, item);
                }
            }
        }
        self.changes = ChangeSet::empty();
    }
}

impl<T: Clone + PartialEq> ListEditor<'_, T> {
    /// Returns the index of the first item equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|i| i == item)
    }

    /// Returns true if an equal item is present.
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Removes the first item equal to `item`. Returns true if one was found.
    pub fn remove(&mut self, item: &T) -> bool {
        match self.index_of(item) {
            Some(index) => self.remove_at(index).is_ok(),
            None => false,
        }
    }

    /// Replaces the first item equal to `original`.
    pub fn replace(&mut self, original: &T, item: T) -> Result<()> {
        let index = self.index_of(original).ok_or(Error::ItemNotFound)?;
        self.replace_at(index, item).map(|_| ())
    }

    /// Removes every listed item that is present.
    ///
    /// Each listed item takes the first equal item not already taken, so
    /// duplicates are removed as many times as they are listed. Matching only
    /// has `PartialEq` to go on and costs up to one comparison per pair of
    /// list item and unmatched victim; callers that know positions should use
    /// [`remove_at_many`](Self::remove_at_many). Returns the number removed.
    pub fn remove_many(&mut self, items: &[T]) -> usize {
        let mut unmatched: Vec<&T> = items.iter().collect();
        let mut indices = Vec::with_capacity(items.len());
        for (index, candidate) in self.items.iter().enumerate() {
            if unmatched.is_empty() {
                break;
            }
            if let Some(at) = unmatched.iter().position(|victim| *victim == candidate) {
                unmatched.swap_remove(at);
                indices.push(index);
            }
        }
        self.remove_sorted(&indices)
    }
}

impl<T: Clone> ListEditor<'_, T> {
    /// Removes the items at `indices`, given as positions in the list before
    /// any of them is removed. Duplicate positions count once.
    ///
    /// Adjacent positions are removed as one `RemoveRange` and the list is
    /// compacted in a single pass. Fails without changing anything if a
    /// position is out of range. Returns the number of items removed.
    pub fn remove_at_many<I>(&mut self, indices: I) -> Result<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        if let Some(&last) = indices.last() {
            check_index(last, self.items.len())?;
        }
        Ok(self.remove_sorted(&indices))
    }

    /// `indices` must be ascending, unique and in range.
    fn remove_sorted(&mut self, indices: &[usize]) -> usize {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        for &index in indices {
            match runs.last_mut() {
                Some((start, count)) if *start + *count == index => *count += 1,
                _ => runs.push((index, 1)),
            }
        }

        // Highest run first so every recorded index is valid on replay.
        for &(index, count) in runs.iter().rev() {
            let removed = self.items[index..index + count].to_vec();
            let change = if count == 1 {
                Change::Remove {
                    item: removed[0].clone(),
                    index,
                }
            } else {
                Change::RemoveRange {
                    items: removed.clone(),
                    index,
                }
            };
            self.changes.push(change);
            self.journal.push(Undo::Insert {
                index,
                items: removed,
            });
        }

        let mut marked = indices.iter().copied().peekable();
        let mut position = 0;
        self.items.retain(|_| {
            let hit = marked.next_if_eq(&position).is_some();
            position += 1;
            !hit
        });
        indices.len()
    }
}

#[inline]
fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::index_out_of_range(index, len))
    }
}

#[inline]
fn check_insert(index: usize, len: usize) -> Result<()> {
    if index <= len {
        Ok(())
    } else {
        Err(Error::index_out_of_range(index, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::ListChangeReason;

    #[test]
    fn test_editor_records_changes() {
        let mut items = vec![1, 2, 3];
        let mut editor = ListEditor::new(&mut items);

        editor.add(4);
        editor.insert(0, 0).unwrap();
        editor.remove_at(2).unwrap();
        editor.replace_at(0, 10).unwrap();
        editor.move_item(0, 3).unwrap();

        let changes = editor.finish();
        assert_eq!(items, vec![1, 3, 4, 10]);
        assert_eq!(changes.len(), 5);
        assert_eq!(changes.adds(), 2);
        assert_eq!(changes.removes(), 1);
        assert_eq!(changes.replaced(), 1);
        assert_eq!(changes.moves(), 1);
    }

    #[test]
    fn test_editor_out_of_range() {
        let mut items = vec![1];
        let mut editor = ListEditor::new(&mut items);

        assert_eq!(editor.remove_at(1), Err(Error::index_out_of_range(1, 1)));
        assert!(editor.insert(3, 9).is_err());
        assert!(editor.remove_range(0, 2).is_err());
        assert!(editor.move_item(0, 1).is_err());
        assert!(editor.changes().is_empty());
    }

    #[test]
    fn test_editor_rollback_restores_everything() {
        let mut items = vec![1, 2, 3, 4];
        let mut editor = ListEditor::new(&mut items);

        editor.add_range(vec![5, 6]);
        editor.remove_range(1, 2).unwrap();
        editor.modify_at(0, |x| *x = 100).unwrap();
        editor.move_item(0, 2).unwrap();
        editor.replace_at(1, 7).unwrap();
        editor.clear();
        editor.add(9);
        editor.rollback();

        assert!(editor.changes().is_empty());
        drop(editor);
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_remove_many_coalesces_contiguous_runs() {
        let mut items: Vec<i32> = (0..10).collect();
        let mut editor = ListEditor::new(&mut items);

        let removed = editor.remove_many(&[2, 0, 1, 7, 42]);
        assert_eq!(removed, 4);

        let changes = editor.finish();
        assert_eq!(items, vec![3, 4, 5, 6, 8, 9]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes.removes(), 4);
        assert_eq!(changes.get(0).map(|c| c.reason()), Some(ListChangeReason::Remove));
        assert_eq!(
            changes.get(1),
            Some(&Change::RemoveRange {
                items: vec![0, 1, 2],
                index: 0
            })
        );
    }

    #[test]
    fn test_remove_at_many_removes_by_position() {
        let mut items = vec![5, 5, 6, 5, 7, 8];
        let mut editor = ListEditor::new(&mut items);

        assert_eq!(
            editor.remove_at_many([9, 0]),
            Err(Error::index_out_of_range(9, 6))
        );
        assert!(editor.changes().is_empty());

        assert_eq!(editor.remove_at_many([5, 1, 4, 1]), Ok(3));
        let changes = editor.finish();
        assert_eq!(items, vec![5, 6, 5]);
        assert_eq!(
            changes.get(0),
            Some(&Change::RemoveRange {
                items: vec![7, 8],
                index: 4
            })
        );
        assert_eq!(changes.get(1), Some(&Change::Remove { item: 5, index: 1 }));
    }

    #[test]
    fn test_bulk_removal_rolls_back_in_place() {
        let mut items: Vec<i32> = (0..8).collect();
        let mut editor = ListEditor::new(&mut items);

        editor.remove_at_many([1, 2, 5, 7]).unwrap();
        editor.remove_many(&[0, 0, 6]);
        assert_eq!(editor.as_slice(), &[3, 4]);
        editor.rollback();
        drop(editor);
        assert_eq!(items, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_remove_many_takes_duplicates_in_order() {
        let mut items = vec![1, 2, 1, 3, 1];
        let mut editor = ListEditor::new(&mut items);

        assert_eq!(editor.remove_many(&[1, 1, 4]), 2);
        let changes = editor.finish();
        assert_eq!(items, vec![2, 3, 1]);

        let mut mirror = vec![1, 2, 1, 3, 1];
        changes.apply_to(&mut mirror).unwrap();
        assert_eq!(mirror, items);
    }

    #[test]
    fn test_remove_and_replace_by_value() {
        let mut items = vec!["a", "b", "a"];
        let mut editor = ListEditor::new(&mut items);

        assert!(editor.remove(&"a"));
        assert!(!editor.remove(&"z"));
        assert_eq!(editor.replace(&"z", "y"), Err(Error::ItemNotFound));
        editor.replace(&"a", "c").unwrap();
        drop(editor);
        assert_eq!(items, vec!["b", "c"]);
    }

    #[test]
    fn test_changes_replay_to_same_state() {
        let before = vec![1, 2, 3];
        let mut items = before.clone();
        let mut editor = ListEditor::new(&mut items);
        editor.insert_range(vec![7, 8], 1).unwrap();
        editor.modify_at(4, |x| *x += 1).unwrap();
        editor.move_item(4, 0).unwrap();
        editor.remove_many(&[7, 8]);
        let changes = editor.finish();

        let mut mirror = before;
        changes.apply_to(&mut mirror).unwrap();
        assert_eq!(mirror, items);
    }
}
