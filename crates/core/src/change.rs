//! Change type for list edits.
//!
//! A `Change` records one atomic edit to a single item or to a contiguous
//! range of items. Indices are positions in the collection at the moment the
//! change was applied, so a sequence of changes replays positionally.

use crate::error::{Error, Result};
use alloc::vec::Vec;

/// The reason a change was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListChangeReason {
    Add,
    AddRange,
    Replace,
    Remove,
    RemoveRange,
    /// The item was mutated in place; its identity is unchanged.
    Refresh,
    Moved,
    Clear,
}

/// One atomic edit to a list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change<T> {
    /// An item was inserted at `index`.
    Add { item: T, index: usize },
    /// A contiguous range was inserted starting at `index`.
    AddRange { items: Vec<T>, index: usize },
    /// The item at `index` was replaced.
    Replace { previous: T, current: T, index: usize },
    /// The item at `index` was removed.
    Remove { item: T, index: usize },
    /// A contiguous range was removed starting at `index`.
    RemoveRange { items: Vec<T>, index: usize },
    /// The item at `index` was re-evaluated in place.
    Refresh { item: T, index: usize },
    /// The item moved from `previous_index` to `current_index`.
    ///
    /// `current_index` is the position after the item was taken out of
    /// `previous_index`.
    Moved {
        item: T,
        previous_index: usize,
        current_index: usize,
    },
    /// Every item was removed.
    Clear { items: Vec<T> },
}

impl<T> Change<T> {
    /// Returns the reason for this change.
    pub fn reason(&self) -> ListChangeReason {
        match self {
            Change::Add { .. } => ListChangeReason::Add,
            Change::AddRange { .. } => ListChangeReason::AddRange,
            Change::Replace { .. } => ListChangeReason::Replace,
            Change::Remove { .. } => ListChangeReason::Remove,
            Change::RemoveRange { .. } => ListChangeReason::RemoveRange,
            Change::Refresh { .. } => ListChangeReason::Refresh,
            Change::Moved { .. } => ListChangeReason::Moved,
            Change::Clear { .. } => ListChangeReason::Clear,
        }
    }

    /// Returns the current item of a single-item change.
    pub fn item(&self) -> Option<&T> {
        match self {
            Change::Add { item, .. }
            | Change::Remove { item, .. }
            | Change::Refresh { item, .. }
            | Change::Moved { item, .. } => Some(item),
            Change::Replace { current, .. } => Some(current),
            Change::AddRange { .. } | Change::RemoveRange { .. } | Change::Clear { .. } => None,
        }
    }

    /// Returns the replaced value of a `Replace`.
    pub fn previous_item(&self) -> Option<&T> {
        match self {
            Change::Replace { previous, .. } => Some(previous),
            _ => None,
        }
    }

    /// Returns the items of a range change or a clear.
    pub fn range(&self) -> Option<&[T]> {
        match self {
            Change::AddRange { items, .. }
            | Change::RemoveRange { items, .. }
            | Change::Clear { items } => Some(items),
            _ => None,
        }
    }

    /// Returns the index the change applies to.
    ///
    /// For `Moved` this is the destination; a `Clear` starts at zero.
    pub fn current_index(&self) -> usize {
        match self {
            Change::Add { index, .. }
            | Change::AddRange { index, .. }
            | Change::Replace { index, .. }
            | Change::Remove { index, .. }
            | Change::RemoveRange { index, .. }
            | Change::Refresh { index, .. } => *index,
            Change::Moved { current_index, .. } => *current_index,
            Change::Clear { .. } => 0,
        }
    }

    /// Returns the source index of a `Moved`.
    pub fn previous_index(&self) -> Option<usize> {
        match self {
            Change::Moved { previous_index, .. } => Some(*previous_index),
            _ => None,
        }
    }

    /// Returns the number of items this change covers.
    pub fn cardinality(&self) -> usize {
        match self {
            Change::AddRange { items, .. }
            | Change::RemoveRange { items, .. }
            | Change::Clear { items } => items.len(),
            _ => 1,
        }
    }

    /// Maps every carried item to a new type, keeping reason and indices.
    pub fn map<U, F>(self, mut f: F) -> Change<U>
    where
        F: FnMut(T) -> U,
    {
        match self {
            Change::Add { item, index } => Change::Add { item: f(item), index },
            Change::AddRange { items, index } => Change::AddRange {
                items: items.into_iter().map(f).collect(),
                index,
            },
            Change::Replace {
                previous,
                current,
                index,
            } => Change::Replace {
                previous: f(previous),
                current: f(current),
                index,
            },
            Change::Remove { item, index } => Change::Remove { item: f(item), index },
            Change::RemoveRange { items, index } => Change::RemoveRange {
                items: items.into_iter().map(f).collect(),
                index,
            },
            Change::Refresh { item, index } => Change::Refresh { item: f(item), index },
            Change::Moved {
                item,
                previous_index,
                current_index,
            } => Change::Moved {
                item: f(item),
                previous_index,
                current_index,
            },
            Change::Clear { items } => Change::Clear {
                items: items.into_iter().map(f).collect(),
            },
        }
    }
}

impl<T: Clone> Change<T> {
    /// Applies this change to `target`.
    ///
    /// The target must be in the state the change was recorded against;
    /// otherwise an `IndexOutOfRange` error is returned and the target is left
    /// untouched.
    pub fn apply_to(&self, target: &mut Vec<T>) -> Result<()> {
        let len = target.len();
        match self {
            Change::Add { item, index } => {
                check_insert(*index, len)?;
                target.insert(*index, item.clone());
            }
            Change::AddRange { items, index } => {
                check_insert(*index, len)?;
                target.splice(*index..*index, items.iter().cloned());
            }
            Change::Replace { current, index, .. } => {
                check_index(*index, len)?;
                target[*index] = current.clone();
            }
            Change::Refresh { item, index } => {
                check_index(*index, len)?;
                target[*index] = item.clone();
            }
            Change::Remove { index, .. } => {
                check_index(*index, len)?;
                target.remove(*index);
            }
            Change::RemoveRange { items, index } => {
                let end = index + items.len();
                if end > len {
                    return Err(Error::index_out_of_range(end, len));
                }
                target.drain(*index..end);
            }
            Change::Moved {
                previous_index,
                current_index,
                ..
            } => {
                check_index(*previous_index, len)?;
                check_index(*current_index, len)?;
                let item = target.remove(*previous_index);
                target.insert(*current_index, item);
            }
            Change::Clear { .. } => target.clear(),
        }
        Ok(())
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
    use alloc::vec;

    #[test]
    fn test_change_reason() {
        assert_eq!(Change::Add { item: 1, index: 0 }.reason(), ListChangeReason::Add);
        assert_eq!(
            Change::Clear { items: vec![1, 2] }.reason(),
            ListChangeReason::Clear
        );
        assert_eq!(
            Change::Moved {
                item: 1,
                previous_index: 0,
                current_index: 2
            }
            .reason(),
            ListChangeReason::Moved
        );
    }

    #[test]
    fn test_change_accessors() {
        let replace = Change::Replace {
            previous: 1,
            current: 2,
            index: 3,
        };
        assert_eq!(replace.item(), Some(&2));
        assert_eq!(replace.previous_item(), Some(&1));
        assert_eq!(replace.current_index(), 3);
        assert_eq!(replace.previous_index(), None);

        let range = Change::RemoveRange {
            items: vec![4, 5, 6],
            index: 1,
        };
        assert_eq!(range.item(), None);
        assert_eq!(range.range(), Some(&[4, 5, 6][..]));
        assert_eq!(range.cardinality(), 3);
    }

    #[test]
    fn test_change_map() {
        let change = Change::AddRange {
            items: vec![1, 2],
            index: 0,
        };
        let mapped = change.map(|x| x * 10);
        assert_eq!(
            mapped,
            Change::AddRange {
                items: vec![10, 20],
                index: 0
            }
        );
    }

    #[test]
    fn test_apply_positional() {
        let mut list = vec![1, 2, 3];
        Change::Add { item: 9, index: 1 }.apply_to(&mut list).unwrap();
        assert_eq!(list, vec![1, 9, 2, 3]);

        Change::Moved {
            item: 9,
            previous_index: 1,
            current_index: 3,
        }
        .apply_to(&mut list)
        .unwrap();
        assert_eq!(list, vec![1, 2, 3, 9]);

        Change::RemoveRange {
            items: vec![2, 3],
            index: 1,
        }
        .apply_to(&mut list)
        .unwrap();
        assert_eq!(list, vec![1, 9]);
    }

    #[test]
    fn test_apply_out_of_range() {
        let mut list = vec![1];
        let err = Change::Remove { item: 1, index: 3 }
            .apply_to(&mut list)
            .unwrap_err();
        assert_eq!(err, Error::index_out_of_range(3, 1));
        assert_eq!(list, vec![1]);
    }
}
