//! Composite sort comparers.

use core::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type CompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Sort direction of one comparer key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// An ordering over `T` built from one or more keys.
///
/// Keys are consulted in declaration order; later keys only break ties left
/// by earlier ones.
pub struct SortComparer<T> {
    keys: Vec<(CompareFn<T>, SortOrder)>,
}

impl<T> Clone for SortComparer<T> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<T> fmt::Debug for SortComparer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let orders: Vec<SortOrder> = self.keys.iter().map(|(_, order)| *order).collect();
        f.debug_struct("SortComparer").field("keys", &orders).finish()
    }
}

impl<T: 'static> SortComparer<T> {
    /// Creates a comparer from an explicit comparison function.
    pub fn by<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            keys: vec![(Arc::new(compare), SortOrder::Asc)],
        }
    }

    /// Sorts ascending by the selected key.
    pub fn ascending<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self { keys: Vec::new() }.then_ascending(key)
    }

    /// Sorts descending by the selected key.
    pub fn descending<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self { keys: Vec::new() }.then_descending(key)
    }

    /// Breaks ties ascending by the selected key.
    pub fn then_ascending<K, F>(self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.then_key(key, SortOrder::Asc)
    }

    /// Breaks ties descending by the selected key.
    pub fn then_descending<K, F>(self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.then_key(key, SortOrder::Desc)
    }

    /// Breaks ties with an explicit comparison function.
    pub fn then_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.keys.push((Arc::new(compare), SortOrder::Asc));
        self
    }

    fn then_key<K, F>(mut self, key: F, order: SortOrder) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.keys
            .push((Arc::new(move |a: &T, b: &T| key(a).cmp(&key(b))), order));
        self
    }

    /// Compares two items.
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        for (compare, order) in &self.keys {
            let cmp = compare(a, b);
            if cmp != Ordering::Equal {
                return match order {
                    SortOrder::Asc => cmp,
                    SortOrder::Desc => cmp.reverse(),
                };
            }
        }
        Ordering::Equal
    }
}
