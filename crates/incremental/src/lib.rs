//! Ripple Incremental - Incremental operators over ripple change streams.
//!
//! Every operator here keeps a private shadow of its input and turns each
//! upstream change set into the minimal change set against its own output,
//! so downstream consumers never re-read whole collections.
//!
//! # Operators
//!
//! - `sort`: sorted projection maintained with binary search (`Sorter`)
//! - `page` / `page_with`: windowed view diffed on data or request changes
//! - `query_when_changed` / `to_collection`: one snapshot per change set
//! - `SizeLimiter` / `limit_size_to`: evicts the oldest items of a store on a
//!   scheduler tick
//!
//! # Example
//!
//! ```rust
//! use ripple_incremental::{ListStreamExt, SortComparer};
//! use ripple_reactive::SourceList;
//!
//! let list = SourceList::new();
//! list.add_range(vec![3, 1, 2]);
//!
//! let sorted = list
//!     .connect()
//!     .sort(SortComparer::ascending(|x: &i32| *x))
//!     .as_aggregator();
//! list.add(0);
//!
//! assert_eq!(sorted.data(), vec![0, 1, 2, 3]);
//! assert_eq!(sorted.message_count(), 2);
//! ```

mod comparer;
mod limit;
mod operator;
mod page;
mod query;
mod scheduler;
mod sort;

pub use comparer::{SortComparer, SortOrder};
pub use limit::{LimitSizeExt, SizeLimiter};
pub use page::{page, page_with, window_changes, Pager};
pub use query::{query_cache_when_changed, query_when_changed};
pub use scheduler::{Action, ImmediateScheduler, Scheduler, TimerScheduler, VirtualTimeScheduler};
pub use sort::Sorter;

use ripple_core::{ChangeSet, KeyedChangeSet, PageRequest, PagedChangeSet};
use ripple_reactive::Stream;
use std::collections::BTreeMap;

/// Operators on list change streams.
pub trait ListStreamExt<T> {
    /// Sorts the stream with `comparer`.
    fn sort(&self, comparer: SortComparer<T>) -> Stream<ChangeSet<T>>;

    /// Pages the stream according to `requests`.
    fn page(&self, requests: &Stream<PageRequest>) -> Stream<PagedChangeSet<T>>;

    /// Pages the stream with one fixed request.
    fn page_with(&self, request: PageRequest) -> Stream<PagedChangeSet<T>>;

    /// Emits `projector(items)` after every change set.
    fn query_when_changed<R, F>(&self, projector: F) -> Stream<R>
    where
        R: 'static,
        F: Fn(&[T]) -> R + Send + Sync + 'static;

    /// Emits a copy of the whole collection after every change set.
    fn to_collection(&self) -> Stream<Vec<T>>;
}

impl<T> ListStreamExt<T> for Stream<ChangeSet<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn sort(&self, comparer: SortComparer<T>) -> Stream<ChangeSet<T>> {
        operator::transform(self, move || Sorter::new(comparer.clone()))
    }

    fn page(&self, requests: &Stream<PageRequest>) -> Stream<PagedChangeSet<T>> {
        page::page(self, requests)
    }

    fn page_with(&self, request: PageRequest) -> Stream<PagedChangeSet<T>> {
        page::page_with(self, request)
    }

    fn query_when_changed<R, F>(&self, projector: F) -> Stream<R>
    where
        R: 'static,
        F: Fn(&[T]) -> R + Send + Sync + 'static,
    {
        query::query_when_changed(self, projector)
    }

    fn to_collection(&self) -> Stream<Vec<T>> {
        query::query_when_changed(self, |items: &[T]| items.to_vec())
    }
}

/// Operators on keyed change streams.
pub trait CacheStreamExt<K, V> {
    /// Emits `projector(items)` after every change set.
    fn query_when_changed<R, F>(&self, projector: F) -> Stream<R>
    where
        R: 'static,
        F: Fn(&BTreeMap<K, V>) -> R + Send + Sync + 'static;

    /// Emits the values in key order after every change set.
    fn to_collection(&self) -> Stream<Vec<V>>;
}

impl<K, V> CacheStreamExt<K, V> for Stream<KeyedChangeSet<K, V>>
where
    K: Ord + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn query_when_changed<R, F>(&self, projector: F) -> Stream<R>
    where
        R: 'static,
        F: Fn(&BTreeMap<K, V>) -> R + Send + Sync + 'static,
    {
        query::query_cache_when_changed(self, projector)
    }

    fn to_collection(&self) -> Stream<Vec<V>> {
        query::query_cache_when_changed(self, |items: &BTreeMap<K, V>| {
            items.values().cloned().collect()
        })
    }
}
