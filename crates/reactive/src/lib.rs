//! Ripple Reactive - Observable source collections for ripple.
//!
//! This crate turns batched edits into change streams. A store accepts edit
//! sessions, commits each one as a single change set, and pushes it to every
//! connected subscriber synchronously on the editing thread.
//!
//! # Core Concepts
//!
//! - `SourceList<T>`: authoritative list; edits go through a `ListEditor`
//! - `SourceCache<K, V>`: authoritative keyed collection, enumerated in key order
//! - `Stream<V>` / `Observer<V>` / `Subscription`: cold push streams with RAII
//!   cancellation
//! - `Subject<V>`: hot stream fed by `publish`
//! - `ChangeSetAggregator`: records every change set of a stream plus a mirror
//!
//! # Example
//!
//! ```rust
//! use ripple_reactive::{ChangeSetAggregator, SourceList};
//!
//! let list = SourceList::new();
//! list.add_range(vec![1, 2, 3]);
//!
//! let results = ChangeSetAggregator::new(&list.connect());
//! list.edit(|editor| {
//!     editor.remove_at(0)?;
//!     editor.add(4);
//!     Ok::<_, ripple_core::Error>(())
//! })
//! .unwrap();
//!
//! assert_eq!(results.message_count(), 2);
//! assert_eq!(results.data(), vec![2, 3, 4]);
//! ```

mod aggregator;
mod cache;
mod editor;
mod filter;
mod hub;
mod list;
mod stream;
mod subscription;

pub use aggregator::{ChangeSetAggregator, Replay};
pub use cache::{CacheEditor, SourceCache, WeakSourceCache};
pub use editor::ListEditor;
pub use list::{SourceList, WeakSourceList};
pub use stream::{FnObserver, Observer, Stream, Subject};
pub use subscription::{Subscriber, SubscriberSet, Subscription, SubscriptionId};

use ripple_core::{ChangeSet, KeyedChangeSet};

/// Stream of list change sets.
pub type ChangeStream<T> = Stream<ChangeSet<T>>;

/// Stream of keyed change sets.
pub type KeyedChangeStream<K, V> = Stream<KeyedChangeSet<K, V>>;
