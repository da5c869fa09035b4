//! On-change query snapshots.
//!
//! Every upstream change set is folded into a private mirror, then the
//! projector runs over the whole mirror. One emission per change set, however
//! many changes it carries.

use crate::operator::{transform, Transform};
use ripple_core::{ChangeSet, KeyedChangeSet};
use ripple_reactive::Stream;
use std::collections::BTreeMap;
use std::sync::Arc;

type Projector<S, R> = Arc<dyn Fn(&S) -> R + Send + Sync>;

struct ListQuery<T, R> {
    mirror: Vec<T>,
    projector: Projector<[T], R>,
}

impl<T: Clone + Send, R> Transform<ChangeSet<T>> for ListQuery<T, R> {
    type Out = R;

    fn apply(&mut self, changes: &ChangeSet<T>) -> Option<R> {
        if let Err(error) = changes.apply_to(&mut self.mirror) {
            panic!("query mirror is out of sync with its source: {error}");
        }
        Some((self.projector)(&self.mirror))
    }
}

struct CacheQuery<K, V, R> {
    mirror: BTreeMap<K, V>,
    projector: Projector<BTreeMap<K, V>, R>,
}

impl<K: Ord + Clone + Send, V: Clone + Send, R> Transform<KeyedChangeSet<K, V>> for CacheQuery<K, V, R> {
    type Out = R;

    fn apply(&mut self, changes: &KeyedChangeSet<K, V>) -> Option<R> {
        changes.apply_to(&mut self.mirror);
        Some((self.projector)(&self.mirror))
    }
}

/// Emits `projector(items)` after every upstream change set.
pub fn query_when_changed<T, R, F>(upstream: &Stream<ChangeSet<T>>, projector: F) -> Stream<R>
where
    T: Clone + Send + 'static,
    R: 'static,
    F: Fn(&[T]) -> R + Send + Sync + 'static,
{
    let projector: Projector<[T], R> = Arc::new(projector);
    transform(upstream, move || ListQuery {
        mirror: Vec::new(),
        projector: Arc::clone(&projector),
    })
}

/// Emits `projector(items)` after every upstream keyed change set.
pub fn query_cache_when_changed<K, V, R, F>(
    upstream: &Stream<KeyedChangeSet<K, V>>,
    projector: F,
) -> Stream<R>
where
    K: Ord + Clone + Send + 'static,
    V: Clone + Send + 'static,
    R: 'static,
    F: Fn(&BTreeMap<K, V>) -> R + Send + Sync + 'static,
{
    let projector: Projector<BTreeMap<K, V>, R> = Arc::new(projector);
    transform(upstream, move || CacheQuery {
        mirror: BTreeMap::new(),
        projector: Arc::clone(&projector),
    })
}
