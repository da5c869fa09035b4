//! Recording collaborator for change streams.
//!
//! `ChangeSetAggregator` subscribes to a stream purely to record what it
//! emits: every change set in order plus a mirror rebuilt by replaying them.
//! Tests use it to assert on message counts and content.

use crate::stream::Stream;
use crate::subscription::Subscription;
use parking_lot::Mutex;
use ripple_core::{ChangeSet, KeyedChangeSet, PagedChangeSet};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A change record that can be replayed onto a mirror collection.
pub trait Replay {
    /// The collection the records describe.
    type Mirror: Default + Clone + Send;

    /// Applies the record to `mirror`.
    ///
    /// Panics if the mirror is not in the state the record was produced
    /// against.
    fn replay(&self, mirror: &mut Self::Mirror);
}

impl<T: Clone + Send> Replay for ChangeSet<T> {
    type Mirror = Vec<T>;

    fn replay(&self, mirror: &mut Vec<T>) {
        if let Err(error) = self.apply_to(mirror) {
            panic!("change set does not apply to its mirror: {error}");
        }
    }
}

impl<T: Clone + Send> Replay for PagedChangeSet<T> {
    type Mirror = Vec<T>;

    fn replay(&self, mirror: &mut Vec<T>) {
        self.changes().replay(mirror);
    }
}

impl<K: Ord + Clone + Send, V: Clone + Send> Replay for KeyedChangeSet<K, V> {
    type Mirror = BTreeMap<K, V>;

    fn replay(&self, mirror: &mut BTreeMap<K, V>) {
        self.apply_to(mirror);
    }
}

struct Recorded<C: Replay> {
    messages: Vec<C>,
    data: C::Mirror,
    completed: bool,
}

/// Records every change set a stream emits.
pub struct ChangeSetAggregator<C: Replay> {
    recorded: Arc<Mutex<Recorded<C>>>,
    subscription: Mutex<Option<Subscription>>,
}

impl<C> ChangeSetAggregator<C>
where
    C: Replay + Clone + Send + 'static,
{
    /// Subscribes to `stream` and starts recording.
    pub fn new(stream: &Stream<C>) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded {
            messages: Vec::new(),
            data: C::Mirror::default(),
            completed: false,
        }));
        let on_next = Arc::clone(&recorded);
        let on_completed = Arc::clone(&recorded);
        let subscription = stream.subscribe_with(
            move |changes: &C| {
                let mut recorded = on_next.lock();
                changes.replay(&mut recorded.data);
                recorded.messages.push(changes.clone());
            },
            move || on_completed.lock().completed = true,
        );
        Self {
            recorded,
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Returns every recorded change set, oldest first.
    pub fn messages(&self) -> Vec<C> {
        self.recorded.lock().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.recorded.lock().messages.len()
    }

    /// Returns the mirror built from the recorded change sets.
    pub fn data(&self) -> C::Mirror {
        self.recorded.lock().data.clone()
    }

    /// Returns true once the stream has completed.
    pub fn is_completed(&self) -> bool {
        self.recorded.lock().completed
    }

    /// Stops recording.
    pub fn dispose(&self) {
        let subscription = self.subscription.lock().take();
        drop(subscription);
    }
}

impl<C> Stream<C>
where
    C: Replay + Clone + Send + 'static,
{
    /// Records this stream with a `ChangeSetAggregator`.
    pub fn as_aggregator(&self) -> ChangeSetAggregator<C> {
        ChangeSetAggregator::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SourceList, Subject};
    use ripple_core::{Change, KeyedChange};

    #[test]
    fn test_aggregator_records_and_mirrors() {
        let subject = Subject::new();
        let results = subject.stream().as_aggregator();

        subject.publish(ChangeSet::initial(vec![1, 2, 3]));
        subject.publish(ChangeSet::from_changes(vec![Change::Remove { item: 1, index: 0 }]));

        assert_eq!(results.message_count(), 2);
        assert_eq!(results.data(), vec![2, 3]);
        assert_eq!(results.messages()[1].removes(), 1);
    }

    #[test]
    fn test_aggregator_dispose_stops_recording() {
        let list = SourceList::new();
        let results = list.connect().as_aggregator();

        list.add(1);
        results.dispose();
        list.add(2);

        assert_eq!(results.message_count(), 1);
        assert!(!results.is_completed());
    }

    #[test]
    fn test_keyed_aggregator() {
        let subject = Subject::new();
        let results = subject.stream().as_aggregator();

        subject.publish(KeyedChangeSet::from_changes(vec![
            KeyedChange::add("a", 1),
            KeyedChange::add("b", 2),
        ]));
        subject.publish(KeyedChangeSet::from_changes(vec![KeyedChange::remove("a", 1)]));

        let data = results.data();
        assert_eq!(data.len(), 1);
        assert_eq!(data.get("b"), Some(&2));
    }

    #[test]
    fn test_aggregator_completes() {
        let subject: Subject<ChangeSet<i32>> = Subject::new();
        let results = ChangeSetAggregator::new(&subject.stream());
        subject.complete();
        assert!(results.is_completed());
    }
}
