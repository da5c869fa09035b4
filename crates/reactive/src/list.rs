//! The authoritative observable list.

use crate::editor::ListEditor;
use crate::filter::{FilteredObserver, ListFilter, Predicate};
use crate::hub::{self, Hub};
use crate::stream::{Observer, Stream};
use crate::subscription::Subscription;
use crate::ChangeStream;
use ripple_core::{ChangeSet, Error, Result};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

type ListHub<T> = Hub<Vec<T>, ChangeSet<T>>;

/// An observable list of record.
///
/// All mutation goes through edit sessions; each session that changes
/// anything publishes exactly one `ChangeSet`. Handles are cheap to clone and
/// share the same list. Dropping the last handle completes every subscriber.
pub struct SourceList<T> {
    hub: Arc<ListHub<T>>,
}

impl<T> Clone for SourceList<T> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SourceList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> SourceList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Creates a list holding `items`. Subscribers see them in their initial
    /// snapshot.
    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            hub: Arc::new(Hub::new(items)),
        }
    }

    /// Runs one edit session.
    ///
    /// Every operation performed through the editor is published as a single
    /// change set once `mutator` returns `Ok`. If it returns `Err`, the
    /// session is rolled back, nothing is published and the error is returned.
    ///
    /// # Panics
    ///
    /// A panic inside `mutator` rolls the session back and is then resumed.
    /// Reading this list, or subscribing to it, from inside `mutator` panics
    /// that way; read through the editor instead.
    pub fn edit<R, E, F>(&self, mutator: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut ListEditor<'_, T>) -> std::result::Result<R, E>,
    {
        self.run_session(mutator, false)
    }

    /// Runs one edit session, routing failure to `on_error`.
    ///
    /// Operations applied before the failure are kept and published.
    pub fn edit_with<E, F, H>(&self, mutator: F, on_error: H)
    where
        F: FnOnce(&mut ListEditor<'_, T>) -> std::result::Result<(), E>,
        H: FnOnce(E),
    {
        if let Err(error) = self.run_session(mutator, true) {
            on_error(error);
        }
    }

    fn run_session<R, E, F>(&self, mutator: F, keep_partial: bool) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut ListEditor<'_, T>) -> std::result::Result<R, E>,
    {
        self.hub.session(|items| {
            let mut editor = ListEditor::new(items);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| mutator(&mut editor)));
            match outcome {
                Ok(Ok(value)) => {
                    let changes = editor.finish();
                    debug!(%changes, "edit session committed");
                    (Ok(value), non_empty(changes))
                }
                Ok(Err(error)) if keep_partial => {
                    let changes = editor.finish();
                    warn!(%changes, "edit session failed; keeping applied changes");
                    (Err(error), non_empty(changes))
                }
                Ok(Err(error)) => {
                    editor.rollback();
                    debug!("edit session failed; rolled back");
                    (Err(error), None)
                }
                Err(payload) => {
                    editor.rollback();
                    warn!("edit session panicked; rolled back");
                    panic::resume_unwind(payload)
                }
            }
        })
    }

    /// Connects to the list.
    ///
    /// Each subscriber first receives one `AddRange` with the current
    /// contents (when non-empty), then every later change set.
    ///
    /// # Panics
    ///
    /// Subscribing to the stream from inside one of this list's own edit
    /// sessions panics, because the snapshot would not be committed yet.
    pub fn connect(&self) -> ChangeStream<T> {
        let weak = Arc::downgrade(&self.hub);
        Stream::new(move |observer: Arc<dyn Observer<ChangeSet<T>>>| {
            let Some(hub) = weak.upgrade() else {
                observer.on_completed();
                return Subscription::empty();
            };
            debug!("list connected");
            hub::attach(&hub, |items: &Vec<T>| {
                (observer, non_empty(ChangeSet::initial(items.clone())))
            })
        })
    }

    /// Connects to the items matching `predicate`.
    ///
    /// Indices in the emitted change sets refer to the filtered view. A
    /// replacement that makes an item start or stop matching arrives as an
    /// add or a remove.
    ///
    /// # Panics
    ///
    /// Same as [`connect`](Self::connect).
    pub fn connect_where<P>(&self, predicate: P) -> ChangeStream<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(&self.hub);
        let predicate: Predicate<T> = Arc::new(predicate);
        Stream::new(move |observer: Arc<dyn Observer<ChangeSet<T>>>| {
            let Some(hub) = weak.upgrade() else {
                observer.on_completed();
                return Subscription::empty();
            };
            let filter = ListFilter::new(Arc::clone(&predicate));
            hub::attach(&hub, |items: &Vec<T>| {
                let filtered: Arc<dyn Observer<ChangeSet<T>>> =
                    Arc::new(FilteredObserver::new(filter, observer));
                (filtered, non_empty(ChangeSet::initial(items.clone())))
            })
        })
    }

    /// Returns a snapshot of the committed items.
    ///
    /// # Panics
    ///
    /// Panics when called from inside one of this list's own edit sessions;
    /// the editor passed to the mutator exposes the in-progress items.
    pub fn items(&self) -> Vec<T> {
        self.hub.read(Vec::clone)
    }

    /// # Panics
    ///
    /// Same as [`items`](Self::items).
    pub fn len(&self) -> usize {
        self.hub.read(Vec::len)
    }

    /// # Panics
    ///
    /// Same as [`items`](Self::items).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completes every subscriber. The list stays editable, but nothing is
    /// published any more and new connections complete immediately.
    pub fn dispose(&self) {
        debug!("list disposed");
        self.hub.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.hub.is_disposed()
    }

    /// Returns the number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Returns a handle that does not keep the list alive.
    pub fn downgrade(&self) -> WeakSourceList<T> {
        WeakSourceList {
            hub: Arc::downgrade(&self.hub),
        }
    }

    /// Appends an item in its own session.
    pub fn add(&self, item: T) {
        self.apply(|editor| {
            editor.add(item);
            Ok(())
        });
    }

    /// Appends items in one session.
    pub fn add_range<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.apply(|editor| {
            editor.add_range(items);
            Ok(())
        });
    }

    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.edit(|editor| editor.insert(index, item))
    }

    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.edit(|editor| editor.remove_at(index))
    }

    pub fn replace_at(&self, index: usize, item: T) -> Result<T> {
        self.edit(|editor| editor.replace_at(index, item))
    }

    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        self.edit(|editor| editor.move_item(from, to))
    }

    /// Removes every item in one session.
    pub fn clear(&self) {
        self.apply(|editor| {
            editor.clear();
            Ok(())
        });
    }

    fn apply<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ListEditor<'_, T>) -> Result<()>,
    {
        // Infallible mutators only.
        let _ = self.edit(mutator);
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> SourceList<T> {
    /// Removes the first item equal to `item`. Returns true if one was found.
    pub fn remove(&self, item: &T) -> bool {
        self.edit(|editor| {
            if editor.remove(item) {
                Ok(())
            } else {
                Err(Error::ItemNotFound)
            }
        })
        .is_ok()
    }

    /// Removes every listed item that is present, in one session.
    pub fn remove_many(&self, items: &[T]) -> usize {
        self.edit(|editor| Ok::<_, Error>(editor.remove_many(items)))
            .unwrap_or_default()
    }
}

impl<T: Clone + Send + Sync + 'static> fmt::Debug for SourceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceList")
            .field("len", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A non-owning handle to a `SourceList`.
pub struct WeakSourceList<T> {
    hub: Weak<ListHub<T>>,
}

impl<T> Clone for WeakSourceList<T> {
    fn clone(&self) -> Self {
        Self {
            hub: Weak::clone(&self.hub),
        }
    }
}

impl<T> WeakSourceList<T> {
    /// Returns the list if it is still alive.
    pub fn upgrade(&self) -> Option<SourceList<T>> {
        self.hub.upgrade().map(|hub| SourceList { hub })
    }
}

fn non_empty<T>(changes: ChangeSet<T>) -> Option<ChangeSet<T>> {
    (!changes.is_empty()).then_some(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeSetAggregator;
    use parking_lot::Mutex;
    use ripple_core::ListChangeReason;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_edit_publishes_one_change_set() {
        let list = SourceList::new();
        let results = ChangeSetAggregator::new(&list.connect());

        list.edit(|editor| {
            editor.add(1);
            editor.add(2);
            editor.insert(0, 0)
        })
        .unwrap();

        assert_eq!(results.message_count(), 1);
        assert_eq!(results.messages()[0].adds(), 3);
        assert_eq!(results.data(), vec![0, 1, 2]);
        assert_eq!(list.items(), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_session_publishes_nothing() {
        let list: SourceList<i32> = SourceList::new();
        let results = ChangeSetAggregator::new(&list.connect());

        list.edit(|_| Ok::<_, Error>(())).unwrap();
        list.clear();
        assert_eq!(results.message_count(), 0);
    }

    #[test]
    fn test_connect_delivers_initial_snapshot() {
        let list = SourceList::with_items(vec![1, 2, 3]);
        let results = ChangeSetAggregator::new(&list.connect());

        assert_eq!(results.message_count(), 1);
        let first = &results.messages()[0];
        assert_eq!(first.adds(), 3);
        assert_eq!(first.get(0).map(|c| c.reason()), Some(ListChangeReason::AddRange));
    }

    #[test]
    fn test_failure_without_handler_rolls_back() {
        let list = SourceList::with_items(vec![1, 2]);
        let results = ChangeSetAggregator::new(&list.connect());

        let outcome = list.edit(|editor| {
            editor.add(3);
            editor.remove_at(10)?;
            Ok(())
        });

        assert_eq!(outcome, Err(Error::index_out_of_range(10, 3)));
        assert_eq!(list.items(), vec![1, 2]);
        assert_eq!(results.message_count(), 1);
    }

    #[test]
    fn test_failure_with_handler_keeps_applied_changes() {
        let list = SourceList::new();
        let results = ChangeSetAggregator::new(&list.connect());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);

        list.edit_with(
            |editor| {
                editor.add(1);
                editor.remove_at(5)?;
                Ok(())
            },
            move |error: Error| sink.lock().push(error),
        );

        assert_eq!(errors.lock().len(), 1);
        assert_eq!(list.items(), vec![1]);
        assert_eq!(results.message_count(), 1);
        assert_eq!(results.data(), vec![1]);
    }

    #[test]
    fn test_panicking_mutator_rolls_back() {
        let list = SourceList::with_items(vec![1]);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = list.edit(|editor| {
                editor.add(2);
                if editor.len() == 2 {
                    panic!("mutator failed");
                }
                Ok::<_, Error>(())
            });
        }));

        assert!(outcome.is_err());
        assert_eq!(list.items(), vec![1]);
        list.add(3);
        assert_eq!(list.items(), vec![1, 3]);
    }

    #[test]
    fn test_panicking_modify_restores_item() {
        let list = SourceList::with_items(vec![1, 2]);
        let results = list.connect().as_aggregator();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = list.edit(|editor| {
                editor.modify_at(0, |item| {
                    *item = 99;
                    panic!("modify failed halfway");
                })
            });
        }));

        assert!(outcome.is_err());
        assert_eq!(list.items(), vec![1, 2]);
        assert_eq!(results.data(), list.items());
        assert_eq!(results.message_count(), 1);
    }

    #[test]
    #[should_panic(expected = "inside its own edit session")]
    fn test_reading_list_inside_its_session_panics() {
        let list = SourceList::with_items(vec![1]);
        let handle = list.clone();
        let _ = list.edit(|editor| {
            editor.add(handle.len() as i32);
            Ok::<_, Error>(())
        });
    }

    #[test]
    fn test_read_inside_session_leaves_list_usable() {
        let list = SourceList::with_items(vec![1]);
        let results = list.connect().as_aggregator();
        let handle = list.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = list.edit(|editor| {
                editor.add(2);
                let _ = handle.connect().as_aggregator();
                Ok::<_, Error>(())
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(list.items(), vec![1]);
        assert_eq!(list.subscriber_count(), 1);

        // The editor is the supported way to read mid-session.
        list.edit(|editor| {
            let next = editor.len() as i32 + 1;
            editor.add(next);
            Ok::<_, Error>(())
        })
        .unwrap();
        assert_eq!(list.items(), vec![1, 2]);
        assert_eq!(results.data(), vec![1, 2]);
    }

    #[test]
    fn test_nested_edit_is_delivered_after_current() {
        let list = SourceList::new();
        let nested = list.clone();
        let _echo = list.connect().subscribe(move |changes: &ChangeSet<i32>| {
            if changes.iter().any(|c| c.item() == Some(&1)) {
                nested.add(2);
            }
        });
        let results = ChangeSetAggregator::new(&list.connect());

        list.add(1);

        assert_eq!(results.message_count(), 2);
        assert_eq!(results.data(), vec![1, 2]);
        assert_eq!(list.items(), vec![1, 2]);
    }

    #[test]
    fn test_connect_where_tracks_predicate() {
        let list = SourceList::with_items(vec![1, 2, 3, 4]);
        let results = ChangeSetAggregator::new(&list.connect_where(|x: &i32| x % 2 == 0));
        assert_eq!(results.data(), vec![2, 4]);

        list.edit(|editor| {
            editor.replace_at(0, 6)?;
            editor.replace_at(1, 5)?;
            editor.add(8);
            editor.add(9);
            Ok::<_, Error>(())
        })
        .unwrap();

        assert_eq!(results.data(), vec![6, 4, 8]);
        assert_eq!(results.message_count(), 2);
    }

    #[test]
    fn test_dispose_completes_subscribers() {
        let list = SourceList::with_items(vec![1]);
        let results = ChangeSetAggregator::new(&list.connect());

        list.dispose();
        assert!(results.is_completed());

        list.add(2);
        assert_eq!(list.items(), vec![1, 2]);
        assert_eq!(results.message_count(), 1);

        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let _late = list
            .connect()
            .subscribe_with(|_| {}, move || flag.store(true, Ordering::SeqCst));
        assert!(completed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dropping_last_handle_completes() {
        let list: SourceList<i32> = SourceList::new();
        let stream = list.connect();
        let results = ChangeSetAggregator::new(&stream);
        let weak = list.downgrade();

        drop(list);
        assert!(results.is_completed());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_disposed_subscription_stops_delivery() {
        let list = SourceList::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&seen);
        let sub = list.connect().subscribe(move |_: &ChangeSet<i32>| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        list.add(1);
        sub.dispose();
        list.add(2);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(list.subscriber_count(), 0);
    }

    #[test]
    fn test_convenience_edits() {
        let list = SourceList::new();
        list.add_range(vec!["a", "b", "c"]);
        list.insert(1, "x").unwrap();
        assert_eq!(list.remove_at(0), Ok("a"));
        assert_eq!(list.replace_at(0, "y"), Ok("x"));
        list.move_item(0, 2).unwrap();
        assert!(list.remove(&"b"));
        assert!(!list.remove(&"b"));
        assert_eq!(list.items(), vec!["c", "y"]);
        assert!(list.move_item(0, 5).is_err());
    }

    #[test]
    fn test_concurrent_editors_keep_mirror_consistent() {
        let list = SourceList::new();
        let results = ChangeSetAggregator::new(&list.connect());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let list = list.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        list.add(t * 100 + i);
                        if i % 5 == 0 {
                            let _ = list.edit(|editor| {
                                if editor.is_empty() {
                                    Ok(())
                                } else {
                                    editor.remove_at(0).map(|_| ())
                                }
                            });
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(results.data(), list.items());
        assert_eq!(list.len(), 160);
        assert_eq!(results.message_count(), 240);
    }
}
