//! Push-based streams.
//!
//! A `Stream` is cold: nothing happens until `subscribe` is called, and every
//! subscription gets its own independent pipeline. Values are delivered
//! synchronously on the publishing thread.

use crate::hub::{self, Hub};
use crate::subscription::Subscription;
use std::fmt;
use std::sync::{Arc, Weak};

/// Receives the values of a stream.
pub trait Observer<V>: Send + Sync {
    /// Called once per published value, in publication order.
    fn on_next(&self, value: &V);

    /// Called once when the publisher completes. No values follow.
    fn on_completed(&self) {}
}

/// An observer built from a pair of closures.
pub struct FnObserver<N, C> {
    on_next: N,
    on_completed: C,
}

impl<N, C> FnObserver<N, C> {
    pub fn new(on_next: N, on_completed: C) -> Self {
        Self {
            on_next,
            on_completed,
        }
    }
}

impl<V, N, C> Observer<V> for FnObserver<N, C>
where
    N: Fn(&V) + Send + Sync,
    C: Fn() + Send + Sync,
{
    fn on_next(&self, value: &V) {
        (self.on_next)(value)
    }

    fn on_completed(&self) {
        (self.on_completed)()
    }
}

type SubscribeFn<V> = dyn Fn(Arc<dyn Observer<V>>) -> Subscription + Send + Sync;

/// A cold stream of values.
pub struct Stream<V> {
    on_subscribe: Arc<SubscribeFn<V>>,
}

impl<V> Clone for Stream<V> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: Arc::clone(&self.on_subscribe),
        }
    }
}

impl<V> fmt::Debug for Stream<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl<V: 'static> Stream<V> {
    /// Creates a stream from its subscribe function.
    ///
    /// `on_subscribe` runs once per subscriber and returns the handle that
    /// tears that subscriber's pipeline down.
    pub fn new<F>(on_subscribe: F) -> Self
    where
        F: Fn(Arc<dyn Observer<V>>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            on_subscribe: Arc::new(on_subscribe),
        }
    }

    /// Subscribes with a value callback.
    pub fn subscribe<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.subscribe_observer(Arc::new(FnObserver::new(on_next, || {})))
    }

    /// Subscribes with value and completion callbacks.
    pub fn subscribe_with<F, C>(&self, on_next: F, on_completed: C) -> Subscription
    where
        F: Fn(&V) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe_observer(Arc::new(FnObserver::new(on_next, on_completed)))
    }

    /// Subscribes an observer.
    pub fn subscribe_observer(&self, observer: Arc<dyn Observer<V>>) -> Subscription {
        (self.on_subscribe)(observer)
    }

    /// Transforms every value.
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: 'static,
        F: Fn(&V) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Stream::new(move |observer: Arc<dyn Observer<U>>| {
            let f = Arc::clone(&f);
            let done = Arc::clone(&observer);
            upstream.subscribe_with(
                move |value| observer.on_next(&f(value)),
                move || done.on_completed(),
            )
        })
    }
}

struct SubjectState<V> {
    latest: Option<V>,
    replay: bool,
}

/// A hot stream that publishes values pushed into it.
///
/// Publication is serialized: values reach every subscriber in the order they
/// were published, including values published from inside a callback.
pub struct Subject<V> {
    hub: Arc<Hub<SubjectState<V>, V>>,
}

impl<V> Clone for Subject<V> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Default for Subject<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> Subject<V> {
    /// Creates a subject that only forwards values published after subscribing.
    pub fn new() -> Self {
        Self::with_state(None, false)
    }

    /// Creates a subject that replays its latest value to new subscribers.
    pub fn with_value(initial: V) -> Self {
        Self::with_state(Some(initial), true)
    }

    fn with_state(latest: Option<V>, replay: bool) -> Self {
        Self {
            hub: Arc::new(Hub::new(SubjectState { latest, replay })),
        }
    }

    /// Publishes a value to every current subscriber.
    pub fn publish(&self, value: V) {
        self.hub.session(|state| {
            if state.replay {
                state.latest = Some(value.clone());
            }
            ((), Some(value))
        })
    }

    /// Returns the latest value when the subject replays.
    pub fn latest(&self) -> Option<V> {
        self.hub.read(|state| state.latest.clone())
    }

    /// Completes every subscriber; later subscribers complete immediately.
    pub fn complete(&self) {
        self.hub.dispose();
    }

    /// Returns the number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    /// Returns the subject as a stream.
    pub fn stream(&self) -> Stream<V> {
        let weak: Weak<Hub<SubjectState<V>, V>> = Arc::downgrade(&self.hub);
        Stream::new(move |observer: Arc<dyn Observer<V>>| match weak.upgrade() {
            Some(hub) => hub::attach(&hub, |state| (observer, state.latest.clone())),
            None => {
                observer.on_completed();
                Subscription::empty()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn recorder<V: Clone + Send + 'static>() -> (Arc<Mutex<Vec<V>>>, impl Fn(&V) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &V| sink.lock().push(v.clone()))
    }

    #[test]
    fn test_stream_is_cold() {
        let subscribed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&subscribed);
        let stream: Stream<i32> = Stream::new(move |observer| {
            flag.store(true, Ordering::SeqCst);
            observer.on_next(&42);
            Subscription::empty()
        });
        assert!(!subscribed.load(Ordering::SeqCst));

        let (seen, sink) = recorder();
        let _sub = stream.subscribe(sink);
        assert!(subscribed.load(Ordering::SeqCst));
        assert_eq!(*seen.lock(), vec![42]);
    }

    #[test]
    fn test_subject_publish() {
        let subject = Subject::new();
        let (seen, sink) = recorder();

        subject.publish(1);
        let sub = subject.stream().subscribe(sink);
        subject.publish(2);
        subject.publish(3);
        assert_eq!(*seen.lock(), vec![2, 3]);

        sub.dispose();
        subject.publish(4);
        assert_eq!(*seen.lock(), vec![2, 3]);
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn test_subject_with_value_replays_latest() {
        let subject = Subject::with_value(1);
        subject.publish(2);

        let (seen, sink) = recorder();
        let _sub = subject.stream().subscribe(sink);
        subject.publish(3);

        assert_eq!(*seen.lock(), vec![2, 3]);
        assert_eq!(subject.latest(), Some(3));
    }

    #[test]
    fn test_subject_complete() {
        let subject: Subject<i32> = Subject::new();
        let completed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&completed);
        let _sub = subject.stream().subscribe_with(
            |_| {},
            move || flag.store(true, Ordering::SeqCst),
        );

        subject.complete();
        assert!(completed.load(Ordering::SeqCst));

        let late = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&late);
        let _late_sub = subject.stream().subscribe_with(
            |_| {},
            move || flag.store(true, Ordering::SeqCst),
        );
        assert!(late.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reentrant_publish_preserves_order() {
        let subject = Subject::new();
        let (seen, sink) = recorder();

        let echo = subject.clone();
        let _first = subject.stream().subscribe(move |v: &i32| {
            if *v == 1 {
                echo.publish(2);
            }
        });
        let _second = subject.stream().subscribe(sink);

        subject.publish(1);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_map() {
        let subject = Subject::new();
        let (seen, sink) = recorder();
        let _sub = subject.stream().map(|v: &i32| v * 10).subscribe(sink);

        subject.publish(4);
        assert_eq!(*seen.lock(), vec![40]);
    }
}
