//! Subscription handles and subscriber bookkeeping.
//!
//! A `Subscription` is the cancellation handle returned by every `subscribe`
//! call. A `SubscriberSet` tracks the observers registered on one publisher
//! and fans values out to them in registration order.

use crate::stream::Observer;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

/// Unique identifier for a subscriber within its publisher.
pub type SubscriptionId = u64;

/// Cancellation handle for a subscription.
///
/// Disposing (or dropping) the handle stops delivery immediately. A callback
/// already running is not interrupted.
#[must_use = "dropping a Subscription disposes it"]
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Creates a subscription that runs `teardown` once when disposed.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Creates a subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self { teardown: None }
    }

    /// Combines two subscriptions; disposing the result disposes both.
    pub fn merge(self, other: Subscription) -> Self {
        Subscription::new(move || {
            drop(self);
            drop(other);
        })
    }

    /// Returns true once the teardown has run.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.teardown.is_none()
    }

    /// Disposes the subscription.
    pub fn dispose(mut self) {
        self.run_teardown();
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// One registered observer.
pub struct Subscriber<V> {
    id: SubscriptionId,
    /// Publication epoch at registration; only later epochs are delivered.
    joined_at: u64,
    observer: Arc<dyn Observer<V>>,
    active: AtomicBool,
}

impl<V> Subscriber<V> {
    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscriber still receives values.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stops all further delivery to this subscriber.
    #[inline]
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Delivers a value if the subscriber is still active.
    pub fn notify(&self, value: &V) {
        if self.is_active() {
            self.observer.on_next(value);
        }
    }

    /// Signals completion once and deactivates.
    pub fn complete(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.observer.on_completed();
        }
    }
}

struct Registry<V> {
    subscribers: Vec<Arc<Subscriber<V>>>,
    next_id: SubscriptionId,
}

/// Manages the subscribers of one publisher.
pub struct SubscriberSet<V> {
    registry: Mutex<Registry<V>>,
}

impl<V> Default for SubscriberSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SubscriberSet<V> {
    /// Creates an empty subscriber set.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                subscribers: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Registers an observer that has seen every publication up to `joined_at`.
    pub fn insert(&self, observer: Arc<dyn Observer<V>>, joined_at: u64) -> Arc<Subscriber<V>> {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;

        let subscriber = Arc::new(Subscriber {
            id,
            joined_at,
            observer,
            active: AtomicBool::new(true),
        });
        registry.subscribers.push(Arc::clone(&subscriber));
        subscriber
    }

    /// Unregisters by ID.
    ///
    /// Returns true if the subscriber was found and removed.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|s| {
            if s.id == id {
                s.deactivate();
                false
            } else {
                true
            }
        });
        registry.subscribers.len() != before
    }

    /// Delivers the value published at `epoch` to every subscriber that
    /// joined before it.
    ///
    /// A panicking subscriber does not prevent delivery to the others; the
    /// first panic is resumed once every subscriber has been served.
    pub fn notify_all(&self, epoch: u64, value: &V) {
        let snapshot: Vec<Arc<Subscriber<V>>> = self.registry.lock().subscribers.clone();

        let mut first_panic = None;
        for subscriber in snapshot.iter().filter(|s| s.joined_at < epoch) {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.notify(value)));
            if let Err(payload) = outcome {
                error!(
                    subscription = subscriber.id,
                    epoch, "subscriber panicked while handling a notification"
                );
                first_panic.get_or_insert(payload);
            }
        }

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }

    /// Completes and removes every subscriber.
    pub fn complete_all(&self) {
        let drained: Vec<Arc<Subscriber<V>>> = self.registry.lock().subscribers.drain(..).collect();
        for subscriber in drained {
            subscriber.complete();
        }
    }

    /// Returns the number of active subscribers.
    #[inline]
    pub fn len(&self) -> usize {
        self.registry.lock().subscribers.len()
    }

    /// Returns true if there are no subscribers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
