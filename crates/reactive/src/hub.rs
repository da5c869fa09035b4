//! Serialized publication shared by stores and subjects.
//!
//! A `Hub` owns a piece of state and the subscribers interested in changes to
//! it. Mutations run as sessions behind a re-entrant gate, so sessions from
//! different threads never interleave. Every committed change record goes into
//! an outbox tagged with a publication epoch; the outermost session on the
//! gate drains the outbox, which keeps delivery in commit order even when a
//! subscriber starts a nested session from inside its callback.

use crate::stream::Observer;
use crate::subscription::{Subscriber, SubscriberSet, Subscription};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

struct HubState<S, C> {
    data: S,
    outbox: VecDeque<(u64, C)>,
    /// Epoch of the most recently committed record.
    epoch: u64,
    draining: bool,
    disposed: bool,
}

pub(crate) struct Hub<S, C> {
    gate: ReentrantMutex<RefCell<HubState<S, C>>>,
    subscribers: SubscriberSet<C>,
}

type Gate<'a, S, C> = ReentrantMutexGuard<'a, RefCell<HubState<S, C>>>;

/// Message of the panic raised when a store is read, or connected to, from
/// inside one of its own edit sessions.
const READ_IN_SESSION: &str =
    "store accessed from inside its own edit session; read through the editor instead";

/// Borrows the committed state. The borrow only fails on the thread that
/// holds the gate for a running mutator; other threads wait on the gate.
fn committed<'g, S, C>(gate: &'g Gate<'_, S, C>) -> Ref<'g, HubState<S, C>> {
    match gate.try_borrow() {
        Ok(state) => state,
        Err(_) => panic!("{READ_IN_SESSION}"),
    }
}

impl<S, C> Hub<S, C> {
    pub(crate) fn new(data: S) -> Self {
        Self {
            gate: ReentrantMutex::new(RefCell::new(HubState {
                data,
                outbox: VecDeque::new(),
                epoch: 0,
                draining: false,
                disposed: false,
            })),
            subscribers: SubscriberSet::new(),
        }
    }

    /// Reads committed state.
    ///
    /// Panics with `READ_IN_SESSION` if called from inside a session's
    /// mutation closure.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let gate = self.gate.lock();
        let state = committed(&gate);
        f(&state.data)
    }

    /// Runs one session: `f` mutates the state and returns the change record
    /// to publish, if any. Returns once the record has been delivered (or
    /// queued behind the delivery already in progress on this thread).
    pub(crate) fn session<R>(&self, f: impl FnOnce(&mut S) -> (R, Option<C>)) -> R {
        let gate = self.gate.lock();
        let (result, record) = {
            let mut state = gate.borrow_mut();
            f(&mut state.data)
        };
        if let Some(record) = record {
            let mut state = gate.borrow_mut();
            if state.disposed {
                return result;
            }
            state.epoch += 1;
            let epoch = state.epoch;
            state.outbox.push_back((epoch, record));
        }
        self.drain(&gate);
        result
    }

    fn drain(&self, gate: &Gate<'_, S, C>) {
        {
            let mut state = gate.borrow_mut();
            if state.draining {
                return;
            }
            state.draining = true;
        }
        let _reset = DrainReset(gate);
        loop {
            let next = gate.borrow_mut().outbox.pop_front();
            let Some((epoch, record)) = next else {
                break;
            };
            trace!(epoch, subscribers = self.subscribers.len(), "publishing change record");
            self.subscribers.notify_all(epoch, &record);
        }
    }

    /// Registers a subscriber. `prepare` sees the committed state and returns
    /// the observer plus the snapshot record it should receive first.
    fn register<F>(&self, prepare: F) -> Option<Arc<Subscriber<C>>>
    where
        F: FnOnce(&S) -> (Arc<dyn Observer<C>>, Option<C>),
    {
        let gate = self.gate.lock();
        let (observer, initial, epoch, disposed) = {
            let state = committed(&gate);
            let (observer, initial) = prepare(&state.data);
            (observer, initial, state.epoch, state.disposed)
        };
        if disposed {
            observer.on_completed();
            return None;
        }
        let subscriber = self.subscribers.insert(observer, epoch);
        if let Some(initial) = initial {
            subscriber.notify(&initial);
        }
        Some(subscriber)
    }

    /// Completes every subscriber and refuses new ones.
    pub(crate) fn dispose(&self) {
        let gate = self.gate.lock();
        {
            let mut state = gate.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.outbox.clear();
        }
        self.subscribers.complete_all();
    }

    pub(crate) fn is_disposed(&self) -> bool {
        let gate = self.gate.lock();
        let disposed = committed(&gate).disposed;
        disposed
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<S, C> Drop for Hub<S, C> {
    fn drop(&mut self) {
        self.subscribers.complete_all();
    }
}

struct DrainReset<'g, 'a, S, C>(&'g Gate<'a, S, C>);

impl<S, C> Drop for DrainReset<'_, '_, S, C> {
    fn drop(&mut self) {
        self.0.borrow_mut().draining = false;
    }
}

/// Subscribes an observer to `hub`, returning the handle that detaches it.
pub(crate) fn attach<S, C, F>(hub: &Arc<Hub<S, C>>, prepare: F) -> Subscription
where
    S: Send + 'static,
    C: Send + 'static,
    F: FnOnce(&S) -> (Arc<dyn Observer<C>>, Option<C>),
{
    let Some(subscriber) = hub.register(prepare) else {
        return Subscription::empty();
    };
    let weak = Arc::downgrade(hub);
    Subscription::new(move || {
        subscriber.deactivate();
        if let Some(hub) = weak.upgrade() {
            hub.subscribers.remove(subscriber.id());
        }
    })
}
