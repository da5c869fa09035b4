//! Injectable time sources.
//!
//! Operators that defer work take a `Scheduler` instead of reaching for a
//! global timer, so tests can drive time by hand with `VirtualTimeScheduler`.

use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// A unit of deferred work.
pub type Action = Box<dyn FnOnce() + Send>;

/// A clock that can run actions after a delay.
pub trait Scheduler: Send + Sync {
    /// Time elapsed on this scheduler's clock.
    fn now(&self) -> Duration;

    /// Runs `action` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, action: Action);
}

/// Runs every action synchronously on the scheduling thread, ignoring the
/// delay.
#[derive(Debug)]
pub struct ImmediateScheduler {
    started: Instant,
}

impl ImmediateScheduler {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ImmediateScheduler {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn schedule(&self, _delay: Duration, action: Action) {
        action();
    }
}

struct VirtualState {
    now: Duration,
    /// Keyed by due time, then scheduling order.
    queue: BTreeMap<(Duration, u64), Action>,
    next_seq: u64,
}

/// A manually advanced clock.
///
/// Actions run during `advance_by`, `advance_to` and `run_all`, on the calling
/// thread, in due order and first-scheduled first among equal due times.
pub struct VirtualTimeScheduler {
    state: Mutex<VirtualState>,
}

impl VirtualTimeScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VirtualState {
                now: Duration::ZERO,
                queue: BTreeMap::new(),
                next_seq: 0,
            }),
        }
    }

    /// Advances the clock by `delta`, running every action that falls due.
    pub fn advance_by(&self, delta: Duration) {
        let target = self.state.lock().now + delta;
        self.advance_to(target);
    }

    /// Advances the clock to `target`, running every action that falls due.
    /// Moving backwards is a no-op.
    pub fn advance_to(&self, target: Duration) {
        while let Some(action) = self.pop_due(Some(target)) {
            action();
        }
        let mut state = self.state.lock();
        if target > state.now {
            state.now = target;
        }
    }

    /// Runs actions until none are left, advancing the clock as it goes.
    pub fn run_all(&self) {
        while let Some(action) = self.pop_due(None) {
            action();
        }
    }

    /// Returns the number of actions waiting to run.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn pop_due(&self, limit: Option<Duration>) -> Option<Action> {
        let mut state = self.state.lock();
        let (&(due, seq), _) = state.queue.first_key_value()?;
        if limit.is_some_and(|limit| due > limit) {
            return None;
        }
        let action = state.queue.remove(&(due, seq))?;
        if due > state.now {
            state.now = due;
        }
        Some(action)
    }
}

impl Default for VirtualTimeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualTimeScheduler {
    fn now(&self) -> Duration {
        self.state.lock().now
    }

    fn schedule(&self, delay: Duration, action: Action) {
        let mut state = self.state.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.insert((due, seq), action);
    }
}

struct TimerQueue {
    queue: BTreeMap<(Instant, u64), Action>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerShared {
    queue: Mutex<TimerQueue>,
    wakeup: Condvar,
}

/// Real-time scheduler backed by one worker thread.
///
/// The worker is stopped and joined when the scheduler is dropped; actions
/// still waiting at that point never run.
pub struct TimerScheduler {
    started: Instant,
    shared: Arc<TimerShared>,
    worker: Option<JoinHandle<()>>,
}

impl TimerScheduler {
    /// Starts the worker thread.
    pub fn new() -> io::Result<Self> {
        let shared = Arc::new(TimerShared {
            queue: Mutex::new(TimerQueue {
                queue: BTreeMap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("ripple-timer".into())
            .spawn(move || run_timer(&worker_shared))?;
        debug!("timer scheduler started");
        Ok(Self {
            started: Instant::now(),
            shared,
            worker: Some(worker),
        })
    }
}

fn run_timer(shared: &TimerShared) {
    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            return;
        }
        let next = queue.queue.first_key_value().map(|(key, _)| *key);
        match next {
            None => shared.wakeup.wait(&mut queue),
            Some((due, seq)) if due <= Instant::now() => {
                let Some(action) = queue.queue.remove(&(due, seq)) else {
                    continue;
                };
                drop(queue);
                if panic::catch_unwind(AssertUnwindSafe(action)).is_err() {
                    error!("scheduled action panicked");
                }
                queue = shared.queue.lock();
            }
            Some((due, _)) => {
                shared.wakeup.wait_until(&mut queue, due);
            }
        }
    }
}

impl Scheduler for TimerScheduler {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn schedule(&self, delay: Duration, action: Action) {
        let mut queue = self.shared.queue.lock();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.queue.insert((Instant::now() + delay, seq), action);
        self.shared.wakeup.notify_one();
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.wakeup.notify_one();
        if let Some(worker) = self.worker.take() {
            // Dropped by one of its own actions; the worker exits on its own.
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("timer worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Action) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |id: u32| {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().push(id)) as Action
        })
    }

    #[test]
    fn test_immediate_runs_synchronously() {
        let scheduler = ImmediateScheduler::new();
        let (seen, action) = recorder();
        scheduler.schedule(Duration::from_secs(60), action(1));
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn test_virtual_time_runs_only_due_actions() {
        let scheduler = VirtualTimeScheduler::new();
        let (seen, action) = recorder();

        scheduler.schedule(Duration::from_millis(100), action(2));
        scheduler.schedule(Duration::from_millis(50), action(1));
        scheduler.schedule(Duration::from_millis(100), action(3));

        scheduler.advance_by(Duration::from_millis(49));
        assert!(seen.lock().is_empty());

        scheduler.advance_by(Duration::from_millis(1));
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(scheduler.now(), Duration::from_millis(50));

        scheduler.advance_to(Duration::from_millis(200));
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
        assert_eq!(scheduler.now(), Duration::from_millis(200));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_virtual_time_actions_can_reschedule() {
        let scheduler = Arc::new(VirtualTimeScheduler::new());
        let (seen, action) = recorder();

        let inner = Arc::clone(&scheduler);
        let follow_up = action(2);
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || inner.schedule(Duration::from_millis(10), follow_up)),
        );
        scheduler.schedule(Duration::from_millis(30), action(3));

        scheduler.run_all();
        assert_eq!(*seen.lock(), vec![2, 3]);
        assert_eq!(scheduler.now(), Duration::from_millis(30));
    }

    #[test]
    fn test_timer_scheduler_runs_action() {
        let scheduler = TimerScheduler::new().unwrap();
        let (tx, rx) = mpsc::channel();
        scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                let _ = tx.send(7);
            }),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(7));
    }

    #[test]
    fn test_timer_scheduler_drop_joins_worker() {
        let scheduler = TimerScheduler::new().unwrap();
        scheduler.schedule(Duration::from_secs(3600), Box::new(|| {}));
        drop(scheduler);
    }
}
