//! The serialized task queue and its exclusive execution loop.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;

use super::timer::{TimerHandle, TimerKey, TimerSlots};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum Work {
    Task(Task),
    Expire(TimerKey),
}

#[derive(Default)]
struct State {
    queue: VecDeque<Work>,
    timers: TimerSlots,
    shut_down: bool,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    wakeup: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking task never holds this lock, so poisoning only means a
        // task panicked elsewhere; the queue itself is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn with_timers<R>(&self, f: impl FnOnce(&mut TimerSlots) -> R) -> R {
        f(&mut self.lock().timers)
    }
}

/// Single logical thread of control for the whole stack.
///
/// Any number of threads may [`post`](Executor::post) work or
/// [`start`](Executor::start) timers; all of it executes one unit at a time,
/// in FIFO order, on whichever loop drives the executor
/// ([`run`](Executor::run), [`run_one`](Executor::run_one),
/// [`poll_one`](Executor::poll_one)). Only one loop should drive a given
/// executor.
///
/// Expired timers are appended to the same queue when they come due, so
/// timer callbacks are serialized with every other task and fire in
/// expiration order.
///
/// `Executor` is a cheap, cloneable handle.
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Create an idle executor.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                wakeup: Notify::new(),
            }),
        }
    }

    /// Enqueue a task.
    ///
    /// Posting to a shut-down executor is a programming error: the task is
    /// dropped and an error is logged.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let rejected = {
            let mut state = self.shared.lock();
            if state.shut_down {
                Some(task)
            } else {
                state.queue.push_back(Work::Task(Box::new(task)));
                None
            }
        };
        match rejected {
            Some(task) => {
                tracing::error!("task posted to a shut-down executor was dropped");
                drop(task);
            }
            None => self.shared.wakeup.notify_one(),
        }
    }

    /// Schedule `callback` to run no earlier than `delay` from now.
    pub fn start<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.start_at(Instant::now() + delay, callback)
    }

    /// Schedule `callback` to run no earlier than `deadline`.
    pub fn start_at<F>(&self, deadline: Instant, callback: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let key = {
            let mut state = self.shared.lock();
            if state.shut_down {
                tracing::error!("timer started on a shut-down executor will never fire");
            }
            state.timers.arm(deadline, Box::new(callback))
        };
        // Wake the loop so it can shorten its sleep.
        self.shared.wakeup.notify_one();
        TimerHandle::new(key, deadline, Arc::downgrade(&self.shared))
    }

    /// Run at most one ready unit of work without waiting.
    ///
    /// Returns `true` if a unit was dequeued. A unit whose timer was cancelled
    /// after coming due counts as executed but runs no callback.
    pub fn poll_one(&self) -> bool {
        let work = {
            let mut state = self.shared.lock();
            if state.shut_down {
                return false;
            }
            Self::promote_expired(&mut state, Instant::now());
            state.queue.pop_front()
        };

        match work {
            Some(Work::Task(task)) => {
                task();
                true
            }
            Some(Work::Expire(key)) => {
                let callback = self.shared.with_timers(|timers| timers.take_expired(key));
                if let Some(callback) = callback {
                    callback();
                }
                true
            }
            None => false,
        }
    }

    /// Run every ready unit, including work posted by the units themselves.
    ///
    /// Returns the number of units executed.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        while self.poll_one() {
            count += 1;
        }
        count
    }

    /// Wait until one unit of work is ready and run it.
    ///
    /// Returns 1, or 0 once the executor has been shut down.
    pub async fn run_one(&self) -> usize {
        loop {
            // Register interest before checking so a concurrent post is not lost.
            let notified = self.shared.wakeup.notified();
            if self.poll_one() {
                return 1;
            }

            let next_deadline = {
                let mut state = self.shared.lock();
                if state.shut_down {
                    return 0;
                }
                state.timers.next_deadline()
            };

            match next_deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(deadline.into()) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Drive the executor until it is shut down.
    pub async fn run(&self) {
        while self.run_one().await > 0 {}
        tracing::debug!("executor loop exited");
    }

    /// Drive the executor on a tokio task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self) -> JoinHandle<()> {
        let executor = self.clone();
        tokio::spawn(async move { executor.run().await })
    }

    /// Resolve once every unit posted before this call has executed.
    ///
    /// Requires the executor to be driven elsewhere (see [`spawn`](Self::spawn)).
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let _ = tx.send(());
        });
        let _ = rx.await;
    }

    /// Stop the loop, drop pending tasks and disarm every timer.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        let (tasks, callbacks) = {
            let mut state = self.shared.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            let tasks: Vec<Work> = state.queue.drain(..).collect();
            (tasks, state.timers.clear())
        };
        tracing::debug!(
            dropped_tasks = tasks.len(),
            dropped_timers = callbacks.len(),
            "executor shut down"
        );
        // Drop outside the lock: dropping captured state may touch the executor.
        drop(tasks);
        drop(callbacks);
        self.shared.wakeup.notify_waiters();
        self.shared.wakeup.notify_one();
    }

    /// Check if [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().shut_down
    }

    /// Number of queued units not yet executed.
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Number of armed timers.
    pub fn armed_timers(&self) -> usize {
        self.shared.lock().timers.armed()
    }

    fn promote_expired(state: &mut State, now: Instant) {
        let mut due = Vec::new();
        state.timers.pop_due(now, &mut due);
        state.queue.extend(due.into_iter().map(Work::Expire));
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Executor")
            .field("pending", &state.queue.len())
            .field("armed_timers", &state.timers.armed())
            .field("shut_down", &state.shut_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Records received values and whether they arrived in increasing order.
    #[derive(Default)]
    struct Recorder {
        values: Mutex<Vec<usize>>,
    }

    impl Recorder {
        fn receive(&self, value: usize) {
            self.values.lock().unwrap().push(value);
        }

        fn is_monotonic(&self) -> bool {
            self.values.lock().unwrap().windows(2).all(|w| w[0] < w[1])
        }

        fn count(&self) -> usize {
            self.values.lock().unwrap().len()
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let make = move || -> Box<dyn FnOnce() + Send> {
            let c = c.clone();
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
        };
        (count, make)
    }

    #[test]
    fn test_ordered_dispatch() {
        const NUM: usize = 10_000;
        let exe = Executor::new();
        let recorder = Arc::new(Recorder::default());

        for i in 0..NUM {
            let r = recorder.clone();
            exe.post(move || r.receive(i));
        }

        assert_eq!(exe.run_until_idle(), NUM);
        assert_eq!(recorder.count(), NUM);
        assert!(recorder.is_monotonic());
    }

    #[test]
    fn test_ordered_dispatch_across_producer_threads() {
        const PER_THREAD: usize = 1_000;
        let exe = Executor::new();
        let recorder = Arc::new(Recorder::default());

        // Each producer finishes before the next starts, fixing the relative order.
        for t in 0..4 {
            let exe = exe.clone();
            let r = recorder.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let r = r.clone();
                    exe.post(move || r.receive(t * PER_THREAD + i));
                }
            })
            .join()
            .unwrap();
        }

        exe.run_until_idle();
        assert_eq!(recorder.count(), 4 * PER_THREAD);
        assert!(recorder.is_monotonic());
    }

    #[test]
    fn test_tasks_posted_by_tasks_run_after_queued_ones() {
        let exe = Executor::new();
        let recorder = Arc::new(Recorder::default());

        let (e, r) = (exe.clone(), recorder.clone());
        exe.post(move || {
            r.receive(0);
            let r2 = r.clone();
            e.post(move || r2.receive(2));
        });
        let r = recorder.clone();
        exe.post(move || r.receive(1));

        exe.run_until_idle();
        assert_eq!(*recorder.values.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_expiration_and_reuse() {
        let exe = Executor::new();
        let (count, make) = counter();

        let t1 = exe.start(Duration::from_millis(1), make());
        let id1 = t1.id();
        assert_eq!(exe.run_one().await, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let t2 = exe.start(Duration::from_millis(1), make());
        assert_eq!(exe.run_one().await, 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // The pool hands back the same timer object.
        assert_eq!(id1, t2.id());

        // Cancelling after firing is a no-op.
        assert!(!t1.cancel());
        assert!(!t2.cancel());
    }

    #[tokio::test]
    async fn test_cancellation() {
        let exe = Executor::new();
        let (count, make) = counter();

        let t1 = exe.start(Duration::from_millis(1), make());
        let id1 = t1.id();
        assert!(t1.cancel());
        assert_eq!(exe.armed_timers(), 0);

        let t2 = exe.start(Duration::from_millis(1), make());
        assert_eq!(exe.run_one().await, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(id1, t2.id());
    }

    #[test]
    fn test_cancel_after_expiry_queued() {
        let exe = Executor::new();
        let (count, make) = counter();

        let blocker_ran = Arc::new(AtomicUsize::new(0));
        let b = blocker_ran.clone();
        exe.post(move || {
            b.fetch_add(1, Ordering::SeqCst);
        });
        let timer = exe.start(Duration::ZERO, make());

        // Runs the blocker; the due timer is promoted into the queue behind it.
        assert!(exe.poll_one());
        assert_eq!(exe.pending(), 1);

        assert!(timer.cancel());
        assert!(exe.poll_one());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(blocker_ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_multiple_outstanding() {
        let exe = Executor::new();
        let (count1, make1) = counter();
        let (count2, make2) = counter();

        let t1 = exe.start(Duration::from_millis(0), make1());
        let t2 = exe.start(Duration::from_millis(100), make2());
        assert_ne!(t1.id(), t2.id());

        assert_eq!(exe.run_one().await, 1);
        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 0);

        assert_eq!(exe.run_one().await, 1);
        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timers_fire_in_expiration_order() {
        let exe = Executor::new();
        let recorder = Arc::new(Recorder::default());

        for (value, delay) in [(2usize, 30u64), (0, 5), (1, 15)] {
            let r = recorder.clone();
            let _ = exe.start(Duration::from_millis(delay), move || r.receive(value));
        }

        for _ in 0..3 {
            exe.run_one().await;
        }
        assert_eq!(*recorder.values.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_spawned_loop_and_flush() {
        let exe = Executor::new();
        let handle = exe.spawn();
        let recorder = Arc::new(Recorder::default());

        for i in 0..100 {
            let r = recorder.clone();
            exe.post(move || r.receive(i));
        }
        exe.flush().await;
        assert_eq!(recorder.count(), 100);

        exe.shutdown();
        handle.await.unwrap();
    }

    #[test]
    fn test_shutdown_drops_work() {
        let exe = Executor::new();
        let (count, make) = counter();

        exe.post(make());
        let _ = exe.start(Duration::ZERO, make());
        exe.shutdown();
        exe.shutdown();

        assert!(exe.is_shut_down());
        assert!(!exe.poll_one());
        assert_eq!(exe.armed_timers(), 0);

        exe.post(make());
        assert_eq!(exe.pending(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
