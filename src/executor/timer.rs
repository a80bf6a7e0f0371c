//! Pooled timer service backing [`Executor::start`](super::Executor::start).
//!
//! Timers live in a slab of slots. Starting a timer arms an idle slot (or
//! grows the slab) and pushes a deadline onto a min-heap. Each arming bumps
//! the slot's generation, so heap entries and handles from an earlier
//! scheduling become stale and can never fire or cancel the new one.
//!
//! A slot returns to the free list as soon as its callback is taken (fired)
//! or dropped (cancelled). The free list is LIFO, so a layer that starts a
//! new timer after the previous one fired gets the same slot back.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Weak;
use std::time::Instant;

use super::queue::{Shared, Task};

/// Identity of a pooled timer slot.
///
/// Two handles with equal ids refer to the same underlying timer object. Ids
/// are only meaningful for one firing cycle: once a timer fires or is
/// cancelled its id may be handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(usize);

impl TimerId {
    /// Slot index inside the executor's timer pool.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Key identifying one scheduling of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerKey {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

struct Armed {
    deadline: Instant,
    callback: Task,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    armed: Option<Armed>,
}

/// Heap entry ordered by deadline, then by start order.
type Deadline = Reverse<(Instant, u64, TimerKey)>;

/// Slab of timer slots plus the deadline heap.
#[derive(Default)]
pub(crate) struct TimerSlots {
    slots: Vec<Slot>,
    free: Vec<usize>,
    heap: BinaryHeap<Deadline>,
    next_seq: u64,
}

impl TimerSlots {
    /// Arm a slot and return its key.
    pub(crate) fn arm(&mut self, deadline: Instant, callback: Task) -> TimerKey {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.generation += 1;
        slot.armed = Some(Armed { deadline, callback });

        let key = TimerKey {
            index,
            generation: slot.generation,
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((deadline, seq, key)));
        key
    }

    /// Disarm a scheduling. Returns the dropped callback if it was still armed.
    pub(crate) fn disarm(&mut self, key: TimerKey) -> Option<Task> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        let armed = slot.armed.take()?;
        self.free.push(key.index);
        Some(armed.callback)
    }

    /// Take the callback of a scheduling that is due, freeing its slot.
    ///
    /// Returns `None` if the scheduling was cancelled in the meantime.
    pub(crate) fn take_expired(&mut self, key: TimerKey) -> Option<Task> {
        self.disarm(key)
    }

    /// Pop every live deadline at or before `now`, in expiration order.
    pub(crate) fn pop_due(&mut self, now: Instant, due: &mut Vec<TimerKey>) {
        while let Some(Reverse((deadline, _, key))) = self.heap.peek().copied() {
            if deadline > now {
                break;
            }
            self.heap.pop();
            if self.is_live(key) {
                due.push(key);
            }
        }
    }

    /// Earliest live deadline, discarding stale heap entries on the way.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, _, key))) = self.heap.peek().copied() {
            if self.is_live(key) {
                return Some(deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Number of armed timers.
    pub(crate) fn armed(&self) -> usize {
        self.slots.iter().filter(|s| s.armed.is_some()).count()
    }

    /// Disarm everything, returning the callbacks so they can be dropped
    /// outside the executor lock.
    pub(crate) fn clear(&mut self) -> Vec<Task> {
        self.heap.clear();
        let mut dropped = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(armed) = slot.armed.take() {
                self.free.push(index);
                dropped.push(armed.callback);
            }
        }
        dropped
    }

    fn is_live(&self, key: TimerKey) -> bool {
        self.slots
            .get(key.index)
            .is_some_and(|s| s.generation == key.generation && s.armed.is_some())
    }

    #[cfg(test)]
    pub(crate) fn deadline_of(&self, key: TimerKey) -> Option<Instant> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.armed.as_ref().map(|a| a.deadline)
    }
}

/// Handle to one scheduled expiration.
///
/// Cancelling consumes the handle, so a scheduling can be cancelled at most
/// once. Dropping a handle does not cancel the timer.
#[must_use = "dropping a TimerHandle leaves the timer armed"]
pub struct TimerHandle {
    key: TimerKey,
    expires_at: Instant,
    shared: Weak<Shared>,
}

impl TimerHandle {
    pub(crate) fn new(key: TimerKey, expires_at: Instant, shared: Weak<Shared>) -> Self {
        Self {
            key,
            expires_at,
            shared,
        }
    }

    /// Pooled slot identity of this timer.
    pub fn id(&self) -> TimerId {
        TimerId(self.key.index)
    }

    /// When the timer was scheduled to fire.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Cancel the timer.
    ///
    /// Returns `true` if the callback was still pending and will now never
    /// run, `false` if it already fired (or the executor is gone). A timer
    /// whose expiry is queued but not yet executed is still cancellable.
    pub fn cancel(self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let dropped = shared.with_timers(|timers| timers.disarm(self.key));
        dropped.is_some()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id())
            .field("generation", &self.key.generation)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn noop() -> Task {
        Box::new(|| {})
    }

    #[test]
    fn test_arm_reuses_freed_slot() {
        let mut timers = TimerSlots::default();
        let now = Instant::now();

        let a = timers.arm(now, noop());
        assert!(timers.take_expired(a).is_some());

        let b = timers.arm(now, noop());
        assert_eq!(a.index, b.index);
        assert_ne!(a.generation, b.generation);
    }

    #[test]
    fn test_outstanding_slots_are_distinct() {
        let mut timers = TimerSlots::default();
        let now = Instant::now();

        let a = timers.arm(now, noop());
        let b = timers.arm(now + Duration::from_millis(100), noop());
        assert_ne!(a.index, b.index);
        assert_eq!(timers.armed(), 2);
    }

    #[test]
    fn test_stale_key_cannot_disarm_new_scheduling() {
        let mut timers = TimerSlots::default();
        let now = Instant::now();

        let old = timers.arm(now, noop());
        timers.disarm(old).unwrap();
        let new = timers.arm(now, noop());

        assert!(timers.disarm(old).is_none());
        assert!(timers.deadline_of(new).is_some());
    }

    #[test]
    fn test_pop_due_in_expiration_order() {
        let mut timers = TimerSlots::default();
        let now = Instant::now();

        let late = timers.arm(now + Duration::from_millis(20), noop());
        let early = timers.arm(now + Duration::from_millis(10), noop());
        let future = timers.arm(now + Duration::from_secs(60), noop());

        let mut due = Vec::new();
        timers.pop_due(now + Duration::from_millis(30), &mut due);
        assert_eq!(due, vec![early, late]);
        assert_eq!(timers.next_deadline(), timers.deadline_of(future));
    }

    #[test]
    fn test_cancelled_entries_are_skipped() {
        let mut timers = TimerSlots::default();
        let now = Instant::now();

        let a = timers.arm(now, noop());
        timers.disarm(a).unwrap();

        let mut due = Vec::new();
        timers.pop_due(now + Duration::from_secs(1), &mut due);
        assert!(due.is_empty());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn test_clear_returns_callbacks() {
        let mut timers = TimerSlots::default();
        let now = Instant::now();
        let _ = timers.arm(now, noop());
        let _ = timers.arm(now, noop());

        assert_eq!(timers.clear().len(), 2);
        assert_eq!(timers.armed(), 0);
        assert_eq!(timers.next_deadline(), None);
    }
}
