//! # Event — the Blocking/Synchronization Primitive
//!
//! A priority-ordered pair of wait lists underlying every higher-level
//! primitive in this crate (queue, mutex, semaphore). Mirrors the C
//! original's `OSEventPrePendTask`/`OSEventPendTask`/`OSEventUnblockTask`
//! trio (spec §4.4/§4.6): one event can have readers waiting for data to
//! show up and writers waiting for room to free up, each list ordered by
//! task priority so the highest-priority waiter is unblocked first.
//! Pending is split across two calls — [`Event::pre_pend`] (interrupts
//! masked) then [`Event::pend`] (scheduler lock only, interrupts
//! enabled) — so timeout installation never has to happen with
//! interrupts masked.

use core::ptr::NonNull;

use crate::config::TickType;
use crate::kernel;
use crate::list::List;
use crate::task::{PendResult, Task, Timeout};

/// Which of an event's two wait lists a task is joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Reader,
    Writer,
}

/// A blocking/event primitive: two priority-ordered wait lists.
pub struct Event {
    readers: List<Task>,
    writers: List<Task>,
}

impl Event {
    /// An event with no waiters.
    pub const fn new() -> Self {
        Event {
            readers: List::new(),
            writers: List::new(),
        }
    }

    #[inline]
    fn list_mut(&mut self, side: Side) -> &mut List<Task> {
        match side {
            Side::Reader => &mut self.readers,
            Side::Writer => &mut self.writers,
        }
    }

    /// Number of tasks currently waiting on `side`.
    pub fn waiting(&self, side: Side) -> usize {
        match side {
            Side::Reader => self.readers.len(),
            Side::Writer => self.writers.len(),
        }
    }

    /// First half of pending: link `task` onto `side`'s wait list,
    /// priority-ordered (highest priority nearer the head, FIFO among
    /// equal priorities — matching the C original's insertion-by-priority
    /// walk). Must be called with interrupts masked (the critical
    /// section held). Does not touch the ready list: the caller has
    /// already been popped off it by `kernel::sched` before its `entry`
    /// ran.
    ///
    /// Split from [`Self::pend`] so that timeout installation — which
    /// can run with interrupts re-enabled — doesn't have to happen
    /// inside this critical section too.
    pub fn pre_pend(&mut self, task: &mut Task, side: Side) {
        task.pend_result = PendResult::Pending;
        let node = NonNull::from(&task.event_node);
        let list = self.list_mut(side);
        insert_by_priority(list, node, task.priority);
    }

    /// Second half of pending: arm `task`'s timeout unless
    /// `ticks_to_wait` is `MAX_DELAY`. Called after [`Self::pre_pend`],
    /// under the scheduler lock only — interrupts are enabled here, and
    /// timeout installation takes its own brief critical section rather
    /// than requiring the caller's to still be held.
    pub fn pend(&mut self, task: &mut Task, ticks_to_wait: TickType) {
        if ticks_to_wait != crate::config::MAX_DELAY {
            let _cs = crate::sync::CriticalSection::new();
            kernel::arm_timeout(task, ticks_to_wait);
        } else {
            task.timeout = Timeout::NotWaiting;
        }
    }

    /// Wake the single highest-priority waiter on `side`, if any,
    /// admitting it back to a ready list and returning a pointer to it
    /// (e.g. so a mutex can record the new owner). Must be called with
    /// the critical section held — this always runs its effect
    /// immediately, independent of the scheduler lock (spec §4.2): only
    /// `kernel::sched`'s own dispatch is gated by that lock, never this
    /// list-to-list move.
    pub fn unblock_one_task(&mut self, side: Side) -> Option<NonNull<Task>> {
        let node = self.list_mut(side).first()?;
        let mut owner = unsafe { node.as_ref().owner() };
        unsafe { List::remove(node) };
        let t = unsafe { owner.as_mut() };
        if t.timeout_node.is_linked() {
            unsafe { List::remove(NonNull::from(&t.timeout_node)) };
        }
        t.timeout = Timeout::NotWaiting;
        t.pend_result = PendResult::Success;
        #[cfg(feature = "log")]
        log::trace!("unblocked task at {:p} on {:?} side", owner.as_ptr(), side);
        kernel::admit_ready(t);
        Some(owner)
    }

    /// As [`Self::unblock_one_task`], discarding the woken task's
    /// identity. Returns whether anyone was woken.
    pub fn unblock_one(&mut self, side: Side) -> bool {
        self.unblock_one_task(side).is_some()
    }

    /// Wake every waiter on `side` (used when an owning resource, e.g. a
    /// mutex, is destroyed or force-released). Must be called with the
    /// critical section held.
    pub fn unblock_all(&mut self, side: Side) {
        while self.unblock_one(side) {}
    }
}

/// Insert `node` into `list` keeping it ordered from highest to lowest
/// priority, FIFO among equals — an O(n) priority-queue insert, the
/// same complexity the C original pays for the same ordering guarantee.
fn insert_by_priority(list: &mut List<Task>, node: NonNull<crate::list::Node<Task>>, priority: crate::config::PriorityType) {
    let mut cursor = list.first();
    while let Some(pos) = cursor {
        let pos_priority = unsafe { pos.as_ref().owner().as_ref().priority };
        if pos_priority < priority {
            unsafe { list.insert_before(pos, node) };
            return;
        }
        cursor = unsafe { pos.as_ref().next_in_list() };
    }
    unsafe { list.insert_last(node) };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_p: usize) {}

    #[test]
    fn unblock_one_picks_highest_priority_waiter() {
        let mut event = Event::new();
        let mut low = Task::new(noop, 0, 1);
        let mut high = Task::new(noop, 0, 5);
        low.fix_owner_pointers();
        high.fix_owner_pointers();

        event.pre_pend(&mut low, Side::Reader);
        event.pend(&mut low, crate::config::MAX_DELAY);
        event.pre_pend(&mut high, Side::Reader);
        event.pend(&mut high, crate::config::MAX_DELAY);
        assert_eq!(event.waiting(Side::Reader), 2);

        assert!(event.unblock_one(Side::Reader));
        assert_eq!(high.pend_result, PendResult::Success);
        assert_eq!(low.pend_result, PendResult::Pending);
        assert_eq!(event.waiting(Side::Reader), 1);

        assert!(event.unblock_one(Side::Reader));
        assert_eq!(low.pend_result, PendResult::Success);
        assert_eq!(event.waiting(Side::Reader), 0);
    }

    #[test]
    fn unblock_with_no_waiters_is_a_no_op() {
        let mut event = Event::new();
        assert!(!event.unblock_one(Side::Writer));
    }

    #[test]
    fn fifo_among_equal_priority() {
        let mut event = Event::new();
        let mut a = Task::new(noop, 0, 2);
        let mut b = Task::new(noop, 0, 2);
        a.fix_owner_pointers();
        b.fix_owner_pointers();

        event.pre_pend(&mut a, Side::Writer);
        event.pend(&mut a, crate::config::MAX_DELAY);
        event.pre_pend(&mut b, Side::Writer);
        event.pend(&mut b, crate::config::MAX_DELAY);

        event.unblock_one(Side::Writer);
        assert_eq!(a.pend_result, PendResult::Success);
        assert_eq!(b.pend_result, PendResult::Pending);
    }
}
