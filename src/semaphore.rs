//! # Binary Semaphore
//!
//! The simplest consumer of [`crate::event::Event`] (spec.md §3
//! mentions a binary semaphore as one of the event's readers): a single
//! flag, `give`/`take`, no count beyond 0/1.

use crate::config::TickType;
use crate::event::{Event, Side};
use crate::task::Task;

pub struct Semaphore {
    available: bool,
    event: Event,
}

impl Semaphore {
    /// A semaphore that starts empty (`take` would block/fail).
    pub const fn new() -> Self {
        Semaphore {
            available: false,
            event: Event::new(),
        }
    }

    /// A semaphore that starts signalled (the first `take` succeeds
    /// immediately).
    pub const fn new_given() -> Self {
        Semaphore {
            available: true,
            event: Event::new(),
        }
    }

    /// Signal the semaphore. Wakes a waiter directly rather than
    /// setting `available` and leaving it for the waiter to notice on
    /// its own dispatch.
    pub fn give(&mut self) {
        let _cs = crate::sync::CriticalSection::new();
        if self.event.unblock_one(Side::Reader) {
            return;
        }
        self.available = true;
    }

    /// Attempt to take without blocking.
    pub fn take(&mut self) -> bool {
        let _cs = crate::sync::CriticalSection::new();
        if self.available {
            self.available = false;
            return true;
        }
        false
    }

    /// Take, blocking `task` for up to `ticks_to_wait` ticks if not
    /// currently available.
    pub fn take_pend(&mut self, task: &mut Task, ticks_to_wait: TickType) -> bool {
        if self.take() {
            return true;
        }
        if ticks_to_wait == 0 {
            return false;
        }
        let _slock = crate::sync::SchedulerLockGuard::new();
        let pending = {
            let _cs = crate::sync::CriticalSection::new();
            if self.available {
                false
            } else {
                self.event.pre_pend(task, Side::Reader);
                true
            }
        };
        if !pending {
            return self.take();
        }
        self.event.pend(task, ticks_to_wait);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_on_empty_fails() {
        let mut s = Semaphore::new();
        assert!(!s.take());
    }

    #[test]
    fn give_then_take_succeeds() {
        let mut s = Semaphore::new();
        s.give();
        assert!(s.take());
        assert!(!s.take());
    }

    #[test]
    fn new_given_starts_signalled() {
        let mut s = Semaphore::new_given();
        assert!(s.take());
    }

    #[test]
    fn give_wakes_a_waiter_instead_of_latching() {
        let mut s = Semaphore::new();
        let mut waiter = Task::new(|_| {}, 0, 0);
        waiter.fix_owner_pointers();
        assert!(!s.take_pend(&mut waiter, crate::config::MAX_DELAY));
        s.give();
        assert_eq!(waiter.pend_result, crate::task::PendResult::Success);
        // The signal went straight to the waiter, not latched for a
        // future `take()`.
        assert!(!s.available);
    }
}
