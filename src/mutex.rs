//! # Mutex
//!
//! A binary lock built on [`crate::event::Event`]. Framed by spec.md as
//! an external collaborator (a thin wrapper the port supplies), but its
//! behavior is pinned down exactly by `tests/mutex_test.cpp` in the
//! original sources, so it is implemented here rather than left as a
//! stub — see `DESIGN.md`.
//!
//! No priority inheritance: the mutex records its owner purely for
//! introspection (`is_locked`/`owner`), never boosts anyone's priority.
//! That is an explicit Non-goal (spec.md §1).

use core::ptr::NonNull;

use crate::config::TickType;
use crate::event::{Event, Side};
use crate::task::Task;

pub struct Mutex {
    locked: bool,
    /// The locking task, if any — recorded purely for introspection.
    /// May be `None` while `locked` is `true` if the lock was taken
    /// from outside any task's `entry` (e.g. the idle loop).
    owner: Option<NonNull<Task>>,
    event: Event,
}

impl Mutex {
    /// An unlocked mutex.
    pub const fn new() -> Self {
        Mutex {
            locked: false,
            owner: None,
            event: Event::new(),
        }
    }

    /// Whether the mutex is currently held.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The owning task, if the mutex is held and was locked from
    /// within a task's `entry`.
    #[inline]
    pub fn owner(&self) -> Option<NonNull<Task>> {
        self.owner
    }

    /// Attempt to lock without blocking. `true` on success.
    pub fn lock(&mut self) -> bool {
        let _cs = crate::sync::CriticalSection::new();
        if self.locked {
            return false;
        }
        self.locked = true;
        self.owner = crate::kernel::get_current_task();
        true
    }

    /// Lock, blocking `task` for up to `ticks_to_wait` ticks if
    /// currently held. Returns `true` if acquired immediately; on
    /// `false` the task has been registered as a waiter (unless
    /// `ticks_to_wait` was `0`) and ownership transfers to it
    /// automatically, via [`Self::unlock`], once it is its turn.
    pub fn lock_pend(&mut self, task: &mut Task, ticks_to_wait: TickType) -> bool {
        if self.lock() {
            return true;
        }
        if ticks_to_wait == 0 {
            return false;
        }
        let _slock = crate::sync::SchedulerLockGuard::new();
        let pending = {
            let _cs = crate::sync::CriticalSection::new();
            if self.locked {
                self.event.pre_pend(task, Side::Reader);
                true
            } else {
                false
            }
        };
        if !pending {
            return self.lock();
        }
        self.event.pend(task, ticks_to_wait);
        false
    }

    /// Release the mutex. Fails (`false`) if it was not held — matching
    /// `mutex_test.cpp`'s `init()` → `unlock()` ⇒ `FAIL` contract.
    /// Hands ownership directly to the highest-priority waiter, if any,
    /// rather than leaving a window where the mutex looks free.
    pub fn unlock(&mut self) -> bool {
        let _cs = crate::sync::CriticalSection::new();
        if !self.locked {
            return false;
        }
        self.owner = self.event.unblock_one_task(Side::Reader);
        self.locked = self.owner.is_some();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_lock_succeeds() {
        let mut m = Mutex::new();
        assert!(!m.is_locked());
        assert!(m.lock());
        assert!(m.is_locked());
    }

    #[test]
    fn lock_then_lock_fails() {
        let mut m = Mutex::new();
        assert!(m.lock());
        assert!(!m.lock());
    }

    #[test]
    fn lock_then_unlock_succeeds() {
        let mut m = Mutex::new();
        assert!(m.lock());
        assert!(m.unlock());
        assert!(!m.is_locked());
    }

    #[test]
    fn init_then_unlock_fails() {
        let mut m = Mutex::new();
        assert!(!m.unlock());
    }

    #[test]
    fn unlock_hands_off_to_a_waiter() {
        let mut m = Mutex::new();
        let mut waiter = Task::new(|_| {}, 0, 0);
        waiter.fix_owner_pointers();

        assert!(m.lock());
        assert!(!m.lock_pend(&mut waiter, crate::config::MAX_DELAY));
        assert!(m.unlock());
        // Ownership transferred straight to the waiter: still locked.
        assert!(m.is_locked());
    }
}
