//! # Queue — Fixed-Capacity FIFO
//!
//! A ring buffer of `N` items of type `T`, blocking via the shared
//! [`crate::event::Event`] primitive. Ported from `source/queue.c`'s
//! lock-counter algorithm (spec §4.7): the ring pointers (`head`,
//! `tail`) and the *reserving* side's own count (`free` on write,
//! `used` on read) are updated inside a critical section, but the item
//! copy itself happens *outside* one (bounded by the scheduler lock on
//! the write side only, matching the original) — this keeps interrupts
//! enabled during a potentially large `memcpy`-equivalent. The *other*
//! side's count only becomes visible once the in-flight operation's
//! copy has completed: `r_lock`/`w_lock` count readers/writers whose
//! ring-pointer update has committed but whose copy hasn't finished
//! yet, and `used`/`free` are only incremented — by the whole
//! accumulated lock count at once — when that count drains back to
//! zero. A reader can therefore never observe `used` counting a slot
//! whose write hasn't finished landing, and a writer can never observe
//! `free` counting a slot a reader hasn't finished copying out of.
//!
//! Unlike the untyped `void *`/`item_size` original, this queue is
//! generic over `T: Copy` and a const-generic capacity `N` — idiomatic
//! Rust in place of a runtime-checked element size.

use crate::config::TickType;
use crate::event::{Event, Side};
use crate::task::Task;

/// A fixed-capacity FIFO of `N` items of type `T`.
pub struct Queue<T: Copy, const N: usize> {
    buf: [T; N],
    head: usize,
    tail: usize,
    /// Items visibly available to a reader. Mirrors `struct queue_t`'s
    /// `used` field: tracked independently of `free`, not derived from
    /// it, since the two transiently don't sum to `N` while an
    /// operation is in flight.
    used: usize,
    /// Slots visibly available to a writer. See `used`.
    free: usize,
    r_lock: u8,
    w_lock: u8,
    event: Event,
}

impl<T: Copy, const N: usize> Queue<T, N> {
    /// An empty queue. `fill` is never observed by a caller — it only
    /// occupies the backing array's slots until written — but a
    /// concrete value is required since the kernel never allocates or
    /// leaves memory uninitialized.
    pub const fn new(fill: T) -> Self {
        // `kernel_assert!` isn't callable from a const fn; a zero-capacity
        // queue is rejected the same way the original's `item_size == 0`
        // misuse is — by never being usable (every read/write is a no-op
        // against `used == 0` and `free == 0`).
        Queue {
            buf: [fill; N],
            head: 0,
            tail: 0,
            used: 0,
            free: N,
            r_lock: 0,
            w_lock: 0,
            event: Event::new(),
        }
    }

    /// Fixed capacity (`N`).
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Items currently visible to a reader.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Slots currently visible to a writer.
    #[inline]
    pub fn free(&self) -> usize {
        self.free
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free == 0
    }

    /// Queue length. Matches the original's documented quirk (spec §9
    /// Open Question, resolved in `DESIGN.md`): this returns the fixed
    /// `capacity`, not the live item count — use [`Self::used`] for
    /// that.
    #[inline]
    pub fn length(&self) -> usize {
        N
    }

    /// Attempt to read one item without blocking. Returns `true` and
    /// fills `out` if the queue was non-empty.
    ///
    /// The copy-out runs with interrupts enabled and *without* the
    /// scheduler lock held, exactly as the original does — only the
    /// write side takes the scheduler lock across its copy (see
    /// [`Self::write`]).
    pub fn read(&mut self, out: &mut T) -> bool {
        let (pos, lock) = {
            let _cs = crate::sync::CriticalSection::new();
            if self.used == 0 {
                return false;
            }
            let pos = self.head;
            self.head = (self.head + 1) % N;
            let lock = self.r_lock;
            self.r_lock = self.r_lock.saturating_add(1);
            self.used -= 1;
            (pos, lock)
        };

        #[cfg(test)]
        test_hooks::call();
        *out = self.buf[pos];

        {
            let _cs = crate::sync::CriticalSection::new();
            if lock == 0 {
                self.free += self.r_lock as usize;
                self.r_lock = 0;
            }
            let _slock = crate::sync::SchedulerLockGuard::new();
            if self.event.waiting(Side::Writer) > 0 {
                self.event.unblock_one(Side::Writer);
            }
        }
        true
    }

    /// Attempt to write one item without blocking. Returns `true` and
    /// consumes `item` if the queue had room.
    ///
    /// Unlike [`Self::read`], the copy-in runs under the scheduler
    /// lock — held from before the copy through the bookkeeping that
    /// follows it — matching the original's `QueueWrite`.
    pub fn write(&mut self, item: T) -> bool {
        let (pos, lock, _slock) = {
            let _cs = crate::sync::CriticalSection::new();
            if self.free == 0 {
                return false;
            }
            let pos = self.tail;
            self.tail = (self.tail + 1) % N;
            let lock = self.w_lock;
            self.w_lock = self.w_lock.saturating_add(1);
            self.free -= 1;
            let slock = crate::sync::SchedulerLockGuard::new();
            (pos, lock, slock)
        };

        #[cfg(test)]
        test_hooks::call();
        self.buf[pos] = item;

        {
            let _cs = crate::sync::CriticalSection::new();
            if lock == 0 {
                self.used += self.w_lock as usize;
                self.w_lock = 0;
            }
            if self.event.waiting(Side::Reader) > 0 {
                self.event.unblock_one(Side::Reader);
            }
        }
        drop(_slock);
        true
    }

    /// Read one item, blocking `task` for up to `ticks_to_wait` ticks
    /// if the queue is currently empty. Returns `true` if `out` was
    /// filled immediately; on `false`, `task` has been registered as a
    /// reader-side waiter (or, if `ticks_to_wait` was `0`, simply
    /// failed) and the caller must return control to the scheduler —
    /// this kernel never blocks a call, only a task's ready-ness (see
    /// `crate::kernel`).
    pub fn read_pend(&mut self, out: &mut T, task: &mut Task, ticks_to_wait: TickType) -> bool {
        if self.read(out) {
            return true;
        }
        if ticks_to_wait == 0 {
            return false;
        }
        let _slock = crate::sync::SchedulerLockGuard::new();
        let pending = {
            let _cs = crate::sync::CriticalSection::new();
            // Re-check: an interrupt-context write could have landed
            // between the failed attempt above and taking this section.
            if self.used > 0 {
                false
            } else {
                self.event.pre_pend(task, Side::Reader);
                true
            }
        };
        if !pending {
            return self.read(out);
        }
        // Timeout installation runs with interrupts re-enabled, under
        // the scheduler lock only.
        self.event.pend(task, ticks_to_wait);
        false
    }

    /// Write one item, blocking `task` for up to `ticks_to_wait` ticks
    /// if the queue is currently full. See [`Self::read_pend`] for the
    /// non-blocking-call contract.
    pub fn write_pend(&mut self, item: T, task: &mut Task, ticks_to_wait: TickType) -> bool {
        if self.write(item) {
            return true;
        }
        if ticks_to_wait == 0 {
            return false;
        }
        let _slock = crate::sync::SchedulerLockGuard::new();
        let pending = {
            let _cs = crate::sync::CriticalSection::new();
            // Re-check: an interrupt-context read could have landed
            // between the failed attempt above and taking this section.
            if self.free > 0 {
                false
            } else {
                self.event.pre_pend(task, Side::Writer);
                true
            }
        };
        if !pending {
            return self.write(item);
        }
        self.event.pend(task, ticks_to_wait);
        false
    }
}

/// Test-only hook matching the original's
/// `LIBRERTOS_TEST_CONCURRENT_ACCESS()` macro: a deterministic
/// interleaving point invoked exactly where the ring pointers have
/// already been committed but the item copy has not, letting a test
/// simulate an interrupt-driven queue operation landing in that window.
#[cfg(test)]
pub mod test_hooks {
    use std::sync::Mutex;

    static HOOK: Mutex<Option<fn()>> = Mutex::new(None);

    pub fn set(hook: Option<fn()>) {
        *HOOK.lock().unwrap_or_else(|e| e.into_inner()) = hook;
    }

    pub(crate) fn call() {
        if let Some(f) = *HOOK.lock().unwrap_or_else(|e| e.into_inner()) {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut q: Queue<u32, 4> = Queue::new(0);
        assert!(q.write(7));
        assert!(q.write(8));
        assert_eq!(q.used(), 2);

        let mut out = 0;
        assert!(q.read(&mut out));
        assert_eq!(out, 7);
        assert!(q.read(&mut out));
        assert_eq!(out, 8);
        assert!(q.is_empty());
    }

    #[test]
    fn read_from_empty_fails_without_blocking_when_ticks_zero() {
        let mut q: Queue<u32, 2> = Queue::new(0);
        let mut out = 0;
        assert!(!q.read(&mut out));
    }

    #[test]
    fn write_to_full_fails() {
        let mut q: Queue<u32, 2> = Queue::new(0);
        assert!(q.write(1));
        assert!(q.write(2));
        assert!(!q.write(3));
        assert_eq!(q.used(), 2);
    }

    #[test]
    fn wraps_around_the_ring() {
        let mut q: Queue<u32, 2> = Queue::new(0);
        let mut out = 0;
        assert!(q.write(1));
        assert!(q.read(&mut out));
        assert_eq!(out, 1);
        assert!(q.write(2));
        assert!(q.write(3));
        assert!(q.read(&mut out));
        assert_eq!(out, 2);
        assert!(q.read(&mut out));
        assert_eq!(out, 3);
    }

    #[test]
    fn length_returns_capacity_not_used_count() {
        let mut q: Queue<u32, 5> = Queue::new(0);
        assert_eq!(q.length(), 5);
        q.write(1);
        assert_eq!(q.length(), 5);
    }

    #[test]
    fn read_pend_fails_fast_with_zero_ticks() {
        let mut q: Queue<u32, 1> = Queue::new(0);
        let mut out = 0;
        let mut t = Task::new(|_| {}, 0, 0);
        t.fix_owner_pointers();
        assert!(!q.read_pend(&mut out, &mut t, 0));
    }

    #[test]
    fn write_pend_registers_a_waiter_on_full_queue() {
        let mut q: Queue<u32, 1> = Queue::new(0);
        let mut t = Task::new(|_| {}, 0, 0);
        t.fix_owner_pointers();
        assert!(q.write(1));
        assert!(!q.write_pend(2, &mut t, 10));
        assert_eq!(q.event.waiting(Side::Writer), 1);
    }

    #[test]
    fn concurrent_access_hook_fires_during_copy_window() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn bump() {
            HITS.fetch_add(1, Ordering::SeqCst);
        }
        test_hooks::set(Some(bump));
        let mut q: Queue<u32, 2> = Queue::new(0);
        q.write(1);
        test_hooks::set(None);
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
    }
}

#[cfg(test)]
mod quickcheck_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    /// Whatever subset of `items` actually fits comes back out in the
    /// same order it went in — the ring never reorders or drops an
    /// accepted item.
    #[quickcheck]
    fn fifo_order_is_preserved(items: std::vec::Vec<u8>) -> bool {
        let mut q: Queue<u8, 16> = Queue::new(0);
        let mut expected = std::vec::Vec::new();
        for &item in items.iter() {
            if q.write(item) {
                expected.push(item);
            }
        }
        let mut actual = std::vec::Vec::new();
        let mut out = 0u8;
        while q.read(&mut out) {
            actual.push(out);
        }
        actual == expected
    }

    /// No sequence of writes ever pushes `used` past `capacity`.
    #[quickcheck]
    fn used_never_exceeds_capacity(write_count: u8) -> bool {
        let mut q: Queue<u8, 4> = Queue::new(0);
        for i in 0..write_count {
            q.write(i);
        }
        q.used() <= q.capacity()
    }

    /// Interleaved writes and reads conserve the item count: `used`
    /// always equals writes accepted minus reads accepted so far.
    #[quickcheck]
    fn used_matches_accepted_writes_minus_reads(ops: std::vec::Vec<bool>) -> bool {
        let mut q: Queue<u8, 8> = Queue::new(0);
        let mut accepted_writes = 0usize;
        let mut accepted_reads = 0usize;
        let mut next = 0u8;
        for write in ops {
            if write {
                if q.write(next) {
                    accepted_writes += 1;
                }
                next = next.wrapping_add(1);
            } else {
                let mut out = 0u8;
                if q.read(&mut out) {
                    accepted_reads += 1;
                }
            }
        }
        q.used() == accepted_writes - accepted_reads
    }
}
