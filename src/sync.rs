//! # Critical Sections and the Scheduler Lock
//!
//! Two orthogonal exclusion mechanisms (spec §4.2):
//!
//! - A **critical section** masks interrupts on enter and restores the
//!   prior mask on exit, re-entrant by construction. It is modelled as a
//!   process-wide ambient capability (per the design notes in spec §9)
//!   rather than a value threaded through every call: acquiring one is a
//!   scoped guard ([`CriticalSection::new`]) built on the `critical-section`
//!   crate's `acquire`/`release` token API, which the teacher already
//!   pulls in transitively via `cortex-m`'s `critical-section-single-core`
//!   feature. Unlike hand-rolled PRIMASK save/restore, this also gives a
//!   `std`-backed implementation for host-side tests for free.
//! - A **scheduler lock** is a depth counter. `unblock_tasks` (see
//!   [`crate::event`]) is always allowed to run under it — moving a task
//!   from an event list to a ready list happens immediately — but
//!   [`crate::kernel::sched`] refuses to dispatch while the counter is
//!   non-zero. This lets a queue hold interrupts *enabled* during its
//!   data-copy window while still preventing a nested dispatch from
//!   disturbing `current_task` mid-operation.
//!
//! The two nest in either order; releasing the scheduler lock never
//! re-enables interrupts by itself.

use core::sync::atomic::{AtomicUsize, Ordering};

/// RAII guard for a critical section. Interrupts are masked for the
/// guard's lifetime and the prior mask is restored on drop, on every
/// exit path, matching spec §9's "scoped-acquisition wrapper with
/// guaranteed release."
#[must_use]
pub struct CriticalSection {
    token: critical_section::RawRestoreState,
}

impl CriticalSection {
    /// Enter a critical section, masking interrupts.
    #[inline]
    pub fn new() -> Self {
        // Safety: paired with `critical_section::release` in `Drop`,
        // called at most once per guard.
        let token = unsafe { critical_section::acquire() };
        CriticalSection { token }
    }
}

impl Default for CriticalSection {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CriticalSection {
    #[inline]
    fn drop(&mut self) {
        // Safety: `self.token` was produced by the matching `acquire`.
        unsafe { critical_section::release(self.token) }
    }
}

/// Run `f` with interrupts masked.
#[inline]
pub fn critical_section<R>(f: impl FnOnce() -> R) -> R {
    let _guard = CriticalSection::new();
    f()
}

// ---------------------------------------------------------------------------
// Scheduler lock
// ---------------------------------------------------------------------------

static SCHED_LOCK_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Enter the scheduler-locked (deferred-dispatch) region. Nestable.
#[inline]
pub fn scheduler_lock() {
    SCHED_LOCK_DEPTH.fetch_add(1, Ordering::AcqRel);
}

/// Leave the scheduler-locked region. The dispatcher becomes eligible to
/// run again once the outermost lock is released.
#[inline]
pub fn scheduler_unlock() {
    SCHED_LOCK_DEPTH.fetch_sub(1, Ordering::AcqRel);
}

/// Whether the scheduler is currently locked (depth > 0). Consulted by
/// [`crate::kernel::sched`] before it does anything else.
#[inline]
pub fn scheduler_is_locked() -> bool {
    SCHED_LOCK_DEPTH.load(Ordering::Acquire) != 0
}

/// RAII guard for [`scheduler_lock`]/[`scheduler_unlock`].
#[must_use]
pub struct SchedulerLockGuard(());

impl SchedulerLockGuard {
    #[inline]
    pub fn new() -> Self {
        scheduler_lock();
        SchedulerLockGuard(())
    }
}

impl Default for SchedulerLockGuard {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SchedulerLockGuard {
    #[inline]
    fn drop(&mut self) {
        scheduler_unlock();
    }
}
