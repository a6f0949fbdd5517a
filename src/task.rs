//! # Task Record
//!
//! A task is not a thread: there is one call stack, shared by every task
//! and the scheduler itself. A `Task` is the bookkeeping the kernel needs
//! to decide *whose* `entry` to invoke next, never a saved register file
//! or stack pointer (contrast the C original's `TaskPtr_t` function
//! pointer plus the three lists it can be linked into; there is no
//! `stack` field here — cf. `arch::cortex_m4`, which only configures
//! SysTick, never a per-task stack).

use core::ptr::NonNull;

use crate::config::{PriorityType, TickType};
use crate::list::Node;

/// A task's relationship to the tick counter (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Not pending on anything with a deadline.
    NotWaiting,
    /// Pending on an event; times out at tick `T` unless unblocked first.
    Waiting(TickType),
    /// Sleeping unconditionally until tick `T` (`task_delay`).
    Delayed(TickType),
}

/// Outcome recorded on a task when it leaves an event's wait list,
/// consumed by the caller of `event::pend` to decide `SUCCESS`/`TIMEOUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendResult {
    /// Still pending; no outcome yet.
    Pending,
    /// Woken because a resource became available.
    Success,
    /// Woken because its timeout tick was reached.
    TimedOut,
}

/// A task entry point: an opaque parameter in, never returns a value the
/// kernel inspects. Tasks that run to completion simply return; the
/// kernel does not reschedule a finished task on its own.
pub type EntryFn = fn(usize);

/// The kernel's bookkeeping record for one task (spec §3).
///
/// `sched_node` links this task into exactly one of the kernel's ready
/// lists or its suspended list. `event_node` links it into at most one
/// event's wait list at a time. `timeout_node` links it into the
/// delayed-tasks list when `timeout` is `Waiting`/`Delayed`. A `Task`
/// must not move once any node has been linked — callers provide
/// `'static` or otherwise address-stable storage, exactly as the
/// original expects task records to outlive the kernel.
pub struct Task {
    /// Entry point invoked by the scheduler.
    pub entry: EntryFn,
    /// Opaque parameter passed to `entry` on every invocation.
    pub param: usize,
    /// Fixed priority in `[LOW_PRIORITY, HIGH_PRIORITY]`. Never changes
    /// after creation — there is no priority inheritance (Non-goal).
    pub priority: PriorityType,

    /// Link into a ready list, the suspended list, or nothing.
    pub sched_node: Node<Task>,
    /// Link into an event's wait list, or nothing.
    pub event_node: Node<Task>,
    /// Link into the delayed-tasks list, or nothing.
    pub timeout_node: Node<Task>,

    /// Waiting-until-tick state.
    pub timeout: Timeout,
    /// Set by `event::unblock_one`/tick expiry, read by the pender.
    pub pend_result: PendResult,
    /// Whether this task is currently suspended (not schedulable even
    /// if it would otherwise be ready).
    pub suspended: bool,
}

impl Task {
    /// Build a task record. The task starts suspended; the caller links
    /// it into a ready list (typically via `kernel::create_task`) once
    /// its storage address is final.
    pub const fn new(entry: EntryFn, param: usize, priority: PriorityType) -> Self {
        Task {
            entry,
            param,
            priority,
            sched_node: Node::new(NonNull::dangling()),
            event_node: Node::new(NonNull::dangling()),
            timeout_node: Node::new(NonNull::dangling()),
            timeout: Timeout::NotWaiting,
            pend_result: PendResult::Pending,
            suspended: false,
        }
    }

    /// Fix up the three nodes' `owner` back-pointers to `self`'s current
    /// address. Must be called exactly once, after `self` has reached
    /// the storage it will occupy for the rest of its life (typically a
    /// `static mut`) and before it is linked into any list — the kernel
    /// never moves a `Task` once this has run, the same contract the C
    /// original places on its statically-allocated TCBs.
    pub fn fix_owner_pointers(&mut self) {
        let self_ptr = NonNull::from(&*self);
        self.sched_node = Node::new(self_ptr);
        self.event_node = Node::new(self_ptr);
        self.timeout_node = Node::new(self_ptr);
    }

    /// Whether this task is waiting on something with a deadline.
    #[inline]
    pub fn has_timeout(&self) -> bool {
        matches!(self.timeout, Timeout::Waiting(_) | Timeout::Delayed(_))
    }

    /// The deadline tick, if any.
    #[inline]
    pub fn timeout_tick(&self) -> Option<TickType> {
        match self.timeout {
            Timeout::Waiting(t) | Timeout::Delayed(t) => Some(t),
            Timeout::NotWaiting => None,
        }
    }
}

// Safety: a `Task`'s only raw-pointer content is the intrusive node
// back-pointers, which always point at `self`; the kernel only ever
// touches a `Task` from within a critical section.
unsafe impl Send for Task {}
unsafe impl Sync for Task {}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(_param: usize) {}

    #[test]
    fn new_task_is_not_waiting_and_not_suspended() {
        let task = Task::new(dummy, 0, 3);
        assert_eq!(task.timeout, Timeout::NotWaiting);
        assert_eq!(task.pend_result, PendResult::Pending);
        assert!(!task.suspended);
        assert!(!task.has_timeout());
        assert_eq!(task.timeout_tick(), None);
    }

    #[test]
    fn timeout_tick_reads_through_either_variant() {
        let mut task = Task::new(dummy, 0, 0);
        task.timeout = Timeout::Waiting(42);
        assert!(task.has_timeout());
        assert_eq!(task.timeout_tick(), Some(42));

        task.timeout = Timeout::Delayed(7);
        assert!(task.has_timeout());
        assert_eq!(task.timeout_tick(), Some(7));
    }
}
