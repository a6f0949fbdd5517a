//! # Kernel State and Scheduler
//!
//! Owns the ready lists, the suspended list, the delayed-tasks list and
//! the tick counter, and implements the dispatcher (spec §4.3/§4.5/§4.6).
//!
//! There is exactly one call stack in this kernel. A task is never more
//! than a `fn(usize)` that does a bounded amount of work and returns;
//! [`sched`] dispatches exactly one such task per call and the caller —
//! the idle loop, or the tick ISR in preemptive mode — is what keeps
//! calling it to advance the system. A task that wants to wait on an
//! event calls a `*_pend` function
//! (see [`crate::event`], [`crate::queue`]); that function returns
//! immediately regardless of whether the wait was satisfied — if it
//! wasn't, the task is simply off every ready list until the event
//! fires or its timeout tick arrives, and `sched` will not invoke it
//! again until then. This is the single-stack discipline the original
//! C kernel relies on: no saved register file, no PendSV, no per-task
//! stack to switch to.
//!
//! ## Startup sequence
//!
//! ```text
//! kernel::init()         — zero all lists, tick = 0
//! kernel::create_task(&mut TASK_A)   (×N, before or after init reruns)
//! loop { kernel::sched(); }          — cooperative idle loop
//! ```
//!
//! The tick ISR wrapper (out of scope; spec §1) is expected to call
//! [`tick_interrupt`] once per SysTick period.

use core::ptr::NonNull;

use crate::config::{self, KernelMode, PriorityType, TickType};
use crate::list::List;
use crate::sync;
use crate::task::{PendResult, Task, Timeout};

/// All mutable kernel state. A singleton in normal use (see
/// [`KERNEL_PTR`] below), but also constructible directly for isolated
/// unit tests.
pub struct KernelState {
    tick: TickType,
    current: Option<NonNull<Task>>,
    ready: [List<Task>; config::NUM_PRIORITIES],
    suspended: List<Task>,
    delayed: List<Task>,
}

impl KernelState {
    /// A freshly initialized kernel: tick at zero, all lists empty, no
    /// task running.
    pub const fn new() -> Self {
        const EMPTY: List<Task> = List::new();
        KernelState {
            tick: 0,
            current: None,
            ready: [EMPTY; config::NUM_PRIORITIES],
            suspended: List::new(),
            delayed: List::new(),
        }
    }

    #[inline]
    fn ready_index(priority: PriorityType) -> usize {
        (priority - config::LOW_PRIORITY) as usize
    }

    /// Link an address-stable task into this kernel at its fixed
    /// priority, ready to run. `task.fix_owner_pointers()` must already
    /// have been called.
    pub fn create_task(&mut self, task: &mut Task) {
        crate::kernel_assert!(
            task.priority >= config::LOW_PRIORITY && task.priority <= config::HIGH_PRIORITY,
            task.priority,
            "task priority out of range"
        );
        let idx = Self::ready_index(task.priority);
        let node = NonNull::from(&task.sched_node);
        let _cs = sync::CriticalSection::new();
        unsafe { self.ready[idx].insert_last(node) };
        #[cfg(feature = "log")]
        log::trace!("task created at priority {}", task.priority);
    }

    /// Current tick count.
    #[inline]
    pub fn tick(&self) -> TickType {
        self.tick
    }

    /// The task currently executing, if any.
    #[inline]
    pub fn current_task(&self) -> Option<NonNull<Task>> {
        self.current
    }

    /// The priority of the task currently running, or a sentinel below
    /// every valid priority if none is.
    fn current_priority(&self) -> PriorityType {
        match self.current {
            Some(t) => unsafe { t.as_ref().priority },
            None => config::LOW_PRIORITY - 1,
        }
    }

    /// Pop the head of the highest-priority non-empty ready list whose
    /// priority is strictly greater than `min_priority_exclusive` — the
    /// preemption bound (spec §4.3): a reentrant call (e.g. from the
    /// tick ISR while a task's `entry` is running) must only ever
    /// dispatch something of strictly higher priority than whatever is
    /// already running.
    fn pop_ready_above(&mut self, min_priority_exclusive: PriorityType) -> Option<NonNull<Task>> {
        let min_idx = min_priority_exclusive as isize - config::LOW_PRIORITY as isize;
        for (idx, list) in self.ready.iter_mut().enumerate().rev() {
            if idx as isize <= min_idx {
                break;
            }
            if let Some(node) = list.first() {
                let owner = unsafe { node.as_ref().owner() };
                unsafe { List::remove(node) };
                return Some(owner);
            }
        }
        None
    }

    /// Admit `task` to the tail of its ready list, unless it is
    /// currently suspended (in which case it stays off every list until
    /// `resume`). Must be called with the critical section held.
    fn admit_ready_locked(&mut self, task: &mut Task) {
        if task.suspended {
            return;
        }
        let idx = Self::ready_index(task.priority);
        let node = NonNull::from(&task.sched_node);
        unsafe { self.ready[idx].insert_last(node) };
    }

    /// Re-enqueue `task` at the tail of its priority's ready list
    /// (round-robin), unless it was moved elsewhere (blocked on an
    /// event, suspended) while it ran.
    fn requeue_if_runnable(&mut self, mut task: NonNull<Task>) {
        let t = unsafe { task.as_mut() };
        if t.suspended || t.event_node.is_linked() || t.has_timeout() {
            return;
        }
        let idx = Self::ready_index(t.priority);
        let node = NonNull::from(&t.sched_node);
        unsafe { self.ready[idx].insert_last(node) };
    }

    /// Dispatch exactly one task: the highest-priority task strictly
    /// above whatever is currently running, run to completion, then
    /// (round-robin) moved to the tail of its priority's list unless it
    /// blocked or was suspended while it ran.
    ///
    /// This advances the system by one slot per call rather than
    /// draining the ready lists internally — a task's `entry` never
    /// loops on its own, so the caller (the idle loop, or the tick ISR
    /// in preemptive mode) is what keeps calling `sched` to keep the
    /// system moving.
    ///
    /// A no-op if the scheduler lock is held (spec §4.2): the caller
    /// that holds it (e.g. a queue mid-copy) will have its own `sched`
    /// call, at lock release, pick up anything that became ready
    /// meanwhile. In [`KernelMode::Cooperative`], also a no-op whenever
    /// a task is already running — `entry` functions are never
    /// interrupted by the scheduler there, only the caller voluntarily
    /// returning to it counts as a yield. `entry` itself is invoked with
    /// no lock of `sched`'s own held, so a [`KernelMode::Preemptive`]
    /// reentrant call from the tick ISR during a lower-priority task's
    /// `entry` is not blocked by this call's own stack frame — only by
    /// the priority bound in [`Self::pop_ready_above`].
    pub fn sched(&mut self) {
        if sync::scheduler_is_locked() {
            return;
        }
        let cur_prio = self.current_priority();
        if config::KERNEL_MODE == KernelMode::Cooperative && self.current.is_some() {
            return;
        }

        let next = {
            let _cs = sync::CriticalSection::new();
            self.pop_ready_above(cur_prio)
        };
        let task = match next {
            Some(t) => t,
            None => return,
        };

        let prev_current = self.current.replace(task);
        let (entry, param) = {
            let t = unsafe { task.as_ref() };
            (t.entry, t.param)
        };
        #[cfg(feature = "log")]
        log::trace!("dispatching task at {:p}", task.as_ptr());
        entry(param);

        let _cs = sync::CriticalSection::new();
        self.current = prev_current;
        self.requeue_if_runnable(task);
    }

    /// Advance the tick counter by one and wake any task whose delayed
    /// or pending-timeout deadline has now arrived. In
    /// [`KernelMode::Preemptive`] this also invokes [`Self::sched`]
    /// before returning, so a just-woken higher-priority task runs with
    /// tick-granularity latency; in
    /// [`KernelMode::Cooperative`] dispatch only happens when the
    /// application calls `sched()` itself.
    pub fn tick_interrupt(&mut self) {
        {
            let _cs = sync::CriticalSection::new();
            self.tick = self.tick.wrapping_add(1);
            self.wake_expired_locked();
        }
        if config::KERNEL_MODE == KernelMode::Preemptive {
            self.sched();
        }
    }

    /// Walk the delayed list once, waking every task whose deadline
    /// tick has been reached or passed. Must be called with the
    /// critical section already held.
    fn wake_expired_locked(&mut self) {
        let now = self.tick;
        let mut cursor = self.delayed.first();
        while let Some(node) = cursor {
            let mut owner = unsafe { node.as_ref().owner() };
            cursor = unsafe { node.as_ref().next_in_list() };
            let t = unsafe { owner.as_mut() };

            let due = match t.timeout_tick() {
                Some(deadline) => tick_reached(now, deadline),
                None => false,
            };
            if !due {
                continue;
            }

            unsafe { List::remove(NonNull::from(&t.timeout_node)) };
            let was_delay_only = matches!(t.timeout, Timeout::Delayed(_));
            t.timeout = Timeout::NotWaiting;
            if was_delay_only {
                t.pend_result = PendResult::Success;
            } else {
                t.pend_result = PendResult::TimedOut;
                if t.event_node.is_linked() {
                    unsafe { List::remove(NonNull::from(&t.event_node)) };
                }
            }
            #[cfg(feature = "log")]
            log::trace!("task at {:p} timed out at tick {}", owner.as_ptr(), now);
            self.admit_ready_locked(t);
        }
    }

    /// Install `task`'s timeout bookkeeping for a bounded wait.
    /// `config::MAX_DELAY` means "wait forever" — no timeout node is
    /// linked. Must be called with the critical section held.
    pub fn arm_timeout(&mut self, task: &mut Task, ticks_to_wait: TickType, delay_only: bool) {
        if ticks_to_wait == config::MAX_DELAY {
            task.timeout = Timeout::NotWaiting;
            return;
        }
        let deadline = self.tick.wrapping_add(ticks_to_wait);
        task.timeout = if delay_only {
            Timeout::Delayed(deadline)
        } else {
            Timeout::Waiting(deadline)
        };
        let node = NonNull::from(&task.timeout_node);
        unsafe { self.delayed.insert_last(node) };
    }

    /// Put `task` to sleep until `tick() + ticks`, independent of any
    /// event (spec §3's "delayed until tick T"). Returns once the delay
    /// has elapsed.
    pub fn delay(&mut self, task: &mut Task, ticks: TickType) {
        // The caller is expected to be the currently-running task,
        // already off every ready list (popped by `sched` before its
        // entry function was invoked); only the timeout bookkeeping is
        // needed here.
        {
            let _cs = sync::CriticalSection::new();
            self.arm_timeout(task, ticks, true);
        }
        self.sched();
    }

    /// Suspend `task`: remove it from whatever makes it schedulable and
    /// mark it so that neither `sched` nor a future unblock re-admits it
    /// to a ready list until [`Self::resume`].
    pub fn suspend(&mut self, task: &mut Task) {
        let _cs = sync::CriticalSection::new();
        task.suspended = true;
        if task.sched_node.is_linked() {
            unsafe { List::remove(NonNull::from(&task.sched_node)) };
        }
        let node = NonNull::from(&task.sched_node);
        unsafe { self.suspended.insert_last(node) };
    }

    /// Resume a suspended task: clears the suspended flag and, if it is
    /// not also waiting on an event/timeout, admits it to its ready
    /// list immediately.
    pub fn resume(&mut self, task: &mut Task) {
        let _cs = sync::CriticalSection::new();
        if !task.suspended {
            return;
        }
        task.suspended = false;
        if task.sched_node.is_linked() {
            unsafe { List::remove(NonNull::from(&task.sched_node)) };
        }
        if !task.event_node.is_linked() && !task.has_timeout() {
            let idx = Self::ready_index(task.priority);
            let node = NonNull::from(&task.sched_node);
            unsafe { self.ready[idx].insert_last(node) };
        }
    }
}

/// True if the wraparound-aware tick counter has reached or passed
/// `deadline`, i.e. `(now - deadline)` is non-negative as a signed
/// difference. `TickType` is unsigned and wraps; comparing directly
/// (`now >= deadline`) breaks the moment `now` wraps past
/// `TickType::MAX` while `deadline` hasn't — see spec §9.
#[inline]
pub fn tick_reached(now: TickType, deadline: TickType) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

// ---------------------------------------------------------------------------
// Global singleton + free-function API (spec §6)
// ---------------------------------------------------------------------------

static mut KERNEL: KernelState = KernelState::new();

/// Raw pointer to the singleton, set by [`init`] — present so a future
/// hardware port's ISR trampolines can reach the kernel without going
/// through a Rust reference.
#[no_mangle]
pub static mut KERNEL_PTR: *mut KernelState = core::ptr::null_mut();

/// Re-initialize the kernel: all lists empty, tick at zero, no task
/// running. Must be called exactly once before any task is created,
/// and is also how `#[cfg(test)]` tests reset shared state between
/// cases (see `tests::with_fresh_kernel`).
pub fn init() {
    let _cs = sync::CriticalSection::new();
    unsafe {
        KERNEL = KernelState::new();
        KERNEL_PTR = core::ptr::addr_of_mut!(KERNEL);
    }
}

#[inline]
fn with_kernel<R>(f: impl FnOnce(&mut KernelState) -> R) -> R {
    unsafe { f(&mut *core::ptr::addr_of_mut!(KERNEL)) }
}

/// Register `task` (caller-owned, address-stable storage) with the
/// kernel at its fixed priority.
pub fn create_task(task: &'static mut Task) {
    task.fix_owner_pointers();
    with_kernel(|k| k.create_task(task));
}

/// Run the dispatcher once. See [`KernelState::sched`].
pub fn sched() {
    with_kernel(KernelState::sched);
}

/// Tick ISR entry point. See [`KernelState::tick_interrupt`].
pub fn tick_interrupt() {
    with_kernel(KernelState::tick_interrupt);
}

/// Current tick count.
pub fn get_tick() -> TickType {
    with_kernel(KernelState::tick)
}

/// The task currently executing, if any.
pub fn get_current_task() -> Option<NonNull<Task>> {
    with_kernel(KernelState::current_task)
}

/// Suspend a task unconditionally.
pub fn task_suspend(task: &mut Task) {
    with_kernel(|k| k.suspend(task));
}

/// Resume a previously suspended task.
pub fn task_resume(task: &mut Task) {
    with_kernel(|k| k.resume(task));
}

/// Delay the calling task for `ticks` ticks (spec §3's `Delayed(T)`).
pub fn task_delay(task: &mut Task, ticks: TickType) {
    with_kernel(|k| k.delay(task, ticks));
}

/// Arm a timeout on `task` without touching the ready/suspended lists,
/// used by [`crate::event`] when installing a wait. Must be called with
/// the critical section already held by the caller.
pub fn arm_timeout(task: &mut Task, ticks_to_wait: TickType) {
    with_kernel(|k| k.arm_timeout(task, ticks_to_wait, false));
}

/// Admit a just-woken task to its ready list (unless suspended), used
/// by [`crate::event::Event::unblock_one`]. Must be called with the
/// critical section already held by the caller.
pub fn admit_ready(task: &mut Task) {
    with_kernel(|k| k.admit_ready_locked(task));
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// The global `KERNEL` is process-wide; serialize tests that touch
    /// the free-function API so they cannot interleave under a
    /// parallel test runner. Tests that only construct a local
    /// `KernelState` don't need this.
    static TEST_SERIAL: Mutex<()> = Mutex::new(());

    pub fn with_fresh_kernel<R>(f: impl FnOnce() -> R) -> R {
        let _guard = TEST_SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        init();
        f()
    }

    fn noop(_param: usize) {}

    #[test]
    fn tick_reached_handles_wraparound() {
        assert!(tick_reached(10, 10));
        assert!(tick_reached(11, 10));
        assert!(!tick_reached(9, 10));
        // now has wrapped past MAX, deadline hasn't: still "reached".
        assert!(tick_reached(2, TickType::MAX - 3));
    }

    #[test]
    fn sched_runs_highest_priority_first() {
        let mut k = KernelState::new();
        static mut ORDER: std::vec::Vec<u8> = std::vec::Vec::new();
        fn low(_p: usize) {
            unsafe { ORDER.push(1) };
        }
        fn high(_p: usize) {
            unsafe { ORDER.push(2) };
        }
        let mut a = Task::new(low, 0, config::LOW_PRIORITY);
        let mut b = Task::new(high, 0, config::HIGH_PRIORITY);
        a.fix_owner_pointers();
        b.fix_owner_pointers();
        k.create_task(&mut a);
        k.create_task(&mut b);
        k.sched();
        k.sched();
        unsafe {
            assert_eq!(ORDER, std::vec![2, 1]);
            ORDER.clear();
        }
    }

    #[test]
    fn suspended_task_is_not_dispatched() {
        let mut k = KernelState::new();
        fn body(_p: usize) {
            panic!("suspended task must not run");
        }
        let mut a = Task::new(body, 0, 0);
        a.fix_owner_pointers();
        k.create_task(&mut a);
        k.suspend(&mut a);
        k.sched();
    }

    #[test]
    fn resume_reschedules_a_suspended_task() {
        let mut k = KernelState::new();
        static mut RAN: bool = false;
        fn body(_p: usize) {
            unsafe { RAN = true };
        }
        let mut a = Task::new(body, 0, 0);
        a.fix_owner_pointers();
        k.create_task(&mut a);
        k.suspend(&mut a);
        k.resume(&mut a);
        k.sched();
        assert!(unsafe { RAN });
    }

    #[test]
    fn delay_wakes_after_tick_interrupt() {
        let mut k = KernelState::new();
        fn body(_p: usize) {}
        let mut a = Task::new(body, 0, 0);
        a.fix_owner_pointers();
        {
            let _cs = sync::CriticalSection::new();
            k.arm_timeout(&mut a, 3, true);
        }
        assert!(!a.sched_node.is_linked());
        for _ in 0..3 {
            k.tick_interrupt();
        }
        assert_eq!(a.timeout, Timeout::NotWaiting);
        assert_eq!(a.pend_result, PendResult::Success);
    }

    #[test]
    fn global_singleton_create_and_sched() {
        with_fresh_kernel(|| {
            static mut TASK_A: Task = Task::new(noop, 7, 0);
            unsafe {
                create_task(&mut *core::ptr::addr_of_mut!(TASK_A));
            }
            sched();
            assert!(get_current_task().is_none());
        });
    }

    /// A strictly higher-priority task created while a lower-priority
    /// one is mid-`entry`, and dispatched via a reentrant `sched()` call
    /// (standing in for the tick ISR firing during that `entry`), runs
    /// to completion *before* the low-priority task's `entry` resumes —
    /// the preemption `KernelMode::Preemptive` promises.
    #[test]
    fn preemptive_mode_dispatches_a_higher_priority_task_mid_entry() {
        with_fresh_kernel(|| {
            assert_eq!(config::KERNEL_MODE, KernelMode::Preemptive);
            static mut ORDER: std::vec::Vec<u8> = std::vec::Vec::new();
            static mut TASK_HIGH: Task = Task::new(high, 0, config::HIGH_PRIORITY);
            static mut TASK_LOW: Task = Task::new(low, 0, config::LOW_PRIORITY);

            fn high(_p: usize) {
                unsafe { ORDER.push(2) };
            }
            fn low(_p: usize) {
                unsafe { ORDER.push(1) };
                unsafe { create_task(&mut *core::ptr::addr_of_mut!(TASK_HIGH)) };
                sched();
                unsafe { ORDER.push(3) };
            }

            unsafe { create_task(&mut *core::ptr::addr_of_mut!(TASK_LOW)) };
            sched();
            unsafe {
                assert_eq!(ORDER, std::vec![1, 2, 3]);
            }
        });
    }
}
