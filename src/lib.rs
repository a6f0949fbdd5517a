//! # rtcore — a single-stack, fixed-priority RTOS kernel core
//!
//! A portable scheduler core for resource-constrained microcontrollers,
//! built around one call stack instead of one stack per task.
//!
//! ## Overview
//!
//! Every task is a `fn(usize)` that does a bounded amount of work and
//! returns. There is no context switch, no saved register file, no
//! per-task stack: [`kernel::KernelState::sched`] dispatches exactly one
//! ready task per call by calling its entry function directly, and the
//! caller — an idle loop, or a tick interrupt in preemptive mode — keeps
//! calling it to advance the system. A task that needs to wait on an
//! event (queue space, a mutex, a semaphore) calls a `*_pend` function
//! that tries once and, on failure, registers the task on a wait list
//! and returns immediately; the task is simply not redispatched until
//! the event fires or its timeout tick arrives.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Application Tasks                     │
//! ├──────────────┬────────────────┬──────────────┬───────────┤
//! │  queue.rs    │   mutex.rs     │ semaphore.rs  │ (app code)│
//! ├──────────────┴────────────────┴──────────────┴───────────┤
//! │                    event.rs (wait lists)                   │
//! ├──────────────────────────────────────────────────────────┤
//! │                  kernel.rs (dispatcher, tick)               │
//! ├──────────────────────┬───────────────────────────────────┤
//! │   list.rs (intrusive) │   sync.rs (critical section,       │
//! │                       │   scheduler lock)                  │
//! ├──────────────────────┴───────────────────────────────────┤
//! │             arch (port-specific SysTick/interrupts)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling policy
//!
//! Fixed-priority, round-robin within a priority level
//! ([`config::NUM_PRIORITIES`] levels). [`config::KERNEL_MODE`] selects
//! between cooperative (a task only gives up the CPU by returning or
//! pending) and preemptive (the tick interrupt also redispatches).
//!
//! ## Memory model
//!
//! - No heap, no `alloc` — every primitive here is statically sized.
//! - One call stack, shared by the kernel and every task.
//! - Shared state is protected by the portable [`sync::CriticalSection`]
//!   (backed by the `critical-section` crate) and, for the sections of
//!   a queue operation that may run with interrupts re-enabled, the
//!   scheduler lock ([`sync::SchedulerLockGuard`]).
//!
//! ## Non-goals
//!
//! Dynamic allocation, per-task stacks, priority inheritance beyond a
//! mutex's owner bookkeeping, multi-core scheduling, floating-point
//! context save/restore, a file system, an MMU. None of these are
//! planned additions.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod event;
pub mod kernel;
pub mod list;
pub mod mutex;
pub mod queue;
pub mod semaphore;
pub mod sync;
pub mod task;

/// Check a kernel invariant, with the offending value attached for the
/// panic message. Panics if `cond` is false.
///
/// The free-standing analogue of the original C kernel's assert hook:
/// there is no mock to redirect this to, so in both test and firmware
/// builds a violated invariant panics (firmware builds pull in a
/// `panic_handler` such as `panic-halt`, turning this into a reset).
#[macro_export]
macro_rules! kernel_assert {
    ($cond:expr, $val:expr, $msg:literal) => {
        if !($cond) {
            panic!("{}: {:?}", $msg, $val);
        }
    };
}
