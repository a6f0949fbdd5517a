//! # Kernel Configuration
//!
//! Compile-time constants governing task priorities, timing and the
//! scheduling policy. All limits are fixed at compile time — the kernel
//! never allocates.

/// Type used for task priorities. `LOW_PRIORITY..=HIGH_PRIORITY`.
pub type PriorityType = i8;

/// Type used for the tick counter. Wraps; timeout comparisons must use
/// wrap-safe signed-difference arithmetic (see
/// [`crate::kernel::tick_reached`]).
pub type TickType = u32;

/// Lowest valid task priority.
pub const LOW_PRIORITY: PriorityType = 0;

/// Highest valid task priority. Must be `>= LOW_PRIORITY`.
pub const HIGH_PRIORITY: PriorityType = 7;

/// Number of distinct priority levels, and therefore the number of ready
/// lists the kernel maintains.
pub const NUM_PRIORITIES: usize = (HIGH_PRIORITY - LOW_PRIORITY + 1) as usize;

/// Sentinel value for `ticks_to_wait` meaning "never time out".
pub const MAX_DELAY: TickType = TickType::MAX;

/// SysTick frequency in Hz. Determines scheduler tick granularity.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
/// Only consumed by the Cortex-M4 port (`arch::cortex_m4`).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Scheduling policy selectable at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelMode {
    /// A running task is never interrupted by the scheduler; it only
    /// gives up the CPU by returning (including by pending on an event).
    Cooperative,
    /// The scheduler may dispatch a strictly higher-priority task on top
    /// of the caller's stack frame when invoked from interrupt context.
    Preemptive,
}

/// Active scheduling policy. Flip to [`KernelMode::Cooperative`] to build
/// a purely cooperative kernel; [`crate::kernel::sched`] reads this
/// constant directly, so the choice costs nothing at runtime.
pub const KERNEL_MODE: KernelMode = KernelMode::Preemptive;
