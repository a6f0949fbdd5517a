//! # Cortex-M4 Port
//!
//! The only hardware-specific code this kernel needs: SysTick
//! configuration and the SysTick handler that drives
//! [`crate::kernel::tick_interrupt`]. Critical sections are handled by
//! the `cortex-m` crate's `critical-section-single-core` feature, which
//! registers a `critical-section` implementation for this target
//! automatically — there is nothing port-specific left for `sync.rs` to
//! do.
//!
//! Context switching, PendSV and per-task stacks do not exist in this
//! port: every task runs on the one call stack the processor already
//! has, dispatched directly by [`crate::kernel::KernelState::sched`].

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
use cortex_m_rt::exception;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};

/// Configure SysTick to fire at `TICK_HZ` using the core clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// SysTick exception handler: the kernel's sole tick source. Advances
/// the tick counter, wakes anything whose timeout has elapsed, and
/// (in `KernelMode::Preemptive`) dispatches.
#[exception]
fn SysTick() {
    crate::kernel::tick_interrupt();
}
