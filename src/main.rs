//! # rtcore demo firmware
//!
//! A minimal demonstration of the kernel on real Cortex-M4 hardware:
//! one periodic producer writing into a bounded queue and one consumer
//! reading from it, at different priorities, driven by the SysTick tick.
//!
//! Neither task ever blocks synchronously — each is a `fn(usize)` that
//! tries its queue operation once and returns; a failed attempt just
//! means the task has nothing to do this dispatch.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use panic_halt as _;

use rtcore::config::{HIGH_PRIORITY, LOW_PRIORITY};
use rtcore::kernel::{self, sched};
use rtcore::queue::Queue;
use rtcore::task::Task;

static mut QUEUE: Queue<u32, 8> = Queue::new(0);
static mut PRODUCER: Task = Task::new(producer, 0, LOW_PRIORITY);
static mut CONSUMER: Task = Task::new(consumer, 0, HIGH_PRIORITY);

/// Writes one item per dispatch, wrapping on failure (queue full).
fn producer(_param: usize) {
    static mut NEXT: u32 = 0;
    unsafe {
        let queue = &mut *core::ptr::addr_of_mut!(QUEUE);
        if queue.write(NEXT) {
            NEXT = NEXT.wrapping_add(1);
        }
    }
}

/// Drains at most one item per dispatch.
fn consumer(_param: usize) {
    let mut out = 0u32;
    unsafe {
        let queue = &mut *core::ptr::addr_of_mut!(QUEUE);
        let _ = queue.read(&mut out);
    }
}

#[entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();

    kernel::init();
    unsafe {
        kernel::create_task(&mut *core::ptr::addr_of_mut!(PRODUCER));
        kernel::create_task(&mut *core::ptr::addr_of_mut!(CONSUMER));
    }

    rtcore::arch::cortex_m4::configure_systick(&mut cp.SYST);

    loop {
        sched();
        cortex_m::asm::wfi();
    }
}
