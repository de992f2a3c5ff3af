//! The timer tick hook, run from the timer IRQ with interrupts disabled.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::{arch, task};

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Ticks since the timer was armed at boot.
pub fn ticks_since_boot() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// One tick: account it on the current task, advance the wake-up timer
/// list, and request a reschedule when the time slice is gone or a worker
/// thread has work.
pub fn on_timer_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    task::sched_account_ticks();
    task::wakeup_timer_tick();
    if task::need_reschedule() {
        task::set_need_resched();
    }
    arch::set_next_trigger();
}

pub fn init() {
    arch::enable_timer_interrupt();
    arch::set_next_trigger();
}
