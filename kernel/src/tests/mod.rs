//! Boot-time self tests: scheduler scenarios that need the real context
//! switch and timer paths. Run before init is spawned.

mod pid;
mod sched;
mod sync;
mod wakeup;

use log::info;

pub fn run() {
    info!("selftest: begin");
    pid::test_pid_allocation();
    sync::test_kmutex_contention();
    sync::test_kcond_timed_wait();
    wakeup::test_wakeup_timer_ordering();
    sched::test_fair_scheduler();
    info!("selftest: all passed");
}
