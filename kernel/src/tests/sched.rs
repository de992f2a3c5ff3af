use core::sync::atomic::{AtomicBool, Ordering};

use alloc::vec::Vec;

use crate::{
    config::TIME_SLICE_TICKS,
    task::{kthread_create, kthread_join_all, sleep_ticks},
};

static STOP: AtomicBool = AtomicBool::new(false);

fn spinner(_arg: usize) {
    while !STOP.load(Ordering::Relaxed) {
        core::hint::spin_loop();
    }
}

/// Three CPU-bound threads created together: after 300 ticks the
/// lowest-total-ticks policy must have spread the time evenly, to within
/// one time slice (the measurement lands mid-slice).
pub fn test_fair_scheduler() {
    let threads = [
        kthread_create(spinner, "selftest-a", 0, 0).expect("selftest: kthread"),
        kthread_create(spinner, "selftest-b", 0, 0).expect("selftest: kthread"),
        kthread_create(spinner, "selftest-c", 0, 0).expect("selftest: kthread"),
    ];

    sleep_ticks(300);

    let totals: Vec<u64> = threads.iter().map(|t| t.total_ticks()).collect();
    STOP.store(true, Ordering::Relaxed);
    kthread_join_all(&threads);

    let max = totals.iter().max().copied().unwrap_or(0);
    let min = totals.iter().min().copied().unwrap_or(0);
    assert!(min > 0, "a spinner never ran: {:?}", totals);
    assert!(
        max - min <= TIME_SLICE_TICKS as u64,
        "unfair spread: {:?}",
        totals
    );
    log::info!("selftest: fair scheduler ok ({:?})", totals);
}
