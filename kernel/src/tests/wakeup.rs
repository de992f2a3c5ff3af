use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::{
    task::{kthread_create, kthread_join, sleep_ticks, WakeCause},
    timer::ticks_since_boot,
};

static WAKE_TICK_X: AtomicU64 = AtomicU64::new(0);
static WAKE_TICK_Y: AtomicU64 = AtomicU64::new(0);
static CAUSES: AtomicU8 = AtomicU8::new(0);

fn sleeper_x(_arg: usize) {
    let cause = sleep_ticks(50);
    WAKE_TICK_X.store(ticks_since_boot(), Ordering::Relaxed);
    if cause == WakeCause::Timer {
        CAUSES.fetch_or(1, Ordering::Relaxed);
    }
}

fn sleeper_y(_arg: usize) {
    let cause = sleep_ticks(20);
    WAKE_TICK_Y.store(ticks_since_boot(), Ordering::Relaxed);
    if cause == WakeCause::Timer {
        CAUSES.fetch_or(2, Ordering::Relaxed);
    }
}

/// X sleeps 50 ticks at t0, Y sleeps 20 at t0+5: Y must wake around
/// t0+25, X around t0+50, both with a timer wake cause.
pub fn test_wakeup_timer_ordering() {
    let t0 = ticks_since_boot();
    let x = kthread_create(sleeper_x, "selftest-x", 0, 0).expect("selftest: kthread");
    sleep_ticks(5);
    let y = kthread_create(sleeper_y, "selftest-y", 0, 0).expect("selftest: kthread");
    kthread_join(&y);
    kthread_join(&x);

    let y_wake = WAKE_TICK_Y.load(Ordering::Relaxed) - t0;
    let x_wake = WAKE_TICK_X.load(Ordering::Relaxed) - t0;
    assert!((24..=27).contains(&y_wake), "Y woke at t0+{}", y_wake);
    assert!((49..=52).contains(&x_wake), "X woke at t0+{}", x_wake);
    assert!(x_wake > y_wake);
    assert_eq!(CAUSES.load(Ordering::Relaxed), 3, "both must see a timer wake");
    log::info!("selftest: wake-up timer ordering ok");
}
