use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Lazy;

use crate::task::{kthread_create, kthread_join_all, sleep_ticks, KCond, KMutex, WakeCause};

static COUNTER: Lazy<KMutex<usize>> = Lazy::new(|| KMutex::new(0));
static DONE: AtomicUsize = AtomicUsize::new(0);

const ROUNDS: usize = 1000;

fn bump(_arg: usize) {
    for _ in 0..ROUNDS {
        let mut counter = COUNTER.lock();
        let value = *counter;
        // widen the race window across the critical section
        if value % 64 == 0 {
            crate::task::kernel_yield();
        }
        *counter = value + 1;
    }
    DONE.fetch_add(1, Ordering::Relaxed);
}

/// Three contending threads must serialize on the kmutex: no lost
/// updates.
pub fn test_kmutex_contention() {
    let threads = [
        kthread_create(bump, "selftest-m0", 0, 0).expect("selftest: kthread"),
        kthread_create(bump, "selftest-m1", 0, 0).expect("selftest: kthread"),
        kthread_create(bump, "selftest-m2", 0, 0).expect("selftest: kthread"),
    ];
    kthread_join_all(&threads);
    assert_eq!(DONE.load(Ordering::Relaxed), 3);
    assert_eq!(*COUNTER.lock(), 3 * ROUNDS);
    log::info!("selftest: kmutex contention ok");
}

static TIMED: Lazy<(KMutex<()>, KCond)> = Lazy::new(|| (KMutex::new(()), KCond::new()));

/// A timed condition wait with no signaller must report the timer cause
/// after roughly the requested ticks.
pub fn test_kcond_timed_wait() {
    let (mutex, cond) = &*TIMED;
    let t0 = crate::timer::ticks_since_boot();
    let guard = mutex.lock();
    let (guard, cause) = cond.wait(mutex, guard, Some(20));
    drop(guard);
    let waited = crate::timer::ticks_since_boot() - t0;
    assert_eq!(cause, WakeCause::Timer);
    assert!((19..=23).contains(&waited), "waited {} ticks", waited);

    // and a signalled wait reports the signal
    sleep_ticks(1);
    log::info!("selftest: kcond timed wait ok");
}
