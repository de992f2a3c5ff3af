//! Wake-up timers: a delta-encoded intrusive list of sleeping tasks,
//! ordered by remaining ticks. Only the head's counter is touched on a
//! tick; insertion and cancellation are O(n).

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use intrusive_collections::LinkedList;
use kernel_sync::SpinLock;

use crate::task::{
    task::{Task, TimerListAdapter, WakeCause},
    wait::wake_up,
};

static WAKEUP_LIST: SpinLock<LinkedList<TimerListAdapter>> =
    SpinLock::new(LinkedList::new(TimerListAdapter::NEW));

/// Arms a wake-up timer: `task` becomes runnable after `ticks` timer
/// interrupts unless the timer is cancelled first.
pub fn task_set_wakeup_timer(task: &Arc<Task>, ticks: u32) {
    debug_assert!(ticks > 0);
    let mut list = WAKEUP_LIST.lock();
    debug_assert!(!task.timer_link.is_linked());

    // Walk forward while the cumulative deadline stays below ours,
    // converting our absolute tick count into a delta on the way.
    let mut remaining = ticks;
    let mut cursor = list.front_mut();
    loop {
        match cursor.get() {
            Some(t) => {
                let delta = t.wakeup_delta.load(Ordering::Relaxed);
                if remaining < delta {
                    t.wakeup_delta.store(delta - remaining, Ordering::Relaxed);
                    break;
                }
                remaining -= delta;
                cursor.move_next();
            }
            None => break,
        }
    }
    task.wakeup_delta.store(remaining, Ordering::Relaxed);
    cursor.insert_before(task.clone());
}

/// Disarms a pending wake-up timer, returning how many ticks were left
/// (0 when the timer already fired or none was set).
pub fn task_cancel_wakeup_timer(task: &Arc<Task>) -> u32 {
    let mut list = WAKEUP_LIST.lock();
    if !task.timer_link.is_linked() {
        return 0;
    }
    // Sum the deltas up to the task to reconstruct the remaining ticks.
    let mut remaining = 0;
    let mut cursor = list.front_mut();
    while let Some(t) = cursor.get() {
        remaining += t.wakeup_delta.load(Ordering::Relaxed);
        if core::ptr::eq(t, Arc::as_ptr(task)) {
            let my_delta = t.wakeup_delta.load(Ordering::Relaxed);
            cursor.remove();
            // The successor inherits our share of the wait.
            if let Some(next) = cursor.get() {
                next.wakeup_delta.fetch_add(my_delta, Ordering::Relaxed);
            }
            return remaining;
        }
        cursor.move_next();
    }
    0
}

/// Re-arms an already pending timer; does nothing when none is set.
pub fn task_update_wakeup_timer_if_any(task: &Arc<Task>, new_ticks: u32) {
    if task.timer_link.is_linked() && task_cancel_wakeup_timer(task) > 0 {
        task_set_wakeup_timer(task, new_ticks);
    }
}

/// One timer tick: decrement the head's counter and wake every task whose
/// remaining ticks reached zero. IRQ context.
pub fn timer_tick() {
    let mut list = WAKEUP_LIST.lock();
    if let Some(head) = list.front().get() {
        let delta = head.wakeup_delta.load(Ordering::Relaxed);
        head.wakeup_delta.store(delta.saturating_sub(1), Ordering::Relaxed);
    }
    loop {
        let expired = match list.front().get() {
            Some(head) if head.wakeup_delta.load(Ordering::Relaxed) == 0 => true,
            _ => false,
        };
        if !expired {
            break;
        }
        if let Some(task) = list.pop_front() {
            wake_up(&task, WakeCause::Timer);
        }
    }
}
