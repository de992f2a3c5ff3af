//! Wait objects and the blocking primitives built on them.
//!
//! Entering a sleep always follows one protocol: disable preemption, move
//! to Sleeping, record the wait object, enqueue on the target's waiter
//! list, then take the preempt-disabled yield. Wakers flip the task back
//! to Runnable and set need-resched; wake-ups are strictly FIFO per wait
//! object.

use alloc::sync::Arc;
use core::{
    cell::UnsafeCell,
    ops::{Deref, DerefMut},
};

use intrusive_collections::LinkedList;
use kernel_sync::SpinLock;

use crate::task::{
    manager::task_change_state,
    sched::{
        current_task, disable_preemption, kernel_yield_preempt_disabled, set_need_resched,
    },
    task::{Task, TaskState, WaitListAdapter, WaitObject, WakeCause},
    timer::{task_cancel_wakeup_timer, task_set_wakeup_timer},
};

/// FIFO queue of sleeping tasks, linked through their embedded wait link.
pub struct WaitQueue {
    list: LinkedList<WaitListAdapter>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            list: LinkedList::new(WaitListAdapter::NEW),
        }
    }

    pub fn push(&mut self, task: Arc<Task>) {
        debug_assert!(!task.wait_link.is_linked());
        self.list.push_back(task);
    }

    pub fn pop(&mut self) -> Option<Arc<Task>> {
        self.list.pop_front()
    }

    /// Unlinks `task` if it is still queued here; true if it was.
    pub fn remove(&mut self, task: &Arc<Task>) -> bool {
        if !task.wait_link.is_linked() {
            return false;
        }
        unsafe { self.list.cursor_mut_from_ptr(Arc::as_ptr(task)) }
            .remove()
            .is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drains the queue, waking every sleeping task with `cause`.
    pub fn wake_all(&mut self, cause: WakeCause) {
        while let Some(task) = self.pop() {
            wake_up(&task, cause);
        }
    }
}

/// Records what `task` is about to sleep on.
pub fn wait_obj_set(task: &Arc<Task>, wobj: WaitObject) {
    let mut shared = task.shared.lock();
    debug_assert!(matches!(shared.wobj, WaitObject::None));
    shared.wobj = wobj;
    shared.wake_cause = WakeCause::None;
}

/// Clears the wait object, returning why the task was woken.
pub fn wait_obj_reset(task: &Arc<Task>) -> WakeCause {
    let mut shared = task.shared.lock();
    shared.wobj = WaitObject::None;
    shared.wake_cause
}

/// Makes a sleeping task runnable, recording the cause. Safe from IRQ
/// context; a no-op for tasks that are not sleeping (the wake raced a
/// different waker).
pub fn wake_up(task: &Arc<Task>, cause: WakeCause) {
    // The shared lock is held across the state change so two wakers
    // cannot both see Sleeping and race the transition.
    let mut shared = task.shared.lock();
    if task.state() != TaskState::Sleeping {
        return;
    }
    shared.wake_cause = cause;
    task_change_state(task, TaskState::Runnable);
    set_need_resched();
}

/// Pure timed sleep through the wake-up timer list. Returns the wake
/// cause: `Timer` when the timer elapsed, `Signalled` when a signal broke
/// the sleep early.
pub fn sleep_ticks(ticks: u32) -> WakeCause {
    if ticks == 0 {
        return WakeCause::Timer;
    }
    let curr = current_task();
    let guard = disable_preemption();
    task_change_state(&curr, TaskState::Sleeping);
    wait_obj_set(&curr, WaitObject::Timer(ticks));
    task_set_wakeup_timer(&curr, ticks);
    kernel_yield_preempt_disabled(guard);
    task_cancel_wakeup_timer(&curr);
    wait_obj_reset(&curr)
}

/* kmutex */

struct MutexState {
    owner: Option<i32>,
    waiters: WaitQueue,
}

/// A sleeping mutual-exclusion lock with FIFO handoff: unlock passes
/// ownership straight to the longest waiter.
pub struct KMutex<T> {
    state: SpinLock<MutexState>,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for KMutex<T> {}
unsafe impl<T: Send> Sync for KMutex<T> {}

pub struct KMutexGuard<'a, T> {
    mutex: &'a KMutex<T>,
}

impl<T> KMutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            state: SpinLock::new(MutexState {
                owner: None,
                waiters: WaitQueue::new(),
            }),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock(&self) -> KMutexGuard<'_, T> {
        let curr = current_task();
        loop {
            let mut state = self.state.lock();
            match state.owner {
                None => {
                    state.owner = Some(curr.tid);
                    return KMutexGuard { mutex: self };
                }
                Some(tid) => {
                    assert!(tid != curr.tid, "kmutex relock by the same task");
                    let guard = disable_preemption();
                    task_change_state(&curr, TaskState::Sleeping);
                    wait_obj_set(&curr, WaitObject::Mutex(self as *const _ as usize));
                    state.waiters.push(curr.clone());
                    drop(state);
                    kernel_yield_preempt_disabled(guard);
                    // The unlocking task handed ownership to us and reset
                    // the wait object; loop to verify and return.
                    if self.state.lock().owner == Some(curr.tid) {
                        return KMutexGuard { mutex: self };
                    }
                }
            }
        }
    }

    fn unlock(&self) {
        let mut state = self.state.lock();
        match state.waiters.pop() {
            Some(next) => {
                // Direct handoff keeps wake order strictly FIFO.
                state.owner = Some(next.tid);
                drop(state);
                wait_obj_reset(&next);
                wake_up(&next, WakeCause::Signalled);
            }
            None => state.owner = None,
        }
    }
}

impl<'a, T> Deref for KMutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for KMutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for KMutexGuard<'a, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

/* kcond */

/// A condition variable over a [`KMutex`]. Waiters are queued in arrival
/// order and signalled from the head.
pub struct KCond {
    waiters: SpinLock<WaitQueue>,
}

impl KCond {
    pub const fn new() -> Self {
        Self {
            waiters: SpinLock::new(WaitQueue::new()),
        }
    }

    /// Releases `guard`, sleeps until signalled (or until `timeout` ticks
    /// pass), then re-acquires the mutex. The cause distinguishes a
    /// signal from a timeout.
    pub fn wait<'a, T>(
        &self,
        mutex: &'a KMutex<T>,
        guard: KMutexGuard<'a, T>,
        timeout: Option<u32>,
    ) -> (KMutexGuard<'a, T>, WakeCause) {
        let curr = current_task();
        let pg = disable_preemption();
        {
            let mut waiters = self.waiters.lock();
            task_change_state(&curr, TaskState::Sleeping);
            wait_obj_set(&curr, WaitObject::Condition(self as *const _ as usize));
            waiters.push(curr.clone());
        }
        if let Some(ticks) = timeout {
            task_set_wakeup_timer(&curr, ticks);
        }
        drop(guard);
        kernel_yield_preempt_disabled(pg);
        if timeout.is_some() {
            task_cancel_wakeup_timer(&curr);
        }
        // A timer or signal wake may have left us linked; clean up under
        // the same lock the signaller uses.
        self.waiters.lock().remove(&curr);
        let cause = wait_obj_reset(&curr);
        (mutex.lock(), cause)
    }

    /// Wakes the longest-waiting sleeper, skipping entries already woken
    /// by their timers.
    pub fn signal_one(&self) {
        let mut waiters = self.waiters.lock();
        while let Some(task) = waiters.pop() {
            if task.state() == TaskState::Sleeping {
                wake_up(&task, WakeCause::Signalled);
                break;
            }
        }
    }

    pub fn signal_all(&self) {
        let mut waiters = self.waiters.lock();
        while let Some(task) = waiters.pop() {
            if task.state() == TaskState::Sleeping {
                wake_up(&task, WakeCause::Signalled);
            }
        }
    }
}
