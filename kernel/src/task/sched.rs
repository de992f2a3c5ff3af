//! The scheduler: preemption counters, the selection policy, and the
//! context-switch choreography.
//!
//! Every context switch happens with interrupts disabled and the global
//! preempt-disable count at exactly 1. A task resuming from `__switch`
//! unwinds that single level itself (through `kernel_yield` or the
//! preempt-guard machinery), so the count is 0 whenever task code runs
//! and always 0 on return to user mode.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use kernel_sync::SpinLock;

use crate::{
    arch,
    cell::SyncCell,
    config::SCHED_TRACE_LEN,
    println,
    task::{
        context::__switch,
        manager::{task_change_state, TASK_MANAGER},
        task::{Task, TaskState},
        worker,
    },
    trap,
};

/* Preemption and need-resched */

static PREEMPT_COUNT: AtomicI32 = AtomicI32::new(0);
static NEED_RESCHED: AtomicBool = AtomicBool::new(false);

pub fn preempt_count() -> i32 {
    PREEMPT_COUNT.load(Ordering::Relaxed)
}

pub fn preemption_enabled() -> bool {
    preempt_count() == 0
}

pub fn set_need_resched() {
    NEED_RESCHED.store(true, Ordering::Relaxed);
}

pub fn clear_need_resched() {
    NEED_RESCHED.store(false, Ordering::Relaxed);
}

pub fn need_resched() -> bool {
    NEED_RESCHED.load(Ordering::Relaxed)
}

pub(crate) fn preempt_disable_raw() {
    PREEMPT_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn preempt_enable_nosched() {
    let old = PREEMPT_COUNT.fetch_sub(1, Ordering::Relaxed);
    debug_assert!(old >= 1);
}

/// Depth token for a disabled-preemption region. Dropping it re-enables
/// preemption and, at the outermost level, honors a pending resched
/// request.
pub struct PreemptGuard(());

pub fn disable_preemption() -> PreemptGuard {
    preempt_disable_raw();
    PreemptGuard(())
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        let old = PREEMPT_COUNT.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(old >= 1);
        if old == 1 && need_resched() && !trap::in_irq() {
            kernel_yield();
        }
    }
}

/* The single CPU */

pub struct Cpu {
    pub current: Option<Arc<Task>>,
    pub idle: Option<Arc<Task>>,
}

static CPU: SyncCell<Cpu> = SyncCell::new(Cpu {
    current: None,
    idle: None,
});

/// The per-CPU slot. Single processor, so this is just "the" CPU.
#[allow(clippy::mut_from_ref)]
pub fn cpu() -> &'static mut Cpu {
    unsafe { CPU.get_mut() }
}

pub fn current_task() -> Arc<Task> {
    cpu().current.clone().expect("no current task")
}

fn idle_task() -> Option<Arc<Task>> {
    cpu().idle.clone()
}

/* Tick accounting */

/// Called on every timer tick, IRQ context, on the current task.
pub fn sched_account_ticks() {
    let curr = current_task();
    curr.ticks.timeslice.fetch_add(1, Ordering::Relaxed);
    curr.ticks.total.fetch_add(1, Ordering::Relaxed);
    if curr.running_in_kernel.load(Ordering::Relaxed) {
        curr.ticks.total_kernel.fetch_add(1, Ordering::Relaxed);
    }
}

/// Should the tick handler ask for a reschedule?
pub fn need_reschedule() -> bool {
    let curr = current_task();
    if let Some(runner) = worker::highest_runnable_worker() {
        return !Arc::ptr_eq(&runner, &curr);
    }
    !(!curr.timeslice_expired() && curr.state() == TaskState::Running)
}

/* Scheduling proper */

/// Picks the next task and switches to it. Must be called with preemption
/// disabled; returns (with preemption still disabled) when this task is
/// scheduled again.
pub fn schedule() {
    debug_assert!(!preemption_enabled());
    clear_need_resched();
    let curr = current_task();

    // A runnable worker thread always wins.
    let selected = worker::highest_runnable_worker();
    if let Some(sel) = &selected {
        if Arc::ptr_eq(sel, &curr) {
            return;
        }
    }

    // If we preempted the task, it is still runnable.
    if curr.state() == TaskState::Running {
        task_change_state(&curr, TaskState::Runnable);
    }

    if let Some(sel) = selected {
        switch_to_task(sel);
        return;
    }

    let best = {
        let mgr = TASK_MANAGER.lock();
        mgr.select_lowest_ticks(&curr, cpu().idle.as_ref())
    };

    match best {
        Some(next) => switch_to_task(next),
        None => {
            if curr.state() == TaskState::Runnable {
                // Nobody else wants the CPU: keep running.
                task_change_state(&curr, TaskState::Running);
                curr.reset_timeslice();
                return;
            }
            let idle = idle_task().expect("no idle task to fall back to");
            switch_to_task(idle);
        }
    }
}

/// Hands the CPU to `next`. Interrupts are disabled across the state flip
/// and the register switch; control comes back here when this task is
/// scheduled again.
pub fn switch_to_task(next: Arc<Task>) {
    let was = arch::local_irq_save();
    debug_assert!(next.state() == TaskState::Runnable);

    task_change_state(&next, TaskState::Running);
    next.reset_timeslice();

    let next_ctx = &next.inner().ctx as *const _;
    let prev = cpu()
        .current
        .replace(next)
        .expect("switch without a current task");
    let prev_ctx = &mut prev.inner().ctx as *mut _;
    // The state lists keep their own reference; ours must die before the
    // switch so a zombie is not pinned by a forgotten local.
    drop(prev);

    unsafe { __switch(prev_ctx, next_ctx) };

    arch::local_irq_restore(was);
}

/// Default yield: expects preemption enabled.
pub fn kernel_yield() {
    debug_assert!(preemption_enabled());
    preempt_disable_raw();
    schedule();
    preempt_enable_nosched();
}

/// Asymmetric yield for the sleep protocol: consumes the caller's single
/// preempt-disable level and returns with preemption enabled.
pub fn kernel_yield_preempt_disabled(guard: PreemptGuard) {
    debug_assert!(preempt_count() == 1);
    core::mem::forget(guard);
    schedule();
    preempt_enable_nosched();
}

/* Transition trace for the panic dump */

struct TraceRing {
    entries: [(i32, u8, u8); SCHED_TRACE_LEN],
    pos: usize,
    wrapped: bool,
}

static TRACE: SpinLock<TraceRing> = SpinLock::new(TraceRing {
    entries: [(0, 0, 0); SCHED_TRACE_LEN],
    pos: 0,
    wrapped: false,
});

pub(crate) fn trace_transition(tid: i32, old: TaskState, new: TaskState) {
    let mut trace = TRACE.lock();
    let pos = trace.pos;
    trace.entries[pos] = (tid, old as u8, new as u8);
    trace.pos = (pos + 1) % SCHED_TRACE_LEN;
    if trace.pos == 0 {
        trace.wrapped = true;
    }
}

/// Prints the most recent task-state transitions, oldest first.
pub fn dump_sched_trace() {
    let trace = TRACE.lock();
    let count = if trace.wrapped {
        SCHED_TRACE_LEN
    } else {
        trace.pos
    };
    println!("last {} scheduler transitions:", count);
    for i in 0..count {
        let idx = if trace.wrapped {
            (trace.pos + i) % SCHED_TRACE_LEN
        } else {
            i
        };
        let (tid, old, new) = trace.entries[idx];
        println!(
            "  tid {:>6}: {:?} -> {:?}",
            tid,
            TaskState::try_from(old).unwrap_or(TaskState::Zombie),
            TaskState::try_from(new).unwrap_or(TaskState::Zombie),
        );
    }
}
