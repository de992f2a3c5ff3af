//! Kernel threads: the factory, the entry shim, join/exit, and the idle
//! task.

use alloc::sync::Arc;

use errno::Errno;
use log::debug;

use crate::{
    arch,
    error::{KernelError, KernelResult},
    task::{
        manager::{add_task, remove_task, runnable_count, task_change_state, TASK_MANAGER},
        process::kernel_process,
        sched::{
            cpu, current_task, disable_preemption, kernel_yield, kernel_yield_preempt_disabled,
            preempt_enable_nosched, schedule,
        },
        task::{Task, TaskState, WaitObject, WakeCause},
        wait::{wait_obj_reset, wait_obj_set},
    },
};

/// Ask the factory for the thread-local scratch buffers.
pub const KTH_ALLOC_BUFS: u32 = 1 << 0;

/// The thread is a worker-thread runner (see `worker.rs`).
pub const KTH_WORKER_THREAD: u32 = 1 << 1;

/// First code any kernel thread runs. Balances the preempt-disable level
/// the switch was made at, turns interrupts on, runs the payload, exits.
extern "C" fn kthread_entry() -> ! {
    preempt_enable_nosched();
    arch::intr_on();
    let (func, arg) = current_task()
        .inner()
        .kthread
        .take()
        .expect("kernel thread without an entry");
    func(arg);
    kthread_exit()
}

/// Creates a kernel thread executing `func(arg)` and hands it to the
/// scheduler.
pub fn kthread_create(
    func: fn(usize),
    name: &'static str,
    flags: u32,
    arg: usize,
) -> KernelResult<Arc<Task>> {
    let tid = TASK_MANAGER.lock().create_new_kernel_tid();
    if tid < 0 {
        return Err(KernelError::Errno(Errno::EAGAIN));
    }
    let task = Task::new(
        tid,
        kernel_process().clone(),
        kthread_entry as usize,
        Some(name),
        0,
        flags & KTH_ALLOC_BUFS != 0,
    );
    task.inner().kthread = Some((func, arg));
    add_task(&task);
    debug!("spawned {:?}", task);
    Ok(task)
}

/// Terminates the calling kernel thread. Also reached by falling off the
/// end of the thread function.
pub fn kthread_exit() -> ! {
    let curr = current_task();
    debug_assert!(curr.is_kernel_thread());
    let _guard = disable_preemption();
    // Zombie first, wake-ups second: a joiner that wakes must observe the
    // final state.
    task_change_state(&curr, TaskState::Zombie);
    curr.exit_waiters.lock().wake_all(WakeCause::TargetDied);
    drop(curr);
    schedule();
    unreachable!("a zombie was scheduled");
}

/// Blocks until the kernel thread `task` exits, then reaps it.
pub fn kthread_join(task: &Arc<Task>) {
    let curr = current_task();
    loop {
        let guard = disable_preemption();
        {
            let mut waiters = task.exit_waiters.lock();
            if task.state() == TaskState::Zombie {
                drop(waiters);
                drop(guard);
                break;
            }
            task_change_state(&curr, TaskState::Sleeping);
            wait_obj_set(&curr, WaitObject::TaskExit(task.clone()));
            waiters.push(curr.clone());
        }
        kernel_yield_preempt_disabled(guard);
        wait_obj_reset(&curr);
    }
    remove_task(task);
}

pub fn kthread_join_all(tasks: &[Arc<Task>]) {
    for task in tasks {
        kthread_join(task);
    }
}

/* The idle task */

static mut IDLE_TICKS: u64 = 0;

fn idle_task_body(_arg: usize) {
    loop {
        debug_assert!(crate::task::sched::preemption_enabled());
        unsafe { IDLE_TICKS += 1 };
        arch::halt();
        if runnable_count() > 0 {
            kernel_yield();
        }
    }
}

/// Creates the statically known idle thread the scheduler falls back to.
pub fn init_idle() {
    let idle = kthread_create(idle_task_body, "idle", 0, 0).expect("cannot create the idle task");
    cpu().idle = Some(idle);
}
