//! Tasks, processes and the scheduler.

mod clone;
mod context;
mod exit;
mod kstack;
mod manager;
mod process;
mod sched;
mod task;
pub mod timer;
mod wait;
mod worker;

pub mod kthread;

pub use clone::{do_execve, do_fork, spawn_init};
pub use exit::{do_exit, do_kill, do_wait4, reap_orphans, WaitOptions};
pub use kstack::trapframe_base;
pub use kthread::{kthread_create, kthread_exit, kthread_join, kthread_join_all, KTH_ALLOC_BUFS,
                  KTH_WORKER_THREAD};
pub use manager::{add_task, get_process, get_task, remove_task, runnable_count,
                  task_change_state, TASK_MANAGER};
pub use process::{kernel_process, Process};
pub use sched::{cpu, current_task, disable_preemption, dump_sched_trace, kernel_yield,
                kernel_yield_preempt_disabled, need_resched, need_reschedule, preempt_count,
                preemption_enabled, schedule, sched_account_ticks, set_need_resched,
                PreemptGuard};
pub(crate) use sched::{preempt_disable_raw, preempt_enable_nosched};
pub use task::{Task, TaskState, WaitObject, WakeCause};
pub use timer::{task_cancel_wakeup_timer, task_set_wakeup_timer, task_update_wakeup_timer_if_any};
pub use wait::{sleep_ticks, wait_obj_reset, wait_obj_set, wake_up, KCond, KMutex, WaitQueue};
pub use worker::{highest_runnable_worker, worker_create, worker_enqueue_job, Worker};

use log::info;

use crate::config::TIMER_HZ;

pub use timer::timer_tick as wakeup_timer_tick;

/// Creates the kernel process (pid 0) and turns the boot flow into its
/// main task, then spawns the idle thread.
pub fn init() {
    let pid = TASK_MANAGER.lock().create_new_pid();
    assert!(pid == 0, "the kernel process must get pid 0");
    let proc = process::create_kernel_process(pid);
    let main = Task::new(pid, proc, 0, Some("main"), 0, true);
    // The boot context *is* this task; its TaskContext gets filled by the
    // first switch away from it.
    main.set_state_raw(TaskState::Running);
    add_task(&main);
    cpu().current = Some(main);
    kthread::init_idle();
    info!("scheduler online: kernel process ready");
}

/// The kernel main thread's duty after boot: reap orphaned zombies,
/// forever.
pub fn kernel_main_loop() -> ! {
    loop {
        reap_orphans();
        sleep_ticks(TIMER_HZ as u32);
    }
}
