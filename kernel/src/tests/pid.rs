use alloc::{sync::Arc, vec::Vec};

use vfs::Path;

use crate::{
    fs::FdTable,
    mm::MemorySpace,
    task::{add_task, remove_task, task_change_state, Process, Task, TaskState, TASK_MANAGER},
};

/// A parked task owning a pid, never scheduled.
fn dummy_task(pid: i32) -> Arc<Task> {
    let ms = MemorySpace::new_user().expect("selftest: no memory");
    let proc = Process::new_user(pid, 0, ms, FdTable::new_empty(), Path::root(), pid, pid);
    let task = Task::new(pid, proc, 0, None, 0, false);
    task.set_state_raw(TaskState::Sleeping);
    add_task(&task);
    task
}

fn retire(task: &Arc<Task>) {
    task_change_state(task, TaskState::Zombie);
    remove_task(task);
}

/// Pid allocation prefers rising pids, wraps to the lowest free one when
/// the ceiling is hit, and reports exhaustion.
pub fn test_pid_allocation() {
    let mut tasks: Vec<Arc<Task>> = Vec::new();
    for expect in 1..=10 {
        let pid = TASK_MANAGER.lock().create_new_pid();
        assert_eq!(pid, expect);
        tasks.push(dummy_task(pid));
    }

    // A hole at 3 is not reused while higher pids are available.
    retire(&tasks.remove(2));
    let pid = TASK_MANAGER.lock().create_new_pid();
    assert_eq!(pid, 11);
    tasks.push(dummy_task(pid));

    // With the ceiling at 11, the next allocation wraps into the hole.
    retire(&tasks.pop().expect("just pushed"));
    let pid = TASK_MANAGER.lock().create_new_pid_in(11);
    assert_eq!(pid, 3);
    tasks.push(dummy_task(pid));

    // Full occupancy reports failure.
    assert_eq!(TASK_MANAGER.lock().create_new_pid_in(10), -1);

    for task in &tasks {
        retire(task);
    }
    log::info!("selftest: pid allocation ok");
}
