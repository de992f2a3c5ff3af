//! Global task bookkeeping: the three state lists, the tid-ordered tree,
//! and id allocation.
//!
//! Every mutation happens under the manager spin lock, which disables
//! interrupts; IRQ handlers may therefore wake tasks (moving them between
//! lists) without further ceremony.

use alloc::sync::Arc;

use intrusive_collections::{LinkedList, RBTree};
use kernel_sync::SpinLock;
use spin::Lazy;

use crate::{
    config::{KERNEL_MAX_TID, KERNEL_TID_START, MAX_PID},
    task::{
        process::Process,
        sched::trace_transition,
        task::{StateListAdapter, Task, TaskState, TidTreeAdapter},
    },
};

pub struct TaskManager {
    runnable: LinkedList<StateListAdapter>,
    sleeping: LinkedList<StateListAdapter>,
    zombie: LinkedList<StateListAdapter>,

    /// Every live task, ordered by tid.
    tasks: RBTree<TidTreeAdapter>,

    pub runnable_count: usize,

    current_max_pid: i32,
    current_max_ktid: i32,
}

pub static TASK_MANAGER: Lazy<SpinLock<TaskManager>> = Lazy::new(|| {
    SpinLock::new(TaskManager {
        runnable: LinkedList::new(StateListAdapter::new()),
        sleeping: LinkedList::new(StateListAdapter::new()),
        zombie: LinkedList::new(StateListAdapter::new()),
        tasks: RBTree::new(TidTreeAdapter::new()),
        runnable_count: 0,
        current_max_pid: -1,
        current_max_ktid: KERNEL_TID_START - 1,
    })
});

impl TaskManager {
    fn add_to_state_list(&mut self, task: &Arc<Task>) {
        match task.state() {
            TaskState::Runnable => {
                self.runnable.push_back(task.clone());
                self.runnable_count += 1;
            }
            TaskState::Sleeping => self.sleeping.push_back(task.clone()),
            TaskState::Zombie => self.zombie.push_back(task.clone()),
            // no dedicated list: without SMP there is only one running task
            TaskState::Running => {}
        }
    }

    fn remove_from_state_list(&mut self, task: &Arc<Task>) {
        let ptr = Arc::as_ptr(task);
        match task.state() {
            TaskState::Runnable => {
                unsafe { self.runnable.cursor_mut_from_ptr(ptr) }.remove();
                debug_assert!(self.runnable_count > 0);
                self.runnable_count -= 1;
            }
            TaskState::Sleeping => {
                unsafe { self.sleeping.cursor_mut_from_ptr(ptr) }.remove();
            }
            TaskState::Zombie => {
                unsafe { self.zombie.cursor_mut_from_ptr(ptr) }.remove();
            }
            TaskState::Running => {}
        }
    }

    /// Walks the tid tree in order, tracking the lowest unused pid overall
    /// and the lowest unused pid above the highest handed out so far. The
    /// second is preferred so pids keep rising while the space lasts.
    pub fn create_new_pid(&mut self) -> i32 {
        self.create_new_pid_in(MAX_PID)
    }

    /// The worker behind [`Self::create_new_pid`], parameterized on the
    /// pid ceiling so the wrap-around path can be exercised.
    pub fn create_new_pid_in(&mut self, max_pid: i32) -> i32 {
        let mut lowest = 0;
        let mut lowest_after_max = self.current_max_pid + 1;
        for task in self.tasks.iter() {
            if task.tid != task.proc.pid {
                continue; // skip secondary threads
            }
            if lowest == task.tid {
                lowest = task.tid + 1;
            }
            if lowest_after_max == task.tid {
                lowest_after_max = task.tid + 1;
            }
        }
        let r = if lowest_after_max <= max_pid {
            lowest_after_max
        } else if lowest <= max_pid {
            lowest
        } else {
            -1
        };
        if r >= 0 {
            self.current_max_pid = r;
        }
        r
    }

    /// Same two-candidate walk over the kernel tid range.
    pub fn create_new_kernel_tid(&mut self) -> i32 {
        let limit = KERNEL_TID_START + KERNEL_MAX_TID - 1;
        let mut lowest = KERNEL_TID_START;
        let mut lowest_after_max = self.current_max_ktid + 1;
        for task in self.tasks.iter() {
            if task.tid < KERNEL_TID_START {
                continue;
            }
            if lowest == task.tid {
                lowest = task.tid + 1;
            }
            if lowest_after_max == task.tid {
                lowest_after_max = task.tid + 1;
            }
        }
        let r = if lowest_after_max <= limit {
            lowest_after_max
        } else if lowest <= limit {
            lowest
        } else {
            -1
        };
        if r >= 0 {
            self.current_max_ktid = r;
        }
        r
    }

    /// Picks the runnable task with the smallest `total_ticks`, skipping
    /// the idle task and the current one. Ties go to list order.
    pub fn select_lowest_ticks(
        &self,
        curr: &Arc<Task>,
        idle: Option<&Arc<Task>>,
    ) -> Option<Arc<Task>> {
        let mut best: Option<Arc<Task>> = None;
        let mut cursor = self.runnable.front();
        while let Some(task) = cursor.get() {
            debug_assert!(task.state() == TaskState::Runnable);
            let ptr = task as *const Task;
            let skip = ptr == Arc::as_ptr(curr)
                || idle.map_or(false, |i| ptr == Arc::as_ptr(i));
            if !skip
                && best
                    .as_ref()
                    .map_or(true, |b| task.total_ticks() < b.total_ticks())
            {
                best = cursor.clone_pointer();
            }
            cursor.move_next();
        }
        best
    }
}

/// Inserts a task into the tid tree and its state list.
pub fn add_task(task: &Arc<Task>) {
    let mut mgr = TASK_MANAGER.lock();
    mgr.tasks.insert(task.clone());
    mgr.add_to_state_list(task);
}

/// Removes a reaped task. Must be a zombie; its memory is freed when the
/// last reference drops.
pub fn remove_task(task: &Arc<Task>) {
    let mut mgr = TASK_MANAGER.lock();
    debug_assert!(task.state() == TaskState::Zombie);
    mgr.remove_from_state_list(task);
    unsafe { mgr.tasks.cursor_mut_from_ptr(Arc::as_ptr(task)) }.remove();
}

/// Moves a task between state lists. Interrupts are disabled by the
/// manager lock: IRQ handlers use this to wake sleepers.
pub fn task_change_state(task: &Arc<Task>, new_state: TaskState) {
    let mut mgr = TASK_MANAGER.lock();
    let old_state = task.state();
    debug_assert!(old_state != new_state);
    debug_assert!(old_state != TaskState::Zombie);
    mgr.remove_from_state_list(task);
    task.set_state_raw(new_state);
    mgr.add_to_state_list(task);
    trace_transition(task.tid, old_state, new_state);
}

pub fn get_task(tid: i32) -> Option<Arc<Task>> {
    let mgr = TASK_MANAGER.lock();
    let cursor = mgr.tasks.find(&tid);
    cursor.clone_pointer()
}

/// The process whose pid is `pid`, located through its main thread.
pub fn get_process(pid: i32) -> Option<Arc<Process>> {
    get_task(pid).map(|t| t.proc.clone())
}

pub fn runnable_count() -> usize {
    TASK_MANAGER.lock().runnable_count
}
