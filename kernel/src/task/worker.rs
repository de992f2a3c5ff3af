//! Worker threads: kernel threads draining a bounded job queue fed from
//! IRQ context. Enqueueing never allocates; the scheduler runs a worker
//! with pending jobs ahead of ordinary tasks.

use alloc::{collections::VecDeque, sync::Arc, vec::Vec};
use core::sync::atomic::Ordering;

use kernel_sync::SpinLock;
use spin::{Lazy, Once};

use crate::{
    error::KernelResult,
    task::{
        kthread::{kthread_create, KTH_ALLOC_BUFS, KTH_WORKER_THREAD},
        manager::task_change_state,
        sched::{current_task, disable_preemption, kernel_yield_preempt_disabled},
        task::{Task, TaskState, WaitObject, WakeCause},
        wait::{wait_obj_reset, wait_obj_set, wake_up},
    },
};

#[derive(Clone, Copy)]
pub struct WorkerJob {
    pub func: fn(usize),
    pub arg: usize,
}

struct JobQueue {
    jobs: VecDeque<WorkerJob>,
    capacity: usize,
}

pub struct Worker {
    pub name: &'static str,
    pub priority: i32,
    queue: SpinLock<JobQueue>,
    task: Once<Arc<Task>>,
}

impl Worker {
    /// The runner task of this worker.
    pub fn task(&self) -> Option<&Arc<Task>> {
        self.task.get()
    }
}

static WORKERS: Lazy<SpinLock<Vec<Arc<Worker>>>> = Lazy::new(|| SpinLock::new(Vec::new()));

fn worker_main(index: usize) {
    let worker = WORKERS.lock()[index].clone();
    let curr = current_task();
    loop {
        let guard = disable_preemption();
        let mut queue = worker.queue.lock();
        if let Some(job) = queue.jobs.pop_front() {
            drop(queue);
            drop(guard);
            (job.func)(job.arg);
            continue;
        }
        // Queue empty: go to sleep while still holding the queue lock, so
        // an IRQ-side enqueue cannot slip between the check and the sleep.
        task_change_state(&curr, TaskState::Sleeping);
        wait_obj_set(
            &curr,
            WaitObject::Condition(Arc::as_ptr(&worker) as usize),
        );
        drop(queue);
        kernel_yield_preempt_disabled(guard);
        wait_obj_reset(&curr);
    }
}

/// Creates a worker thread with a job queue of `capacity` entries.
pub fn worker_create(
    name: &'static str,
    priority: i32,
    capacity: usize,
) -> KernelResult<Arc<Worker>> {
    let worker = Arc::new(Worker {
        name,
        priority,
        queue: SpinLock::new(JobQueue {
            jobs: VecDeque::with_capacity(capacity),
            capacity,
        }),
        task: Once::new(),
    });
    let index = {
        let mut workers = WORKERS.lock();
        workers.push(worker.clone());
        workers.len() - 1
    };
    let task = kthread_create(
        worker_main,
        name,
        KTH_ALLOC_BUFS | KTH_WORKER_THREAD,
        index,
    )?;
    task.worker_index.store(index as i32, Ordering::Relaxed);
    worker.task.call_once(|| task);
    Ok(worker)
}

/// Queues a job on `worker`. Callable from IRQ context: fails (returning
/// false) instead of allocating when the queue is full.
pub fn worker_enqueue_job(worker: &Arc<Worker>, func: fn(usize), arg: usize) -> bool {
    {
        let mut queue = worker.queue.lock();
        if queue.jobs.len() >= queue.capacity {
            return false;
        }
        queue.jobs.push_back(WorkerJob { func, arg });
    }
    if let Some(task) = worker.task.get() {
        wake_up(task, WakeCause::Signalled);
    }
    true
}

/// The highest-priority worker whose runner is ready to execute jobs.
/// Consulted by the scheduler ahead of the normal selection.
pub fn highest_runnable_worker() -> Option<Arc<Task>> {
    let workers = WORKERS.lock();
    let mut best: Option<(&Arc<Worker>, &Arc<Task>)> = None;
    for worker in workers.iter() {
        let Some(task) = worker.task.get() else {
            continue;
        };
        if task.state() != TaskState::Runnable {
            continue;
        }
        if best.map_or(true, |(w, _)| worker.priority > w.priority) {
            best = Some((worker, task));
        }
    }
    best.map(|(_, t)| t.clone())
}
