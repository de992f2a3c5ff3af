use alloc::{boxed::Box, sync::Arc};
use core::{
    fmt,
    sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, AtomicU8, Ordering},
};

use intrusive_collections::{
    intrusive_adapter, KeyAdapter, LinkedListAtomicLink, RBTreeAtomicLink,
};
use kernel_sync::SpinLock;
use numeric_enum_macro::numeric_enum;
use vfs::PATH_MAX;

use crate::{
    cell::SyncCell,
    config::TIME_SLICE_TICKS,
    task::{
        context::TaskContext,
        kstack::KernelStack,
        process::{kernel_process, Process},
        wait::WaitQueue,
    },
    trap::TrapFrame,
};

numeric_enum! {
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TaskState {
        Runnable = 1,
        Running = 2,
        Sleeping = 3,
        Zombie = 4,
    }
}

/// What a sleeping task is waiting for.
pub enum WaitObject {
    None,
    /// Address of the kmutex, for diagnostics. Mutex waits are not
    /// interruptible.
    Mutex(usize),
    /// Address of the kcond.
    Condition(usize),
    /// Waiting for this task to exit (or, for a vfork parent, to exec).
    TaskExit(Arc<Task>),
    /// Pure timed sleep for this many ticks.
    Timer(u32),
}

impl WaitObject {
    /// May a signal break this wait?
    pub fn interruptible(&self) -> bool {
        !matches!(self, WaitObject::Mutex(_))
    }
}

/// Why a sleeping task was made runnable again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    None,
    /// The waited-for event happened.
    Signalled,
    /// The wake-up timer fired first.
    Timer,
    /// The waited-for task died.
    TargetDied,
}

/// Scheduler counters, updated from the timer IRQ on the current task.
pub struct SchedTicks {
    /// Ticks consumed in the current time slice.
    pub timeslice: AtomicU32,
    /// Total life-time ticks.
    pub total: AtomicU64,
    /// Total life-time ticks spent in kernel mode.
    pub total_kernel: AtomicU64,
}

/// Mutable task data only ever touched by the task itself (or during the
/// switch that resumes it, with interrupts off).
pub struct TaskInner {
    pub ctx: TaskContext,
    pub kstack: KernelStack,
    /// Entry of a kernel thread, consumed on first run.
    pub kthread: Option<(fn(usize), usize)>,
    /// Scratch buffer for user paths.
    pub path_buf: Option<Box<[u8; PATH_MAX]>>,
    /// Scratch buffer for small user structures.
    pub io_buf: Option<Box<[u8; 512]>>,
}

/// Task data other tasks and IRQ handlers may touch, behind a spin lock.
pub struct TaskShared {
    pub wobj: WaitObject,
    pub wake_cause: WakeCause,
    /// wait4 status (exit code << 8).
    pub wstatus: i32,
    /// The parent stopped by our vfork, released on exec or exit.
    pub vfork_parent: Option<Arc<Task>>,
}

/// The schedulable unit.
pub struct Task {
    /// Task id; equals the process pid for a main thread.
    pub tid: i32,

    /// Owning process.
    pub proc: Arc<Process>,

    pub is_main_thread: bool,

    /// Kernel thread name, `None` for user tasks.
    pub kthread_name: Option<&'static str>,

    /// Worker registry index for worker threads, -1 otherwise. Written
    /// once before the task is added to the scheduler.
    pub worker_index: AtomicI32,

    /// Current state, also readable from IRQ context.
    state: AtomicU8,

    pub running_in_kernel: AtomicBool,

    /// One pending signal number; 0 means none.
    pub pending_signal: AtomicI32,

    pub ticks: SchedTicks,

    /// Delta to the predecessor in the wake-up timer list.
    pub wakeup_delta: AtomicU32,

    /// Physical page of this task's trapframe; 0 for kernel threads.
    pub trapframe_pa: usize,

    pub inner: SyncCell<TaskInner>,
    pub shared: SpinLock<TaskShared>,

    /// Tasks waiting for this one to end.
    pub exit_waiters: SpinLock<WaitQueue>,

    /* Intrusive links */
    pub(crate) state_link: LinkedListAtomicLink,
    pub(crate) tid_link: RBTreeAtomicLink,
    pub(crate) wait_link: LinkedListAtomicLink,
    pub(crate) timer_link: LinkedListAtomicLink,
}

intrusive_adapter!(pub StateListAdapter = Arc<Task>: Task { state_link: LinkedListAtomicLink });
intrusive_adapter!(pub TidTreeAdapter = Arc<Task>: Task { tid_link: RBTreeAtomicLink });
intrusive_adapter!(pub WaitListAdapter = Arc<Task>: Task { wait_link: LinkedListAtomicLink });
intrusive_adapter!(pub TimerListAdapter = Arc<Task>: Task { timer_link: LinkedListAtomicLink });

impl<'a> KeyAdapter<'a> for TidTreeAdapter {
    type Key = i32;
    fn get_key(&self, task: &'a Task) -> i32 {
        task.tid
    }
}

impl Task {
    /// Builds a task in the Runnable state. The context resumes at
    /// `entry` on a fresh kernel stack; `trapframe_pa` is 0 for kernel
    /// threads.
    pub fn new(
        tid: i32,
        proc: Arc<Process>,
        entry: usize,
        kthread_name: Option<&'static str>,
        trapframe_pa: usize,
        alloc_bufs: bool,
    ) -> Arc<Self> {
        let kstack = KernelStack::new();
        let ctx = TaskContext::new(entry, kstack.top());
        let is_main_thread = tid == proc.pid;
        Arc::new(Task {
            tid,
            proc,
            is_main_thread,
            kthread_name,
            worker_index: AtomicI32::new(-1),
            state: AtomicU8::new(TaskState::Runnable as u8),
            running_in_kernel: AtomicBool::new(true),
            pending_signal: AtomicI32::new(0),
            ticks: SchedTicks {
                timeslice: AtomicU32::new(0),
                total: AtomicU64::new(0),
                total_kernel: AtomicU64::new(0),
            },
            wakeup_delta: AtomicU32::new(0),
            trapframe_pa,
            inner: SyncCell::new(TaskInner {
                ctx,
                kstack,
                kthread: None,
                path_buf: alloc_bufs.then(|| Box::new([0u8; PATH_MAX])),
                io_buf: alloc_bufs.then(|| Box::new([0u8; 512])),
            }),
            shared: SpinLock::new(TaskShared {
                wobj: WaitObject::None,
                wake_cause: WakeCause::None,
                wstatus: 0,
                vfork_parent: None,
            }),
            exit_waiters: SpinLock::new(WaitQueue::new()),
            state_link: LinkedListAtomicLink::new(),
            tid_link: RBTreeAtomicLink::new(),
            wait_link: LinkedListAtomicLink::new(),
            timer_link: LinkedListAtomicLink::new(),
        })
    }

    pub fn state(&self) -> TaskState {
        TaskState::try_from(self.state.load(Ordering::Relaxed)).unwrap_or(TaskState::Zombie)
    }

    /// Raw state store; list membership is the manager's business.
    pub(crate) fn set_state_raw(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    /// Mutable access to the task-private data.
    ///
    /// Sound by the single-owner rule of [`SyncCell`]: only the task
    /// itself (and the switch path resuming it) goes through here.
    #[allow(clippy::mut_from_ref)]
    pub fn inner(&self) -> &mut TaskInner {
        unsafe { self.inner.get_mut() }
    }

    /// This task's trapframe. User tasks only.
    pub fn trapframe(&self) -> &'static mut TrapFrame {
        debug_assert!(self.trapframe_pa != 0);
        unsafe { &mut *(self.trapframe_pa as *mut TrapFrame) }
    }

    pub fn is_kernel_thread(&self) -> bool {
        Arc::ptr_eq(&self.proc, kernel_process())
    }

    pub fn is_worker_thread(&self) -> bool {
        self.worker_index.load(Ordering::Relaxed) >= 0
    }

    pub fn reset_timeslice(&self) {
        self.ticks.timeslice.store(0, Ordering::Relaxed);
    }

    pub fn total_ticks(&self) -> u64 {
        self.ticks.total.load(Ordering::Relaxed)
    }

    /// Has this task used up its time slice?
    pub fn timeslice_expired(&self) -> bool {
        self.ticks.timeslice.load(Ordering::Relaxed) >= TIME_SLICE_TICKS
    }

    pub fn set_pending_signal(&self, sig: i32) {
        self.pending_signal.store(sig, Ordering::Relaxed);
    }

    pub fn take_pending_signal(&self) -> i32 {
        self.pending_signal.swap(0, Ordering::Relaxed)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kthread_name {
            Some(name) => write!(f, "kthread [{}] tid={}", name, self.tid),
            None => write!(f, "task pid={} tid={}", self.proc.pid, self.tid),
        }
    }
}
