//! The process: pid, address space, file table, and the family tree.

use alloc::{sync::Arc, vec::Vec};
use core::sync::atomic::AtomicI32;

use kernel_sync::SpinLock;
use spin::Once;
use vfs::Path;

use crate::{
    fs::FdTable,
    mm::MemorySpace,
    task::{
        task::Task,
        wait::{KCond, KMutex},
    },
};

pub struct ProcessInner {
    pub cwd: Path,

    /// Child tasks (main threads of forked children).
    pub children: Vec<Arc<Task>>,

    pub pgid: i32,
    pub sid: i32,

    /// Exit status of the main thread, valid once it is a zombie.
    pub exit_status: i32,
}

/// The address-space and file-table owner. pid 0 is the kernel process,
/// home of every kernel thread.
pub struct Process {
    pub pid: i32,

    pub parent_pid: AtomicI32,

    /// `None` only for the kernel process.
    mm: Option<Arc<SpinLock<MemorySpace>>>,

    pub fds: Arc<SpinLock<FdTable>>,

    pub inner: SpinLock<ProcessInner>,

    /// Monitor for wait4: children signal `child_cond` under `wait_lock`
    /// when they become reapable.
    pub wait_lock: KMutex<()>,
    pub child_cond: KCond,
}

impl Process {
    pub fn new_user(
        pid: i32,
        parent_pid: i32,
        mm: MemorySpace,
        fds: FdTable,
        cwd: Path,
        pgid: i32,
        sid: i32,
    ) -> Arc<Self> {
        Arc::new(Self {
            pid,
            parent_pid: AtomicI32::new(parent_pid),
            mm: Some(Arc::new(SpinLock::new(mm))),
            fds: Arc::new(SpinLock::new(fds)),
            inner: SpinLock::new(ProcessInner {
                cwd,
                children: Vec::new(),
                pgid,
                sid,
                exit_status: 0,
            }),
            wait_lock: KMutex::new(()),
            child_cond: KCond::new(),
        })
    }

    /// The address space. Panics for the kernel process, which has none.
    pub fn mm(&self) -> &Arc<SpinLock<MemorySpace>> {
        self.mm
            .as_ref()
            .expect("the kernel process has no address space")
    }

    pub fn has_mm(&self) -> bool {
        self.mm.is_some()
    }
}

static KERNEL_PROCESS: Once<Arc<Process>> = Once::new();

/// The statically known pid-0 process every kernel thread belongs to.
pub fn kernel_process() -> &'static Arc<Process> {
    KERNEL_PROCESS.get().expect("kernel process not created yet")
}

/// Builds the kernel process. Called once, before any task exists.
pub(crate) fn create_kernel_process(pid: i32) -> Arc<Process> {
    debug_assert!(pid == 0);
    KERNEL_PROCESS
        .call_once(|| {
            Arc::new(Process {
                pid,
                parent_pid: AtomicI32::new(0),
                mm: None,
                fds: Arc::new(SpinLock::new(FdTable::new_empty())),
                inner: SpinLock::new(ProcessInner {
                    cwd: Path::root(),
                    children: Vec::new(),
                    pgid: 0,
                    sid: 0,
                    exit_status: 0,
                }),
                wait_lock: KMutex::new(()),
                child_cond: KCond::new(),
            })
        })
        .clone()
}
