//! Process duplication (fork/vfork) and program replacement (execve).

use alloc::{string::String, sync::Arc, vec, vec::Vec};

use errno::Errno;
use log::{debug, info};
use vfs::{vfs_open, vfs_read, OpenFlags, Path};

use crate::{
    error::{KernelError, KernelResult},
    loader,
    mm::{frame_alloc, kernel_satp, PteFlags},
    task::{
        kstack::trapframe_base,
        manager::{add_task, TASK_MANAGER},
        process::{kernel_process, Process},
        sched::{current_task, disable_preemption, kernel_yield_preempt_disabled,
                preempt_enable_nosched},
        task::{Task, TaskState, WaitObject, WakeCause},
        wait::{wait_obj_reset, wait_obj_set, wake_up},
    },
    trap::{user_trap_return, TrapFrame},
};

/// First code a freshly forked (or spawned) user task runs: balance the
/// switch's preempt level and drop straight into user mode through the
/// task's trapframe.
extern "C" fn user_task_entry() -> ! {
    preempt_enable_nosched();
    user_trap_return()
}

/// Duplicates the current process. The child's trapframe is a copy of the
/// parent's with a0 forced to 0. For vfork the parent is stopped until
/// the child execs or exits.
pub fn do_fork(vfork: bool) -> KernelResult<i32> {
    let curr = current_task();
    let proc = curr.proc.clone();

    let pid = TASK_MANAGER.lock().create_new_pid();
    if pid < 0 {
        return Err(KernelError::Errno(Errno::EAGAIN));
    }

    let child_ms = proc.mm().lock().fork_clone()?;
    let fds = proc.fds.lock().clone();
    let (cwd, pgid, sid) = {
        let inner = proc.inner.lock();
        (inner.cwd.clone(), inner.pgid, inner.sid)
    };
    let child_proc = Process::new_user(pid, proc.pid, child_ms, fds, cwd, pgid, sid);

    let tf_pa = frame_alloc().ok_or(KernelError::FrameAllocFailed)?;
    let child = Task::new(
        pid,
        child_proc.clone(),
        user_task_entry as usize,
        None,
        tf_pa,
        true,
    );

    // The child resumes exactly where the parent trapped, seeing 0.
    unsafe {
        core::ptr::copy_nonoverlapping(
            curr.trapframe_pa as *const TrapFrame,
            tf_pa as *mut TrapFrame,
            1,
        );
    }
    let tf = child.trapframe();
    tf.set_return(0);
    tf.kernel_sp = child.inner().kstack.top();

    child_proc
        .mm()
        .lock()
        .pt
        .map(trapframe_base(child.inner().kstack.kid), tf_pa, PteFlags::R | PteFlags::W)?;

    proc.inner.lock().children.push(child.clone());
    debug!("forked {:?} -> pid {}", curr, pid);

    if vfork {
        child.shared.lock().vfork_parent = Some(curr.clone());
        // Sleep on the child before it can possibly run.
        let guard = disable_preemption();
        add_task(&child);
        {
            let mut waiters = child.exit_waiters.lock();
            crate::task::manager::task_change_state(&curr, TaskState::Sleeping);
            wait_obj_set(&curr, WaitObject::TaskExit(child.clone()));
            waiters.push(curr.clone());
        }
        kernel_yield_preempt_disabled(guard);
        child.exit_waiters.lock().remove(&curr);
        wait_obj_reset(&curr);
    } else {
        add_task(&child);
    }
    Ok(pid)
}

fn read_whole_file(cwd: &Path, path: &str) -> KernelResult<Vec<u8>> {
    let file = vfs_open(cwd, path, OpenFlags::O_RDONLY, 0).map_err(KernelError::Errno)?;
    let size = file.stat().map_err(KernelError::Errno)?.st_size as usize;
    let mut data = vec![0u8; size];
    let mut done = 0;
    while done < size {
        let n = vfs_read(&file, &mut data[done..]).map_err(KernelError::Errno)?;
        if n == 0 {
            break;
        }
        done += n;
    }
    data.truncate(done);
    Ok(data)
}

/// Replaces the current process image.
pub fn do_execve(path: &str, args: Vec<String>) -> KernelResult {
    let curr = current_task();
    let proc = curr.proc.clone();
    let cwd = proc.inner.lock().cwd.clone();

    let image = read_whole_file(&cwd, path)?;
    let (mut ms, sp, entry) = loader::from_elf(&image, &args)?;
    ms.pt.map(
        trapframe_base(curr.inner().kstack.kid),
        curr.trapframe_pa,
        PteFlags::R | PteFlags::W,
    )?;

    // The old image dies here; we are running on the kernel table, so the
    // swap is safe mid-syscall.
    *proc.mm().lock() = ms;

    let tf = curr.trapframe();
    *tf = TrapFrame::new(
        kernel_satp(),
        curr.inner().kstack.top(),
        crate::trap::user_trap_handler as usize,
        entry,
        sp,
    );
    // argc and argv for the C runtime, matching the stack layout.
    tf.set_args(args.len(), sp + 8);

    proc.fds.lock().close_cloexec();

    // A vfork parent resumes once the child has a fresh image.
    if let Some(parent) = curr.shared.lock().vfork_parent.take() {
        wake_up(&parent, WakeCause::Signalled);
    }
    Ok(())
}

/// Loads the first user process from the root filesystem.
pub fn spawn_init(path: &str) -> KernelResult<Arc<Task>> {
    let image = read_whole_file(&Path::root(), path)?;
    let args = vec![String::from(path)];
    let (ms, sp, entry) = loader::from_elf(&image, &args)?;

    let pid = TASK_MANAGER.lock().create_new_pid();
    if pid < 0 {
        return Err(KernelError::Errno(Errno::EAGAIN));
    }

    let tf_pa = frame_alloc().ok_or(KernelError::FrameAllocFailed)?;
    let proc = Process::new_user(
        pid,
        0,
        ms,
        crate::fs::FdTable::new_std(),
        Path::root(),
        pid,
        pid,
    );
    let task = Task::new(pid, proc.clone(), user_task_entry as usize, None, tf_pa, true);

    *task.trapframe() = TrapFrame::new(
        kernel_satp(),
        task.inner().kstack.top(),
        crate::trap::user_trap_handler as usize,
        entry,
        sp,
    );
    task.trapframe().set_args(args.len(), sp + 8);

    proc.mm()
        .lock()
        .pt
        .map(trapframe_base(task.inner().kstack.kid), tf_pa, PteFlags::R | PteFlags::W)?;

    kernel_process().inner.lock().children.push(task.clone());
    add_task(&task);
    info!("spawned init process pid {} from {}", pid, path);
    Ok(task)
}
