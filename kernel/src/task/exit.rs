//! Task termination, zombie reaping, and signals.

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use bitflags::bitflags;
use errno::Errno;
use log::debug;

use crate::{
    error::{KernelError, KernelResult},
    task::{
        kthread::kthread_exit,
        manager::{get_process, get_task, remove_task, task_change_state},
        process::kernel_process,
        sched::{current_task, disable_preemption, schedule},
        task::{Task, TaskState, WakeCause},
        wait::wake_up,
    },
};

bitflags! {
    pub struct WaitOptions: u32 {
        /// Return immediately if no child has exited.
        const WNOHANG = 0x00000001;
        /// Wait for children that have terminated.
        const WEXITED = 0x00000004;
    }
}

/// Terminates the current task. It stays a zombie on the zombie list
/// until the parent reaps it (or, for orphans, the kernel main thread
/// does).
pub fn do_exit(code: i32) -> ! {
    let curr = current_task();
    debug!("{:?} exited with code {}", curr, code);

    if curr.is_kernel_thread() {
        kthread_exit();
    }

    let proc = curr.proc.clone();
    curr.shared.lock().wstatus = (code & 0xff) << 8;

    if curr.is_main_thread {
        // Nothing can reach the file table after exit: drop it now so
        // inode references die before the zombie is reaped.
        proc.fds.lock().clear();

        // Orphans are adopted by the kernel process.
        let kernel = kernel_process();
        let mut inner = proc.inner.lock();
        inner.exit_status = code;
        let orphans: alloc::vec::Vec<_> = inner.children.drain(..).collect();
        drop(inner);
        for child in orphans {
            child.proc.parent_pid.store(0, Ordering::Relaxed);
            kernel.inner.lock().children.push(child);
        }
    }

    let vfork_parent = curr.shared.lock().vfork_parent.take();

    // Notify the parent under its wait monitor, then leave for good.
    let parent = get_process(proc.parent_pid.load(Ordering::Relaxed));
    match parent {
        Some(pp) if curr.is_main_thread => {
            let wait_guard = pp.wait_lock.lock();
            let _guard = disable_preemption();
            task_change_state(&curr, TaskState::Zombie);
            curr.exit_waiters.lock().wake_all(WakeCause::TargetDied);
            if let Some(vp) = vfork_parent {
                wake_up(&vp, WakeCause::Signalled);
            }
            pp.child_cond.signal_one();
            drop(wait_guard);
            drop(curr);
            schedule();
        }
        _ => {
            let _guard = disable_preemption();
            task_change_state(&curr, TaskState::Zombie);
            curr.exit_waiters.lock().wake_all(WakeCause::TargetDied);
            if let Some(vp) = vfork_parent {
                wake_up(&vp, WakeCause::Signalled);
            }
            drop(curr);
            schedule();
        }
    }
    unreachable!("a zombie was scheduled");
}

/// Reaps one exited child. Returns `(pid, wstatus)`; pid 0 with WNOHANG
/// when nothing is reapable yet.
pub fn do_wait4(pid: isize, options: WaitOptions) -> KernelResult<(i32, i32)> {
    let curr = current_task();
    let proc = curr.proc.clone();
    loop {
        let wait_guard = proc.wait_lock.lock();

        let mut found_child = false;
        let mut zombie: Option<Arc<Task>> = None;
        {
            let inner = proc.inner.lock();
            for child in inner.children.iter() {
                if pid > 0 && child.proc.pid != pid as i32 {
                    continue;
                }
                found_child = true;
                if child.state() == TaskState::Zombie {
                    zombie = Some(child.clone());
                    break;
                }
            }
        }

        if let Some(z) = zombie {
            drop(wait_guard);
            proc.inner
                .lock()
                .children
                .retain(|c| !Arc::ptr_eq(c, &z));
            let wstatus = z.shared.lock().wstatus;
            let zpid = z.proc.pid;
            remove_task(&z);
            return Ok((zpid, wstatus));
        }

        if !found_child {
            return Err(KernelError::Errno(Errno::ECHILD));
        }
        if options.contains(WaitOptions::WNOHANG) {
            return Ok((0, 0));
        }
        if curr.pending_signal.load(Ordering::Relaxed) != 0 {
            return Err(KernelError::Errno(Errno::EINTR));
        }
        let (guard, _cause) = proc.child_cond.wait(&proc.wait_lock, wait_guard, None);
        drop(guard);
    }
}

/// Posts `sig` to the main thread of process `pid`, breaking any
/// interruptible sleep it is in.
pub fn do_kill(pid: i32, sig: i32) -> KernelResult {
    if !(1..=31).contains(&sig) {
        return Err(KernelError::Errno(Errno::EINVAL));
    }
    let task = get_task(pid).ok_or(KernelError::Errno(Errno::ESRCH))?;
    if task.is_kernel_thread() {
        return Err(KernelError::Errno(Errno::EPERM));
    }
    task.set_pending_signal(sig);
    let interruptible = task.shared.lock().wobj.interruptible();
    if interruptible {
        wake_up(&task, WakeCause::Signalled);
    }
    Ok(())
}

/// Reaps zombies the kernel process adopted. Used by the kernel main
/// thread's reaper loop.
pub fn reap_orphans() {
    let kernel = kernel_process();
    loop {
        let zombie = {
            let inner = kernel.inner.lock();
            inner
                .children
                .iter()
                .find(|c| c.state() == TaskState::Zombie)
                .cloned()
        };
        match zombie {
            Some(z) => {
                kernel
                    .inner
                    .lock()
                    .children
                    .retain(|c| !Arc::ptr_eq(c, &z));
                debug!("reaped orphan {:?}", z);
                remove_task(&z);
            }
            None => break,
        }
    }
}
