//! Process-side syscalls.

use alloc::{string::String, vec::Vec};

use errno::Errno;
use ktime::TimeSpec;
use log::trace;

use super::read_path;
use crate::{
    config::TIMER_HZ,
    error::{KernelError, KernelResult},
    mm::{copy_from_user, copy_to_user},
    task::{
        current_task, disable_preemption, do_execve, do_exit, do_fork, do_kill, do_wait4,
        kernel_yield, kernel_yield_preempt_disabled, sleep_ticks, task_change_state,
        wait_obj_reset, wait_obj_set, TaskState, WaitObject, WaitOptions, WakeCause,
    },
};

const CLONE_VFORK: usize = 0x4000;
const CLONE_VM: usize = 0x100;
const CLONE_THREAD: usize = 0x10000;

fn err(e: Errno) -> KernelError {
    KernelError::Errno(e)
}

pub fn sys_exit(code: i32) -> KernelResult<usize> {
    do_exit(code)
}

pub fn sys_clone(flags: usize, _stack: usize) -> KernelResult<usize> {
    // Address-space sharing beyond vfork means real threads; not here.
    if flags & CLONE_THREAD != 0 || (flags & CLONE_VM != 0 && flags & CLONE_VFORK == 0) {
        return Err(err(Errno::ENOSYS));
    }
    let pid = do_fork(flags & CLONE_VFORK != 0)?;
    Ok(pid as usize)
}

pub fn sys_execve(path: usize, argv: usize) -> KernelResult<usize> {
    let path = read_path(path)?;
    let mut args: Vec<String> = Vec::new();
    if argv != 0 {
        let proc = current_task().proc.clone();
        for i in 0..32 {
            let mut ptr = [0u8; 8];
            {
                let mm = proc.mm().lock();
                copy_from_user(&mm, argv + i * 8, &mut ptr)?;
            }
            let ptr = u64::from_le_bytes(ptr) as usize;
            if ptr == 0 {
                break;
            }
            args.push(read_path(ptr)?);
        }
    }
    if args.is_empty() {
        args.push(path.clone());
    }
    do_execve(&path, args)?;
    Ok(0)
}

pub fn sys_wait4(pid: isize, status: usize, options: u32) -> KernelResult<usize> {
    let options = WaitOptions::from_bits_truncate(options);
    let (child_pid, wstatus) = do_wait4(pid, options)?;
    if status != 0 && child_pid > 0 {
        let proc = current_task().proc.clone();
        let mm = proc.mm().lock();
        copy_to_user(&mm, status, &wstatus.to_le_bytes())?;
    }
    Ok(child_pid as usize)
}

pub fn sys_kill(pid: i32, sig: i32) -> KernelResult<usize> {
    do_kill(pid, sig)?;
    Ok(0)
}

pub fn sys_sched_yield() -> KernelResult<usize> {
    kernel_yield();
    Ok(0)
}

pub fn sys_nanosleep(req: usize, _rem: usize) -> KernelResult<usize> {
    let curr = current_task();
    let proc = curr.proc.clone();
    let mut buf = [0u8; 16];
    {
        let mm = proc.mm().lock();
        copy_from_user(&mm, req, &mut buf)?;
    }
    let sec = usize::from_le_bytes(buf[0..8].try_into().unwrap());
    let nsec = usize::from_le_bytes(buf[8..16].try_into().unwrap());
    let ticks = TimeSpec::new(sec, nsec).to_ticks(TIMER_HZ);
    trace!("nanosleep {} ticks", ticks);
    match sleep_ticks(ticks as u32) {
        WakeCause::Timer => Ok(0),
        _ => Err(err(Errno::EINTR)),
    }
}

/// Stops until a signal arrives; always -EINTR, per POSIX.
pub fn sys_pause() -> KernelResult<usize> {
    let curr = current_task();
    loop {
        let guard = disable_preemption();
        if curr.pending_signal.load(core::sync::atomic::Ordering::Relaxed) != 0 {
            drop(guard);
            return Err(err(Errno::EINTR));
        }
        task_change_state(&curr, TaskState::Sleeping);
        wait_obj_set(&curr, WaitObject::Condition(0));
        kernel_yield_preempt_disabled(guard);
        wait_obj_reset(&curr);
    }
}

pub fn sys_getpid() -> KernelResult<usize> {
    Ok(current_task().proc.pid as usize)
}

pub fn sys_getppid() -> KernelResult<usize> {
    Ok(current_task()
        .proc
        .parent_pid
        .load(core::sync::atomic::Ordering::Relaxed) as usize)
}

pub fn sys_gettid() -> KernelResult<usize> {
    Ok(current_task().tid as usize)
}

pub fn sys_getpgid(pid: i32) -> KernelResult<usize> {
    if pid == 0 {
        return Ok(current_task().proc.inner.lock().pgid as usize);
    }
    let proc = crate::task::get_process(pid).ok_or(err(Errno::ESRCH))?;
    let pgid = proc.inner.lock().pgid;
    Ok(pgid as usize)
}

pub fn sys_setsid() -> KernelResult<usize> {
    let proc = current_task().proc.clone();
    let mut inner = proc.inner.lock();
    // A process group leader may not create a new session.
    if inner.pgid == proc.pid {
        return Err(err(Errno::EPERM));
    }
    inner.pgid = proc.pid;
    inner.sid = proc.pid;
    Ok(proc.pid as usize)
}

pub fn sys_brk(addr: usize) -> KernelResult<usize> {
    let proc = current_task().proc.clone();
    let mut mm = proc.mm().lock();
    if addr == 0 {
        return Ok(mm.brk);
    }
    Ok(mm.set_brk(addr))
}
