//! The syscall surface: riscv64 Linux numbers dispatched onto the VFS and
//! the scheduler.

mod file;
mod proc;

use alloc::string::String;

use errno::Errno;
use log::trace;
use numeric_enum_macro::numeric_enum;
use vfs::Path;

use crate::{
    error::{KernelError, KernelResult},
    mm::read_user_cstr,
    task::current_task,
};

numeric_enum! {
    #[repr(usize)]
    #[derive(Debug, PartialEq, Eq)]
    #[allow(non_camel_case_types)]
    pub enum SyscallNo {
        DUP = 23,
        IOCTL = 29,
        MKDIRAT = 34,
        UNLINKAT = 35,
        SYMLINKAT = 36,
        LINKAT = 37,
        RENAMEAT = 38,
        TRUNCATE = 45,
        FTRUNCATE = 46,
        FCHMODAT = 53,
        OPENAT = 56,
        CLOSE = 57,
        GETDENTS64 = 61,
        LSEEK = 62,
        READ = 63,
        WRITE = 64,
        READLINKAT = 78,
        FSTATAT = 79,
        FSTAT = 80,
        UTIMENSAT = 88,
        EXIT = 93,
        EXIT_GROUP = 94,
        NANOSLEEP = 101,
        SCHED_YIELD = 124,
        KILL = 129,
        GETPGID = 155,
        SETSID = 157,
        GETPID = 172,
        GETPPID = 173,
        GETTID = 178,
        BRK = 214,
        MUNMAP = 215,
        CLONE = 220,
        EXECVE = 221,
        MMAP = 222,
        WAIT4 = 260,
        /// No generic riscv64 number exists; kept at the historic value.
        PAUSE = 1061,
    }
}

/// Special dirfd meaning "relative to the current working directory".
pub const AT_FDCWD: isize = -100;

/// Resolves only cwd-relative and absolute paths: any other dirfd is
/// unsupported.
fn check_dirfd(dirfd: usize, path: &str) -> KernelResult {
    if dirfd as isize == AT_FDCWD || path.starts_with('/') {
        Ok(())
    } else {
        Err(KernelError::Errno(Errno::EINVAL))
    }
}

/// Current working directory of the calling process.
fn cwd() -> Path {
    current_task().proc.inner.lock().cwd.clone()
}

/// Copies a user path into the task's path scratch buffer.
fn read_path(addr: usize) -> KernelResult<String> {
    let curr = current_task();
    let proc = curr.proc.clone();
    let mm = proc.mm().lock();
    let buf = curr
        .inner()
        .path_buf
        .as_mut()
        .ok_or(KernelError::Errno(Errno::EFAULT))?;
    let len = read_user_cstr(&mm, addr, &mut buf[..])?;
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

pub fn syscall(nr: usize, args: [usize; 6]) -> isize {
    let no = match SyscallNo::try_from(nr) {
        Ok(no) => no,
        Err(_) => {
            trace!("unsupported syscall {}", nr);
            return Errno::ENOSYS.as_ret();
        }
    };
    trace!("[U] SYSCALL {:?} {:x?}", no, args);
    let result: KernelResult<usize> = match no {
        SyscallNo::DUP => file::sys_dup(args[0]),
        SyscallNo::IOCTL => file::sys_ioctl(args[0], args[1], args[2]),
        SyscallNo::MKDIRAT => file::sys_mkdirat(args[0], args[1], args[2] as u32),
        SyscallNo::UNLINKAT => file::sys_unlinkat(args[0], args[1], args[2] as u32),
        SyscallNo::SYMLINKAT => file::sys_symlinkat(args[0], args[1], args[2]),
        SyscallNo::LINKAT => file::sys_linkat(args[0], args[1], args[2], args[3]),
        SyscallNo::RENAMEAT => file::sys_renameat(args[0], args[1], args[2], args[3]),
        SyscallNo::TRUNCATE => file::sys_truncate(args[0], args[1]),
        SyscallNo::FTRUNCATE => file::sys_ftruncate(args[0], args[1]),
        SyscallNo::FCHMODAT => file::sys_fchmodat(args[0], args[1], args[2] as u32),
        SyscallNo::OPENAT => file::sys_openat(args[0], args[1], args[2] as u32, args[3] as u32),
        SyscallNo::CLOSE => file::sys_close(args[0]),
        SyscallNo::GETDENTS64 => file::sys_getdents64(args[0], args[1], args[2]),
        SyscallNo::LSEEK => file::sys_lseek(args[0], args[1] as i64, args[2] as u32),
        SyscallNo::READ => file::sys_read(args[0], args[1], args[2]),
        SyscallNo::WRITE => file::sys_write(args[0], args[1], args[2]),
        SyscallNo::READLINKAT => file::sys_readlinkat(args[0], args[1], args[2], args[3]),
        SyscallNo::FSTATAT => file::sys_fstatat(args[0], args[1], args[2], args[3] as u32),
        SyscallNo::FSTAT => file::sys_fstat(args[0], args[1]),
        SyscallNo::UTIMENSAT => file::sys_utimensat(args[0], args[1], args[2], args[3] as u32),
        SyscallNo::EXIT | SyscallNo::EXIT_GROUP => proc::sys_exit(args[0] as i32),
        SyscallNo::NANOSLEEP => proc::sys_nanosleep(args[0], args[1]),
        SyscallNo::SCHED_YIELD => proc::sys_sched_yield(),
        SyscallNo::KILL => proc::sys_kill(args[0] as i32, args[1] as i32),
        SyscallNo::GETPGID => proc::sys_getpgid(args[0] as i32),
        SyscallNo::SETSID => proc::sys_setsid(),
        SyscallNo::GETPID => proc::sys_getpid(),
        SyscallNo::GETPPID => proc::sys_getppid(),
        SyscallNo::GETTID => proc::sys_gettid(),
        SyscallNo::BRK => proc::sys_brk(args[0]),
        SyscallNo::MUNMAP => file::sys_munmap(args[0], args[1]),
        SyscallNo::CLONE => proc::sys_clone(args[0], args[1]),
        SyscallNo::EXECVE => proc::sys_execve(args[0], args[1]),
        SyscallNo::MMAP => file::sys_mmap(args[0], args[1], args[2], args[3], args[4], args[5]),
        SyscallNo::WAIT4 => proc::sys_wait4(args[0] as isize, args[1], args[2] as u32),
        SyscallNo::PAUSE => proc::sys_pause(),
    };
    match result {
        Ok(value) => value as isize,
        Err(e) => e.as_errno().as_ret(),
    }
}
