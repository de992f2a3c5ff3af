//! File-side syscalls: thin translation onto the VFS entry points.

use alloc::vec;

use errno::Errno;
use ktime::TimeSpec;
use vfs::{
    vfs_chmod, vfs_dup, vfs_fstat, vfs_ftruncate, vfs_futimens, vfs_getdents, vfs_ioctl,
    vfs_link, vfs_mkdir, vfs_open, vfs_read, vfs_readlink, vfs_rename, vfs_rmdir, vfs_seek,
    vfs_stat, vfs_symlink, vfs_truncate, vfs_unlink, vfs_write, OpenFlags, SeekWhence, Stat,
};

use super::{check_dirfd, cwd, read_path};
use crate::{
    error::{KernelError, KernelResult},
    mm::{copy_from_user, copy_to_user, validate_user_range, VmFlags},
    task::current_task,
};

const AT_SYMLINK_NOFOLLOW: u32 = 0x100;
const AT_REMOVEDIR: u32 = 0x200;

const PROT_READ: usize = 1;
const PROT_WRITE: usize = 2;
const PROT_EXEC: usize = 4;
const MAP_ANONYMOUS: usize = 0x20;

fn err(e: Errno) -> KernelError {
    KernelError::Errno(e)
}

pub fn sys_openat(dirfd: usize, path: usize, flags: u32, mode: u32) -> KernelResult<usize> {
    let path = read_path(path)?;
    check_dirfd(dirfd, &path)?;
    let flags = OpenFlags::from_bits_truncate(flags);
    let umask = current_task().proc.fds.lock().umask;
    let file = vfs_open(&cwd(), &path, flags, mode & !umask).map_err(err)?;
    let cloexec = flags.contains(OpenFlags::O_CLOEXEC);
    current_task().proc.fds.lock().push(file, cloexec)
}

pub fn sys_close(fd: usize) -> KernelResult<usize> {
    let file = current_task().proc.fds.lock().remove(fd)?;
    vfs::vfs_close(file);
    Ok(0)
}

pub fn sys_dup(fd: usize) -> KernelResult<usize> {
    let proc = current_task().proc.clone();
    let file = proc.fds.lock().get(fd)?;
    let copy = vfs_dup(&file).map_err(err)?;
    proc.fds.lock().push(copy, false)
}

pub fn sys_read(fd: usize, buf: usize, len: usize) -> KernelResult<usize> {
    let proc = current_task().proc.clone();
    let file = proc.fds.lock().get(fd)?;
    {
        let mm = proc.mm().lock();
        validate_user_range(&mm, buf, len, true)?;
    }
    let mut kbuf = vec![0u8; len.min(16 * 1024)];
    let mut done = 0;
    while done < len {
        let chunk = kbuf.len().min(len - done);
        let n = vfs_read(&file, &mut kbuf[..chunk]).map_err(err)?;
        if n == 0 {
            break;
        }
        let mm = proc.mm().lock();
        copy_to_user(&mm, buf + done, &kbuf[..n])?;
        done += n;
        if n < chunk {
            break;
        }
    }
    Ok(done)
}

pub fn sys_write(fd: usize, buf: usize, len: usize) -> KernelResult<usize> {
    let proc = current_task().proc.clone();
    let file = proc.fds.lock().get(fd)?;
    {
        let mm = proc.mm().lock();
        validate_user_range(&mm, buf, len, false)?;
    }
    let mut kbuf = vec![0u8; len.min(16 * 1024)];
    let mut done = 0;
    while done < len {
        let chunk = kbuf.len().min(len - done);
        {
            let mm = proc.mm().lock();
            copy_from_user(&mm, buf + done, &mut kbuf[..chunk])?;
        }
        let n = vfs_write(&file, &kbuf[..chunk]).map_err(err)?;
        done += n;
        if n < chunk {
            break;
        }
    }
    Ok(done)
}

pub fn sys_lseek(fd: usize, offset: i64, whence: u32) -> KernelResult<usize> {
    let file = current_task().proc.fds.lock().get(fd)?;
    let whence = SeekWhence::from_bits(whence).ok_or(err(Errno::EINVAL))?;
    let pos = vfs_seek(&file, offset, whence).map_err(err)?;
    Ok(pos as usize)
}

pub fn sys_getdents64(fd: usize, dirp: usize, count: usize) -> KernelResult<usize> {
    let proc = current_task().proc.clone();
    let file = proc.fds.lock().get(fd)?;
    {
        let mm = proc.mm().lock();
        validate_user_range(&mm, dirp, count, true)?;
    }
    let mut kbuf = vec![0u8; count.min(16 * 1024)];
    let n = vfs_getdents(&file, &mut kbuf).map_err(err)?;
    let mm = proc.mm().lock();
    copy_to_user(&mm, dirp, &kbuf[..n])?;
    Ok(n)
}

fn copy_stat_out(addr: usize, stat: &Stat) -> KernelResult {
    let bytes = unsafe {
        core::slice::from_raw_parts(stat as *const Stat as *const u8, core::mem::size_of::<Stat>())
    };
    let proc = current_task().proc.clone();
    let mm = proc.mm().lock();
    copy_to_user(&mm, addr, bytes)
}

pub fn sys_fstat(fd: usize, statbuf: usize) -> KernelResult<usize> {
    let file = current_task().proc.fds.lock().get(fd)?;
    let stat = vfs_fstat(&file).map_err(err)?;
    copy_stat_out(statbuf, &stat)?;
    Ok(0)
}

pub fn sys_fstatat(dirfd: usize, path: usize, statbuf: usize, flags: u32) -> KernelResult<usize> {
    let path = read_path(path)?;
    check_dirfd(dirfd, &path)?;
    let follow = flags & AT_SYMLINK_NOFOLLOW == 0;
    let stat = vfs_stat(&cwd(), &path, follow).map_err(err)?;
    copy_stat_out(statbuf, &stat)?;
    Ok(0)
}

pub fn sys_mkdirat(dirfd: usize, path: usize, mode: u32) -> KernelResult<usize> {
    let path = read_path(path)?;
    check_dirfd(dirfd, &path)?;
    vfs_mkdir(&cwd(), &path, mode).map_err(err)?;
    Ok(0)
}

pub fn sys_unlinkat(dirfd: usize, path: usize, flags: u32) -> KernelResult<usize> {
    let path = read_path(path)?;
    check_dirfd(dirfd, &path)?;
    if flags & AT_REMOVEDIR != 0 {
        vfs_rmdir(&cwd(), &path).map_err(err)?;
    } else {
        vfs_unlink(&cwd(), &path).map_err(err)?;
    }
    Ok(0)
}

pub fn sys_symlinkat(target: usize, dirfd: usize, linkpath: usize) -> KernelResult<usize> {
    let target = read_path(target)?;
    let linkpath = read_path(linkpath)?;
    check_dirfd(dirfd, &linkpath)?;
    vfs_symlink(&cwd(), &target, &linkpath).map_err(err)?;
    Ok(0)
}

pub fn sys_readlinkat(
    dirfd: usize,
    path: usize,
    buf: usize,
    bufsiz: usize,
) -> KernelResult<usize> {
    let path = read_path(path)?;
    check_dirfd(dirfd, &path)?;
    let target = vfs_readlink(&cwd(), &path).map_err(err)?;
    let n = target.len().min(bufsiz);
    let proc = current_task().proc.clone();
    let mm = proc.mm().lock();
    copy_to_user(&mm, buf, &target.as_bytes()[..n])?;
    Ok(n)
}

pub fn sys_linkat(
    olddirfd: usize,
    oldpath: usize,
    newdirfd: usize,
    newpath: usize,
) -> KernelResult<usize> {
    let old = read_path(oldpath)?;
    check_dirfd(olddirfd, &old)?;
    let new = read_path(newpath)?;
    check_dirfd(newdirfd, &new)?;
    vfs_link(&cwd(), &old, &new).map_err(err)?;
    Ok(0)
}

pub fn sys_renameat(
    olddirfd: usize,
    oldpath: usize,
    newdirfd: usize,
    newpath: usize,
) -> KernelResult<usize> {
    let old = read_path(oldpath)?;
    check_dirfd(olddirfd, &old)?;
    let new = read_path(newpath)?;
    check_dirfd(newdirfd, &new)?;
    vfs_rename(&cwd(), &old, &new).map_err(err)?;
    Ok(0)
}

pub fn sys_fchmodat(dirfd: usize, path: usize, mode: u32) -> KernelResult<usize> {
    let path = read_path(path)?;
    check_dirfd(dirfd, &path)?;
    vfs_chmod(&cwd(), &path, mode).map_err(err)?;
    Ok(0)
}

pub fn sys_truncate(path: usize, len: usize) -> KernelResult<usize> {
    let path = read_path(path)?;
    vfs_truncate(&cwd(), &path, len).map_err(err)?;
    Ok(0)
}

pub fn sys_ftruncate(fd: usize, len: usize) -> KernelResult<usize> {
    let file = current_task().proc.fds.lock().get(fd)?;
    vfs_ftruncate(&file, len).map_err(err)?;
    Ok(0)
}

const UTIME_NOW: usize = 0x3fffffff;

pub fn sys_utimensat(
    dirfd: usize,
    path: usize,
    times: usize,
    _flags: u32,
) -> KernelResult<usize> {
    let curr = current_task();
    let proc = curr.proc.clone();
    let now = crate::fs::now();
    let times = if times == 0 {
        [now; 2]
    } else {
        // Small structure: copied through the task's io scratch buffer.
        let mm = proc.mm().lock();
        let buf = curr
            .inner()
            .io_buf
            .as_mut()
            .ok_or(err(Errno::EFAULT))?;
        copy_from_user(&mm, times, &mut buf[..32])?;
        let mut specs = [TimeSpec::default(); 2];
        for (i, spec) in specs.iter_mut().enumerate() {
            let base = i * 16;
            let sec = usize::from_le_bytes(buf[base..base + 8].try_into().unwrap());
            let nsec = usize::from_le_bytes(buf[base + 8..base + 16].try_into().unwrap());
            *spec = if nsec >= UTIME_NOW - 1 {
                now
            } else {
                TimeSpec::new(sec, nsec)
            };
        }
        specs
    };

    if path == 0 {
        // futimens: dirfd names the file itself.
        let file = proc.fds.lock().get(dirfd)?;
        vfs_futimens(&file, &times).map_err(err)?;
    } else {
        let path = read_path(path)?;
        check_dirfd(dirfd, &path)?;
        let file = vfs_open(&cwd(), &path, OpenFlags::O_RDONLY, 0).map_err(err)?;
        vfs_futimens(&file, &times).map_err(err)?;
    }
    Ok(0)
}

pub fn sys_ioctl(fd: usize, cmd: usize, arg: usize) -> KernelResult<usize> {
    let file = current_task().proc.fds.lock().get(fd)?;
    vfs_ioctl(&file, cmd, arg).map_err(err)
}

pub fn sys_mmap(
    _addr: usize,
    len: usize,
    prot: usize,
    flags: usize,
    fd: usize,
    offset: usize,
) -> KernelResult<usize> {
    if len == 0 {
        return Err(err(Errno::EINVAL));
    }
    let mut vmflags = VmFlags::USER;
    if prot & PROT_READ != 0 {
        vmflags |= VmFlags::READ;
    }
    if prot & PROT_WRITE != 0 {
        vmflags |= VmFlags::WRITE;
    }
    if prot & PROT_EXEC != 0 {
        vmflags |= VmFlags::EXEC;
    }
    let proc = current_task().proc.clone();
    if flags & MAP_ANONYMOUS != 0 {
        return proc.mm().lock().map_anon_mmap(len, vmflags);
    }
    if offset != 0 {
        return Err(err(Errno::EINVAL));
    }
    let file = proc.fds.lock().get(fd)?;
    proc.mm().lock().map_file(&file, len, vmflags)
}

pub fn sys_munmap(addr: usize, _len: usize) -> KernelResult<usize> {
    let proc = current_task().proc.clone();
    proc.mm().lock().unmap_area(addr)?;
    Ok(0)
}
