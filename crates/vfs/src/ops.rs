//! The syscall-facing VFS entry points.
//!
//! Each function picks the locking mode its operation needs: read-only
//! traversal runs under the whole-filesystem shared lock, structural
//! changes under the exclusive one, and handle I/O under the per-handle
//! locks. No filesystem lock is ever held across a call into a different
//! filesystem.

use alloc::string::String;

use errno::Errno;
use ktime::TimeSpec;

use crate::{
    file::FileRef,
    flag::{OpenFlags, SeekWhence},
    fs::{FsRef, InodeKind, InodeRef},
    path::Path,
    resolve::resolve_path,
    stat::Stat,
    Result,
};

fn with_shlock<T>(fs: &FsRef, f: impl FnOnce() -> Result<T>) -> Result<T> {
    fs.shlock();
    let r = f();
    fs.shunlock();
    r
}

fn with_exlock<T>(fs: &FsRef, f: impl FnOnce() -> Result<T>) -> Result<T> {
    fs.exlock();
    let r = f();
    fs.exunlock();
    r
}

/// Opens `path`, creating the file when O_CREAT asks for it.
pub fn vfs_open(cwd: &Path, path: &str, flags: OpenFlags, mode: u32) -> Result<FileRef> {
    let follow = !flags.contains(OpenFlags::O_NOFOLLOW);
    let vp = resolve_path(cwd, path, follow)?;
    let fs = vp.fs.clone();
    if flags.contains(OpenFlags::O_CREAT) {
        with_exlock(&fs, || fs.open(&vp, flags, mode))
    } else {
        with_shlock(&fs, || fs.open(&vp, flags, mode))
    }
}

/// Stats a path (the handle-less flavor; see [`vfs_fstat`]).
pub fn vfs_stat(cwd: &Path, path: &str, follow: bool) -> Result<Stat> {
    let vp = resolve_path(cwd, path, follow)?;
    let fs = vp.fs.clone();
    let inode = vp.inode()?.clone();
    with_shlock(&fs, || fs.stat(&inode))
}

/// Reads the target of a symlink.
pub fn vfs_readlink(cwd: &Path, path: &str) -> Result<String> {
    let vp = resolve_path(cwd, path, false)?;
    let inode = vp.inode()?.clone();
    if inode.kind() != InodeKind::Symlink {
        return Err(Errno::EINVAL);
    }
    let fs = vp.fs.clone();
    with_shlock(&fs, || fs.readlink(&inode))
}

pub fn vfs_mkdir(cwd: &Path, path: &str, mode: u32) -> Result<()> {
    let vp = resolve_path(cwd, path, false)?;
    let fs = vp.fs.clone();
    with_exlock(&fs, || fs.mkdir(&vp, mode))
}

pub fn vfs_rmdir(cwd: &Path, path: &str) -> Result<()> {
    let vp = resolve_path(cwd, path, false)?;
    let fs = vp.fs.clone();
    with_exlock(&fs, || fs.rmdir(&vp))
}

pub fn vfs_unlink(cwd: &Path, path: &str) -> Result<()> {
    let vp = resolve_path(cwd, path, false)?;
    let fs = vp.fs.clone();
    with_exlock(&fs, || fs.unlink(&vp))
}

pub fn vfs_symlink(cwd: &Path, target: &str, linkpath: &str) -> Result<()> {
    let vp = resolve_path(cwd, linkpath, false)?;
    let fs = vp.fs.clone();
    with_exlock(&fs, || fs.symlink(target, &vp))
}

/// Hard-links `old` at `new`. Both must live on the same filesystem.
pub fn vfs_link(cwd: &Path, old: &str, new: &str) -> Result<()> {
    let oldp = resolve_path(cwd, old, false)?;
    let newp = resolve_path(cwd, new, false)?;
    if oldp.fs.device_id() != newp.fs.device_id() {
        return Err(Errno::EXDEV);
    }
    let fs = oldp.fs.clone();
    with_exlock(&fs, || fs.link(&oldp, &newp))
}

/// Renames `old` to `new`. Both must live on the same filesystem.
pub fn vfs_rename(cwd: &Path, old: &str, new: &str) -> Result<()> {
    let oldp = resolve_path(cwd, old, false)?;
    let newp = resolve_path(cwd, new, false)?;
    if oldp.fs.device_id() != newp.fs.device_id() {
        return Err(Errno::EXDEV);
    }
    let fs = oldp.fs.clone();
    with_exlock(&fs, || fs.rename(&oldp, &newp))
}

pub fn vfs_chmod(cwd: &Path, path: &str, mode: u32) -> Result<()> {
    let vp = resolve_path(cwd, path, true)?;
    let fs = vp.fs.clone();
    let inode = vp.inode()?.clone();
    with_exlock(&fs, || fs.chmod(&inode, mode))
}

pub fn vfs_truncate(cwd: &Path, path: &str, len: usize) -> Result<()> {
    let vp = resolve_path(cwd, path, true)?;
    let fs = vp.fs.clone();
    let inode = vp.inode()?.clone();
    with_exlock(&fs, || fs.truncate(&inode, len))
}

fn handle_fs_inode(file: &FileRef) -> Result<(FsRef, InodeRef)> {
    let fs = file.fs().ok_or(Errno::EINVAL)?;
    let inode = file.inode().ok_or(Errno::EINVAL)?;
    Ok((fs, inode))
}

pub fn vfs_ftruncate(file: &FileRef, len: usize) -> Result<()> {
    let (fs, inode) = handle_fs_inode(file)?;
    with_exlock(&fs, || fs.truncate(&inode, len))
}

pub fn vfs_futimens(file: &FileRef, times: &[TimeSpec; 2]) -> Result<()> {
    let (fs, inode) = handle_fs_inode(file)?;
    with_exlock(&fs, || fs.futimens(&inode, times))
}

/* Handle-level operations */

pub fn vfs_read(file: &FileRef, buf: &mut [u8]) -> Result<usize> {
    file.shlock();
    let r = file.read(buf);
    file.shunlock();
    r
}

pub fn vfs_write(file: &FileRef, buf: &[u8]) -> Result<usize> {
    file.exlock();
    let r = file.write(buf);
    file.exunlock();
    r
}

pub fn vfs_seek(file: &FileRef, offset: i64, whence: SeekWhence) -> Result<i64> {
    file.exlock();
    let r = file.seek(offset, whence);
    file.exunlock();
    r
}

pub fn vfs_getdents(file: &FileRef, buf: &mut [u8]) -> Result<usize> {
    file.shlock();
    let r = file.getdents(buf);
    file.shunlock();
    r
}

pub fn vfs_ioctl(file: &FileRef, cmd: usize, arg: usize) -> Result<usize> {
    file.ioctl(cmd, arg)
}

pub fn vfs_dup(file: &FileRef) -> Result<FileRef> {
    file.dup()
}

pub fn vfs_fstat(file: &FileRef) -> Result<Stat> {
    file.stat()
}

/// Closing is dropping: the handle's destructor releases the inode
/// reference and lets the filesystem destroy orphaned inodes.
pub fn vfs_close(file: FileRef) {
    drop(file);
}
