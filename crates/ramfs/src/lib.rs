//! ramfs: a memory-resident filesystem.
//!
//! Files keep their content in 4 KiB blocks held in an offset-ordered map
//! (sparse holes read back as zeroes), directories keep a name-ordered
//! entry map, symlinks keep a path string. Inodes are reference counted by
//! `Arc`: directory entries hold the strong references that make up nlink,
//! open handles hold their own, and an inode is freed exactly when both
//! reach zero.
//!
//! Structural operations are called by the VFS with the whole-filesystem
//! exclusive lock held and re-look entries up by name, so a stale
//! resolution can never remove the wrong entry.

#![no_std]

extern crate alloc;

mod blocks;
mod dir;
mod file;
mod inode;
#[cfg(test)]
mod test;

use alloc::{
    string::{String, ToString},
    sync::{Arc, Weak},
};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use errno::Errno;
use ktime::TimeSpec;
use spin::RwLock;
use vfs::{
    FileRef, FileSystem, FsFlags, FsPath, InodeKind, InodeRef, OpenFlags, Stat, VfsPath, PATH_MAX,
};

use dir::{dir_add_entry, dir_entry_count, dir_get_entry, dir_remove_entry};
use file::RamfsFile;
use inode::{Content, RamfsInode};

/// Size of one file block; matches the page size so blocks can be mapped.
pub const BLOCK_SIZE: usize = 4096;

const ROOT_INO: u64 = 1;

/// Source of inode timestamps, injected by the kernel (the boot clock) and
/// by tests (a fake).
pub type Clock = fn() -> TimeSpec;

/// A mounted ramfs instance.
pub struct Ramfs {
    pub(crate) device_id: u64,
    pub(crate) clock: Clock,
    pub(crate) open_handles: AtomicUsize,
    this: Weak<Ramfs>,
    root: Arc<RamfsInode>,
    next_ino: AtomicU64,
    /// Whole-filesystem reader/writer lock, exposed through the
    /// [`FileSystem`] lock methods.
    lock: RwLock<()>,
}

fn zero_clock() -> TimeSpec {
    TimeSpec::default()
}

impl Ramfs {
    pub fn new(device_id: u64, clock: Clock) -> Arc<Self> {
        Arc::new_cyclic(|this| {
            let root = RamfsInode::new_dir(this, ROOT_INO, 0o777, None, clock());
            // The root has no directory entry pointing at it; pin one link
            // so it is never considered orphaned.
            root.data.write().nlink = 1;
            Ramfs {
                device_id,
                clock,
                open_handles: AtomicUsize::new(0),
                this: this.clone(),
                root,
                next_ino: AtomicU64::new(ROOT_INO + 1),
                lock: RwLock::new(()),
            }
        })
    }

    /// A ramfs with no usable clock; timestamps stay zero.
    pub fn new_unclocked(device_id: u64) -> Arc<Self> {
        Self::new(device_id, zero_clock)
    }

    fn alloc_ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::Relaxed)
    }

    fn now(&self) -> TimeSpec {
        (self.clock)()
    }

    fn this(&self) -> Arc<Ramfs> {
        self.this.upgrade().expect("ramfs outlived its own Arc")
    }
}

/// Downcasts a VFS inode reference back into this filesystem's inode.
fn as_ramfs_inode(inode: &InodeRef) -> Result<Arc<RamfsInode>, Errno> {
    inode
        .clone()
        .downcast_arc::<RamfsInode>()
        .map_err(|_| Errno::EINVAL)
}

/// Removes a non-directory entry. Shared by unlink and rename-over-file.
fn unlink_locked(dir: &Arc<RamfsInode>, name: &str) -> Result<(), Errno> {
    let inode = dir_get_entry(dir, name).ok_or(Errno::ENOENT)?;
    if inode.kind == InodeKind::Dir {
        return Err(Errno::EISDIR);
    }
    RamfsInode::check_access(&dir.data.read(), false, true)?;
    dir_remove_entry(dir, name)?;
    // If no handle keeps the inode open, the Arc we got from the lookup is
    // the last one and the content dies with it on return.
    Ok(())
}

/// Removes an empty directory entry. Shared by rmdir and rename-over-dir.
fn rmdir_locked(dir: &Arc<RamfsInode>, name: &str) -> Result<(), Errno> {
    let inode = dir_get_entry(dir, name).ok_or(Errno::ENOENT)?;
    if inode.kind != InodeKind::Dir {
        return Err(Errno::ENOTDIR);
    }
    if dir_entry_count(&inode)? != 0 {
        return Err(Errno::ENOTEMPTY);
    }
    RamfsInode::check_access(&dir.data.read(), false, true)?;
    dir_remove_entry(dir, name)?;
    Ok(())
}

impl FileSystem for Ramfs {
    fn fs_name(&self) -> &'static str {
        "ramfs"
    }

    fn device_id(&self) -> u64 {
        self.device_id
    }

    fn flags(&self) -> FsFlags {
        FsFlags::RW
    }

    fn root(&self) -> InodeRef {
        self.root.clone()
    }

    fn open_handle_count(&self) -> usize {
        self.open_handles.load(Ordering::Relaxed)
    }

    fn get_entry(&self, dir: &InodeRef, name: &str) -> vfs::Result<FsPath> {
        let dir = as_ramfs_inode(dir)?;
        if dir.kind != InodeKind::Dir {
            return Err(Errno::ENOTDIR);
        }
        let found = dir_get_entry(&dir, name);
        Ok(FsPath {
            kind: found.as_ref().map(|i| i.kind),
            inode: found.map(|i| -> InodeRef { i }),
            dir_inode: dir,
        })
    }

    fn open(&self, path: &VfsPath, flags: OpenFlags, mode: u32) -> vfs::Result<FileRef> {
        let dir = as_ramfs_inode(&path.fs_path.dir_inode)?;
        // Re-look the entry up: resolution ran before our lock was taken.
        let existing = if path.last.is_empty() {
            Some(self.root.clone())
        } else {
            dir_get_entry(&dir, &path.last)
        };

        let inode = match existing {
            Some(inode) => {
                if flags.contains(OpenFlags::O_CREAT | OpenFlags::O_EXCL) {
                    return Err(Errno::EEXIST);
                }
                if flags.contains(OpenFlags::O_DIRECTORY) && inode.kind != InodeKind::Dir {
                    return Err(Errno::ENOTDIR);
                }
                match inode.kind {
                    // Reachable only with O_NOFOLLOW on the final component
                    InodeKind::Symlink => return Err(Errno::ELOOP),
                    InodeKind::Dir if flags.writable() => return Err(Errno::EISDIR),
                    _ => {}
                }
                RamfsInode::check_access(
                    &inode.data.read(),
                    flags.readable(),
                    flags.writable(),
                )?;
                if flags.contains(OpenFlags::O_TRUNC)
                    && flags.writable()
                    && inode.kind == InodeKind::File
                {
                    let mut data = inode.data.write();
                    let now = self.now();
                    if let Content::File(f) = &mut data.content {
                        f.truncate(0);
                    }
                    data.mtime = now;
                }
                inode
            }
            None => {
                if !flags.contains(OpenFlags::O_CREAT) {
                    return Err(Errno::ENOENT);
                }
                RamfsInode::check_access(&dir.data.read(), false, true)?;
                let inode = RamfsInode::new_file(&self.this, self.alloc_ino(), mode, self.now());
                dir_add_entry(&dir, &path.last, &inode)?;
                inode
            }
        };
        Ok(RamfsFile::new(self.this(), inode, flags))
    }

    fn mkdir(&self, path: &VfsPath, mode: u32) -> vfs::Result<()> {
        if path.last.is_empty() {
            return Err(Errno::EEXIST);
        }
        let dir = as_ramfs_inode(&path.fs_path.dir_inode)?;
        if dir_get_entry(&dir, &path.last).is_some() {
            return Err(Errno::EEXIST);
        }
        RamfsInode::check_access(&dir.data.read(), false, true)?;
        let child = RamfsInode::new_dir(
            &self.this,
            self.alloc_ino(),
            mode,
            Some(dir.this.clone()),
            self.now(),
        );
        dir_add_entry(&dir, &path.last, &child)
    }

    fn rmdir(&self, path: &VfsPath) -> vfs::Result<()> {
        if path.last.is_empty() {
            return Err(Errno::EBUSY);
        }
        let dir = as_ramfs_inode(&path.fs_path.dir_inode)?;
        rmdir_locked(&dir, &path.last)
    }

    fn unlink(&self, path: &VfsPath) -> vfs::Result<()> {
        if path.last.is_empty() {
            return Err(Errno::EISDIR);
        }
        let dir = as_ramfs_inode(&path.fs_path.dir_inode)?;
        unlink_locked(&dir, &path.last)
    }

    fn symlink(&self, target: &str, link: &VfsPath) -> vfs::Result<()> {
        if target.is_empty() || target.len() >= PATH_MAX {
            return Err(Errno::EINVAL);
        }
        if link.last.is_empty() {
            return Err(Errno::EEXIST);
        }
        let dir = as_ramfs_inode(&link.fs_path.dir_inode)?;
        if dir_get_entry(&dir, &link.last).is_some() {
            return Err(Errno::EEXIST);
        }
        RamfsInode::check_access(&dir.data.read(), false, true)?;
        let inode = RamfsInode::new_symlink(
            &self.this,
            self.alloc_ino(),
            target.to_string(),
            self.now(),
        );
        dir_add_entry(&dir, &link.last, &inode)
    }

    fn readlink(&self, inode: &InodeRef) -> vfs::Result<String> {
        let inode = as_ramfs_inode(inode)?;
        let data = inode.data.read();
        match &data.content {
            Content::Symlink(target) => Ok(target.clone()),
            _ => Err(Errno::EINVAL),
        }
    }

    fn link(&self, old: &VfsPath, new: &VfsPath) -> vfs::Result<()> {
        let old_dir = as_ramfs_inode(&old.fs_path.dir_inode)?;
        let new_dir = as_ramfs_inode(&new.fs_path.dir_inode)?;
        let old_inode = dir_get_entry(&old_dir, &old.last).ok_or(Errno::ENOENT)?;
        if old_inode.kind != InodeKind::File {
            return Err(Errno::EPERM);
        }
        if new.last.is_empty() || dir_get_entry(&new_dir, &new.last).is_some() {
            return Err(Errno::EEXIST);
        }
        RamfsInode::check_access(&new_dir.data.read(), false, true)?;
        dir_add_entry(&new_dir, &new.last, &old_inode)
    }

    fn rename(&self, old: &VfsPath, new: &VfsPath) -> vfs::Result<()> {
        if old.last.is_empty() || new.last.is_empty() {
            return Err(Errno::EBUSY);
        }
        let old_dir = as_ramfs_inode(&old.fs_path.dir_inode)?;
        let new_dir = as_ramfs_inode(&new.fs_path.dir_inode)?;
        let old_inode = dir_get_entry(&old_dir, &old.last).ok_or(Errno::ENOENT)?;

        if let Some(new_inode) = dir_get_entry(&new_dir, &new.last) {
            if new_inode.kind == InodeKind::Dir {
                if old_inode.kind != InodeKind::Dir {
                    return Err(Errno::EISDIR);
                }
                if dir_entry_count(&new_inode)? != 0 {
                    return Err(Errno::ENOTEMPTY);
                }
                rmdir_locked(&new_dir, &new.last)?;
            } else {
                unlink_locked(&new_dir, &new.last)?;
            }
        }

        // If this fails (out of memory racing the deletion above), the
        // destination stays deleted and the source entry stays intact; the
        // syscall then reports the failure with that side effect visible.
        dir_add_entry(&new_dir, &new.last, &old_inode)?;

        // This step cannot fail anymore.
        dir_remove_entry(&old_dir, &old.last)?;
        Ok(())
    }

    fn chmod(&self, inode: &InodeRef, mode: u32) -> vfs::Result<()> {
        let inode = as_ramfs_inode(inode)?;
        let mut data = inode.data.write();
        // Only the nine permission bits are stored; setuid/sticky and
        // friends are rejected rather than silently dropped.
        if mode & !0o777 != 0 {
            return Err(Errno::EPERM);
        }
        data.mode = mode & 0o777;
        data.ctime = self.now();
        Ok(())
    }

    fn truncate(&self, inode: &InodeRef, len: usize) -> vfs::Result<()> {
        let inode = as_ramfs_inode(inode)?;
        let mut data = inode.data.write();
        RamfsInode::check_access(&data, false, true)?;
        let now = self.now();
        match &mut data.content {
            Content::File(f) => f.truncate(len),
            Content::Dir(_) => return Err(Errno::EISDIR),
            Content::Symlink(_) => return Err(Errno::EINVAL),
        }
        data.mtime = now;
        Ok(())
    }

    fn stat(&self, inode: &InodeRef) -> vfs::Result<Stat> {
        Ok(as_ramfs_inode(inode)?.stat())
    }

    fn futimens(&self, inode: &InodeRef, times: &[TimeSpec; 2]) -> vfs::Result<()> {
        let inode = as_ramfs_inode(inode)?;
        let mut data = inode.data.write();
        if data.mode & 0o200 == 0 {
            return Err(Errno::EACCES);
        }
        data.atime = times[0];
        data.mtime = times[1];
        Ok(())
    }

    fn exlock(&self) {
        core::mem::forget(self.lock.write());
    }

    fn exunlock(&self) {
        unsafe { self.lock.force_write_unlock() };
    }

    fn shlock(&self) {
        core::mem::forget(self.lock.read());
    }

    fn shunlock(&self) {
        unsafe { self.lock.force_read_decrement() };
    }
}
