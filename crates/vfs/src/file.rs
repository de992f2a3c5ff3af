use alloc::sync::Arc;
use core::ptr::NonNull;

use downcast_rs::{impl_downcast, DowncastSync};
use errno::Errno;

use crate::{
    flag::SeekWhence,
    fs::{FsRef, InodeRef},
    stat::Stat,
    Result,
};

/// A per-open-file object, produced by [`crate::FileSystem::open`].
///
/// Byte position and iteration cursors are per-handle state kept behind
/// interior mutability, so handles are shared as `Arc<dyn VfsFile>` (a
/// forked child and its parent share the seek position).
///
/// The per-file lock methods are optional; a filesystem that serializes
/// inside its own operations (ramfs does) leaves them as no-ops.
pub trait VfsFile: DowncastSync {
    /// Reads at the current position, advancing it. Returns the number of
    /// bytes read; 0 means end of file.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes at the current position (or at end-of-file under O_APPEND),
    /// advancing it.
    fn write(&self, buf: &[u8]) -> Result<usize>;

    fn seek(&self, offset: i64, whence: SeekWhence) -> Result<i64>;

    fn stat(&self) -> Result<Stat>;

    /// Clones this handle. The copy starts from the current position and
    /// moves independently afterwards.
    fn dup(&self) -> Result<FileRef>;

    /// Streams directory entries into `buf` as 64-bit dirent records.
    fn getdents(&self, _buf: &mut [u8]) -> Result<usize> {
        Err(Errno::ENOTDIR)
    }

    fn ioctl(&self, _cmd: usize, _arg: usize) -> Result<usize> {
        Err(Errno::ENOTTY)
    }

    /// The backing inode, when the handle has one (console handles don't).
    fn inode(&self) -> Option<InodeRef> {
        None
    }

    /// The owning filesystem, when the handle has one.
    fn fs(&self) -> Option<FsRef> {
        None
    }

    /// Hands out the backing page containing `offset` for memory mapping,
    /// without copying. The page stays owned by the filesystem.
    fn mmap_page(&self, _offset: usize) -> Result<NonNull<u8>> {
        Err(Errno::ENOSYS)
    }

    fn read_ready(&self) -> bool {
        true
    }

    fn write_ready(&self) -> bool {
        true
    }

    /* Optional per-file locks */

    fn exlock(&self) {}
    fn exunlock(&self) {}
    fn shlock(&self) {}
    fn shunlock(&self) {}
}

impl_downcast!(sync VfsFile);

impl core::fmt::Debug for dyn VfsFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("dyn VfsFile")
    }
}

pub type FileRef = Arc<dyn VfsFile>;
