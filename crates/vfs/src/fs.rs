use alloc::{string::String, sync::Arc};

use bitflags::bitflags;
use downcast_rs::{impl_downcast, DowncastSync};
use errno::Errno;
use ktime::TimeSpec;

use crate::{file::FileRef, flag::OpenFlags, stat::Stat, Result};

bitflags! {
    pub struct FsFlags: u32 {
        /// The filesystem accepts structural changes and writes.
        const RW = 1 << 0;
    }
}

/// What kind of object an inode is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File,
    Dir,
    Symlink,
}

/// A filesystem-internal file object. The VFS only ever sees it as an
/// opaque reference; the owning filesystem downcasts it back to its
/// concrete type.
pub trait Inode: DowncastSync {
    /// Inode number, unique within the owning filesystem.
    fn ino(&self) -> u64;

    /// The kind of object this inode is.
    fn kind(&self) -> InodeKind;
}

impl_downcast!(sync Inode);

pub type InodeRef = Arc<dyn Inode>;

/// The outcome of looking one name up in one directory.
pub struct FsPath {
    /// The resolved inode; `None` means the entry does not exist.
    pub inode: Option<InodeRef>,

    /// The directory the lookup happened in.
    pub dir_inode: InodeRef,

    /// Kind of the resolved inode, when it exists.
    pub kind: Option<InodeKind>,
}

/// A fully resolved path: the owning filesystem, the final lookup result
/// and the last component's name (empty for the filesystem root).
pub struct VfsPath {
    pub fs: FsRef,
    pub fs_path: FsPath,
    pub last: String,
}

impl VfsPath {
    /// The resolved inode, or ENOENT.
    pub fn inode(&self) -> Result<&InodeRef> {
        self.fs_path.inode.as_ref().ok_or(Errno::ENOENT)
    }

    pub fn exists(&self) -> bool {
        self.fs_path.inode.is_some()
    }
}

/// The operation table a mounted filesystem installs.
///
/// Structural operations (create, unlink, rename, ...) are called by the
/// VFS with the whole-filesystem exclusive lock held; read-only traversal
/// runs under the shared lock. Operations a filesystem does not support
/// report [`Errno::ENOSYS`].
pub trait FileSystem: DowncastSync {
    /// Short type name, e.g. `"ramfs"`.
    fn fs_name(&self) -> &'static str;

    /// Device id, unique among mounted filesystems.
    fn device_id(&self) -> u64;

    fn flags(&self) -> FsFlags;

    /// The root directory inode.
    fn root(&self) -> InodeRef;

    /// Looks up one component inside `dir`. Fails with ENOTDIR when `dir`
    /// is not a directory; an absent entry is reported through
    /// [`FsPath::inode`] being `None`, not as an error.
    fn get_entry(&self, dir: &InodeRef, name: &str) -> Result<FsPath>;

    /// Number of live handles into this filesystem; consulted by
    /// mountpoint removal.
    fn open_handle_count(&self) -> usize {
        0
    }

    fn open(&self, _path: &VfsPath, _flags: OpenFlags, _mode: u32) -> Result<FileRef> {
        Err(Errno::ENOSYS)
    }

    fn mkdir(&self, _path: &VfsPath, _mode: u32) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    fn rmdir(&self, _path: &VfsPath) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    fn unlink(&self, _path: &VfsPath) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    fn symlink(&self, _target: &str, _link: &VfsPath) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    /// Reads a symlink target. Also used internally by path resolution.
    fn readlink(&self, _inode: &InodeRef) -> Result<String> {
        Err(Errno::ENOSYS)
    }

    /// Hard-links `old` under `new`. Both paths are inside this filesystem;
    /// the VFS rejects cross-filesystem links before getting here.
    fn link(&self, _old: &VfsPath, _new: &VfsPath) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    /// Renames `old` to `new`, both inside this filesystem.
    fn rename(&self, _old: &VfsPath, _new: &VfsPath) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    fn chmod(&self, _inode: &InodeRef, _mode: u32) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    fn truncate(&self, _inode: &InodeRef, _len: usize) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    fn stat(&self, _inode: &InodeRef) -> Result<Stat> {
        Err(Errno::ENOSYS)
    }

    fn futimens(&self, _inode: &InodeRef, _times: &[TimeSpec; 2]) -> Result<()> {
        Err(Errno::ENOSYS)
    }

    /* Whole-filesystem locks */

    fn exlock(&self) {}
    fn exunlock(&self) {}
    fn shlock(&self) {}
    fn shunlock(&self) {}
}

impl_downcast!(sync FileSystem);

pub type FsRef = Arc<dyn FileSystem>;
