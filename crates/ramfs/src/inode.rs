use alloc::{
    collections::BTreeMap,
    string::String,
    sync::{Arc, Weak},
};

use errno::Errno;
use ktime::TimeSpec;
use spin::RwLock;
use vfs::{Inode, InodeKind, Stat, StatMode};

use crate::{blocks::FileBlocks, Ramfs, BLOCK_SIZE};

/// An in-memory file object. Immutable identity outside the lock, all
/// attributes and content behind the per-inode reader/writer lock.
pub struct RamfsInode {
    pub(crate) ino: u64,
    pub(crate) kind: InodeKind,
    pub(crate) fs: Weak<Ramfs>,
    pub(crate) this: Weak<RamfsInode>,
    pub(crate) data: RwLock<InodeData>,
}

pub(crate) struct InodeData {
    /// The nine Unix permission bits; nothing above them is stored.
    pub mode: u32,

    /// Number of directory entries referencing this inode. `.` and `..`
    /// are not counted, which is what keeps directory cycles reclaimable.
    pub nlink: u32,

    pub atime: TimeSpec,
    pub mtime: TimeSpec,
    pub ctime: TimeSpec,

    pub content: Content,
}

pub(crate) enum Content {
    File(FileBlocks),
    Dir(DirEntries),
    Symlink(String),
}

/// Real entries of a directory, ordered by name. `.` and `..` are served
/// from the self/parent references instead of map slots, so a directory
/// never keeps itself or its parent alive.
pub(crate) struct DirEntries {
    pub parent: Weak<RamfsInode>,
    pub entries: BTreeMap<String, Arc<RamfsInode>>,
}

impl RamfsInode {
    pub(crate) fn new_file(fs: &Weak<Ramfs>, ino: u64, mode: u32, now: TimeSpec) -> Arc<Self> {
        Self::alloc(fs, ino, InodeKind::File, mode, now, |_| {
            Content::File(FileBlocks::new())
        })
    }

    pub(crate) fn new_symlink(
        fs: &Weak<Ramfs>,
        ino: u64,
        target: String,
        now: TimeSpec,
    ) -> Arc<Self> {
        Self::alloc(fs, ino, InodeKind::Symlink, 0o777, now, |_| {
            Content::Symlink(target)
        })
    }

    /// A directory pointing back at `parent`; the root passes `None` and
    /// becomes its own parent.
    pub(crate) fn new_dir(
        fs: &Weak<Ramfs>,
        ino: u64,
        mode: u32,
        parent: Option<Weak<RamfsInode>>,
        now: TimeSpec,
    ) -> Arc<Self> {
        Self::alloc(fs, ino, InodeKind::Dir, mode, now, |this| {
            Content::Dir(DirEntries {
                parent: parent.unwrap_or_else(|| this.clone()),
                entries: BTreeMap::new(),
            })
        })
    }

    fn alloc(
        fs: &Weak<Ramfs>,
        ino: u64,
        kind: InodeKind,
        mode: u32,
        now: TimeSpec,
        content: impl FnOnce(&Weak<RamfsInode>) -> Content,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| RamfsInode {
            ino,
            kind,
            fs: fs.clone(),
            this: this.clone(),
            data: RwLock::new(InodeData {
                mode: mode & 0o777,
                nlink: 0,
                atime: now,
                mtime: now,
                ctime: now,
                content: content(this),
            }),
        })
    }

    /// Checks the owner permission bits for the requested access.
    pub(crate) fn check_access(data: &InodeData, read: bool, write: bool) -> Result<(), Errno> {
        if read && data.mode & 0o400 == 0 {
            return Err(Errno::EACCES);
        }
        if write && data.mode & 0o200 == 0 {
            return Err(Errno::EACCES);
        }
        Ok(())
    }

    pub(crate) fn stat(&self) -> Stat {
        let data = self.data.read();
        let (type_bits, size, blocks) = match &data.content {
            Content::File(f) => (
                StatMode::S_IFREG.bits(),
                f.size as i64,
                (f.allocated_blocks() * (BLOCK_SIZE / 512)) as u64,
            ),
            Content::Dir(d) => (StatMode::S_IFDIR.bits(), (d.entries.len() + 2) as i64, 0),
            Content::Symlink(t) => (StatMode::S_IFLNK.bits(), t.len() as i64, 0),
        };
        Stat {
            st_dev: self.fs.upgrade().map(|fs| fs.device_id).unwrap_or(0),
            st_ino: self.ino,
            st_mode: type_bits | data.mode,
            st_nlink: data.nlink,
            st_size: size,
            st_blksize: BLOCK_SIZE as u32,
            st_blocks: blocks,
            st_atime: data.atime,
            st_mtime: data.mtime,
            st_ctime: data.ctime,
            ..Default::default()
        }
    }
}

impl Inode for RamfsInode {
    fn ino(&self) -> u64 {
        self.ino
    }

    fn kind(&self) -> InodeKind {
        self.kind
    }
}
