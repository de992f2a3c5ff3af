use alloc::{string::String, sync::Arc};
use core::{ptr::NonNull, sync::atomic::Ordering};

use errno::Errno;
use spin::Mutex;
use vfs::{
    DirentWriter, FileRef, FsRef, InodeKind, InodeRef, OpenFlags, SeekWhence, Stat, VfsFile,
    DT_DIR, DT_LNK, DT_REG,
};

use crate::{
    dir::{dir_get_entry, dir_next_name},
    inode::{Content, RamfsInode},
    Ramfs, BLOCK_SIZE,
};

/// Where a directory iteration currently stands. Cursors are by-name:
/// removing an entry can never invalidate another handle's position.
#[derive(Clone)]
enum DirCursor {
    Dot,
    DotDot,
    /// Resume with the first name strictly greater than this one.
    After(String),
    End,
}

#[derive(Clone)]
struct FilePos {
    pos: usize,
    emitted: i64,
    cursor: DirCursor,
}

/// A per-open handle into a ramfs file or directory.
pub struct RamfsFile {
    fs: Arc<Ramfs>,
    inode: Arc<RamfsInode>,
    flags: OpenFlags,
    state: Mutex<FilePos>,
}

impl RamfsFile {
    pub(crate) fn new(fs: Arc<Ramfs>, inode: Arc<RamfsInode>, flags: OpenFlags) -> Arc<Self> {
        fs.open_handles.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            fs,
            inode,
            flags,
            state: Mutex::new(FilePos {
                pos: 0,
                emitted: 0,
                cursor: DirCursor::Dot,
            }),
        })
    }

    fn dtype(kind: InodeKind) -> u8 {
        match kind {
            InodeKind::File => DT_REG,
            InodeKind::Dir => DT_DIR,
            InodeKind::Symlink => DT_LNK,
        }
    }
}

impl Drop for RamfsFile {
    fn drop(&mut self) {
        // The inode reference dies with the handle; an unlinked inode with
        // no remaining handles is freed right here by the Arc.
        self.fs.open_handles.fetch_sub(1, Ordering::Relaxed);
    }
}

impl VfsFile for RamfsFile {
    fn read(&self, buf: &mut [u8]) -> vfs::Result<usize> {
        if !self.flags.readable() {
            return Err(Errno::EBADF);
        }
        let mut state = self.state.lock();
        let data = self.inode.data.read();
        let file = match &data.content {
            Content::File(f) => f,
            Content::Dir(_) => return Err(Errno::EISDIR),
            Content::Symlink(_) => return Err(Errno::EINVAL),
        };
        let n = file.read_at(state.pos, buf);
        state.pos += n;
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> vfs::Result<usize> {
        if !self.flags.writable() {
            return Err(Errno::EBADF);
        }
        let mut state = self.state.lock();
        let mut data = self.inode.data.write();
        let now = (self.fs.clock)();
        let file = match &mut data.content {
            Content::File(f) => f,
            Content::Dir(_) => return Err(Errno::EISDIR),
            Content::Symlink(_) => return Err(Errno::EINVAL),
        };
        if self.flags.contains(OpenFlags::O_APPEND) {
            state.pos = file.size;
        }
        let n = file.write_at(state.pos, buf);
        state.pos += n;
        data.mtime = now;
        Ok(n)
    }

    fn seek(&self, offset: i64, whence: SeekWhence) -> vfs::Result<i64> {
        let mut state = self.state.lock();
        if self.inode.kind == InodeKind::Dir {
            // Only a full rewind is meaningful on a directory handle.
            if whence != SeekWhence::SEEK_SET || offset != 0 {
                return Err(Errno::EINVAL);
            }
            state.pos = 0;
            state.emitted = 0;
            state.cursor = DirCursor::Dot;
            return Ok(0);
        }
        let base = match whence {
            SeekWhence::SEEK_SET => 0,
            SeekWhence::SEEK_CUR => state.pos as i64,
            SeekWhence::SEEK_END => {
                let data = self.inode.data.read();
                match &data.content {
                    Content::File(f) => f.size as i64,
                    _ => 0,
                }
            }
            _ => return Err(Errno::EINVAL),
        };
        let target = base + offset;
        if target < 0 {
            return Err(Errno::EINVAL);
        }
        state.pos = target as usize;
        Ok(target)
    }

    fn stat(&self) -> vfs::Result<Stat> {
        Ok(self.inode.stat())
    }

    fn dup(&self) -> vfs::Result<FileRef> {
        self.fs.open_handles.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(Self {
            fs: self.fs.clone(),
            inode: self.inode.clone(),
            flags: self.flags,
            state: Mutex::new(self.state.lock().clone()),
        }))
    }

    /// Streams entries lexicographically from the handle's cursor: `.`,
    /// `..`, then the real entries. A non-empty buffer too small for even
    /// one record fails with EINVAL and the cursor stays put.
    fn getdents(&self, buf: &mut [u8]) -> vfs::Result<usize> {
        if self.inode.kind != InodeKind::Dir {
            return Err(Errno::ENOTDIR);
        }
        let mut state = self.state.lock();
        if matches!(state.cursor, DirCursor::End) {
            return Ok(0);
        }
        let mut writer = DirentWriter::new(buf);
        loop {
            let (name, ino, dtype, next) = match &state.cursor {
                DirCursor::Dot => (
                    String::from("."),
                    self.inode.ino,
                    DT_DIR,
                    DirCursor::DotDot,
                ),
                DirCursor::DotDot => {
                    let parent = dir_get_entry(&self.inode, "..").ok_or(Errno::ENOENT)?;
                    // An empty "after" name resumes at the first real entry.
                    (
                        String::from(".."),
                        parent.ino,
                        DT_DIR,
                        DirCursor::After(String::new()),
                    )
                }
                DirCursor::After(prev) => match dir_next_name(&self.inode, Some(prev.as_str())) {
                    Some((name, inode)) => {
                        let next = DirCursor::After(name.clone());
                        (name, inode.ino, Self::dtype(inode.kind), next)
                    }
                    None => {
                        state.cursor = DirCursor::End;
                        break;
                    }
                },
                DirCursor::End => break,
            };
            let off = state.emitted + 1;
            if !writer.push(ino, off, dtype, &name) {
                if writer.written() == 0 {
                    return Err(Errno::EINVAL);
                }
                break;
            }
            state.emitted = off;
            state.cursor = next;
        }
        Ok(writer.written())
    }

    fn inode(&self) -> Option<InodeRef> {
        Some(self.inode.clone())
    }

    fn fs(&self) -> Option<FsRef> {
        Some(self.fs.clone())
    }

    fn mmap_page(&self, offset: usize) -> vfs::Result<NonNull<u8>> {
        if self.inode.kind != InodeKind::File {
            return Err(Errno::EINVAL);
        }
        let mut data = self.inode.data.write();
        let file = match &mut data.content {
            Content::File(f) => f,
            _ => return Err(Errno::EINVAL),
        };
        if offset % BLOCK_SIZE != 0 {
            return Err(Errno::EINVAL);
        }
        let limit = (file.size + BLOCK_SIZE - 1) / BLOCK_SIZE * BLOCK_SIZE;
        if offset >= limit {
            return Err(Errno::EINVAL);
        }
        Ok(file.page_at(offset))
    }
}
