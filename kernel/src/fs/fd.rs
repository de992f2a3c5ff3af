use alloc::vec::Vec;

use errno::Errno;
use vfs::FileRef;

use crate::{
    config::FD_LIMIT,
    error::{KernelError, KernelResult},
};

#[derive(Clone)]
pub struct FdEntry {
    pub file: FileRef,
    pub cloexec: bool,
}

/// File descriptor table: small integers to VFS handles, with recycled
/// slots reused lowest-first via the free list.
#[derive(Clone)]
pub struct FdTable {
    list: Vec<Option<FdEntry>>,
    recycled: Vec<usize>,
    pub limit: usize,
    pub umask: u32,
}

impl FdTable {
    /// An empty table (the kernel process).
    pub fn new_empty() -> Self {
        Self {
            list: Vec::new(),
            recycled: Vec::new(),
            limit: FD_LIMIT,
            umask: 0,
        }
    }

    /// A table with the console on fds 0, 1 and 2.
    pub fn new_std() -> Self {
        let mut table = Self::new_empty();
        for _ in 0..3 {
            table.push(crate::fs::console_file(), false).unwrap();
        }
        table
    }

    pub fn get(&self, fd: usize) -> KernelResult<FileRef> {
        self.list
            .get(fd)
            .and_then(|e| e.as_ref())
            .map(|e| e.file.clone())
            .ok_or(KernelError::Errno(Errno::EBADF))
    }

    pub fn remove(&mut self, fd: usize) -> KernelResult<FileRef> {
        let entry = self
            .list
            .get_mut(fd)
            .and_then(|e| e.take())
            .ok_or(KernelError::Errno(Errno::EBADF))?;
        self.recycled.push(fd);
        Ok(entry.file)
    }

    fn alloc(&mut self) -> KernelResult<usize> {
        if let Some(fd) = self.recycled.pop() {
            Ok(fd)
        } else {
            let fd = self.list.len();
            if fd < self.limit {
                self.list.push(None);
                Ok(fd)
            } else {
                Err(KernelError::Errno(Errno::EMFILE))
            }
        }
    }

    /// Installs a handle, returning its descriptor.
    pub fn push(&mut self, file: FileRef, cloexec: bool) -> KernelResult<usize> {
        let fd = self.alloc()?;
        self.list[fd] = Some(FdEntry { file, cloexec });
        Ok(fd)
    }

    /// Drops every handle (process exit).
    pub fn clear(&mut self) {
        self.list.clear();
        self.recycled.clear();
    }

    /// Drops the handles marked close-on-exec.
    pub fn close_cloexec(&mut self) {
        for (fd, slot) in self.list.iter_mut().enumerate() {
            if slot.as_ref().map_or(false, |e| e.cloexec) {
                *slot = None;
                self.recycled.push(fd);
            }
        }
    }
}
