//! The virtual filesystem layer.
//!
//! The VFS multiplexes every mounted filesystem behind one uniform surface:
//! absolute paths are matched against the mountpoint table (longest prefix
//! wins), the remaining components are walked one by one through the owning
//! filesystem's [`FileSystem::get_entry`], and the resulting handles expose
//! the per-file operation set ([`VfsFile`]).
//!
//! Filesystems install their operations as trait objects; per-call locking
//! picks one of four modes (whole-fs shared or exclusive, per-handle shared
//! or exclusive) in [`ops`].

#![no_std]

extern crate alloc;

mod dirent;
mod file;
mod flag;
mod fs;
mod mount;
mod ops;
mod path;
mod resolve;
mod stat;
#[cfg(test)]
mod test;

pub use dirent::{DirentWriter, DT_DIR, DT_LNK, DT_REG, DT_UNKNOWN};
pub use file::{FileRef, VfsFile};
pub use flag::{OpenFlags, SeekWhence};
pub use fs::{FileSystem, FsFlags, FsPath, FsRef, Inode, InodeKind, InodeRef, VfsPath};
pub use mount::{mountpoint_add, mountpoint_remove, MountTable};
pub use ops::*;
pub use path::Path;
pub use resolve::resolve_path;
pub use stat::{Stat, StatMode};

/// Longest accepted name of a single path component.
pub const NAME_MAX: usize = 255;

/// Longest accepted path, terminator included.
pub const PATH_MAX: usize = 4096;

/// Symbolic links followed during one resolution before giving up.
pub const SYMLOOP_MAX: usize = 40;

/// Every fallible VFS operation reports an [`errno::Errno`].
pub type Result<T> = core::result::Result<T, errno::Errno>;
