use alloc::{string::String, sync::Arc, vec::Vec};

use errno::Errno;
use spin::RwLock;

use crate::{fs::FsRef, path::Path, Result};

/// Binding of a filesystem to an absolute path prefix.
pub struct Mountpoint {
    pub fs: FsRef,
    pub prefix: Path,
}

/// Ordered sequence of mountpoints, searched longest-prefix-first.
pub struct MountTable {
    mounts: Vec<Mountpoint>,
}

/// A successful prefix match: the owning filesystem and the components of
/// the path remaining below the mountpoint.
pub struct ResolvedMount {
    pub fs: FsRef,
    pub prefix: Path,
    pub rest: Vec<String>,
}

impl MountTable {
    pub const fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    /// Registers `fs` at `prefix`. The first registration must be the root
    /// filesystem at "/".
    pub fn add(&mut self, fs: FsRef, prefix: Path) -> Result<()> {
        if self.mounts.is_empty() && !prefix.is_root() {
            return Err(Errno::EINVAL);
        }
        if self.mounts.iter().any(|m| m.prefix == prefix) {
            return Err(Errno::EBUSY);
        }
        self.mounts.push(Mountpoint { fs, prefix });
        Ok(())
    }

    /// Unbinds the filesystem mounted at `prefix`. Fails with EBUSY while
    /// the filesystem still has open handles, and for the root filesystem.
    pub fn remove(&mut self, prefix: &Path) -> Result<()> {
        let idx = self
            .mounts
            .iter()
            .position(|m| &m.prefix == prefix)
            .ok_or(Errno::ENOENT)?;
        if prefix.is_root() {
            return Err(Errno::EBUSY);
        }
        if self.mounts[idx].fs.open_handle_count() != 0 {
            return Err(Errno::EBUSY);
        }
        self.mounts.remove(idx);
        Ok(())
    }

    /// Longest-prefix match of `path` against the table.
    pub fn resolve(&self, path: &Path) -> Result<ResolvedMount> {
        let comps = path.components();
        let mut best: Option<&Mountpoint> = None;
        let mut best_len = 0;
        for m in &self.mounts {
            let pre = m.prefix.components();
            if pre.len() <= comps.len()
                && pre.iter().zip(comps.iter()).all(|(a, b)| a == b)
                && (best.is_none() || pre.len() > best_len)
            {
                best_len = pre.len();
                best = Some(m);
            }
        }
        let m = best.ok_or(Errno::ENOENT)?;
        Ok(ResolvedMount {
            fs: Arc::clone(&m.fs),
            prefix: m.prefix.clone(),
            rest: comps[best_len..].iter().map(|s| String::from(*s)).collect(),
        })
    }
}

static MOUNTS: RwLock<MountTable> = RwLock::new(MountTable::new());

/// Registers a filesystem at an absolute path.
pub fn mountpoint_add(fs: FsRef, path: &str) -> Result<()> {
    MOUNTS.write().add(fs, Path::new(path))
}

/// Unbinds the filesystem mounted at `path`.
pub fn mountpoint_remove(path: &str) -> Result<()> {
    MOUNTS.write().remove(&Path::new(path))
}

/// Finds the filesystem owning `path`.
pub(crate) fn resolve_mountpoint(path: &Path) -> Result<ResolvedMount> {
    MOUNTS.read().resolve(path)
}
