use alloc::string::String;

use errno::Errno;

use crate::{
    fs::{FsPath, InodeKind, VfsPath},
    mount::resolve_mountpoint,
    path::Path,
    Result, PATH_MAX, SYMLOOP_MAX,
};

/// Re-assembles the path after a symlink has been met: everything resolved
/// so far, the link target (an absolute target restarts from the root), and
/// the components that were still pending.
fn splice(prefix: &Path, rest: &[String], hit: usize, target: &str, trailing: bool) -> Path {
    let mut base = String::from(prefix.as_str());
    for comp in &rest[..hit] {
        if !base.ends_with('/') {
            base.push('/');
        }
        base += comp;
    }
    let spliced = Path::concat(&Path::new(&base), target);
    let mut s = String::from(spliced.as_str());
    for comp in &rest[hit + 1..] {
        if !s.ends_with('/') {
            s.push('/');
        }
        s += comp;
    }
    if trailing && !s.ends_with('/') {
        s.push('/');
    }
    Path::new(&s)
}

/// Resolves `path` (made absolute against `cwd`) down to a [`VfsPath`].
///
/// The mountpoint table picks the filesystem by longest prefix; the
/// remaining components are walked one by one through `get_entry`.
/// Symlinks met along the way are dereferenced up to [`SYMLOOP_MAX`] hops
/// in total; the final component is only dereferenced when `follow_last`
/// is set or the path carries a trailing slash. A trailing slash also
/// requires the final entry, when it exists, to be a directory.
///
/// An absent *final* component is not an error: the returned
/// [`VfsPath`] carries `inode == None` alongside the directory that would
/// own the entry, which is exactly what creation operations need.
pub fn resolve_path(cwd: &Path, path: &str, follow_last: bool) -> Result<VfsPath> {
    if path.is_empty() {
        return Err(Errno::ENOENT);
    }
    if path.len() >= PATH_MAX {
        return Err(Errno::ENAMETOOLONG);
    }
    let mut abs = Path::concat(cwd, path);
    let mut hops = 0usize;

    'restart: loop {
        let trailing = abs.has_trailing_slash();
        let mount = resolve_mountpoint(&abs)?;
        let fs = mount.fs;
        let root = fs.root();

        if mount.rest.is_empty() {
            // The path names the filesystem root itself.
            return Ok(VfsPath {
                fs,
                fs_path: FsPath {
                    inode: Some(root.clone()),
                    dir_inode: root,
                    kind: Some(InodeKind::Dir),
                },
                last: String::new(),
            });
        }

        let mut dir = root;
        for (i, comp) in mount.rest.iter().enumerate() {
            let is_last = i == mount.rest.len() - 1;
            let fsp = fs.get_entry(&dir, comp)?;

            if fsp.kind == Some(InodeKind::Symlink) && (!is_last || follow_last || trailing) {
                hops += 1;
                if hops > SYMLOOP_MAX {
                    return Err(Errno::EINVAL);
                }
                let link = fsp.inode.as_ref().ok_or(Errno::ENOENT)?;
                let target = fs.readlink(link)?;
                abs = splice(&mount.prefix, &mount.rest, i, &target, trailing);
                continue 'restart;
            }

            if is_last {
                if trailing && fsp.kind.is_some() && fsp.kind != Some(InodeKind::Dir) {
                    return Err(Errno::ENOTDIR);
                }
                return Ok(VfsPath {
                    fs,
                    fs_path: fsp,
                    last: comp.clone(),
                });
            }

            match fsp.kind {
                None => return Err(Errno::ENOENT),
                Some(InodeKind::Dir) => {
                    dir = fsp.inode.ok_or(Errno::ENOENT)?;
                }
                Some(_) => return Err(Errno::ENOTDIR),
            }
        }
        unreachable!("walk always ends at the last component");
    }
}
