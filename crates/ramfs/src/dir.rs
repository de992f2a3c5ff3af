use alloc::{
    string::{String, ToString},
    sync::Arc,
};

use errno::Errno;
use vfs::NAME_MAX;

use crate::inode::{Content, RamfsInode};

/// Looks one name up in `dir`. `.` and `..` resolve through the self and
/// parent references; everything else through the entry map.
pub(crate) fn dir_get_entry(dir: &Arc<RamfsInode>, name: &str) -> Option<Arc<RamfsInode>> {
    match name {
        "." => dir.this.upgrade(),
        ".." => {
            let data = dir.data.read();
            match &data.content {
                Content::Dir(d) => d.parent.upgrade(),
                _ => None,
            }
        }
        _ => {
            let data = dir.data.read();
            match &data.content {
                Content::Dir(d) => d.entries.get(name).cloned(),
                _ => None,
            }
        }
    }
}

/// Adds a directory entry `name -> child`, bumping the child's nlink.
///
/// The entry map owns a strong reference: that reference *is* the link
/// count from the VFS point of view.
pub(crate) fn dir_add_entry(
    dir: &Arc<RamfsInode>,
    name: &str,
    child: &Arc<RamfsInode>,
) -> Result<(), Errno> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(Errno::EINVAL);
    }
    if name.len() > NAME_MAX {
        return Err(Errno::EINVAL);
    }
    {
        let mut data = dir.data.write();
        let d = match &mut data.content {
            Content::Dir(d) => d,
            _ => return Err(Errno::ENOTDIR),
        };
        if d.entries.contains_key(name) {
            return Err(Errno::EEXIST);
        }
        d.entries.insert(name.to_string(), child.clone());
    }
    let mut child_data = child.data.write();
    child_data.nlink += 1;
    // A directory gets exactly one entry in its lifetime (no dir hard
    // links), so this is where its parent pointer settles.
    if let Content::Dir(cd) = &mut child_data.content {
        cd.parent = dir.this.clone();
    }
    Ok(())
}

/// Removes the entry `name`, dropping the child's nlink. Returns the
/// unlinked inode so the caller can inspect it after removal.
pub(crate) fn dir_remove_entry(dir: &Arc<RamfsInode>, name: &str) -> Result<Arc<RamfsInode>, Errno> {
    let child = {
        let mut data = dir.data.write();
        let d = match &mut data.content {
            Content::Dir(d) => d,
            _ => return Err(Errno::ENOTDIR),
        };
        d.entries.remove(name).ok_or(Errno::ENOENT)?
    };
    let mut child_data = child.data.write();
    debug_assert!(child_data.nlink > 0);
    child_data.nlink -= 1;
    drop(child_data);
    Ok(child)
}

/// Number of real entries (`.` and `..` not counted).
pub(crate) fn dir_entry_count(dir: &Arc<RamfsInode>) -> Result<usize, Errno> {
    let data = dir.data.read();
    match &data.content {
        Content::Dir(d) => Ok(d.entries.len()),
        _ => Err(Errno::ENOTDIR),
    }
}

/// The first entry name strictly greater than `after`, for cursor resume.
pub(crate) fn dir_next_name(
    dir: &Arc<RamfsInode>,
    after: Option<&str>,
) -> Option<(String, Arc<RamfsInode>)> {
    let data = dir.data.read();
    match &data.content {
        Content::Dir(d) => {
            let mut iter = match after {
                Some(name) => d
                    .entries
                    .range::<str, _>((core::ops::Bound::Excluded(name), core::ops::Bound::Unbounded)),
                None => d.entries.range::<str, _>(..),
            };
            iter.next().map(|(n, i)| (n.clone(), i.clone()))
        }
        _ => None,
    }
}
