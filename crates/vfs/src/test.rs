extern crate std;

use alloc::sync::Arc;

use crate::{
    DirentWriter, FileSystem, FsFlags, FsPath, Inode, InodeKind, InodeRef, MountTable, Path,
    Result, DT_REG,
};

#[test]
fn test_path() {
    let path = Path::new("a/b/c/.././..///d/");
    assert_eq!(path, Path::new("/a/d/"));
    assert!(path.has_trailing_slash());
    assert_eq!(path.last(), Some("d"));
    assert_eq!(path.parent(), Path::new("/a"));
    assert_eq!(Path::new("/../../.."), Path::root());
    assert_eq!(Path::concat(&Path::new("/a/b"), "../c"), Path::new("/a/c"));
    assert_eq!(Path::concat(&Path::new("/a/b"), "/abs"), Path::new("/abs"));
    assert_eq!(Path::new("/x/y").components(), ["x", "y"]);
}

struct NullInode;

impl Inode for NullInode {
    fn ino(&self) -> u64 {
        1
    }
    fn kind(&self) -> InodeKind {
        InodeKind::Dir
    }
}

struct NullFs(u64);

impl FileSystem for NullFs {
    fn fs_name(&self) -> &'static str {
        "nullfs"
    }
    fn device_id(&self) -> u64 {
        self.0
    }
    fn flags(&self) -> FsFlags {
        FsFlags::RW
    }
    fn root(&self) -> InodeRef {
        Arc::new(NullInode)
    }
    fn get_entry(&self, dir: &InodeRef, _name: &str) -> Result<FsPath> {
        Ok(FsPath {
            inode: None,
            dir_inode: dir.clone(),
            kind: None,
        })
    }
}

#[test]
fn test_mount_longest_prefix() {
    let mut table = MountTable::new();
    table.add(Arc::new(NullFs(1)), Path::root()).unwrap();
    table.add(Arc::new(NullFs(2)), Path::new("/mnt")).unwrap();
    table.add(Arc::new(NullFs(3)), Path::new("/mnt/inner")).unwrap();

    let m = table.resolve(&Path::new("/etc/passwd")).unwrap();
    assert_eq!(m.fs.device_id(), 1);
    assert_eq!(m.rest, ["etc", "passwd"]);

    let m = table.resolve(&Path::new("/mnt/x")).unwrap();
    assert_eq!(m.fs.device_id(), 2);
    assert_eq!(m.rest, ["x"]);

    let m = table.resolve(&Path::new("/mnt/inner/deep/file")).unwrap();
    assert_eq!(m.fs.device_id(), 3);
    assert_eq!(m.rest, ["deep", "file"]);

    // "/mnt/innerX" must not match the "/mnt/inner" prefix
    let m = table.resolve(&Path::new("/mnt/innerX")).unwrap();
    assert_eq!(m.fs.device_id(), 2);
}

#[test]
fn test_mount_rules() {
    let mut table = MountTable::new();
    // first mount must be the root filesystem
    assert!(table.add(Arc::new(NullFs(9)), Path::new("/x")).is_err());
    table.add(Arc::new(NullFs(1)), Path::root()).unwrap();
    assert!(table.add(Arc::new(NullFs(2)), Path::root()).is_err());
    assert!(table.remove(&Path::root()).is_err());
}

#[test]
fn test_dirent_encoding() {
    let mut buf = [0u8; 64];
    let mut w = DirentWriter::new(&mut buf);
    assert!(w.push(7, 1, DT_REG, "hello"));
    let reclen = DirentWriter::record_len("hello");
    assert_eq!(reclen, 32); // 19 + 5 + 1 rounded up to 8
    assert_eq!(w.written(), reclen);
    assert_eq!(&buf[0..8], &7u64.to_le_bytes());
    assert_eq!(&buf[16..18], &(reclen as u16).to_le_bytes());
    assert_eq!(buf[18], DT_REG);
    assert_eq!(&buf[19..24], b"hello");
    assert_eq!(buf[24], 0);

    // A name that does not fit is rejected without partial output
    let mut small = [0u8; 16];
    let mut w = DirentWriter::new(&mut small);
    assert!(!w.push(1, 0, DT_REG, "toolongname"));
    assert_eq!(w.written(), 0);
}
