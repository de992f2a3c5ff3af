//! Boot ramdisk: a ustar archive linked in behind the kernel image,
//! unpacked into the root filesystem at boot.

use alloc::string::String;

use log::{info, warn};
use vfs::{vfs_chmod, vfs_mkdir, vfs_open, vfs_symlink, vfs_write, OpenFlags, Path};

const BLOCK: usize = 512;

fn octal_field(bytes: &[u8]) -> usize {
    let mut value = 0;
    for &b in bytes {
        match b {
            b'0'..=b'7' => value = value * 8 + (b - b'0') as usize,
            _ => break,
        }
    }
    value
}

fn str_field(bytes: &[u8]) -> &str {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    core::str::from_utf8(&bytes[..end]).unwrap_or("")
}

/// Unpacks `archive` into the mounted root filesystem.
pub fn load(archive: &[u8]) {
    let root = Path::root();
    let mut off = 0;
    let mut count = 0usize;
    while off + BLOCK <= archive.len() {
        let header = &archive[off..off + BLOCK];
        if header[0] == 0 {
            break;
        }
        let name = str_field(&header[0..100]);
        let mode = octal_field(&header[100..108]) as u32 & 0o777;
        let size = octal_field(&header[124..136]);
        let typeflag = header[156];
        let linkname = str_field(&header[157..257]);
        if off + BLOCK + size > archive.len() {
            warn!("initrd: truncated archive at {}", name);
            break;
        }

        let mut path = String::from("/");
        path.push_str(name.trim_end_matches('/'));

        let result = match typeflag {
            b'5' => vfs_mkdir(&root, &path, mode),
            b'2' => vfs_symlink(&root, linkname, &path),
            b'0' | 0 => (|| {
                let file = vfs_open(
                    &root,
                    &path,
                    OpenFlags::O_WRONLY | OpenFlags::O_CREAT | OpenFlags::O_TRUNC,
                    mode | 0o200,
                )?;
                let data = &archive[off + BLOCK..off + BLOCK + size];
                vfs_write(&file, data)?;
                vfs_chmod(&root, &path, mode)
            })(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!("initrd: cannot unpack {}: {:?}", path, e);
        } else {
            count += 1;
        }

        off += BLOCK + (size + BLOCK - 1) / BLOCK * BLOCK;
    }
    info!("initrd: unpacked {} entries", count);
}
