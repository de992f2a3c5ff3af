extern crate std;

use alloc::{string::String, vec, vec::Vec};

use errno::Errno;
use vfs::{
    mountpoint_add, mountpoint_remove, vfs_getdents, vfs_link, vfs_mkdir, vfs_open, vfs_read,
    vfs_readlink, vfs_rename, vfs_rmdir, vfs_seek, vfs_stat, vfs_symlink, vfs_truncate,
    vfs_unlink, vfs_write, OpenFlags, Path, SeekWhence, StatMode,
};

use crate::Ramfs;

/// Mounts one shared root ramfs; each test works under its own names.
fn cwd() -> Path {
    static INIT: spin::Once = spin::Once::new();
    INIT.call_once(|| {
        mountpoint_add(Ramfs::new_unclocked(1), "/").unwrap();
        mountpoint_add(Ramfs::new_unclocked(2), "/other").unwrap();
    });
    Path::root()
}

const RW: OpenFlags = OpenFlags::O_RDWR;

fn creat(path: &str) -> vfs::FileRef {
    vfs_open(
        &cwd(),
        path,
        OpenFlags::O_RDWR | OpenFlags::O_CREAT,
        0o644,
    )
    .unwrap()
}

fn read_names(dir: &str) -> Vec<String> {
    let h = vfs_open(&cwd(), dir, OpenFlags::O_RDONLY, 0).unwrap();
    let mut names = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        let n = vfs_getdents(&h, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        let mut at = 0;
        while at < n {
            let reclen = u16::from_le_bytes([buf[at + 16], buf[at + 17]]) as usize;
            let name_bytes = &buf[at + 19..at + reclen];
            let end = name_bytes.iter().position(|&b| b == 0).unwrap();
            names.push(String::from_utf8(name_bytes[..end].to_vec()).unwrap());
            at += reclen;
        }
    }
    names
}

#[test]
fn write_seek_read_round_trip() {
    let h = creat("/rt_file");
    let msg = b"hello block storage";
    assert_eq!(vfs_write(&h, msg).unwrap(), msg.len());
    assert_eq!(vfs_seek(&h, 0, SeekWhence::SEEK_SET).unwrap(), 0);
    let mut out = vec![0u8; msg.len()];
    assert_eq!(vfs_read(&h, &mut out).unwrap(), msg.len());
    assert_eq!(&out[..], msg);
    // end of file
    assert_eq!(vfs_read(&h, &mut out).unwrap(), 0);
}

#[test]
fn sparse_write_extends_and_reads_zero() {
    let h = creat("/sparse");
    assert_eq!(vfs_seek(&h, 10_000, SeekWhence::SEEK_SET).unwrap(), 10_000);
    assert_eq!(vfs_write(&h, b"tail").unwrap(), 4);
    let st = vfs_stat(&cwd(), "/sparse", true).unwrap();
    assert_eq!(st.st_size, 10_004);
    // only the touched block is allocated
    assert_eq!(st.st_blocks, (crate::BLOCK_SIZE / 512) as u64);
    // the hole reads back as zeroes
    assert_eq!(vfs_seek(&h, 0, SeekWhence::SEEK_SET).unwrap(), 0);
    let mut buf = [0xffu8; 64];
    assert_eq!(vfs_read(&h, &mut buf).unwrap(), 64);
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn mkdir_rmdir_round_trip() {
    vfs_mkdir(&cwd(), "/rt_dir", 0o755).unwrap();
    let before = read_names("/rt_dir");
    assert_eq!(before, [".", ".."]);
    vfs_mkdir(&cwd(), "/rt_dir/sub", 0o755).unwrap();
    assert_eq!(
        vfs_rmdir(&cwd(), "/rt_dir").unwrap_err(),
        Errno::ENOTEMPTY
    );
    vfs_rmdir(&cwd(), "/rt_dir/sub").unwrap();
    assert_eq!(read_names("/rt_dir"), before);
    vfs_rmdir(&cwd(), "/rt_dir").unwrap();
    assert_eq!(
        vfs_stat(&cwd(), "/rt_dir", true).unwrap_err(),
        Errno::ENOENT
    );
}

#[test]
fn symlink_round_trip_and_loop() {
    creat("/sym_target");
    vfs_symlink(&cwd(), "/sym_target", "/sym_link").unwrap();
    assert_eq!(vfs_readlink(&cwd(), "/sym_link").unwrap(), "/sym_target");
    // the link resolves to the target for open and stat
    let st = vfs_stat(&cwd(), "/sym_link", true).unwrap();
    assert_eq!(st.st_mode & StatMode::S_IFMT.bits(), StatMode::S_IFREG.bits());
    let st = vfs_stat(&cwd(), "/sym_link", false).unwrap();
    assert_eq!(st.st_mode & StatMode::S_IFMT.bits(), StatMode::S_IFLNK.bits());

    // a self-loop exhausts the 40-hop budget
    vfs_symlink(&cwd(), "/sym_loop", "/sym_loop").unwrap();
    assert_eq!(
        vfs_open(&cwd(), "/sym_loop", OpenFlags::O_RDONLY, 0).unwrap_err(),
        Errno::EINVAL
    );
}

#[test]
fn rename_over_non_empty_dir_fails() {
    vfs_mkdir(&cwd(), "/ren_a", 0o755).unwrap();
    vfs_mkdir(&cwd(), "/ren_b", 0o755).unwrap();
    creat("/ren_b/f");
    assert_eq!(
        vfs_rename(&cwd(), "/ren_a", "/ren_b").unwrap_err(),
        Errno::ENOTEMPTY
    );
    // nothing changed
    assert!(vfs_stat(&cwd(), "/ren_a", true).is_ok());
    assert!(vfs_stat(&cwd(), "/ren_b/f", true).is_ok());
}

#[test]
fn rename_round_trip() {
    let h = creat("/ren_x");
    vfs_write(&h, b"payload").unwrap();
    vfs_rename(&cwd(), "/ren_x", "/ren_y").unwrap();
    assert_eq!(vfs_stat(&cwd(), "/ren_x", true).unwrap_err(), Errno::ENOENT);
    vfs_rename(&cwd(), "/ren_y", "/ren_x").unwrap();
    let st = vfs_stat(&cwd(), "/ren_x", true).unwrap();
    assert_eq!(st.st_size, 7);
}

#[test]
fn rename_moves_dir_and_fixes_parent() {
    vfs_mkdir(&cwd(), "/mv_src", 0o755).unwrap();
    vfs_mkdir(&cwd(), "/mv_dst", 0o755).unwrap();
    vfs_mkdir(&cwd(), "/mv_src/inner", 0o755).unwrap();
    vfs_rename(&cwd(), "/mv_src/inner", "/mv_dst/inner").unwrap();
    // the ".." entry of the moved directory now names the new parent
    let dst = vfs_stat(&cwd(), "/mv_dst", true).unwrap();
    let h = vfs_open(&cwd(), "/mv_dst/inner", OpenFlags::O_RDONLY, 0).unwrap();
    let mut buf = [0u8; 128];
    let n = vfs_getdents(&h, &mut buf).unwrap();
    let reclen0 = u16::from_le_bytes([buf[16], buf[17]]) as usize;
    assert!(n >= reclen0 + 24 && &buf[reclen0 + 19..reclen0 + 21] == b"..");
    let dotdot_ino = u64::from_le_bytes(buf[reclen0..reclen0 + 8].try_into().unwrap());
    assert_eq!(dotdot_ino, dst.st_ino);
}

#[test]
fn cross_device_rename_and_link() {
    creat("/other/xdev");
    assert_eq!(
        vfs_rename(&cwd(), "/other/xdev", "/xdev").unwrap_err(),
        Errno::EXDEV
    );
    assert_eq!(
        vfs_link(&cwd(), "/other/xdev", "/xdev").unwrap_err(),
        Errno::EXDEV
    );
}

#[test]
fn unlink_while_open_defers_destruction() {
    let h = creat("/u_open");
    vfs_write(&h, b"still here").unwrap();
    let r = vfs_open(&cwd(), "/u_open", OpenFlags::O_RDONLY, 0).unwrap();
    vfs_unlink(&cwd(), "/u_open").unwrap();
    assert_eq!(vfs_stat(&cwd(), "/u_open", true).unwrap_err(), Errno::ENOENT);
    // the open handle still reads the content
    let mut buf = [0u8; 10];
    assert_eq!(vfs_read(&r, &mut buf).unwrap(), 10);
    assert_eq!(&buf, b"still here");
    drop(r);
    drop(h);
    assert_eq!(vfs_stat(&cwd(), "/u_open", true).unwrap_err(), Errno::ENOENT);
}

#[test]
fn link_shares_the_inode() {
    let h = creat("/ln_a");
    vfs_write(&h, b"shared").unwrap();
    vfs_link(&cwd(), "/ln_a", "/ln_b").unwrap();
    let st = vfs_stat(&cwd(), "/ln_a", true).unwrap();
    assert_eq!(st.st_nlink, 2);
    let st2 = vfs_stat(&cwd(), "/ln_b", true).unwrap();
    assert_eq!(st.st_ino, st2.st_ino);
    vfs_unlink(&cwd(), "/ln_a").unwrap();
    let st = vfs_stat(&cwd(), "/ln_b", true).unwrap();
    assert_eq!(st.st_nlink, 1);
    assert_eq!(st.st_size, 6);
    // linking a directory is refused
    vfs_mkdir(&cwd(), "/ln_dir", 0o755).unwrap();
    assert_eq!(
        vfs_link(&cwd(), "/ln_dir", "/ln_dir2").unwrap_err(),
        Errno::EPERM
    );
}

#[test]
fn name_length_boundary() {
    let ok: String = core::iter::repeat('a').take(vfs::NAME_MAX).collect();
    let too_long: String = core::iter::repeat('a').take(vfs::NAME_MAX + 1).collect();
    vfs_mkdir(&cwd(), "/nl", 0o755).unwrap();
    let mut p = String::from("/nl/");
    p.push_str(&ok);
    assert!(vfs_open(&cwd(), &p, OpenFlags::O_CREAT | RW, 0o644).is_ok());
    let mut p = String::from("/nl/");
    p.push_str(&too_long);
    assert_eq!(
        vfs_open(&cwd(), &p, OpenFlags::O_CREAT | RW, 0o644).unwrap_err(),
        Errno::EINVAL
    );
}

#[test]
fn getdents_batches_and_rejects_tiny_buffers() {
    vfs_mkdir(&cwd(), "/gd", 0o755).unwrap();
    for name in ["alpha", "beta", "gamma"] {
        let mut p = String::from("/gd/");
        p.push_str(name);
        creat(&p);
    }
    assert_eq!(read_names("/gd"), [".", "..", "alpha", "beta", "gamma"]);

    // a buffer too small for even one record fails without advancing
    let h = vfs_open(&cwd(), "/gd", OpenFlags::O_RDONLY, 0).unwrap();
    let mut tiny = [0u8; 8];
    assert_eq!(vfs_getdents(&h, &mut tiny).unwrap_err(), Errno::EINVAL);
    // the cursor did not move: a real buffer still starts at "."
    let mut buf = [0u8; 512];
    let n = vfs_getdents(&h, &mut buf).unwrap();
    assert!(n > 0);
    assert_eq!(buf[19], b'.');
}

#[test]
fn getdents_survives_concurrent_unlink() {
    vfs_mkdir(&cwd(), "/gdu", 0o755).unwrap();
    for name in ["one", "two", "zzz"] {
        let mut p = String::from("/gdu/");
        p.push_str(name);
        creat(&p);
    }
    let h = vfs_open(&cwd(), "/gdu", OpenFlags::O_RDONLY, 0).unwrap();
    // pull ".", "..", "one" with a buffer sized for exactly three records
    let mut buf = [0u8; 3 * 24];
    let n = vfs_getdents(&h, &mut buf).unwrap();
    assert_eq!(n, 3 * 24);
    // remove the entry the cursor would return next
    vfs_unlink(&cwd(), "/gdu/two").unwrap();
    let mut buf = [0u8; 512];
    let n = vfs_getdents(&h, &mut buf).unwrap();
    assert!(n > 0);
    assert_eq!(buf[19..22], *b"zzz");
}

#[test]
fn chmod_rejects_special_bits() {
    creat("/ch_f");
    vfs::vfs_chmod(&cwd(), "/ch_f", 0o600).unwrap();
    assert_eq!(
        vfs::vfs_chmod(&cwd(), "/ch_f", 0o4755).unwrap_err(),
        Errno::EPERM
    );
    vfs::vfs_chmod(&cwd(), "/ch_f", 0o400).unwrap();
    // mode bits now reject writing
    assert_eq!(
        vfs_open(&cwd(), "/ch_f", OpenFlags::O_WRONLY, 0).unwrap_err(),
        Errno::EACCES
    );
}

#[test]
fn truncate_shrinks_and_zero_fills() {
    let h = creat("/tr_f");
    vfs_write(&h, b"0123456789").unwrap();
    vfs_truncate(&cwd(), "/tr_f", 4).unwrap();
    assert_eq!(vfs_stat(&cwd(), "/tr_f", true).unwrap().st_size, 4);
    // re-extend: the cut tail reads back as zeroes
    vfs_truncate(&cwd(), "/tr_f", 8).unwrap();
    vfs_seek(&h, 0, SeekWhence::SEEK_SET).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(vfs_read(&h, &mut buf).unwrap(), 8);
    assert_eq!(&buf, b"0123\0\0\0\0");
}

#[test]
fn open_flag_behavior() {
    let h = creat("/of_f");
    vfs_write(&h, b"data").unwrap();
    assert_eq!(
        vfs_open(
            &cwd(),
            "/of_f",
            OpenFlags::O_CREAT | OpenFlags::O_EXCL | RW,
            0o644
        )
        .unwrap_err(),
        Errno::EEXIST
    );
    assert_eq!(
        vfs_open(&cwd(), "/of_f", OpenFlags::O_RDONLY | OpenFlags::O_DIRECTORY, 0).unwrap_err(),
        Errno::ENOTDIR
    );
    // a trailing slash requires a directory
    assert_eq!(
        vfs_open(&cwd(), "/of_f/", OpenFlags::O_RDONLY, 0).unwrap_err(),
        Errno::ENOTDIR
    );
    // O_TRUNC drops the content
    let t = vfs_open(&cwd(), "/of_f", RW | OpenFlags::O_TRUNC, 0).unwrap();
    assert_eq!(vfs_stat(&cwd(), "/of_f", true).unwrap().st_size, 0);
    drop(t);
    // writing through a directory handle is refused
    assert_eq!(
        vfs_open(&cwd(), "/", OpenFlags::O_WRONLY, 0).unwrap_err(),
        Errno::EISDIR
    );
}

#[test]
fn dup_copies_the_position() {
    let h = creat("/dup_f");
    vfs_write(&h, b"abcdef").unwrap();
    vfs_seek(&h, 1, SeekWhence::SEEK_SET).unwrap();
    let d = vfs::vfs_dup(&h).unwrap();
    // the copy starts where the original was, then moves independently
    let mut buf = [0u8; 2];
    assert_eq!(vfs_read(&d, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"bc");
    let mut buf = [0u8; 2];
    assert_eq!(vfs_read(&h, &mut buf).unwrap(), 2);
    assert_eq!(&buf, b"bc");
}

#[test]
fn mountpoint_removal_requires_idle_fs() {
    let sub = Ramfs::new_unclocked(7);
    mountpoint_add(sub, "/mnt_busy").unwrap();
    let h = vfs_open(
        &cwd(),
        "/mnt_busy/f",
        OpenFlags::O_CREAT | RW,
        0o644,
    )
    .unwrap();
    assert_eq!(mountpoint_remove("/mnt_busy").unwrap_err(), Errno::EBUSY);
    drop(h);
    mountpoint_remove("/mnt_busy").unwrap();
}

#[test]
fn mmap_page_is_the_backing_block() {
    let h = creat("/mm_f");
    vfs_write(&h, b"mapped").unwrap();
    let page = h.mmap_page(0).unwrap();
    let bytes = unsafe { core::slice::from_raw_parts(page.as_ptr(), 6) };
    assert_eq!(bytes, b"mapped");
    // no copy: writing through the handle is visible through the mapping
    vfs_seek(&h, 0, SeekWhence::SEEK_SET).unwrap();
    vfs_write(&h, b"M").unwrap();
    let bytes = unsafe { core::slice::from_raw_parts(page.as_ptr(), 6) };
    assert_eq!(bytes, b"Mapped");
    // past end-of-file there is no page
    assert!(h.mmap_page(crate::BLOCK_SIZE).is_err());
}

#[test]
fn rename_over_file_replaces_it() {
    creat("/rw_src");
    creat("/rw_dst");
    vfs_rename(&cwd(), "/rw_src", "/rw_dst").unwrap();
    assert_eq!(vfs_stat(&cwd(), "/rw_src", true).unwrap_err(), Errno::ENOENT);
    assert!(vfs_stat(&cwd(), "/rw_dst", true).is_ok());
}
