use bitflags::bitflags;
use ktime::TimeSpec;

bitflags! {
    pub struct StatMode: u32 {
        /// bit mask for the file type bit field
        const S_IFMT = 0o170000;
        /// symbolic link
        const S_IFLNK = 0o120000;
        /// regular file
        const S_IFREG = 0o100000;
        /// directory
        const S_IFDIR = 0o040000;
        /// owner has read permission
        const S_IRUSR = 0o0400;
        /// owner has write permission
        const S_IWUSR = 0o0200;
        /// owner has execute permission
        const S_IXUSR = 0o0100;
        /// group has read permission
        const S_IRGRP = 0o0040;
        /// group has write permission
        const S_IWGRP = 0o0020;
        /// group has execute permission
        const S_IXGRP = 0o0010;
        /// others have read permission
        const S_IROTH = 0o0004;
        /// others have write permission
        const S_IWOTH = 0o0002;
        /// others have execute permission
        const S_IXOTH = 0o0001;
    }
}

/// The nine Unix permission bits. Everything above them (file type in stat,
/// setuid/setgid/sticky) is rejected or synthesized elsewhere.
pub const MODE_MASK: u32 = 0o777;

/// Store the file attributes of a supported file.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Stat {
    /// ID of device containing file.
    pub st_dev: u64,
    /// Inode number.
    pub st_ino: u64,
    /// File type and mode.
    pub st_mode: u32,
    /// Number of hard links.
    pub st_nlink: u32,
    /// User ID of the file's owner.
    pub st_uid: u32,
    /// Group ID of the file's group.
    pub st_gid: u32,
    /// Device ID (if special file)
    pub st_rdev: u64,
    pub __pad: u64,
    /// Size of file, in bytes.
    pub st_size: i64,
    /// Optimal block size for I/O.
    pub st_blksize: u32,
    pub __pad2: i32,
    /// Number of 512-byte blocks allocated.
    pub st_blocks: u64,
    /// Time of last access.
    pub st_atime: TimeSpec,
    /// Time of last modification.
    pub st_mtime: TimeSpec,
    /// Time of last status change.
    pub st_ctime: TimeSpec,
    pub __unused: u64,
}
