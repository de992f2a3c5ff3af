use bitflags::bitflags;

bitflags! {
    pub struct OpenFlags: u32 {
        const O_RDONLY = 0o0;
        const O_WRONLY = 0o1;
        const O_RDWR = 0o2;
        const O_CREAT = 0o100;
        const O_EXCL = 0o200;
        const O_NOCTTY = 0o400;
        /// Truncate the file to length 0 on open, if it exists and is writable.
        const O_TRUNC = 0o1000;
        /// The file is opened in append mode. Before each write(2), the file
        /// offset is positioned at the end of the file, as if with lseek(2).
        const O_APPEND = 0o2000;
        const O_NONBLOCK = 0o4000;
        /// Fail with ENOTDIR if the resolved entry is not a directory.
        const O_DIRECTORY = 0o200000;
        /// Do not dereference the final path component if it is a symlink.
        const O_NOFOLLOW = 0o400000;
        const O_CLOEXEC = 0o2000000;
    }
}

impl OpenFlags {
    /// Does this open request permit reading?
    pub fn readable(&self) -> bool {
        !self.contains(OpenFlags::O_WRONLY)
    }

    /// Does this open request permit writing?
    pub fn writable(&self) -> bool {
        self.intersects(OpenFlags::O_WRONLY | OpenFlags::O_RDWR)
    }
}

bitflags! {
    pub struct SeekWhence: u32 {
        /// set to offset bytes.
        const SEEK_SET = 0;
        /// set to its current location plus offset bytes.
        const SEEK_CUR = 1;
        /// set to the size of the file plus offset bytes.
        const SEEK_END = 2;
    }
}
