//! POSIX-style error numbers.
//!
//! Every fallible operation in the filesystem and syscall layers reports an
//! [`Errno`]. The syscall dispatcher negates the value into the user ABI,
//! so `Errno` only ever stores the positive number.

#![no_std]

use numeric_enum_macro::numeric_enum;

numeric_enum! {
    #[repr(i32)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[allow(non_camel_case_types)]
    pub enum Errno {
        /// Operation not permitted
        EPERM = 1,
        /// No such file or directory
        ENOENT = 2,
        /// No such process
        ESRCH = 3,
        /// Interrupted system call
        EINTR = 4,
        /// Exec format error
        ENOEXEC = 8,
        /// Bad file descriptor
        EBADF = 9,
        /// No child processes
        ECHILD = 10,
        /// Try again
        EAGAIN = 11,
        /// Out of memory
        ENOMEM = 12,
        /// Permission denied
        EACCES = 13,
        /// Bad address
        EFAULT = 14,
        /// Device or resource busy
        EBUSY = 16,
        /// File exists
        EEXIST = 17,
        /// Cross-device link
        EXDEV = 18,
        /// Not a directory
        ENOTDIR = 20,
        /// Is a directory
        EISDIR = 21,
        /// Invalid argument
        EINVAL = 22,
        /// Too many open files
        EMFILE = 24,
        /// Inappropriate ioctl for device
        ENOTTY = 25,
        /// File too large
        EFBIG = 27,
        /// No space left on device
        ENOSPC = 28,
        /// Illegal seek
        ESPIPE = 29,
        /// Read-only file system
        EROFS = 30,
        /// Math result not representable
        ERANGE = 34,
        /// File name too long
        ENAMETOOLONG = 36,
        /// Function not implemented
        ENOSYS = 38,
        /// Directory not empty
        ENOTEMPTY = 39,
        /// Too many symbolic links encountered
        ELOOP = 40,
        /// Connection timed out
        ETIMEDOUT = 110,
    }
}

impl Errno {
    /// The value returned to user space: `-errno`.
    pub fn as_ret(self) -> isize {
        -(self as i32) as isize
    }
}

#[cfg(test)]
mod test {
    use super::Errno;

    #[test]
    fn numeric_round_trip() {
        assert_eq!(Errno::try_from(2), Ok(Errno::ENOENT));
        assert_eq!(Errno::ENOTEMPTY as i32, 39);
        assert_eq!(Errno::ENOENT.as_ret(), -2);
        assert!(Errno::try_from(200).is_err());
    }
}
