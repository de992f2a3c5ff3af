//! The console as a VFS file, wired onto fds 0/1/2 of the first process.

use alloc::sync::Arc;

use errno::Errno;
use vfs::{FileRef, SeekWhence, Stat, VfsFile};

use crate::task::kernel_yield;

pub struct Console;

impl VfsFile for Console {
    /// Blocking read of whatever the SBI console has, at least one byte.
    fn read(&self, buf: &mut [u8]) -> vfs::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut n = 0;
        loop {
            #[allow(deprecated)]
            let c = sbi_rt::legacy::console_getchar();
            if c == usize::MAX {
                if n > 0 {
                    return Ok(n);
                }
                kernel_yield();
                continue;
            }
            buf[n] = c as u8;
            n += 1;
            if n == buf.len() {
                return Ok(n);
            }
        }
    }

    fn write(&self, buf: &[u8]) -> vfs::Result<usize> {
        for &byte in buf {
            crate::arch::console_putchar(byte);
        }
        Ok(buf.len())
    }

    fn seek(&self, _offset: i64, _whence: SeekWhence) -> vfs::Result<i64> {
        Err(Errno::ESPIPE)
    }

    fn stat(&self) -> vfs::Result<Stat> {
        Ok(Stat {
            st_mode: 0o020000 | 0o666, // character device
            st_blksize: 1,
            ..Default::default()
        })
    }

    fn dup(&self) -> vfs::Result<FileRef> {
        Ok(Arc::new(Console))
    }

    fn ioctl(&self, _cmd: usize, _arg: usize) -> vfs::Result<usize> {
        // Enough tty for a libc to believe isatty(3).
        Ok(0)
    }
}
