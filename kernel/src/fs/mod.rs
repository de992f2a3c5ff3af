//! Kernel-side filesystem glue: the root ramfs mount, the boot ramdisk,
//! fd tables and the console files.

mod console;
mod fd;
mod initrd;

use alloc::sync::Arc;

use ktime::TimeSpec;
use log::info;
use ramfs::Ramfs;
use vfs::{mountpoint_add, FileRef};

pub use console::Console;
pub use fd::{FdEntry, FdTable};

use crate::config::TIMER_HZ;

/// A fresh console handle.
pub fn console_file() -> FileRef {
    Arc::new(Console)
}

fn boot_clock() -> TimeSpec {
    TimeSpec::from_ticks(crate::timer::ticks_since_boot(), TIMER_HZ)
}

/// The boot clock, also used for inode timestamps.
pub fn now() -> TimeSpec {
    boot_clock()
}

fn initrd_bytes() -> &'static [u8] {
    extern "C" {
        fn sinitrd();
        fn einitrd();
    }
    let start = sinitrd as usize;
    let end = einitrd as usize;
    unsafe { core::slice::from_raw_parts(start as *const u8, end - start) }
}

/// Mounts the root ramfs and unpacks the boot ramdisk into it.
pub fn init() {
    let root = Ramfs::new(1, boot_clock);
    mountpoint_add(root, "/").expect("cannot mount the root filesystem");
    info!("mounted ramfs at /");

    let initrd = initrd_bytes();
    if initrd.is_empty() {
        info!("no boot ramdisk");
    } else {
        initrd::load(initrd);
    }
}
