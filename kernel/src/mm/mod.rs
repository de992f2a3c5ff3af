mod frame;
mod page_table;
mod space;
mod user;

use kernel_sync::SpinLock;
use spin::Lazy;

pub use frame::{frame_alloc, frame_dealloc, frame_init};
pub use page_table::{PageTable, PteFlags};
pub use space::{MemorySpace, VmFlags};
pub use user::{copy_from_user, copy_to_user, read_user_cstr, validate_user_range};

use crate::{arch, config::PHYSICAL_MEMORY_END};

/// The kernel's own address space.
pub static KERNEL_SPACE: Lazy<SpinLock<MemorySpace>> = Lazy::new(|| {
    SpinLock::new(MemorySpace::new_kernel().expect("cannot build the kernel address space"))
});

/// The kernel satp value, cached for the user-return path.
pub fn kernel_satp() -> usize {
    KERNEL_SPACE.lock().pt.satp()
}

pub fn init() {
    extern "C" {
        fn ekernel();
    }
    frame_init(ekernel as usize, PHYSICAL_MEMORY_END);
    let satp = KERNEL_SPACE.lock().pt.satp();
    arch::activate_page_table(satp);
}
