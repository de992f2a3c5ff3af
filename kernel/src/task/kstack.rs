use alloc::boxed::Box;

use id_alloc::{IdAllocator, RecycleAllocator};
use kernel_sync::SpinLock;
use spin::Lazy;

use crate::config::{KERNEL_STACK_SIZE, PAGE_SIZE, TRAMPOLINE_VA};

/// Global kernel stack slot allocator. Slot 0 belongs to the boot stack.
static KSTACK_IDS: Lazy<SpinLock<RecycleAllocator>> =
    Lazy::new(|| SpinLock::new(RecycleAllocator::new(1)));

#[repr(align(16))]
struct StackBuf([u8; KERNEL_STACK_SIZE]);

/// A task's kernel stack plus the slot id that also names its trapframe
/// page in user address spaces.
pub struct KernelStack {
    pub kid: usize,
    buf: Box<StackBuf>,
}

impl KernelStack {
    pub fn new() -> Self {
        Self {
            kid: KSTACK_IDS.lock().alloc(),
            buf: Box::new(StackBuf([0; KERNEL_STACK_SIZE])),
        }
    }

    /// Stack top; riscv stacks grow down.
    pub fn top(&self) -> usize {
        self.buf.0.as_ptr() as usize + KERNEL_STACK_SIZE
    }
}

impl Drop for KernelStack {
    fn drop(&mut self) {
        KSTACK_IDS.lock().dealloc(self.kid);
    }
}

/// Trapframe pages sit below the trampoline, one page per stack slot.
pub fn trapframe_base(kid: usize) -> usize {
    TRAMPOLINE_VA - (kid + 1) * PAGE_SIZE
}
