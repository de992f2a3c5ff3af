/*!
Compile-time knobs. Everything the core tunes lives here; the arch and
memory-layout constants are the qemu-virt numbers.
*/

/* Scheduling */

/// Timer interrupts per second.
pub const TIMER_HZ: usize = 100;

/// Ticks a task may run before the tick handler asks for a reschedule.
pub const TIME_SLICE_TICKS: u32 = (TIMER_HZ / 20) as u32;

/// Largest legal user pid.
pub const MAX_PID: i32 = 8191;

/// First tid handed to kernel threads.
pub const KERNEL_TID_START: i32 = 10000;

/// Number of tids reserved for kernel threads after [`KERNEL_TID_START`].
pub const KERNEL_MAX_TID: i32 = 1024;

const _: () = assert!(MAX_PID < KERNEL_TID_START);

/// Deepest tracked interrupt nesting.
pub const MAX_NESTED_INTERRUPTS: usize = 32;

/// Scheduler transitions kept for the panic dump.
pub const SCHED_TRACE_LEN: usize = 16;

/* Memory layout */

/// Boot stack for the initial execution context.
pub const BOOT_STACK_SIZE: usize = 0x1_0000;

/// Kernel heap arena.
#[cfg(not(feature = "tiny"))]
pub const KERNEL_HEAP_SIZE: usize = 0x80_0000;
#[cfg(feature = "tiny")]
pub const KERNEL_HEAP_SIZE: usize = 0x10_0000;

/// Used for the buddy allocator's free lists.
pub const KERNEL_HEAP_ORDER: usize = 32;

/// End of usable physical memory on qemu-virt.
pub const PHYSICAL_MEMORY_END: usize = 0x8800_0000;

pub const PAGE_SIZE: usize = 4096;

/// Top of the Sv39 virtual address space.
pub const MAX_VA: usize = usize::MAX;

/// The trampoline page sits in the highest page of every address space.
pub const TRAMPOLINE_VA: usize = MAX_VA - PAGE_SIZE + 1;

/// Per-task trapframes sit right below the trampoline.
pub const TRAPFRAME_VA: usize = TRAMPOLINE_VA - PAGE_SIZE;

/// Kernel stack size per task.
pub const KERNEL_STACK_SIZE: usize = 0x4000;

/* User address space */

pub const USER_STACK_SIZE: usize = 0x2_0000;

/// User stacks grow down from here.
pub const USER_STACK_TOP: usize = 0x40_0000_0000;

/// mmap regions are carved downward from below the stack area.
pub const USER_MMAP_TOP: usize = 0x38_0000_0000;

/* Files */

#[cfg(not(feature = "tiny"))]
pub const FD_LIMIT: usize = 256;
#[cfg(feature = "tiny")]
pub const FD_LIMIT: usize = 64;

/* Timer hardware */

/// Timebase frequency of qemu-virt.
pub const CLOCK_FREQ: usize = 10_000_000;
