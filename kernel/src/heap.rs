//! The kernel heap: a buddy allocator over a static arena.
//!
//! `heap-poisoning` fills freed memory with a recognizable pattern so that
//! use-after-free reads surface as garbage instead of stale data.
//! `heap-stats` keeps a per-size-class allocation counter.

use core::alloc::{GlobalAlloc, Layout};

use buddy_system_allocator::LockedHeap;

use crate::config::{KERNEL_HEAP_ORDER, KERNEL_HEAP_SIZE};

#[cfg(feature = "heap-poisoning")]
const POISON: u8 = 0x5a;

struct KernelHeap {
    inner: LockedHeap<KERNEL_HEAP_ORDER>,
    #[cfg(feature = "heap-stats")]
    counts: [core::sync::atomic::AtomicUsize; usize::BITS as usize],
    #[cfg(feature = "heap-leak-detector")]
    live: core::sync::atomic::AtomicIsize,
    #[cfg(feature = "heap-leak-detector")]
    live_bytes: core::sync::atomic::AtomicIsize,
}

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        #[cfg(feature = "heap-stats")]
        {
            use core::sync::atomic::Ordering;
            let class = layout.size().next_power_of_two().trailing_zeros() as usize;
            self.counts[class].fetch_add(1, Ordering::Relaxed);
        }
        #[cfg(feature = "heap-leak-detector")]
        {
            use core::sync::atomic::Ordering;
            self.live.fetch_add(1, Ordering::Relaxed);
            self.live_bytes.fetch_add(layout.size() as isize, Ordering::Relaxed);
        }
        self.inner.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        #[cfg(feature = "heap-poisoning")]
        core::ptr::write_bytes(ptr, POISON, layout.size());
        #[cfg(feature = "heap-leak-detector")]
        {
            use core::sync::atomic::Ordering;
            self.live.fetch_sub(1, Ordering::Relaxed);
            self.live_bytes.fetch_sub(layout.size() as isize, Ordering::Relaxed);
        }
        self.inner.dealloc(ptr, layout)
    }
}

#[cfg(feature = "heap-stats")]
#[allow(clippy::declare_interior_mutable_const)]
const ZERO: core::sync::atomic::AtomicUsize = core::sync::atomic::AtomicUsize::new(0);

#[global_allocator]
static HEAP: KernelHeap = KernelHeap {
    inner: LockedHeap::empty(),
    #[cfg(feature = "heap-stats")]
    counts: [ZERO; usize::BITS as usize],
    #[cfg(feature = "heap-leak-detector")]
    live: core::sync::atomic::AtomicIsize::new(0),
    #[cfg(feature = "heap-leak-detector")]
    live_bytes: core::sync::atomic::AtomicIsize::new(0),
};

static mut ARENA: [u8; KERNEL_HEAP_SIZE] = [0u8; KERNEL_HEAP_SIZE];

pub fn init() {
    unsafe {
        HEAP.inner
            .lock()
            .init(core::ptr::addr_of!(ARENA) as usize, KERNEL_HEAP_SIZE);
    }
}

/// Dumps the per-class allocation counters collected so far.
#[cfg(feature = "heap-stats")]
pub fn dump_stats() {
    use core::sync::atomic::Ordering;
    for (class, count) in HEAP.counts.iter().enumerate() {
        let n = count.load(Ordering::Relaxed);
        if n != 0 {
            log::info!("heap: {:>10} B class: {} allocations", 1usize << class, n);
        }
    }
}

/// Live-allocation snapshot, printed from the panic path.
#[cfg(feature = "heap-leak-detector")]
pub fn dump_live_allocations() {
    use core::sync::atomic::Ordering;
    crate::println!(
        "heap: {} live allocations, {} bytes",
        HEAP.live.load(Ordering::Relaxed),
        HEAP.live_bytes.load(Ordering::Relaxed)
    );
}
