//! Interrupt-aware spin locks.
//!
//! Taking a [`SpinLock`] disables interrupts first and restores the previous
//! interrupt-enable bit when the last nested lock is released, so lock
//! holders can never be interrupted by a handler that tries to take the same
//! lock. On a single processor this is the whole mutual-exclusion story for
//! data shared with IRQ context.
//!
//! When built for a hosted target (unit tests), the interrupt hooks compile
//! to no-ops and the lock degrades to a plain spin mutex.

#![no_std]

mod arch;
mod spinlock;

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use arch::{intr_get, intr_off, intr_on};
pub use spinlock::{SpinLock, SpinLockGuard};

/// Depth of push_off() nesting on the (single) CPU.
static NOFF: AtomicUsize = AtomicUsize::new(0);

/// Were interrupts enabled before the first push_off()?
static INTENA: AtomicBool = AtomicBool::new(false);

/// Disables interrupts, remembering the previous enable bit at the first
/// (outermost) call. Increases the nesting depth by 1.
pub fn push_off() {
    let old = intr_get();
    intr_off();
    if NOFF.load(Ordering::Relaxed) == 0 {
        INTENA.store(old, Ordering::Relaxed);
    }
    NOFF.fetch_add(1, Ordering::Relaxed);
}

/// Decreases the nesting depth by 1, re-enabling interrupts at the last
/// (outermost) call if they were enabled before.
pub fn pop_off() {
    debug_assert!(!intr_get());
    let old = NOFF.fetch_sub(1, Ordering::Relaxed);
    debug_assert!(old >= 1);
    if old == 1 && INTENA.load(Ordering::Relaxed) {
        intr_on();
    }
}

/// Current interrupt-disable nesting depth.
pub fn intr_depth() -> usize {
    NOFF.load(Ordering::Relaxed)
}
