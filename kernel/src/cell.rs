use core::cell::UnsafeCell;

/// An `UnsafeCell` that claims `Sync`. Used for data that is only touched
/// by the task that owns it (or with interrupts disabled on this single
/// CPU), where the lock a `SpinLock` would add has nothing to protect.
#[repr(transparent)]
pub struct SyncCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for SyncCell<T> {}

impl<T> SyncCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// # Safety
    ///
    /// The caller must be the only context touching the value; see the
    /// type-level rule.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self) -> &mut T {
        &mut *self.0.get()
    }

    pub fn get(&self) -> *mut T {
        self.0.get()
    }
}
