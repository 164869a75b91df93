use std::sync::{Mutex, MutexGuard, PoisonError};

/// A cell holding a `Copy` value which can be shared between tasks
///
/// Every access takes a short lived lock. A poisoned lock is recovered, since the stored value is
/// always a complete `T` and there is no invariant a panicking writer could have broken.
#[derive(Debug, Default)]
pub struct AtomicCell<T> {
    inner: Mutex<T>,
}

impl<T: Copy> AtomicCell<T> {
    /// Create a new cell holding `value`
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    fn guard(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the current value
    pub fn load(&self) -> T {
        *self.guard()
    }

    /// Replace the current value
    pub fn store(&self, value: T) {
        *self.guard() = value;
    }

    /// Replace the current value, returning the previous one
    pub fn swap(&self, value: T) -> T {
        core::mem::replace(&mut *self.guard(), value)
    }
}

impl<T: Copy + Default> AtomicCell<T> {
    /// Take the value, leaving `T::default()` in its place
    pub fn take(&self) -> T {
        self.swap(T::default())
    }
}
