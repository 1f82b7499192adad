//! Critical section protected cell
//!
//! Zero-overhead wrapper for data that must be accessed within critical sections.

use core::cell::UnsafeCell;

use crate::critical::{critical_section, CriticalSection};

/// A cell that can only be accessed within a critical section.
pub struct CsCell<T>(UnsafeCell<T>);

// SAFETY: every access path requires a critical section token.
unsafe impl<T: Send> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    /// Create a new CsCell
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Get a mutable reference to the inner value
    ///
    /// The reference must not outlive the critical section it was obtained
    /// in, and must not be requested twice within one.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get<'cs>(&'cs self, _cs: CriticalSection<'cs>) -> &'cs mut T {
        unsafe { &mut *self.0.get() }
    }

    /// Run a closure on the inner value inside a fresh critical section
    #[inline]
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section(|cs| f(self.get(cs)))
    }
}
