//! Synchronization primitives
//!
//! Contains the priority-inheritance mutex and the kernel traits it runs on.

pub mod sem;

#[cfg(feature = "pip")]
pub mod mutex;
