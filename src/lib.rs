//! Scheduler event tracing and priority inheritance for embedded RTOS kernels
//!
//! Two facilities for a preemptive real-time kernel on a small
//! microcontroller:
//! - Fixed-capacity event tracing: scheduler hooks record task, queue and
//!   tick events into per-category buffers for offline analysis
//! - A priority-inheritance mutex built on the kernel's binary semaphore
//!
//! The kernel itself stays external. It reaches the tracer through the
//! [`trace::TracePort`] trait and the mutex through
//! [`sync::sem::BinarySemaphore`] and [`sync::sem::TaskControl`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod sync;
pub mod port;

#[cfg(feature = "trace")]
pub mod trace;

// ============ Re-exports ============

pub use self::core::config;
pub use self::core::config::*;
pub use self::core::critical;
pub use self::core::error;
pub use self::core::error::{OsError, OsResult};
pub use self::core::types;
pub use self::core::types::*;

pub use sync::sem;
#[cfg(feature = "pip")]
pub use sync::mutex;
#[cfg(feature = "pip")]
pub use sync::mutex::{MutexState, PipMutex};

#[cfg(feature = "trace")]
pub use trace::{TracePort, Tracer};
