//! Critical section handling
//!
//! Thin layer over the `critical-section` crate. On Cortex-M the crate root
//! installs a PRIMASK based single-core implementation; host builds pick up
//! whichever implementation the final binary links (the `std` one in tests).

pub use critical_section::CriticalSection;

/// Execute a closure with interrupts disabled
///
/// The closure receives the critical section token, which can be used to
/// access [`CsCell`](crate::core::cs_cell::CsCell) protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        use cortex_m::peripheral::scb::VectActive;
        !matches!(cortex_m::peripheral::SCB::vect_active(), VectActive::ThreadMode)
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}
