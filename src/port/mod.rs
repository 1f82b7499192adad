//! Port layer - CPU-specific implementations
//!
//! Provides the free-running cycle counter the trace hooks stamp records
//! with, and a sink for the trace dump.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

// Software counter for non-ARM targets (for testing)
#[cfg(not(target_arch = "arm"))]
pub mod stub {
    use portable_atomic::{AtomicU32, Ordering};

    use crate::types::OsCycles;

    static CYCLES: AtomicU32 = AtomicU32::new(0);

    pub fn cycle_counter_init() {
        CYCLES.store(0, Ordering::Relaxed);
    }

    /// Every read advances the counter by one
    pub fn cycle_count() -> OsCycles {
        CYCLES.fetch_add(1, Ordering::Relaxed)
    }

    pub fn advance_cycles(cycles: OsCycles) {
        CYCLES.fetch_add(cycles, Ordering::Relaxed);
    }
}

#[cfg(not(target_arch = "arm"))]
pub use stub::*;
