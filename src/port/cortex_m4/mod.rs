//! Cortex-M4 port implementation
//!
//! Timestamps come from the DWT cycle counter; the dump goes out over
//! semihosting.

use cortex_m::peripheral::DWT;
use cortex_m_semihosting::hio::{self, HostStream};

use crate::error::{OsError, OsResult};
use crate::types::OsCycles;

/// Enable the DWT cycle counter
///
/// Must run once before the first traced event, otherwise every record
/// carries a zero timestamp.
pub fn cycle_counter_init() {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.DCB.enable_trace();
    p.DWT.set_cycle_count(0);
    p.DWT.enable_cycle_counter();
}

/// Current DWT cycle count (wraps at 2^32)
#[inline(always)]
pub fn cycle_count() -> OsCycles {
    DWT::cycle_count()
}

/// Host stdout over semihosting, usable as a dump sink
///
/// Writes halt the core while a debugger services them; only use it from
/// the monitor task.
pub fn report_sink() -> OsResult<HostStream> {
    hio::hstdout().map_err(|_| OsError::ObjCreateFailed)
}
