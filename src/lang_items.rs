//! Language items and default exception handlers

// With defmt on ARM targets, log over RTT and let panic_probe report panics
#[cfg(all(feature = "defmt", target_arch = "arm"))]
use defmt_rtt as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use panic_probe as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

// Without defmt the panic message goes to the dump sink, next to the trace
#[cfg(all(not(feature = "defmt"), target_arch = "arm"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::fmt::Write;

    if let Ok(mut out) = crate::port::report_sink() {
        let _ = writeln!(out, "PANIC: {}", info);
    }
    loop {
        cortex_m::asm::udf();
    }
}

#[cfg(target_arch = "arm")]
#[cortex_m_rt::exception]
unsafe fn HardFault(_ef: &cortex_m_rt::ExceptionFrame) -> ! {
    crate::error!("hard fault at pc={=u32:#x}", _ef.pc());
    loop {
        cortex_m::asm::udf();
    }
}

// Log timestamps share the DWT clock with trace records
#[cfg(all(feature = "defmt", target_arch = "arm"))]
defmt::timestamp!("{=u32}", crate::port::cycle_count());
