//! Compile-time configuration
//!
//! These constants control buffer capacities, monitor timing and resource
//! limits. The trace capacities are defaults; `Tracer` accepts others as
//! const-generic parameters.

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Queue event slots
pub const CFG_TRACE_QUEUE_CAPACITY: usize = 500;

/// Tick event slots
pub const CFG_TRACE_TICK_CAPACITY: usize = 1000;

/// Task event slots
pub const CFG_TRACE_TASK_CAPACITY: usize = 200;

/// Ticks the monitor waits before its first dump
pub const CFG_MONITOR_SETTLE_TICKS: u32 = 1000;

/// Ticks between incremental dumps of the looping monitor
pub const CFG_MONITOR_POLL_TICKS: u32 = 5000;

/// Tasks that can wait on one PIP mutex at the same time
pub const CFG_PIP_WAITERS_MAX: usize = 8;

/// Convert milliseconds to ticks
#[inline]
pub const fn ms_to_ticks(ms: u32) -> u32 {
    ((ms as u64 * CFG_TICK_RATE_HZ as u64) / 1000) as u32
}
