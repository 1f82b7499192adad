//! Core type definitions
//!
//! Identifiers and counters shared by the tracing subsystem and the
//! priority-inheritance mutex. Task and queue identifiers are opaque handle
//! values handed out by the host scheduler; `0` is the null handle.

/// Task priority (higher value = more urgent)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Free-running hardware cycle counter value
pub type OsCycles = u32;

/// Opaque task handle (`0` = no task)
pub type OsTaskId = u32;

/// Opaque queue handle
pub type OsQueueId = u32;

/// The null task handle
pub const TASK_NONE: OsTaskId = 0;

/// Do not wait at all
pub const TIMEOUT_NONE: OsTick = 0;

/// Wait until the operation succeeds
pub const TIMEOUT_FOREVER: OsTick = OsTick::MAX;

/// Trace record category. Each category owns one buffer with its own cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TraceCategory {
    Queue = 0,
    Tick = 1,
    Task = 2,
}

impl TraceCategory {
    pub const ALL: [TraceCategory; 3] = [TraceCategory::Queue, TraceCategory::Tick, TraceCategory::Task];

    /// Bit raised in the error flags when this category overflows
    #[inline]
    pub const fn overflow_bit(self) -> u8 {
        match self {
            TraceCategory::Queue => 0x01,
            TraceCategory::Tick => 0x02,
            TraceCategory::Task => 0x04,
        }
    }
}

/// Buffer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BufferState {
    /// Not yet allocated; interrupt-context writes are dropped
    Unallocated = 0,
    /// Writable
    Ready = 1,
}
