//! Trace record types
//!
//! Fixed-layout records, one per category. Every field is 32 bits wide so
//! the `repr(C)` layout carries no padding. Records are `Copy`: a slot is
//! written once and only ever copied out afterwards.

use core::fmt;

use crate::types::{OsCycles, OsQueueId, OsTaskId, OsTick, TraceCategory};

/// Queue operation observed by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum QueueEventKind {
    Receive = 0,
    ReceiveFailed = 1,
    ReceiveFromIsr = 2,
    ReceiveFromIsrFailed = 3,
    Send = 4,
    SendFailed = 5,
    SendFromIsr = 6,
    SendFromIsrFailed = 7,
    SetSend = 8,
}

impl QueueEventKind {
    /// Fired from interrupt context
    #[inline]
    pub const fn is_from_isr(self) -> bool {
        matches!(
            self,
            QueueEventKind::ReceiveFromIsr
                | QueueEventKind::ReceiveFromIsrFailed
                | QueueEventKind::SendFromIsr
                | QueueEventKind::SendFromIsrFailed
        )
    }

    /// Captured with the interrupt-safe tick count and no wait
    ///
    /// Includes `SetSend`, which the kernel fires from both task and
    /// interrupt send paths.
    #[inline]
    pub const fn is_isr_safe(self) -> bool {
        self.is_from_isr() || matches!(self, QueueEventKind::SetSend)
    }

    /// Name of the scheduler trace macro that fires this event
    pub const fn macro_name(self) -> &'static str {
        match self {
            QueueEventKind::Receive => "traceQUEUE_RECEIVE",
            QueueEventKind::ReceiveFailed => "traceQUEUE_RECEIVE_FAILED",
            QueueEventKind::ReceiveFromIsr => "traceQUEUE_RECEIVE_FROM_ISR",
            QueueEventKind::ReceiveFromIsrFailed => "traceQUEUE_RECEIVE_FROM_ISR_FAILED",
            QueueEventKind::Send => "traceQUEUE_SEND",
            QueueEventKind::SendFailed => "traceQUEUE_SEND_FAILED",
            QueueEventKind::SendFromIsr => "traceQUEUE_SEND_FROM_ISR",
            QueueEventKind::SendFromIsrFailed => "traceQUEUE_SEND_FROM_ISR_FAILED",
            QueueEventKind::SetSend => "traceQUEUE_SET_SEND",
        }
    }

    #[inline]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            QueueEventKind::ReceiveFailed
                | QueueEventKind::ReceiveFromIsrFailed
                | QueueEventKind::SendFailed
                | QueueEventKind::SendFromIsrFailed
        )
    }
}

impl TryFrom<u32> for QueueEventKind {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => QueueEventKind::Receive,
            1 => QueueEventKind::ReceiveFailed,
            2 => QueueEventKind::ReceiveFromIsr,
            3 => QueueEventKind::ReceiveFromIsrFailed,
            4 => QueueEventKind::Send,
            5 => QueueEventKind::SendFailed,
            6 => QueueEventKind::SendFromIsr,
            7 => QueueEventKind::SendFromIsrFailed,
            8 => QueueEventKind::SetSend,
            other => return Err(other),
        })
    }
}

/// Task lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TaskEventKind {
    Create = 0,
    CreateFailed = 1,
    Delete = 2,
    Delay = 3,
    DelayUntil = 4,
    SwitchedIn = 5,
    SwitchedOut = 6,
}

impl TaskEventKind {
    pub const fn macro_name(self) -> &'static str {
        match self {
            TaskEventKind::Create => "traceTASK_CREATE",
            TaskEventKind::CreateFailed => "traceTASK_CREATE_FAILED",
            TaskEventKind::Delete => "traceTASK_DELETE",
            TaskEventKind::Delay => "traceTASK_DELAY",
            TaskEventKind::DelayUntil => "traceTASK_DELAY_UNTIL",
            TaskEventKind::SwitchedIn => "traceTASK_SWITCHED_IN",
            TaskEventKind::SwitchedOut => "traceTASK_SWITCHED_OUT",
        }
    }
}

impl TryFrom<u32> for TaskEventKind {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TaskEventKind::Create,
            1 => TaskEventKind::CreateFailed,
            2 => TaskEventKind::Delete,
            3 => TaskEventKind::Delay,
            4 => TaskEventKind::DelayUntil,
            5 => TaskEventKind::SwitchedIn,
            6 => TaskEventKind::SwitchedOut,
            other => return Err(other),
        })
    }
}

/// Queue send/receive record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    /// Scheduler tick count when the event fired
    pub tick: OsTick,
    /// Cycle counter when the event fired
    pub timestamp: OsCycles,
    pub queue: OsQueueId,
    /// Requested wait, `0` from interrupt context
    pub ticks_to_wait: OsTick,
    /// Task running when the event fired
    pub task: OsTaskId,
}

/// Tick increment record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct TickEvent {
    pub tick: OsTick,
    pub timestamp: OsCycles,
    pub new_tick: OsTick,
    /// Task active at the tick boundary
    pub task: OsTaskId,
}

/// Task lifecycle record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub tick: OsTick,
    pub timestamp: OsCycles,
    pub task: OsTaskId,
    /// Created, deleted or switched task; `0` for delays
    pub affected: OsTaskId,
    /// Delay in ticks (or wake time for `DelayUntil`)
    pub delay: OsTick,
}

/// Any trace record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TraceRecord {
    Queue(QueueEvent),
    Tick(TickEvent),
    Task(TaskEvent),
}

impl TraceRecord {
    #[inline]
    pub fn category(&self) -> TraceCategory {
        match self {
            TraceRecord::Queue(_) => TraceCategory::Queue,
            TraceRecord::Tick(_) => TraceCategory::Tick,
            TraceRecord::Task(_) => TraceCategory::Task,
        }
    }

    /// Acting task
    #[inline]
    pub fn task(&self) -> OsTaskId {
        match self {
            TraceRecord::Queue(e) => e.task,
            TraceRecord::Tick(e) => e.task,
            TraceRecord::Task(e) => e.task,
        }
    }

    /// Trace macro name, the event type shared by all three categories
    pub fn macro_name(&self) -> &'static str {
        match self {
            TraceRecord::Queue(e) => e.kind.macro_name(),
            TraceRecord::Tick(_) => "traceTASK_INCREMENT_TICK",
            TraceRecord::Task(e) => e.kind.macro_name(),
        }
    }

    /// Queue handle, new tick count, or affected task
    pub fn affected_object(&self) -> u32 {
        match self {
            TraceRecord::Queue(e) => e.queue,
            TraceRecord::Tick(e) => e.new_tick,
            TraceRecord::Task(e) => e.affected,
        }
    }

    /// Wait or delay in ticks; for a tick record, the distance to the new count
    pub fn delay(&self) -> OsTick {
        match self {
            TraceRecord::Queue(e) => e.ticks_to_wait,
            TraceRecord::Tick(e) => e.new_tick.wrapping_sub(e.tick),
            TraceRecord::Task(e) => e.delay,
        }
    }
}

impl From<QueueEvent> for TraceRecord {
    fn from(value: QueueEvent) -> Self {
        TraceRecord::Queue(value)
    }
}

impl From<TickEvent> for TraceRecord {
    fn from(value: TickEvent) -> Self {
        TraceRecord::Tick(value)
    }
}

impl From<TaskEvent> for TraceRecord {
    fn from(value: TaskEvent) -> Self {
        TraceRecord::Task(value)
    }
}

// Dump line formats: one semicolon-separated line per record.

/// `messageType;queueId;tickTime;timestamp;taskId;ticksToWait`
impl fmt::Display for QueueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.kind as u32, self.queue, self.tick, self.timestamp, self.task, self.ticks_to_wait
        )
    }
}

/// `tickTime;timestamp;newTickTime;taskId`
impl fmt::Display for TickEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{};{}", self.tick, self.timestamp, self.new_tick, self.task)
    }
}

/// `messageType;tickTime;timestamp;taskId;affectedTaskId;delay`
impl fmt::Display for TaskEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.kind as u32, self.tick, self.timestamp, self.task, self.affected, self.delay
        )
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceRecord::Queue(e) => fmt::Display::fmt(e, f),
            TraceRecord::Tick(e) => fmt::Display::fmt(e, f),
            TraceRecord::Task(e) => fmt::Display::fmt(e, f),
        }
    }
}
