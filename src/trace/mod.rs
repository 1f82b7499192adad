//! Scheduler event tracing
//!
//! A [`Tracer`] owns one bounded buffer per record category and the
//! monitor-task setting. The host scheduler calls its hooks inline at the
//! matching events; each hook captures the tick count, the cycle counter and
//! the acting task through the [`TracePort`] collaborator and appends one
//! record. Hooks never fail and never block.
//!
//! Queue and tick hooks record nothing until a monitor task is registered,
//! and nothing while the monitor task itself is running. Task lifecycle
//! hooks always record.

pub mod buffer;
pub mod parse;
pub mod record;
pub mod report;

pub use buffer::{Records, Slot, TraceBuffer};
pub use record::{QueueEvent, QueueEventKind, TaskEvent, TaskEventKind, TickEvent, TraceRecord};

use portable_atomic::{AtomicU32, Ordering};

use crate::config::{CFG_TRACE_QUEUE_CAPACITY, CFG_TRACE_TASK_CAPACITY, CFG_TRACE_TICK_CAPACITY};
use crate::error::{OsError, OsResult};
use crate::types::{OsCycles, OsQueueId, OsTaskId, OsTick, TraceCategory, TASK_NONE, TIMEOUT_NONE};

/// What the tracer needs from the scheduler and the hardware
pub trait TracePort {
    /// Handle of the task currently executing
    fn current_task(&self) -> OsTaskId;

    /// Scheduler tick count (task context)
    fn tick_count(&self) -> OsTick;

    /// Scheduler tick count, safe to read from an interrupt handler
    fn tick_count_from_isr(&self) -> OsTick;

    /// Free-running hardware cycle counter
    fn cycle_count(&self) -> OsCycles;
}

impl<P: TracePort + ?Sized> TracePort for &P {
    #[inline]
    fn current_task(&self) -> OsTaskId {
        (**self).current_task()
    }

    #[inline]
    fn tick_count(&self) -> OsTick {
        (**self).tick_count()
    }

    #[inline]
    fn tick_count_from_isr(&self) -> OsTick {
        (**self).tick_count_from_isr()
    }

    #[inline]
    fn cycle_count(&self) -> OsCycles {
        (**self).cycle_count()
    }
}

/// Calling context of a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HookContext {
    Task,
    Isr,
}

/// Tracing subsystem instance
pub struct Tracer<
    P,
    const QN: usize = CFG_TRACE_QUEUE_CAPACITY,
    const KN: usize = CFG_TRACE_TICK_CAPACITY,
    const TN: usize = CFG_TRACE_TASK_CAPACITY,
> {
    port: P,
    monitor: AtomicU32,
    queue: TraceBuffer<QueueEvent, QN>,
    tick: TraceBuffer<TickEvent, KN>,
    task: TraceBuffer<TaskEvent, TN>,
}

impl<P: TracePort, const QN: usize, const KN: usize, const TN: usize> Tracer<P, QN, KN, TN> {
    /// Create a tracer; buffers start unallocated and no monitor is set
    pub const fn new(port: P) -> Self {
        Tracer {
            port,
            monitor: AtomicU32::new(TASK_NONE),
            queue: TraceBuffer::new(),
            tick: TraceBuffer::new(),
            task: TraceBuffer::new(),
        }
    }

    /// Allocate all three buffers up front (task context)
    pub fn init(&self) -> OsResult<()> {
        self.queue.allocate()?;
        self.tick.allocate()?;
        self.task.allocate()?;
        crate::info!(
            "tracer ready: queue={=usize} tick={=usize} task={=usize}",
            QN,
            KN,
            TN
        );
        Ok(())
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    // ============ Monitor task ============

    /// Register the diagnostic task whose own queue/tick activity is ignored
    ///
    /// Established once; a second registration fails with
    /// [`OsError::MonitorSet`].
    ///
    /// Queue and tick events are only recorded once a monitor is set, and
    /// the tick hook runs in interrupt context, so both buffers are
    /// allocated here (task context only).
    pub fn set_monitor_task(&self, task: OsTaskId) -> OsResult<()> {
        if task == TASK_NONE {
            return Err(OsError::TaskInvalid);
        }
        self.queue.allocate()?;
        self.tick.allocate()?;
        self.monitor
            .compare_exchange(TASK_NONE, task, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| OsError::MonitorSet)
    }

    /// Registered monitor task, if any
    #[inline]
    pub fn monitor_task(&self) -> Option<OsTaskId> {
        match self.monitor.load(Ordering::Acquire) {
            TASK_NONE => None,
            id => Some(id),
        }
    }

    /// Queue and tick events from `task` are recorded
    #[inline]
    fn monitored(&self, task: OsTaskId) -> bool {
        let monitor = self.monitor.load(Ordering::Acquire);
        monitor != TASK_NONE && monitor != task
    }

    // ============ Buffers ============

    #[inline]
    pub fn queue_events(&self) -> &TraceBuffer<QueueEvent, QN> {
        &self.queue
    }

    #[inline]
    pub fn tick_events(&self) -> &TraceBuffer<TickEvent, KN> {
        &self.tick
    }

    #[inline]
    pub fn task_events(&self) -> &TraceBuffer<TaskEvent, TN> {
        &self.task
    }

    /// Number of records in one category
    pub fn len(&self, category: TraceCategory) -> usize {
        match category {
            TraceCategory::Queue => self.queue.len(),
            TraceCategory::Tick => self.tick.len(),
            TraceCategory::Task => self.task.len(),
        }
    }

    pub fn is_overflowed(&self, category: TraceCategory) -> bool {
        match category {
            TraceCategory::Queue => self.queue.is_overflowed(),
            TraceCategory::Tick => self.tick.is_overflowed(),
            TraceCategory::Task => self.task.is_overflowed(),
        }
    }

    /// Overflow bits of all categories (queue `0x01`, tick `0x02`, task `0x04`)
    pub fn error_flags(&self) -> u8 {
        TraceCategory::ALL
            .iter()
            .filter(|c| self.is_overflowed(**c))
            .fold(0, |flags, c| flags | c.overflow_bit())
    }

    // ============ Record writer ============

    /// Append a record to the buffer of its category
    ///
    /// Task-context writes allocate the buffer on first use; interrupt
    /// context writes never do.
    pub fn append(&self, record: TraceRecord, ctx: HookContext) -> bool {
        match (record, ctx) {
            (TraceRecord::Queue(e), HookContext::Task) => self.queue.push(e),
            (TraceRecord::Queue(e), HookContext::Isr) => self.queue.push_from_isr(e),
            (TraceRecord::Tick(e), HookContext::Task) => self.tick.push(e),
            (TraceRecord::Tick(e), HookContext::Isr) => self.tick.push_from_isr(e),
            (TraceRecord::Task(e), HookContext::Task) => self.task.push(e),
            (TraceRecord::Task(e), HookContext::Isr) => self.task.push_from_isr(e),
        }
    }

    fn queue_event(&self, kind: QueueEventKind, queue: OsQueueId, ticks_to_wait: OsTick) {
        let task = self.port.current_task();
        if !self.monitored(task) {
            return;
        }

        let (tick, ctx) = if kind.is_isr_safe() {
            (self.port.tick_count_from_isr(), HookContext::Isr)
        } else {
            (self.port.tick_count(), HookContext::Task)
        };

        let record = QueueEvent {
            kind,
            tick,
            timestamp: self.port.cycle_count(),
            queue,
            ticks_to_wait,
            task,
        };
        self.append(record.into(), ctx);
    }

    fn task_event(&self, kind: TaskEventKind, affected: OsTaskId, delay: OsTick) {
        let record = TaskEvent {
            kind,
            tick: self.port.tick_count(),
            timestamp: self.port.cycle_count(),
            task: self.port.current_task(),
            affected,
            delay,
        };
        self.append(record.into(), HookContext::Task);
    }

    // ============ Queue hooks ============

    pub fn queue_receive(&self, queue: OsQueueId, ticks_to_wait: OsTick) {
        self.queue_event(QueueEventKind::Receive, queue, ticks_to_wait);
    }

    pub fn queue_receive_failed(&self, queue: OsQueueId, ticks_to_wait: OsTick) {
        self.queue_event(QueueEventKind::ReceiveFailed, queue, ticks_to_wait);
    }

    pub fn queue_receive_from_isr(&self, queue: OsQueueId) {
        self.queue_event(QueueEventKind::ReceiveFromIsr, queue, TIMEOUT_NONE);
    }

    pub fn queue_receive_from_isr_failed(&self, queue: OsQueueId) {
        self.queue_event(QueueEventKind::ReceiveFromIsrFailed, queue, TIMEOUT_NONE);
    }

    pub fn queue_send(&self, queue: OsQueueId, ticks_to_wait: OsTick) {
        self.queue_event(QueueEventKind::Send, queue, ticks_to_wait);
    }

    pub fn queue_send_failed(&self, queue: OsQueueId, ticks_to_wait: OsTick) {
        self.queue_event(QueueEventKind::SendFailed, queue, ticks_to_wait);
    }

    pub fn queue_send_from_isr(&self, queue: OsQueueId) {
        self.queue_event(QueueEventKind::SendFromIsr, queue, TIMEOUT_NONE);
    }

    pub fn queue_send_from_isr_failed(&self, queue: OsQueueId) {
        self.queue_event(QueueEventKind::SendFromIsrFailed, queue, TIMEOUT_NONE);
    }

    /// Item posted to a queue that belongs to a queue set
    pub fn queue_set_send(&self, queue: OsQueueId) {
        self.queue_event(QueueEventKind::SetSend, queue, TIMEOUT_NONE);
    }

    // ============ Tick hook ============

    /// Called from the tick interrupt with the count before the increment
    pub fn task_increment_tick(&self, tick_count: OsTick) {
        let task = self.port.current_task();
        if !self.monitored(task) {
            return;
        }

        let record = TickEvent {
            tick: tick_count,
            timestamp: self.port.cycle_count(),
            new_tick: tick_count.wrapping_add(1),
            task,
        };
        self.append(record.into(), HookContext::Isr);
    }

    // ============ Task hooks ============

    pub fn task_create(&self, new_task: OsTaskId) {
        self.task_event(TaskEventKind::Create, new_task, 0);
    }

    pub fn task_create_failed(&self, new_task: OsTaskId) {
        self.task_event(TaskEventKind::CreateFailed, new_task, 0);
    }

    pub fn task_delete(&self, task: OsTaskId) {
        self.task_event(TaskEventKind::Delete, task, 0);
    }

    pub fn task_delay(&self, ticks_to_delay: OsTick) {
        self.task_event(TaskEventKind::Delay, TASK_NONE, ticks_to_delay);
    }

    pub fn task_delay_until(&self, time_to_wake: OsTick) {
        self.task_event(TaskEventKind::DelayUntil, TASK_NONE, time_to_wake);
    }

    pub fn task_switched_in(&self) {
        let current = self.port.current_task();
        self.task_event(TaskEventKind::SwitchedIn, current, 0);
    }

    pub fn task_switched_out(&self) {
        let current = self.port.current_task();
        self.task_event(TaskEventKind::SwitchedOut, current, 0);
    }
}
