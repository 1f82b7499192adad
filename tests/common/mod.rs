//! Host kernel simulation shared by the integration tests
//!
//! Tasks are std threads. Each thread registers its task id in a
//! thread-local, priorities live in a map, the binary semaphore is a
//! `Mutex<bool>` + `Condvar`, and one tick is one millisecond.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use rtmon::sem::{BinarySemaphore, TaskControl};
use rtmon::{OsCycles, OsError, OsPrio, OsQueueId, OsResult, OsTaskId, OsTick, TracePort, Tracer};
use rtmon::{TASK_NONE, TIMEOUT_FOREVER, TIMEOUT_NONE};

thread_local! {
    static CURRENT_TASK: Cell<OsTaskId> = const { Cell::new(TASK_NONE) };
}

/// Bind the calling thread to `task`
pub fn enter_task(task: OsTaskId) {
    CURRENT_TASK.with(|t| t.set(task));
}

pub fn ticks(n: OsTick) -> Duration {
    Duration::from_millis(n as u64)
}

/// Poll `cond` every millisecond for up to two seconds
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}

// ============ Kernel ============

pub struct HostKernel {
    start: Instant,
    next_id: AtomicU32,
    prios: Mutex<HashMap<OsTaskId, OsPrio>>,
}

impl HostKernel {
    pub fn new() -> Self {
        HostKernel {
            start: Instant::now(),
            next_id: AtomicU32::new(1),
            prios: Mutex::new(HashMap::new()),
        }
    }

    /// Register a task and return its handle
    pub fn create_task(&self, prio: OsPrio) -> OsTaskId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.prios.lock().unwrap().insert(id, prio);
        id
    }

    pub fn delay(&self, n: OsTick) {
        std::thread::sleep(ticks(n));
    }
}

impl TaskControl for HostKernel {
    fn current_task(&self) -> OsTaskId {
        CURRENT_TASK.with(|t| t.get())
    }

    fn priority(&self, task: OsTaskId) -> OsPrio {
        self.prios.lock().unwrap().get(&task).copied().unwrap_or(0)
    }

    fn set_priority(&self, task: OsTaskId, prio: OsPrio) {
        self.prios.lock().unwrap().insert(task, prio);
    }
}

impl TracePort for HostKernel {
    fn current_task(&self) -> OsTaskId {
        CURRENT_TASK.with(|t| t.get())
    }

    fn tick_count(&self) -> OsTick {
        self.start.elapsed().as_millis() as OsTick
    }

    fn tick_count_from_isr(&self) -> OsTick {
        TracePort::tick_count(self)
    }

    fn cycle_count(&self) -> OsCycles {
        rtmon::port::cycle_count()
    }
}

pub type HostTracer<'k> = Tracer<&'k HostKernel>;

// ============ Manual port ============

/// Trace port whose readings the test sets by hand
pub struct ManualPort {
    task: AtomicU32,
    tick: AtomicU32,
    isr_tick: AtomicU32,
    cycles: AtomicU32,
}

impl ManualPort {
    pub const CYCLES_PER_READ: OsCycles = 10;

    pub fn new() -> Self {
        ManualPort {
            task: AtomicU32::new(TASK_NONE),
            tick: AtomicU32::new(0),
            isr_tick: AtomicU32::new(0),
            cycles: AtomicU32::new(0),
        }
    }

    pub fn set_task(&self, task: OsTaskId) {
        self.task.store(task, Ordering::Relaxed);
    }

    /// Set both the task and the interrupt tick view
    pub fn set_tick(&self, tick: OsTick) {
        self.tick.store(tick, Ordering::Relaxed);
        self.isr_tick.store(tick, Ordering::Relaxed);
    }

    pub fn set_isr_tick(&self, tick: OsTick) {
        self.isr_tick.store(tick, Ordering::Relaxed);
    }
}

impl TracePort for ManualPort {
    fn current_task(&self) -> OsTaskId {
        self.task.load(Ordering::Relaxed)
    }

    fn tick_count(&self) -> OsTick {
        self.tick.load(Ordering::Relaxed)
    }

    fn tick_count_from_isr(&self) -> OsTick {
        self.isr_tick.load(Ordering::Relaxed)
    }

    fn cycle_count(&self) -> OsCycles {
        self.cycles.fetch_add(Self::CYCLES_PER_READ, Ordering::Relaxed)
    }
}

// ============ Binary semaphore ============

pub struct HostSemaphore {
    taken: Mutex<bool>,
    freed: Condvar,
}

impl BinarySemaphore for HostSemaphore {
    fn create() -> OsResult<Self> {
        Ok(HostSemaphore {
            taken: Mutex::new(false),
            freed: Condvar::new(),
        })
    }

    fn take(&self, timeout: OsTick) -> OsResult<()> {
        let taken = self.taken.lock().unwrap();
        let mut taken = match timeout {
            TIMEOUT_NONE => taken,
            TIMEOUT_FOREVER => self.freed.wait_while(taken, |t| *t).unwrap(),
            n => self.freed.wait_timeout_while(taken, ticks(n), |t| *t).unwrap().0,
        };
        if *taken {
            return Err(OsError::Timeout);
        }
        *taken = true;
        Ok(())
    }

    fn give(&self) -> OsResult<()> {
        *self.taken.lock().unwrap() = false;
        self.freed.notify_one();
        Ok(())
    }
}

/// Semaphore whose creation always fails
pub struct ExhaustedSemaphore;

impl BinarySemaphore for ExhaustedSemaphore {
    fn create() -> OsResult<Self> {
        Err(OsError::ObjCreateFailed)
    }

    fn take(&self, _timeout: OsTick) -> OsResult<()> {
        Ok(())
    }

    fn give(&self) -> OsResult<()> {
        Ok(())
    }
}

// ============ Traced queue ============

/// Bounded FIFO that fires the queue trace hooks
pub struct TracedQueue<'t, 'k, T> {
    id: OsQueueId,
    depth: usize,
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    tracer: &'t HostTracer<'k>,
}

impl<'t, 'k, T> TracedQueue<'t, 'k, T> {
    pub fn new(id: OsQueueId, depth: usize, tracer: &'t HostTracer<'k>) -> Self {
        TracedQueue {
            id,
            depth,
            items: Mutex::new(VecDeque::with_capacity(depth)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            tracer,
        }
    }

    pub fn id(&self) -> OsQueueId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn send(&self, item: T, timeout: OsTick) -> OsResult<()> {
        let items = self.items.lock().unwrap();
        let full = |q: &mut VecDeque<T>| q.len() >= self.depth;
        let mut items = match timeout {
            TIMEOUT_NONE => items,
            TIMEOUT_FOREVER => self.not_full.wait_while(items, full).unwrap(),
            n => self.not_full.wait_timeout_while(items, ticks(n), full).unwrap().0,
        };
        if items.len() >= self.depth {
            drop(items);
            self.tracer.queue_send_failed(self.id, timeout);
            return Err(OsError::Timeout);
        }
        items.push_back(item);
        drop(items);
        self.not_empty.notify_one();
        self.tracer.queue_send(self.id, timeout);
        Ok(())
    }

    pub fn receive(&self, timeout: OsTick) -> OsResult<T> {
        let items = self.items.lock().unwrap();
        let empty = |q: &mut VecDeque<T>| q.is_empty();
        let mut items = match timeout {
            TIMEOUT_NONE => items,
            TIMEOUT_FOREVER => self.not_empty.wait_while(items, empty).unwrap(),
            n => self.not_empty.wait_timeout_while(items, ticks(n), empty).unwrap().0,
        };
        match items.pop_front() {
            Some(item) => {
                drop(items);
                self.not_full.notify_one();
                self.tracer.queue_receive(self.id, timeout);
                Ok(item)
            }
            None => {
                drop(items);
                self.tracer.queue_receive_failed(self.id, timeout);
                Err(OsError::Timeout)
            }
        }
    }

    pub fn send_from_isr(&self, item: T) -> OsResult<()> {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.depth {
            drop(items);
            self.tracer.queue_send_from_isr_failed(self.id);
            return Err(OsError::Timeout);
        }
        items.push_back(item);
        drop(items);
        self.not_empty.notify_one();
        self.tracer.queue_send_from_isr(self.id);
        Ok(())
    }
}
