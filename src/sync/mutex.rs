//! Mutex with priority inheritance
//!
//! A [`PipMutex`] wraps the kernel's binary semaphore together with the
//! holder's identity and its base priority. While a higher-priority task is
//! blocked in [`PipMutex::acquire`], the holder runs at that task's priority;
//! [`PipMutex::release`] drops it back to the base priority.
//!
//! Blocked waiters are kept in a small fixed table so a new holder, or a
//! holder whose boosting waiter timed out, can be re-evaluated against the
//! waiters that remain.

use crate::config::CFG_PIP_WAITERS_MAX;
use crate::critical::{critical_section, is_isr_context};
use crate::core::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::types::{OsPrio, OsTaskId, OsTick, TASK_NONE, TIMEOUT_NONE};

use super::sem::{BinarySemaphore, TaskControl};

/// Observable mutex state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MutexState {
    Free,
    Held {
        owner: OsTaskId,
        /// Owner priority before any inheritance boost
        base_prio: OsPrio,
    },
}

#[derive(Debug, Clone, Copy)]
struct Waiter {
    task: OsTaskId,
    prio: OsPrio,
}

struct PipState {
    holder: OsTaskId,
    base_prio: OsPrio,
    waiters: [Option<Waiter>; CFG_PIP_WAITERS_MAX],
}

impl PipState {
    const fn new() -> Self {
        PipState {
            holder: TASK_NONE,
            base_prio: 0,
            waiters: [None; CFG_PIP_WAITERS_MAX],
        }
    }

    fn enqueue(&mut self, task: OsTaskId, prio: OsPrio) -> OsResult<()> {
        let slot = self
            .waiters
            .iter_mut()
            .find(|w| w.is_none())
            .ok_or(OsError::MutexWaitersFull)?;
        *slot = Some(Waiter { task, prio });
        Ok(())
    }

    fn dequeue(&mut self, task: OsTaskId) {
        if let Some(slot) = self
            .waiters
            .iter_mut()
            .find(|w| matches!(w, Some(w) if w.task == task))
        {
            *slot = None;
        }
    }

    fn highest_waiter(&self) -> Option<OsPrio> {
        self.waiters.iter().flatten().map(|w| w.prio).max()
    }

    fn waiter_count(&self) -> usize {
        self.waiters.iter().flatten().count()
    }
}

/// Priority-inheritance mutex
pub struct PipMutex<S, K> {
    sem: S,
    kernel: K,
    state: CsCell<PipState>,
}

impl<S: BinarySemaphore, K: TaskControl> PipMutex<S, K> {
    /// Create a free mutex
    ///
    /// Fails with [`OsError::ObjCreateFailed`] when the semaphore cannot be
    /// allocated.
    pub fn create(kernel: K) -> OsResult<Self> {
        if is_isr_context() {
            return Err(OsError::CreateIsr);
        }

        let sem = S::create().map_err(|e| {
            crate::error!("pip: semaphore create failed ({=u16})", e.code());
            e
        })?;

        Ok(PipMutex {
            sem,
            kernel,
            state: CsCell::new(PipState::new()),
        })
    }

    /// Acquire the mutex, waiting up to `timeout` ticks
    ///
    /// A waiter with higher priority than the holder lends the holder its
    /// priority until the holder releases or the waiter gives up. Expiry
    /// returns [`OsError::Timeout`] and leaves no boost behind.
    pub fn acquire(&self, timeout: OsTick) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }

        let me = self.kernel.current_task();
        if me == TASK_NONE {
            return Err(OsError::TaskInvalid);
        }
        let my_prio = self.kernel.priority(me);
        let waits = timeout != TIMEOUT_NONE;

        critical_section(|cs| {
            let st = self.state.get(cs);
            if st.holder == me {
                return Err(OsError::MutexOwner);
            }
            if waits {
                st.enqueue(me, my_prio)?;
                if st.holder != TASK_NONE && my_prio > self.kernel.priority(st.holder) {
                    crate::debug!("pip: boost task {=u32} to {=u8}", st.holder, my_prio);
                    self.kernel.set_priority(st.holder, my_prio);
                }
            }
            Ok(())
        })?;

        let result = self.sem.take(timeout);

        critical_section(|cs| {
            let st = self.state.get(cs);
            if waits {
                st.dequeue(me);
            }

            match result {
                Ok(()) => {
                    st.holder = me;
                    st.base_prio = my_prio;
                    if let Some(top) = st.highest_waiter().filter(|p| *p > my_prio) {
                        self.kernel.set_priority(me, top);
                    }
                    Ok(())
                }
                Err(e) => {
                    if waits && st.holder != TASK_NONE {
                        let target = st.highest_waiter().map_or(st.base_prio, |p| p.max(st.base_prio));
                        if self.kernel.priority(st.holder) != target {
                            self.kernel.set_priority(st.holder, target);
                        }
                    }
                    Err(e)
                }
            }
        })
    }

    /// Acquire without waiting
    #[inline]
    pub fn try_acquire(&self) -> OsResult<()> {
        self.acquire(TIMEOUT_NONE)
    }

    /// Release the mutex and drop back to the base priority
    ///
    /// Only the holder may release; anyone else gets
    /// [`OsError::MutexNotOwner`] and the state is left untouched.
    pub fn release(&self) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::PostIsr);
        }

        let me = self.kernel.current_task();
        let base_prio = critical_section(|cs| {
            let st = self.state.get(cs);
            if me == TASK_NONE || st.holder != me {
                return Err(OsError::MutexNotOwner);
            }
            st.holder = TASK_NONE;
            Ok(st.base_prio)
        })?;

        if let Err(e) = self.sem.give() {
            self.state.with(|st| st.holder = me);
            return Err(e);
        }

        if self.kernel.priority(me) != base_prio {
            crate::debug!("pip: restore task {=u32} to {=u8}", me, base_prio);
            self.kernel.set_priority(me, base_prio);
        }
        Ok(())
    }

    /// Acquire and get a guard that releases on drop
    pub fn lock(&self, timeout: OsTick) -> OsResult<PipGuard<'_, S, K>> {
        self.acquire(timeout)?;
        Ok(PipGuard { mutex: self })
    }

    pub fn state(&self) -> MutexState {
        self.state.with(|st| match st.holder {
            TASK_NONE => MutexState::Free,
            owner => MutexState::Held {
                owner,
                base_prio: st.base_prio,
            },
        })
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.state() != MutexState::Free
    }

    /// Tasks currently blocked in `acquire`
    pub fn waiters(&self) -> usize {
        self.state.with(|st| st.waiter_count())
    }
}

/// Held mutex; released when dropped
pub struct PipGuard<'m, S: BinarySemaphore, K: TaskControl> {
    mutex: &'m PipMutex<S, K>,
}

impl<S: BinarySemaphore, K: TaskControl> Drop for PipGuard<'_, S, K> {
    fn drop(&mut self) {
        if let Err(_e) = self.mutex.release() {
            crate::error!("pip: guard release failed ({=u16})", _e.code());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiter_table() {
        let mut st = PipState::new();
        assert_eq!(st.highest_waiter(), None);
        st.enqueue(1, 3).unwrap();
        st.enqueue(2, 9).unwrap();
        st.enqueue(3, 5).unwrap();
        assert_eq!(st.highest_waiter(), Some(9));
        st.dequeue(2);
        assert_eq!(st.highest_waiter(), Some(5));
        assert_eq!(st.waiter_count(), 2);
        st.dequeue(42);
        assert_eq!(st.waiter_count(), 2);
    }

    #[test]
    fn test_waiter_table_full() {
        let mut st = PipState::new();
        for t in 0..CFG_PIP_WAITERS_MAX as OsTaskId {
            st.enqueue(t + 1, 1).unwrap();
        }
        assert_eq!(st.enqueue(100, 1), Err(OsError::MutexWaitersFull));
    }
}
