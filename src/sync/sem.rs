//! Kernel collaborators of the PIP mutex
//!
//! The mutex does not own a scheduler. It drives the host kernel's binary
//! semaphore for blocking and reads/writes task priorities through these
//! traits.

use crate::error::OsResult;
use crate::types::{OsPrio, OsTaskId, OsTick};

/// Binary lock primitive with held/free states
pub trait BinarySemaphore: Sized {
    /// Create a semaphore in the free (available) state
    ///
    /// Fails with [`OsError::ObjCreateFailed`](crate::error::OsError::ObjCreateFailed)
    /// when the kernel cannot allocate one.
    fn create() -> OsResult<Self>;

    /// Take the semaphore, blocking for up to `timeout` ticks
    ///
    /// `0` returns at once; `TIMEOUT_FOREVER` waits indefinitely. Expiry
    /// yields [`OsError::Timeout`](crate::error::OsError::Timeout).
    fn take(&self, timeout: OsTick) -> OsResult<()>;

    /// Give the semaphore back, waking one waiter
    fn give(&self) -> OsResult<()>;
}

/// Task identity and priority access
pub trait TaskControl {
    fn current_task(&self) -> OsTaskId;

    /// Effective priority of `task`
    fn priority(&self, task: OsTaskId) -> OsPrio;

    /// Change the effective priority of `task`
    fn set_priority(&self, task: OsTaskId, prio: OsPrio);
}

impl<T: TaskControl + ?Sized> TaskControl for &T {
    #[inline]
    fn current_task(&self) -> OsTaskId {
        (**self).current_task()
    }

    #[inline]
    fn priority(&self, task: OsTaskId) -> OsPrio {
        (**self).priority(task)
    }

    #[inline]
    fn set_priority(&self, task: OsTaskId, prio: OsPrio) {
        (**self).set_priority(task, prio)
    }
}
