//! Error types
//!
//! Uses Rust's Result pattern instead of C-style status codes. Trace hooks
//! never surface errors; everything else returns an [`OsResult`].

/// RTOS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ ISR errors ============
    /// Cannot create or allocate an object from ISR
    CreateIsr = 12001,
    /// Cannot pend from ISR
    PendIsr = 25006,
    /// Cannot post from ISR
    PostIsr = 25010,

    // ============ Mutex errors ============
    /// Caller is not the mutex owner
    MutexNotOwner = 22401,
    /// Task already owns the mutex
    MutexOwner = 22402,
    /// Too many tasks waiting on the mutex
    MutexWaitersFull = 22405,

    // ============ Object errors ============
    /// Underlying kernel object could not be allocated
    ObjCreateFailed = 24005,

    // ============ Task errors ============
    /// Invalid (null) task handle
    TaskInvalid = 29007,

    // ============ Timeout ============
    /// Operation timed out
    Timeout = 29401,

    // ============ Trace errors ============
    /// Monitor task already registered
    MonitorSet = 30001,
}

/// Result type alias for RTOS operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric error code
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Timeouts are an expected outcome, not a failure
    #[inline]
    pub fn is_timeout(self) -> bool {
        self == OsError::Timeout
    }
}
