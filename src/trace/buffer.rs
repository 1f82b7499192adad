//! Bounded trace buffer
//!
//! One buffer per record category: a fixed array of slots, a write cursor
//! and a sticky overflow flag. Slots below the cursor are immutable once
//! written. Reservation and population happen inside a single critical
//! section, so readers only ever observe fully written records.
//!
//! Storage is inline. "Allocation" arms the buffer for writing and may only
//! happen from task context; interrupt-context writers never allocate and
//! drop their event while the buffer is still unallocated.

use core::mem::MaybeUninit;

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::core::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::types::BufferState;

struct Slots<T, const N: usize> {
    slots: [MaybeUninit<T>; N],
    len: usize,
}

/// Fixed-capacity, append-only record buffer
pub struct TraceBuffer<T: Copy, const N: usize> {
    inner: CsCell<Slots<T, N>>,
    state: AtomicU8,
    overflowed: AtomicBool,
    dropped: AtomicU32,
}

impl<T: Copy + Send, const N: usize> TraceBuffer<T, N> {
    /// Create a new, unallocated buffer
    pub const fn new() -> Self {
        TraceBuffer {
            inner: CsCell::new(Slots {
                slots: [const { MaybeUninit::uninit() }; N],
                len: 0,
            }),
            state: AtomicU8::new(BufferState::Unallocated as u8),
            overflowed: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Arm the buffer for writing
    ///
    /// Idempotent. Fails with [`OsError::CreateIsr`] from interrupt context.
    pub fn allocate(&self) -> OsResult<()> {
        if self.is_allocated() {
            return Ok(());
        }

        if is_isr_context() {
            return Err(OsError::CreateIsr);
        }

        if self
            .state
            .compare_exchange(
                BufferState::Unallocated as u8,
                BufferState::Ready as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            crate::debug!("trace buffer allocated ({=usize} slots)", N);
        }
        Ok(())
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.state.load(Ordering::Acquire) == BufferState::Ready as u8
    }

    #[inline]
    pub fn state(&self) -> BufferState {
        if self.is_allocated() {
            BufferState::Ready
        } else {
            BufferState::Unallocated
        }
    }

    /// Reserve the next free slot
    ///
    /// Returns `None` when the buffer is unallocated or full. A full buffer
    /// raises the sticky overflow flag and counts the dropped event.
    pub fn acquire_slot<'cs>(&'cs self, cs: CriticalSection<'cs>) -> Option<Slot<'cs, T, N>> {
        if !self.is_allocated() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let inner = self.inner.get(cs);
        if inner.len >= N {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            if !self.overflowed.swap(true, Ordering::AcqRel) {
                crate::warn!("trace buffer full ({=usize} slots), dropping events", N);
            }
            return None;
        }

        Some(Slot { inner })
    }

    /// Append a record from task context, allocating on first use
    pub fn push(&self, record: T) -> bool {
        if !self.is_allocated() {
            // from an ISR this stays unallocated and the write is counted as dropped
            let _ = self.allocate();
        }
        self.push_from_isr(record)
    }

    /// Append a record without ever allocating
    pub fn push_from_isr(&self, record: T) -> bool {
        critical_section(|cs| match self.acquire_slot(cs) {
            Some(slot) => {
                slot.write(record);
                true
            }
            None => false,
        })
    }

    /// Number of records written
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.with(|inner| inner.len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Sticky: never cleared once raised
    #[inline]
    pub fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    /// Events discarded because the buffer was full or unallocated
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Copy out the record at `index`
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.with(|inner| {
            if index < inner.len {
                // SAFETY: slots below `len` were written by `Slot::write`.
                Some(unsafe { inner.slots[index].assume_init() })
            } else {
                None
            }
        })
    }

    /// Lazily iterate over all records in write order
    #[inline]
    pub fn iter(&self) -> Records<'_, T, N> {
        self.iter_from(0)
    }

    /// Lazily iterate over records starting at `start`
    ///
    /// Records written while iterating are picked up as well.
    #[inline]
    pub fn iter_from(&self, start: usize) -> Records<'_, T, N> {
        Records { buffer: self, next: start }
    }
}

impl<T: Copy + Send, const N: usize> Default for TraceBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A reserved slot, valid for one critical section
///
/// The cursor only advances when the slot is written; dropping an unwritten
/// slot releases the reservation.
pub struct Slot<'cs, T, const N: usize> {
    inner: &'cs mut Slots<T, N>,
}

impl<T: Copy, const N: usize> Slot<'_, T, N> {
    /// Index this slot will occupy
    #[inline]
    pub fn index(&self) -> usize {
        self.inner.len
    }

    /// Populate the slot and advance the cursor
    #[inline]
    pub fn write(self, record: T) {
        let idx = self.inner.len;
        self.inner.slots[idx].write(record);
        self.inner.len = idx + 1;
    }
}

/// Iterator over buffer records
pub struct Records<'a, T: Copy, const N: usize> {
    buffer: &'a TraceBuffer<T, N>,
    next: usize,
}

impl<'a, T: Copy + Send, const N: usize> Records<'a, T, N> {
    /// Index of the next record to be yielded
    #[inline]
    pub fn position(&self) -> usize {
        self.next
    }
}

impl<T: Copy + Send, const N: usize> Iterator for Records<'_, T, N> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let record = self.buffer.get(self.next)?;
        self.next += 1;
        Some(record)
    }
}
