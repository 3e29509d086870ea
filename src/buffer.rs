// SPDX-License-Identifier: Apache-2.0

use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicBool, AtomicU8, Ordering},
};

/// A single 12-bit ADC reading, right-aligned
pub type Sample = u16;

/// Ownership state of a [`SampleBuffer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BufferStatus {
    /// Drained and cleared; may have a descriptor armed but the engine is not writing to it
    Empty = 0,
    /// Owned by the transfer engine
    Filling = 1,
    /// Owned by the consumer until it calls [`mark_empty`](crate::channel::AcquisitionChannel::mark_empty)
    Full = 2,
}

impl BufferStatus {
    /// Decode the raw tag. Only values written by [`SampleBuffer::set_status`] are ever stored.
    const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => BufferStatus::Empty,
            1 => BufferStatus::Filling,
            _ => BufferStatus::Full,
        }
    }
}

/// Fixed-capacity slot of samples plus the status tag arbitrating access to them.
///
/// The tag is the only synchronization between interrupt context, the transfer engine and the
/// consumer. Samples may be read or cleared by the CPU only while the tag reads
/// [`BufferStatus::Full`] or [`BufferStatus::Empty`]; while [`BufferStatus::Filling`] they belong
/// to the engine.
pub struct SampleBuffer<const N: usize> {
    /// Sample storage, written by DMA through [`SampleBuffer::as_mut_ptr`]
    samples: UnsafeCell<[Sample; N]>,
    /// Raw [`BufferStatus`]
    status: AtomicU8,
    /// The contents of the current window must not be reported
    discard: AtomicBool,
}

// SAFETY: access to `samples` is arbitrated by `status`, see type docs.
unsafe impl<const N: usize> Sync for SampleBuffer<N> {}

impl<const N: usize> SampleBuffer<N> {
    /// Create a zeroed buffer
    pub const fn new(status: BufferStatus) -> Self {
        Self {
            samples: UnsafeCell::new([0; N]),
            status: AtomicU8::new(status as u8),
            discard: AtomicBool::new(false),
        }
    }

    /// Number of samples per window
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Current status. Acquire pairs with the release in [`SampleBuffer::set_status`], so samples
    /// written before a transition to [`BufferStatus::Full`] are visible once it is observed.
    pub fn status(&self) -> BufferStatus {
        BufferStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    /// Store a new status with release semantics
    pub(crate) fn set_status(&self, status: BufferStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Destination pointer for the transfer engine
    pub(crate) fn as_mut_ptr(&self) -> *mut Sample {
        self.samples.get().cast()
    }

    /// Flag the current window as untrustworthy
    pub(crate) fn set_discard(&self) {
        self.discard.store(true, Ordering::Release);
    }

    /// Read and reset the discard flag.
    ///
    /// Load and store instead of `swap`: thumbv6m has no compare-and-swap. The consumer resets the
    /// flag of a full buffer and the controller that of an empty one, so the two never race.
    pub(crate) fn take_discard(&self) -> bool {
        let discard = self.discard.load(Ordering::Acquire);
        if discard {
            self.discard.store(false, Ordering::Release);
        }
        discard
    }

    /// Run `f` over the samples, then zero them.
    ///
    /// # Safety
    ///
    /// The transfer engine must not be writing to this buffer, i.e. the status must not be
    /// [`BufferStatus::Filling`] and no descriptor pointing here may be running.
    pub(crate) unsafe fn drain_with<R>(&self, f: impl FnOnce(&[Sample; N]) -> R) -> R {
        let samples = &mut *self.samples.get();
        let result = f(samples);
        samples.fill(0);
        result
    }

    /// Zero the samples.
    ///
    /// # Safety
    ///
    /// Same as [`SampleBuffer::drain_with`].
    pub(crate) unsafe fn clear(&self) {
        (*self.samples.get()).fill(0);
    }

    /// Copy of the current contents, for inspection in tests.
    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> [Sample; N] {
        unsafe { *self.samples.get() }
    }
}

/// Monotonic counter of samples taken across all windows.
#[derive(Default, Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleCounter(u64);

impl SampleCounter {
    /// Get current counter value
    pub fn get_counter(&self) -> u64 {
        self.0
    }

    /// Add a drained window to the count. Saturates (with a warning) instead of wrapping, so the
    /// reported total never goes backwards.
    pub fn increment_by(&mut self, samples: usize) {
        match self.0.checked_add(samples as u64) {
            None => {
                warn!("Sample counter overflowed, total will no longer increase");
                self.0 = u64::MAX;
            }
            Some(new_counter) => self.0 = new_counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_tag() {
        let buffer = SampleBuffer::<4>::new(BufferStatus::Filling);
        assert_eq!(buffer.status(), BufferStatus::Filling);
        buffer.set_status(BufferStatus::Full);
        assert_eq!(buffer.status(), BufferStatus::Full);
        buffer.set_status(BufferStatus::Empty);
        assert_eq!(buffer.status(), BufferStatus::Empty);
    }

    #[test]
    fn drain_reads_then_zeroes() {
        let buffer = SampleBuffer::<4>::new(BufferStatus::Full);
        unsafe {
            for (i, sample) in [1, 2, 3, 4].into_iter().enumerate() {
                buffer.as_mut_ptr().add(i).write_volatile(sample);
            }
            let sum: u32 = buffer.drain_with(|s| s.iter().map(|&x| x as u32).sum());
            assert_eq!(sum, 10);
        }
        assert_eq!(buffer.snapshot(), [0; 4]);
    }

    #[test]
    fn discard_flag_is_taken_once() {
        let buffer = SampleBuffer::<4>::new(BufferStatus::Empty);
        assert!(!buffer.take_discard());
        buffer.set_discard();
        assert!(buffer.take_discard());
        assert!(!buffer.take_discard());
    }

    #[test]
    fn counter_saturates() {
        let mut counter = SampleCounter(u64::MAX - 2);
        counter.increment_by(2);
        assert_eq!(counter.get_counter(), u64::MAX);
        counter.increment_by(256);
        assert_eq!(counter.get_counter(), u64::MAX);
    }
}
