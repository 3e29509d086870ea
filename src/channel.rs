// SPDX-License-Identifier: Apache-2.0

//! Double-buffer state shared between the completion interrupt and the consumer loop.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::{
    buffer::{BufferStatus, SampleBuffer},
    engine::{SubChannel, TransferEngine, TransferMode, TransferRequest},
};

/// Identifies one of the two buffers owned by an [`AcquisitionChannel`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferId {
    /// Filled first after startup
    Ping,
    /// Filled second
    Pong,
}

impl BufferId {
    /// The other buffer
    pub const fn other(self) -> Self {
        match self {
            BufferId::Ping => BufferId::Pong,
            BufferId::Pong => BufferId::Ping,
        }
    }
}

/// A transition was requested from the wrong state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionError {
    /// Buffer the transition was requested for
    pub buffer: BufferId,
    /// Status required by the transition
    pub expected: BufferStatus,
    /// Status actually found
    pub found: BufferStatus,
}

/// Outcome of [`AcquisitionChannel::mark_full`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handoff {
    /// The completed buffer is full and the other buffer is now filling
    Swapped,
    /// The completed buffer is full, but the other one has not been drained yet. Nothing is
    /// filling until the consumer re-arms a buffer.
    Overrun,
    /// The completed buffer was empty. Its window is discarded and it must be re-armed in place.
    UnexpectedEmpty,
    /// The completed buffer was already full. It is flagged for discard.
    UnexpectedFull,
}

/// Monotonic fault counters.
///
/// Every counter is only written from interrupt context, so increments are a plain load and
/// store. Cores without compare-and-swap (thumbv6m) can still use them.
#[derive(Default)]
pub struct FaultCounters {
    /// Completions while the other buffer was still full
    overruns: AtomicU32,
    /// Bus faults reported by the transfer engine
    engine_faults: AtomicU32,
    /// Completions for a buffer that was not filling
    unexpected: AtomicU32,
}

impl FaultCounters {
    /// All counters at zero
    pub const fn new() -> Self {
        Self {
            overruns: AtomicU32::new(0),
            engine_faults: AtomicU32::new(0),
            unexpected: AtomicU32::new(0),
        }
    }

    /// Single-writer increment, saturating at [`u32::MAX`]
    fn bump(counter: &AtomicU32) {
        let value = counter.load(Ordering::Relaxed);
        counter.store(value.saturating_add(1), Ordering::Relaxed);
    }

    /// Record a buffer overrun
    pub(crate) fn record_overrun(&self) {
        Self::bump(&self.overruns)
    }

    /// Record a transfer engine fault
    pub(crate) fn record_engine_fault(&self) {
        Self::bump(&self.engine_faults)
    }

    /// Record a completion for a buffer which was not filling
    pub(crate) fn record_unexpected(&self) {
        Self::bump(&self.unexpected)
    }

    /// Read all counters
    pub fn snapshot(&self) -> FaultReport {
        FaultReport {
            overruns: self.overruns.load(Ordering::Relaxed),
            engine_faults: self.engine_faults.load(Ordering::Relaxed),
            unexpected: self.unexpected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FaultCounters`].
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultReport {
    /// See [`Handoff::Overrun`]
    pub overruns: u32,
    /// Bus faults reported by the transfer engine
    pub engine_faults: u32,
    /// See [`Handoff::UnexpectedEmpty`] and [`Handoff::UnexpectedFull`]
    pub unexpected: u32,
}

impl FaultReport {
    /// No fault has been recorded
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Owns the two buffers of a ping-pong acquisition and their binding to the engine's
/// sub-channels.
///
/// Status tags are the only cross-context state; this type holds no locks and is meant to live in
/// a `static`, shared by reference between the completion interrupt and the consumer loop.
pub struct AcquisitionChannel<const N: usize> {
    /// Buffer bound to [`SubChannel::Primary`]
    ping: SampleBuffer<N>,
    /// Buffer bound to [`SubChannel::Alternate`]
    pong: SampleBuffer<N>,
    /// Faults recorded by the controller
    faults: FaultCounters,
}

impl<const N: usize> AcquisitionChannel<N> {
    /// New channel. Ping starts out filling and pong empty, so capture begins on ping.
    pub const fn new() -> Self {
        Self {
            ping: SampleBuffer::new(BufferStatus::Filling),
            pong: SampleBuffer::new(BufferStatus::Empty),
            faults: FaultCounters::new(),
        }
    }

    /// Access a buffer
    pub fn buffer(&self, id: BufferId) -> &SampleBuffer<N> {
        match id {
            BufferId::Ping => &self.ping,
            BufferId::Pong => &self.pong,
        }
    }

    /// Status of a buffer
    pub fn status(&self, id: BufferId) -> BufferStatus {
        self.buffer(id).status()
    }

    /// Buffer bound to a sub-channel. The binding never changes.
    pub const fn buffer_for(sub: SubChannel) -> BufferId {
        match sub {
            SubChannel::Primary => BufferId::Ping,
            SubChannel::Alternate => BufferId::Pong,
        }
    }

    /// Sub-channel bound to a buffer
    pub const fn sub_channel_for(id: BufferId) -> SubChannel {
        match id {
            BufferId::Ping => SubChannel::Primary,
            BufferId::Pong => SubChannel::Alternate,
        }
    }

    /// Fault counters
    pub fn faults(&self) -> &FaultCounters {
        &self.faults
    }

    /// Whether either buffer is currently owned by the engine
    pub fn is_filling(&self) -> bool {
        self.ping.status() == BufferStatus::Filling || self.pong.status() == BufferStatus::Filling
    }

    /// Give an empty buffer to the engine.
    pub fn mark_filling(&self, id: BufferId) -> Result<(), TransitionError> {
        self.transition(id, BufferStatus::Empty, BufferStatus::Filling)
    }

    /// Hand a drained and cleared buffer back for re-arming.
    pub fn mark_empty(&self, id: BufferId) -> Result<(), TransitionError> {
        self.transition(id, BufferStatus::Full, BufferStatus::Empty)
    }

    /// Completion of the window in `id`: `id` becomes full and the other buffer, if empty,
    /// becomes filling. Both stores happen before returning, and this must only be called from the
    /// context which cannot be preempted by the consumer.
    ///
    /// Faults are counted here and described by the returned [`Handoff`]; nothing is ever left
    /// with both buffers filling.
    pub fn mark_full(&self, id: BufferId) -> Handoff {
        let done = self.buffer(id);
        let next = self.buffer(id.other());

        match done.status() {
            BufferStatus::Filling => {
                done.set_status(BufferStatus::Full);
                match next.status() {
                    BufferStatus::Empty => {
                        next.set_status(BufferStatus::Filling);
                        Handoff::Swapped
                    }
                    BufferStatus::Full => {
                        self.faults.record_overrun();
                        Handoff::Overrun
                    }
                    // Both filling: unreachable unless the status tags were written elsewhere.
                    // Keep the one which just completed full so the pair stays consistent.
                    BufferStatus::Filling => {
                        self.faults.record_unexpected();
                        Handoff::Swapped
                    }
                }
            }
            BufferStatus::Empty => {
                self.faults.record_unexpected();
                Handoff::UnexpectedEmpty
            }
            BufferStatus::Full => {
                self.faults.record_unexpected();
                done.set_discard();
                Handoff::UnexpectedFull
            }
        }
    }

    /// Descriptor which fills `id` from `source` with its full capacity.
    pub(crate) fn transfer_request(&'static self, id: BufferId, source: u32) -> TransferRequest {
        TransferRequest {
            source,
            destination: self.buffer(id).as_mut_ptr(),
            length: N,
            mode: TransferMode::PingPong,
        }
    }

    /// Load a fresh descriptor for `id` and arm its sub-channel. `id` must be empty.
    ///
    /// If nothing is filling (the engine stalled on an overrun) the engine restarts on `id`, so it
    /// is marked filling here. Otherwise it is picked up by the next [`mark_full`](Self::mark_full).
    pub(crate) fn rearm<E: TransferEngine>(&'static self, id: BufferId, source: u32, engine: &mut E) {
        let sub = Self::sub_channel_for(id);
        critical_section::with(|_| {
            engine.configure_transfer(sub, self.transfer_request(id, source));
            if !self.is_filling() {
                // `id` is empty and nothing else writes its status inside this critical section
                let marked = self.mark_filling(id);
                debug_assert!(marked.is_ok(), "re-armed buffer was not empty: {:?}", marked);
            }
            engine.enable(sub);
        })
    }

    /// Checked single-buffer transition
    fn transition(
        &self,
        id: BufferId,
        expected: BufferStatus,
        next: BufferStatus,
    ) -> Result<(), TransitionError> {
        let buffer = self.buffer(id);
        let found = buffer.status();
        if found != expected {
            return Err(TransitionError {
                buffer: id,
                expected,
                found,
            });
        }
        buffer.set_status(next);
        Ok(())
    }
}

impl<const N: usize> Default for AcquisitionChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_filling_ping() {
        let channel = AcquisitionChannel::<4>::new();
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Filling);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Empty);
        assert!(channel.faults().snapshot().is_clean());
    }

    #[test]
    fn completion_swaps_ownership() {
        let channel = AcquisitionChannel::<4>::new();
        assert_eq!(channel.mark_full(BufferId::Ping), Handoff::Swapped);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Full);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Filling);

        channel.mark_empty(BufferId::Ping).unwrap();
        assert_eq!(channel.mark_full(BufferId::Pong), Handoff::Swapped);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Filling);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Full);
    }

    #[test]
    fn transitions_check_preconditions() {
        let channel = AcquisitionChannel::<4>::new();
        assert_eq!(
            channel.mark_filling(BufferId::Ping),
            Err(TransitionError {
                buffer: BufferId::Ping,
                expected: BufferStatus::Empty,
                found: BufferStatus::Filling,
            })
        );
        assert!(channel.mark_empty(BufferId::Pong).is_err());
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Filling);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Empty);
    }

    #[test]
    fn overrun_leaves_both_full_and_counts_once() {
        let channel = AcquisitionChannel::<4>::new();
        channel.mark_full(BufferId::Ping);
        assert_eq!(channel.mark_full(BufferId::Pong), Handoff::Overrun);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Full);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Full);
        assert!(!channel.is_filling());
        assert_eq!(channel.faults().snapshot().overruns, 1);
    }

    #[test]
    fn unexpected_completions_do_not_move_state() {
        let channel = AcquisitionChannel::<4>::new();
        assert_eq!(channel.mark_full(BufferId::Pong), Handoff::UnexpectedEmpty);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Empty);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Filling);

        channel.mark_full(BufferId::Ping);
        assert_eq!(channel.mark_full(BufferId::Ping), Handoff::UnexpectedFull);
        assert!(channel.buffer(BufferId::Ping).take_discard());
        assert_eq!(channel.faults().snapshot().unexpected, 2);
    }

    #[test]
    fn sub_channel_binding_is_fixed() {
        for sub in SubChannel::ALL {
            let id = AcquisitionChannel::<4>::buffer_for(sub);
            assert_eq!(AcquisitionChannel::<4>::sub_channel_for(id), sub);
        }
    }
}
