// SPDX-License-Identifier: Apache-2.0

//! Completion handling, run from the transfer engine's interrupt.
//!
//! Nothing here blocks, allocates or logs: faults only go to the channel's counters, where the
//! consumer loop picks them up.

use crate::{
    buffer::BufferStatus,
    channel::{AcquisitionChannel, BufferId, Handoff},
    engine::{SubChannel, TransferEngine},
};

/// Interrupt-side half of the acquisition. Cheap to copy into the handler.
#[derive(Copy, Clone)]
pub struct AcquisitionController<const N: usize> {
    /// Shared double-buffer state
    channel: &'static AcquisitionChannel<N>,
    /// Address of the sample source register
    source: u32,
}

impl<const N: usize> AcquisitionController<N> {
    /// Create a controller reading samples from the register at `source`
    pub const fn new(channel: &'static AcquisitionChannel<N>, source: u32) -> Self {
        Self { channel, source }
    }

    /// Load both descriptors and start the engine on the primary sub-channel, which fills the
    /// initially-filling buffer.
    pub fn start<E: TransferEngine>(&self, engine: &mut E) {
        for sub in SubChannel::ALL {
            let id = AcquisitionChannel::<N>::buffer_for(sub);
            engine.configure_transfer(sub, self.channel.transfer_request(id, self.source));
        }
        engine.enable(SubChannel::Primary);
        engine.enable(SubChannel::Alternate);
    }

    /// Full interrupt handler: faults first, so a faulted window is flagged before its completion
    /// is handed to the consumer.
    pub fn on_interrupt<E: TransferEngine>(&self, engine: &mut E) {
        let faulted = self.on_transfer_fault(engine);
        self.complete(engine, faulted);
    }

    /// Count every engine fault and discard the windows the faulted sub-channels were writing.
    ///
    /// Returns which sub-channels faulted, indexed by [`SubChannel::index`].
    pub fn on_transfer_fault<E: TransferEngine>(&self, engine: &mut E) -> [bool; 2] {
        let mut faulted = [false; 2];
        for _ in SubChannel::ALL {
            let Some(sub) = engine.take_fault() else {
                break;
            };
            faulted[sub.index()] = true;
            self.channel.faults().record_engine_fault();
            self.channel
                .buffer(AcquisitionChannel::<N>::buffer_for(sub))
                .set_discard();
        }
        faulted
    }

    /// Hand every completed window to the consumer and acknowledge it.
    ///
    /// At most one pass per sub-channel, so a misbehaving engine cannot keep the handler looping.
    pub fn on_transfer_complete<E: TransferEngine>(&self, engine: &mut E) {
        self.complete(engine, [false; 2])
    }

    /// Completion pass, knowing which sub-channels stopped on a fault
    fn complete<E: TransferEngine>(&self, engine: &mut E, faulted: [bool; 2]) {
        for _ in SubChannel::ALL {
            let Some(sub) = engine.completed_sub_channel() else {
                break;
            };
            // Acknowledge first: clearing also stops the sub-channel, which must not undo a
            // re-arm below.
            engine.clear_completion(sub);
            let id = AcquisitionChannel::<N>::buffer_for(sub);

            // The engine chained into `id` before the hand-off reached its status, then faulted.
            // That fault is already counted; only the partial window has to go.
            if faulted[sub.index()] && self.channel.status(id) == BufferStatus::Empty {
                self.recycle(id, engine);
                continue;
            }

            match self.channel.mark_full(id) {
                Handoff::Swapped | Handoff::Overrun | Handoff::UnexpectedFull => {}
                Handoff::UnexpectedEmpty => self.recycle(id, engine),
            }
        }
    }

    /// Throw away whatever the stopped sub-channel wrote into the empty buffer `id` and re-arm it
    fn recycle<E: TransferEngine>(&self, id: BufferId, engine: &mut E) {
        let buffer = self.channel.buffer(id);
        // Discarded here, not by the consumer
        buffer.take_discard();
        // SAFETY: the sub-channel bound to `id` just stopped and the consumer does not touch
        // empty buffers.
        unsafe { buffer.clear() };
        self.channel.rearm(id, self.source, engine);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedEngine;

    /// Fake source register address
    const SOURCE: u32 = 0x4004_c00c;

    fn setup() -> (
        &'static AcquisitionChannel<4>,
        AcquisitionController<4>,
        SimulatedEngine,
    ) {
        let channel: &'static AcquisitionChannel<4> = Box::leak(Box::new(AcquisitionChannel::new()));
        let controller = AcquisitionController::new(channel, SOURCE);
        let mut engine = SimulatedEngine::default();
        controller.start(&mut engine);
        (channel, controller, engine)
    }

    #[test]
    fn start_runs_primary() {
        let (channel, _, engine) = setup();
        assert_eq!(engine.running(), Some(SubChannel::Primary));
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Filling);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Empty);
    }

    #[test]
    fn completion_hands_off_and_clears() {
        let (channel, controller, mut engine) = setup();
        engine.push_all([10, 20, 30, 40]);
        assert_eq!(engine.completed_sub_channel(), Some(SubChannel::Primary));

        controller.on_interrupt(&mut engine);
        assert_eq!(engine.completed_sub_channel(), None);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Full);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Filling);
        assert_eq!(engine.running(), Some(SubChannel::Alternate));
        assert_eq!(channel.buffer(BufferId::Ping).snapshot(), [10, 20, 30, 40]);
    }

    #[test]
    fn interrupt_without_completion_is_a_no_op() {
        let (channel, controller, mut engine) = setup();
        engine.push_all([1, 2]);
        controller.on_interrupt(&mut engine);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Filling);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Empty);
        assert!(channel.faults().snapshot().is_clean());
    }

    #[test]
    fn engine_fault_flags_window_for_discard() {
        let (channel, controller, mut engine) = setup();
        engine.push_all([1, 2]);
        engine.inject_fault();

        controller.on_interrupt(&mut engine);
        let faults = channel.faults().snapshot();
        assert_eq!(faults.engine_faults, 1);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Full);
        assert!(channel.buffer(BufferId::Ping).take_discard());
        // The other sub-channel keeps going
        assert_eq!(engine.running(), Some(SubChannel::Alternate));
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Filling);
    }

    #[test]
    fn unexpected_empty_completion_is_recycled_in_place() {
        let channel: &'static AcquisitionChannel<4> = Box::leak(Box::new(AcquisitionChannel::new()));
        let controller = AcquisitionController::new(channel, SOURCE);
        let mut engine = SimulatedEngine::default();
        // Misconfigured: the alternate sub-channel runs although ping is the filling buffer
        engine.configure_transfer(
            SubChannel::Alternate,
            channel.transfer_request(BufferId::Pong, SOURCE),
        );
        engine.enable(SubChannel::Alternate);
        engine.push_all([7, 7, 7, 7]);

        controller.on_interrupt(&mut engine);
        assert_eq!(channel.faults().snapshot().unexpected, 1);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Empty);
        assert_eq!(channel.buffer(BufferId::Pong).snapshot(), [0; 4]);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Filling);
        assert_eq!(engine.completed_sub_channel(), None);
    }

    #[test]
    fn recycled_window_does_not_keep_discard_flag() {
        let channel: &'static AcquisitionChannel<4> = Box::leak(Box::new(AcquisitionChannel::new()));
        let controller = AcquisitionController::new(channel, SOURCE);
        let mut engine = SimulatedEngine::default();
        channel.buffer(BufferId::Pong).set_discard();
        engine.configure_transfer(
            SubChannel::Alternate,
            channel.transfer_request(BufferId::Pong, SOURCE),
        );
        engine.enable(SubChannel::Alternate);
        engine.push_all([7, 7, 7, 7]);

        controller.on_interrupt(&mut engine);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Empty);
        assert!(!channel.buffer(BufferId::Pong).take_discard());
    }

    #[test]
    fn faults_on_both_sub_channels_are_taken_in_one_interrupt() {
        let (channel, controller, mut engine) = setup();
        engine.push_all([1, 2]);
        engine.inject_fault();
        engine.push(3);
        engine.inject_fault();
        assert_eq!(engine.running(), None);

        controller.on_interrupt(&mut engine);
        let faults = channel.faults().snapshot();
        assert_eq!(faults.engine_faults, 2);
        assert_eq!(faults.unexpected, 0);
        assert_eq!(engine.completed_sub_channel(), None);
        assert_eq!(channel.status(BufferId::Ping), BufferStatus::Full);
        assert_eq!(channel.status(BufferId::Pong), BufferStatus::Full);
        assert!(channel.buffer(BufferId::Ping).take_discard());
        assert!(channel.buffer(BufferId::Pong).take_discard());
    }
}
