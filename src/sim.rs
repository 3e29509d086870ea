//! Software transfer engine for host tests. Writes through the descriptor pointers exactly like
//! the DMA would, one sample per [`SimulatedEngine::push`].

use crate::{
    buffer::Sample,
    engine::{SubChannel, TransferEngine, TransferRequest},
};

/// Per sub-channel descriptor state
#[derive(Default, Clone, Copy)]
struct Slot {
    /// Loaded descriptor
    request: Option<TransferRequest>,
    /// Samples written so far
    written: usize,
    /// Armed and not yet stopped
    enabled: bool,
    /// Completion latched until cleared
    completed: bool,
}

/// Simulated ping-pong DMA engine
#[derive(Default)]
pub(crate) struct SimulatedEngine {
    /// Primary and alternate
    slots: [Slot; 2],
    /// Sub-channel currently transferring
    running: Option<SubChannel>,
    /// Pending faults, per sub-channel
    faults: [bool; 2],
    /// Samples which arrived while no sub-channel was running
    pub(crate) dropped: usize,
}

impl SimulatedEngine {
    /// Sub-channel currently transferring
    pub(crate) fn running(&self) -> Option<SubChannel> {
        self.running
    }

    /// Deliver one sample from the source register. Returns whether it was stored.
    pub(crate) fn push(&mut self, sample: Sample) -> bool {
        let Some(sub) = self.running else {
            self.dropped += 1;
            return false;
        };
        let slot = &mut self.slots[sub.index()];
        let request = slot.request.expect("running sub-channel without descriptor");
        assert!(slot.written < request.length, "write past end of buffer");
        unsafe { request.destination.add(slot.written).write_volatile(sample) };
        slot.written += 1;
        if slot.written == request.length {
            self.stop(sub);
        }
        true
    }

    /// Deliver a whole sequence
    pub(crate) fn push_all(&mut self, samples: impl IntoIterator<Item = Sample>) {
        for sample in samples {
            self.push(sample);
        }
    }

    /// Bus error on the running sub-channel: it halts early and raises its completion
    pub(crate) fn inject_fault(&mut self) {
        if let Some(sub) = self.running {
            self.faults[sub.index()] = true;
            self.stop(sub);
        }
    }

    /// Stop condition reached on `sub`: latch completion and hand over if possible
    fn stop(&mut self, sub: SubChannel) {
        let slot = &mut self.slots[sub.index()];
        slot.enabled = false;
        slot.completed = true;
        let other = &self.slots[sub.other().index()];
        self.running = (other.enabled && other.request.is_some()).then_some(sub.other());
    }
}

impl TransferEngine for SimulatedEngine {
    fn configure_transfer(&mut self, sub: SubChannel, request: TransferRequest) {
        let slot = &mut self.slots[sub.index()];
        slot.request = Some(request);
        slot.written = 0;
        slot.enabled = false;
    }

    fn enable(&mut self, sub: SubChannel) {
        let slot = &mut self.slots[sub.index()];
        slot.enabled = true;
        if self.running.is_none() && slot.request.is_some() {
            self.running = Some(sub);
        }
    }

    fn completed_sub_channel(&self) -> Option<SubChannel> {
        SubChannel::ALL
            .into_iter()
            .find(|sub| self.slots[sub.index()].completed)
    }

    fn clear_completion(&mut self, sub: SubChannel) {
        self.slots[sub.index()].completed = false;
    }

    fn take_fault(&mut self) -> Option<SubChannel> {
        let sub = SubChannel::ALL
            .into_iter()
            .find(|sub| self.faults[sub.index()])?;
        self.faults[sub.index()] = false;
        Some(sub)
    }
}
