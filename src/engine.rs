// SPDX-License-Identifier: Apache-2.0

//! The hardware boundary: a transfer engine which copies samples from a fixed source register into
//! whichever buffer its active sub-channel points at, without processor intervention.

use crate::buffer::Sample;

/// One of the two independently addressable halves of a ping-pong transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubChannel {
    /// Runs first after the transfer is started
    Primary,
    /// Takes over when [`SubChannel::Primary`] reaches its stop condition
    Alternate,
}

impl SubChannel {
    /// Both sub-channels, primary first
    pub const ALL: [SubChannel; 2] = [SubChannel::Primary, SubChannel::Alternate];

    /// The sub-channel which takes over when this one stops
    pub const fn other(self) -> Self {
        match self {
            SubChannel::Primary => SubChannel::Alternate,
            SubChannel::Alternate => SubChannel::Primary,
        }
    }

    /// Array index of this sub-channel
    pub const fn index(self) -> usize {
        match self {
            SubChannel::Primary => 0,
            SubChannel::Alternate => 1,
        }
    }
}

/// How the engine proceeds once a sub-channel reaches its stop condition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferMode {
    /// Stop this sub-channel and continue on the other one, if it is armed
    PingPong,
}

/// A transfer descriptor: copy `length` samples from `source` into `destination`.
///
/// Only [`AcquisitionChannel`](crate::channel::AcquisitionChannel) creates these, always pointing
/// into one of its `'static` buffers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Address of the hardware register samples are read from. Never incremented.
    pub source: u32,
    /// First slot of the destination buffer. Incremented per sample.
    pub destination: *mut Sample,
    /// Number of samples before the stop condition
    pub length: usize,
    /// Behaviour at the stop condition
    pub mode: TransferMode,
}

// SAFETY: the destination is a `'static` buffer whose access is arbitrated by its status tag.
unsafe impl Send for TransferRequest {}

/// A DMA engine (or a simulation of one) capable of ping-pong transfers.
///
/// Completion is latched per sub-channel until cleared. After a sub-channel completes it stays
/// stopped until it is configured and enabled again, so a completed buffer is never written to.
pub trait TransferEngine {
    /// Load a descriptor into `sub`. The sub-channel is left disabled.
    fn configure_transfer(&mut self, sub: SubChannel, request: TransferRequest);

    /// Arm `sub`. If no sub-channel is currently transferring, start on `sub` immediately;
    /// otherwise it starts when the running sub-channel reaches its stop condition.
    fn enable(&mut self, sub: SubChannel);

    /// A sub-channel which has reached its stop condition and not been cleared yet.
    fn completed_sub_channel(&self) -> Option<SubChannel>;

    /// Acknowledge the completion of `sub`
    fn clear_completion(&mut self, sub: SubChannel);

    /// Report and clear a bus fault, along with the sub-channel that raised it. One fault per
    /// call; both sub-channels may have faulted before the interrupt runs.
    fn take_fault(&mut self) -> Option<SubChannel>;
}
