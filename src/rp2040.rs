// SPDX-License-Identifier: Apache-2.0

//! [`TransferEngine`] over two RP2040 DMA channels chained to each other.
//!
//! Channel 0 is the primary sub-channel and channel 1 the alternate. Each one triggers the other
//! when its transfer count runs out, and both raise `DMA_IRQ_0` on completion. The RP2040 has no
//! stop mode, so a completed channel is disabled when its completion is cleared; otherwise the
//! next chain trigger would reload its count and write past the end of its buffer.

use rp2040_hal::{
    dma::{Channel, SingleChannel, CH0, CH1},
    pac,
};

use crate::engine::{SubChannel, TransferEngine, TransferRequest};

/// DREQ number of the ADC FIFO
const DREQ_ADC: u32 = 36;

/// Offset of the `FIFO` register in the ADC block
const ADC_FIFO_OFFSET: u32 = 0x0c;

/// Address of the ADC result FIFO, the source register of every transfer
pub fn adc_fifo_address() -> u32 {
    pac::ADC::ptr() as u32 + ADC_FIFO_OFFSET
}

/// Bits of `CHx_CTRL_TRIG`
mod ctrl {
    /// Channel responds to triggers
    pub const EN: u32 = 1 << 0;
    /// 16-bit transfers
    pub const DATA_SIZE_HALFWORD: u32 = 1 << 2;
    /// Write address increments after each transfer
    pub const INCR_WRITE: u32 = 1 << 5;
    /// Channel triggered on completion
    pub const CHAIN_TO_SHIFT: u32 = 11;
    /// Transfer request pacing the channel
    pub const TREQ_SEL_SHIFT: u32 = 15;
    /// Transfer in progress
    pub const BUSY: u32 = 1 << 24;
    /// Write bus error, write 1 to clear
    pub const WRITE_ERROR: u32 = 1 << 29;
    /// Read bus error, write 1 to clear
    pub const READ_ERROR: u32 = 1 << 30;
    /// Logical OR of the error flags
    pub const AHB_ERROR: u32 = 1 << 31;
}

/// Ping-pong DMA engine on channels 0 and 1.
pub struct DmaEngine {
    /// Ownership of channel 0
    _primary: Channel<CH0>,
    /// Ownership of channel 1
    _alternate: Channel<CH1>,
    /// Source pacing request
    treq: u32,
    /// Completions raised in software after a bus error, one bit per sub-channel
    faulted: u8,
}

impl DmaEngine {
    /// Take over both channels for transfers paced by the ADC FIFO
    pub fn new(mut primary: Channel<CH0>, mut alternate: Channel<CH1>) -> Self {
        primary.enable_irq0();
        alternate.enable_irq0();
        Self {
            _primary: primary,
            _alternate: alternate,
            treq: DREQ_ADC,
            faulted: 0,
        }
    }

    /// DMA register block
    fn regs() -> &'static pac::dma::RegisterBlock {
        // SAFETY: only the registers of channels 0 and 1 are touched, which this engine owns
        unsafe { &*pac::DMA::ptr() }
    }

    /// Register index of a sub-channel's DMA channel
    const fn channel(sub: SubChannel) -> usize {
        sub.index()
    }

    /// Control word for `sub`, optionally enabled
    fn ctrl(&self, sub: SubChannel, enable: bool) -> u32 {
        let mut ctrl = ctrl::DATA_SIZE_HALFWORD
            | ctrl::INCR_WRITE
            | (Self::channel(sub.other()) as u32) << ctrl::CHAIN_TO_SHIFT
            | self.treq << ctrl::TREQ_SEL_SHIFT;
        if enable {
            ctrl |= ctrl::EN;
        }
        ctrl
    }

    /// Write the control word without triggering the channel
    fn write_ctrl(&self, sub: SubChannel, ctrl: u32) {
        Self::regs()
            .ch(Self::channel(sub))
            .ch_al1_ctrl()
            .write(|w| unsafe { w.bits(ctrl) });
    }

    /// Whether the channel behind `sub` is transferring
    fn is_busy(sub: SubChannel) -> bool {
        Self::regs()
            .ch(Self::channel(sub))
            .ch_ctrl_trig()
            .read()
            .bits()
            & ctrl::BUSY
            != 0
    }
}

impl TransferEngine for DmaEngine {
    fn configure_transfer(&mut self, sub: SubChannel, request: TransferRequest) {
        let ch = Self::regs().ch(Self::channel(sub));
        self.write_ctrl(sub, self.ctrl(sub, false));
        ch.ch_read_addr().write(|w| unsafe { w.bits(request.source) });
        ch.ch_write_addr()
            .write(|w| unsafe { w.bits(request.destination as u32) });
        ch.ch_trans_count()
            .write(|w| unsafe { w.bits(request.length as u32) });
    }

    fn enable(&mut self, sub: SubChannel) {
        self.write_ctrl(sub, self.ctrl(sub, true));
        // Enabled before checking: if the other channel finishes after the check, its chain
        // trigger is accepted; if it finished before, nothing is running and we start here.
        if !Self::is_busy(sub) && !Self::is_busy(sub.other()) {
            Self::regs()
                .multi_chan_trigger()
                .write(|w| unsafe { w.bits(1 << Self::channel(sub)) });
        }
    }

    fn completed_sub_channel(&self) -> Option<SubChannel> {
        let pending = Self::regs().ints0().read().bits() | self.faulted as u32;
        SubChannel::ALL
            .into_iter()
            .find(|&sub| pending & (1 << Self::channel(sub)) != 0)
    }

    fn clear_completion(&mut self, sub: SubChannel) {
        self.write_ctrl(sub, self.ctrl(sub, false));
        self.faulted &= !(1 << Self::channel(sub));
        Self::regs()
            .ints0()
            .write(|w| unsafe { w.bits(1 << Self::channel(sub)) });
    }

    fn take_fault(&mut self) -> Option<SubChannel> {
        let sub = SubChannel::ALL.into_iter().find(|&sub| {
            Self::regs().ch(Self::channel(sub)).ch_ctrl_trig().read().bits() & ctrl::AHB_ERROR != 0
        })?;

        // A faulted channel halts without chaining: raise its completion and hand over.
        self.write_ctrl(
            sub,
            self.ctrl(sub, false) | ctrl::READ_ERROR | ctrl::WRITE_ERROR,
        );
        self.faulted |= 1 << Self::channel(sub);
        let other = Self::regs().ch(Self::channel(sub.other())).ch_ctrl_trig().read().bits();
        if other & ctrl::EN != 0 && other & ctrl::BUSY == 0 {
            Self::regs()
                .multi_chan_trigger()
                .write(|w| unsafe { w.bits(1 << Self::channel(sub.other())) });
        }
        Some(sub)
    }
}
