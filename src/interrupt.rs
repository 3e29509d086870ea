//! Interrupt-shared state, plus static [`Mutex`]es for the firmware.

use core::cell::RefCell;
use critical_section::Mutex;

use crate::engine::{SubChannel, TransferEngine, TransferRequest};

/// Handle to an engine stored in a static [`Mutex`], so the consumer loop can drive the same
/// engine the completion interrupt uses. Every call takes its own critical section.
pub struct SharedEngine<E: 'static>(pub &'static Mutex<RefCell<Option<E>>>);

impl<E: 'static> SharedEngine<E> {
    /// Panic message raised if the engine was never installed
    pub const NO_ENGINE_PANIC_MSG: &'static str =
        "Transfer engine has not been initialized or is not currently available in mutex";

    /// Run `f` on the engine within a critical section
    fn with<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        critical_section::with(|cs| {
            let mut engine = self.0.borrow_ref_mut(cs);
            f(engine.as_mut().expect(Self::NO_ENGINE_PANIC_MSG))
        })
    }
}

impl<E: TransferEngine + 'static> TransferEngine for SharedEngine<E> {
    fn configure_transfer(&mut self, sub: SubChannel, request: TransferRequest) {
        self.with(|engine| engine.configure_transfer(sub, request))
    }

    fn enable(&mut self, sub: SubChannel) {
        self.with(|engine| engine.enable(sub))
    }

    fn completed_sub_channel(&self) -> Option<SubChannel> {
        self.with(|engine| engine.completed_sub_channel())
    }

    fn clear_completion(&mut self, sub: SubChannel) {
        self.with(|engine| engine.clear_completion(sub))
    }

    fn take_fault(&mut self) -> Option<SubChannel> {
        self.with(|engine| engine.take_fault())
    }
}

#[cfg(feature = "rp2040")]
pub use self::firmware::*;

/// Statics shared between `DMA_IRQ_0` and the main loop
#[cfg(feature = "rp2040")]
mod firmware {
    use core::cell::{Cell, RefCell};
    use critical_section::Mutex;

    use crate::{
        channel::AcquisitionChannel, config::BUFFER_SIZE, controller::AcquisitionController,
        rp2040::DmaEngine,
    };

    /// Ping and pong buffers
    pub static CHANNEL: AcquisitionChannel<BUFFER_SIZE> = AcquisitionChannel::new();

    /// DMA engine for access in interrupts
    pub static ENGINE: Mutex<RefCell<Option<DmaEngine>>> = Mutex::new(RefCell::new(None));

    /// Completion handler, installed once the source address is known
    pub static CONTROLLER: Mutex<Cell<Option<AcquisitionController<BUFFER_SIZE>>>> =
        Mutex::new(Cell::new(None));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::{AcquisitionChannel, BufferId},
        consumer::Consumer,
        controller::AcquisitionController,
        sim::SimulatedEngine,
    };

    static ENGINE: Mutex<RefCell<Option<SimulatedEngine>>> = Mutex::new(RefCell::new(None));
    static CHANNEL: AcquisitionChannel<4> = AcquisitionChannel::new();

    #[test]
    fn shared_engine_drives_pipeline() {
        let controller = AcquisitionController::new(&CHANNEL, 0);
        let mut consumer = Consumer::new(&CHANNEL, 0);
        let mut shared = SharedEngine(&ENGINE);
        critical_section::with(|cs| ENGINE.replace(cs, Some(SimulatedEngine::default())));
        controller.start(&mut shared);

        critical_section::with(|cs| {
            let mut engine = ENGINE.borrow_ref_mut(cs);
            let engine = engine.as_mut().unwrap();
            engine.push_all([2, 4, 6, 8]);
            controller.on_interrupt(engine);
        });

        let mut averages = Vec::new();
        assert_eq!(
            consumer.poll(&mut shared, &mut |report: &crate::consumer::Report| {
                averages.push(report.primary_average)
            }),
            1
        );
        assert_eq!(averages, [5]);
        assert_eq!(
            CHANNEL.status(BufferId::Ping),
            crate::buffer::BufferStatus::Empty
        );
    }
}
