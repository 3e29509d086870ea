//! Continuous ADC acquisition into a pair of ping-pong DMA buffers.
//!
//! A timer-paced ADC feeds a transfer engine which fills one buffer while the other is drained by
//! the main loop. When a buffer fills, the completion interrupt
//! ([`AcquisitionController`](controller::AcquisitionController)) marks it full and hands the other
//! buffer to the engine. The main loop ([`Consumer`](consumer::Consumer)) averages full buffers,
//! clears them and re-arms them. Ownership of each buffer is tracked by an atomic status tag in
//! [`AcquisitionChannel`](channel::AcquisitionChannel); no locks are taken around the samples.
//!
//! ```text
//!           ┌──────── DMA ────────┐
//!  ADC FIFO ┤ primary → ping      ├─ DMA_IRQ_0 ─ AcquisitionController (Filling → Full)
//!           │ alternate → pong    │
//!           └─────────────────────┘      main loop ─ Consumer (Full → Empty, re-arm)
//! ```
//!
//! If the main loop falls behind and both buffers are full, capture stalls and samples are dropped
//! until a buffer is drained; see [`Handoff::Overrun`](channel::Handoff::Overrun). Faults never
//! cross the interrupt boundary as errors, they are counted in
//! [`FaultCounters`](channel::FaultCounters).
//!
//! ## Crate features
//!
//! - `defmt`: log through [`defmt`](https://docs.rs/defmt) instead of the [`log`] facade.
//! - `rp2040`: the [`rp2040::DmaEngine`], status LEDs and the firmware binary. Implies `defmt`.
//! - `trace_windows`: logs the contents of every drained window. Very noisy!
//!
//! ## Demo
//!
//! The following is a simplified version of the firmware binary (`src/main.rs`), without status
//! LEDs.
//!
//! ```no_run
//! #![no_std]
//! #![no_main]
//!
//! use pingpong_adc::{
//!     config::{AcquisitionConfig, ADC_CLOCK_HZ},
//!     consumer::{Consumer, Report},
//!     controller::AcquisitionController,
//!     interrupt::{SharedEngine, CHANNEL, CONTROLLER, ENGINE},
//!     rp2040::{adc_fifo_address, DmaEngine},
//! };
//! #[allow(unused_imports)]
//! use defmt_rtt as _;
//! #[allow(unused_imports)]
//! use panic_probe as _;
//! use rp2040_hal::{
//!     adc::{Adc, AdcPin},
//!     clocks::init_clocks_and_plls,
//!     dma::DMAExt,
//!     entry,
//!     gpio::Pins,
//!     pac,
//!     Sio, Watchdog,
//! };
//!
//! #[link_section = ".boot2"]
//! #[used]
//! pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
//!
//! #[entry]
//! fn main() -> ! {
//!     let mut pac = pac::Peripherals::take().unwrap();
//!     let mut watchdog = Watchdog::new(pac.WATCHDOG);
//!     let sio = Sio::new(pac.SIO);
//!     let _clocks = init_clocks_and_plls(
//!         12_000_000,
//!         pac.XOSC,
//!         pac.CLOCKS,
//!         pac.PLL_SYS,
//!         pac.PLL_USB,
//!         &mut pac.RESETS,
//!         &mut watchdog,
//!     )
//!     .ok()
//!     .unwrap();
//!     let pins = Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);
//!
//!     let mut adc = Adc::new(pac.ADC, &mut pac.RESETS);
//!     let mut adc_pin0 = AdcPin::new(pins.gpio26.into_floating_input()).unwrap();
//!     let dma = pac.DMA.split(&mut pac.RESETS);
//!
//!     let config = AcquisitionConfig::new(adc_fifo_address());
//!     let (int, frac) = config.clock_divider(ADC_CLOCK_HZ);
//!     let mut readings_fifo = adc
//!         .build_fifo()
//!         .set_channel(&mut adc_pin0)
//!         .clock_divider(int, frac)
//!         .enable_dma()
//!         .start_paused();
//!
//!     let controller = AcquisitionController::new(&CHANNEL, config.source_address);
//!     let mut engine = DmaEngine::new(dma.ch0, dma.ch1);
//!     controller.start(&mut engine);
//!     critical_section::with(|cs| {
//!         ENGINE.replace(cs, Some(engine));
//!         CONTROLLER.borrow(cs).set(Some(controller));
//!     });
//!     unsafe { pac::NVIC::unmask(pac::Interrupt::DMA_IRQ_0) }
//!     readings_fifo.resume();
//!
//!     let mut consumer = Consumer::new(&CHANNEL, config.source_address);
//!     let mut shared = SharedEngine(&ENGINE);
//!     loop {
//!         consumer.poll(&mut shared, &mut |report: &Report| defmt::info!("{}", report));
//!     }
//! }
//! ```

// Copyright 2024 The pingpong_adc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

#[macro_use]
mod fmt;

pub mod buffer;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod controller;
pub mod engine;
pub mod interrupt;

#[cfg(feature = "rp2040")]
pub mod components;
#[cfg(feature = "rp2040")]
pub mod rp2040;

#[cfg(test)]
mod sim;
