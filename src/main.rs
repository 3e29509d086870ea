//! Samples ADC0 (GPIO26) continuously into ping-pong DMA buffers and prints the average of every
//! window over defmt.
#![no_std]
#![no_main]
#![doc(html_playground_url = "https://play.rust-lang.org/")]
#![warn(missing_docs)]

use defmt::{debug, info, warn};
#[allow(unused_imports)]
use defmt_rtt as _;
#[allow(unused_imports)]
use panic_probe as _;
use pingpong_adc::{
    components::StatusLeds,
    config::{AcquisitionConfig, ADC_CLOCK_HZ, BUFFER_SIZE},
    consumer::{Consumer, Report},
    controller::AcquisitionController,
    interrupt::{SharedEngine, CHANNEL, CONTROLLER, ENGINE},
    rp2040::{adc_fifo_address, DmaEngine},
};
use rp2040_hal::{
    adc::{Adc, AdcPin},
    clocks::init_clocks_and_plls,
    dma::DMAExt,
    entry,
    gpio::Pins,
    pac::{self, interrupt},
    prelude::*,
    Sio, Watchdog,
};

/// Second-stage bootloader, from [rp2040-boot2](https://docs.rs/rp2040-boot2)
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
/// External high-speed crystal on the pico board is 12Mhz
pub const XOSC_FREQ_HZ: u32 = 12_000_000;

/// Main operation loop
#[entry]
fn main() -> ! {
    info!("Ping-pong ADC startup");
    let mut pac = pac::Peripherals::take().expect("Peripherals already taken");
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let sio = Sio::new(pac.SIO);

    let clocks = init_clocks_and_plls(
        XOSC_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .expect("Unable to initialize clocks and PLLs");
    let adc_clock_hz = clocks.adc_clock.freq().to_Hz();
    if adc_clock_hz != ADC_CLOCK_HZ {
        warn!(
            "ADC clock runs at {=u32} Hz instead of {=u32} Hz",
            adc_clock_hz, ADC_CLOCK_HZ
        );
    }
    let pins = Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    let mut status_leds = StatusLeds::init(pins.gpio6, pins.gpio7, pins.gpio8);

    // Setup ADC pins, DMA
    let mut adc = Adc::new(pac.ADC, &mut pac.RESETS);
    let mut adc_pin0 = AdcPin::new(pins.gpio26.into_floating_input())
        .ok()
        .expect("GPIO26 is not an ADC pin");
    let dma = pac.DMA.split(&mut pac.RESETS);

    let config = AcquisitionConfig::new(adc_fifo_address());
    // Ex. 48 MHz ADC clock at 16 ksamples/s -> conversion every 3000 clk cycles
    let (div_int, div_frac) = config.clock_divider(adc_clock_hz);
    info!(
        "Sampling at {=u32} Hz, {=usize} samples per window ({=u64} us)",
        config.sample_rate_hz,
        BUFFER_SIZE,
        config.window_period_us(BUFFER_SIZE)
    );
    let mut readings_fifo = adc
        .build_fifo()
        .set_channel(&mut adc_pin0)
        .clock_divider(div_int, div_frac)
        .enable_dma()
        .start_paused();

    // Arm both descriptors before the FIFO produces anything
    let controller = AcquisitionController::new(&CHANNEL, config.source_address);
    let mut engine = DmaEngine::new(dma.ch0, dma.ch1);
    controller.start(&mut engine);
    debug!("critical_section: transfer DMA engine and controller to mutex");
    critical_section::with(|cs| {
        ENGINE.replace(cs, Some(engine));
        CONTROLLER.borrow(cs).set(Some(controller));
    });
    unsafe { cortex_m::peripheral::NVIC::unmask(pac::Interrupt::DMA_IRQ_0) }
    readings_fifo.resume();

    info!("primary avg\talternate avg\ttotal samples");
    let mut consumer = Consumer::new(&CHANNEL, config.source_address);
    let mut shared_engine = SharedEngine(&ENGINE);
    let mut console = |report: &Report| {
        info!(
            "{=u16}\t{=u16}\t{=u64}",
            report.primary_average, report.alternate_average, report.samples_taken
        )
    };
    loop {
        if consumer.poll(&mut shared_engine, &mut console) > 0 {
            status_leds.update(&consumer.report().faults);
        }
    }
}

/// Completion and bus-error interrupt of DMA channels 0 and 1
#[interrupt]
fn DMA_IRQ_0() {
    critical_section::with(|cs| {
        let Some(controller) = CONTROLLER.borrow(cs).get() else {
            return;
        };
        if let Some(engine) = ENGINE.borrow_ref_mut(cs).as_mut() {
            controller.on_interrupt(engine);
        }
    });
}
