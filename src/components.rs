//! Basic component structs
use embedded_hal::digital::{OutputPin, PinState};
use rp2040_hal::gpio::{
    bank0::{Gpio6, Gpio7, Gpio8},
    FunctionNull, FunctionSio, Pin, PullDown, SioOutput,
};

use crate::channel::FaultReport;

/// All states for LEDs
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusLedStates {
    /// Green: no faults so far
    Normal,
    /// Yellow: windows have been dropped because the consumer fell behind
    Alert,
    /// Red: the engine reported a bus error or an unexpected completion
    Error,
}

impl StatusLedStates {
    /// Most severe state described by the fault counters
    pub fn from_faults(faults: &FaultReport) -> Self {
        if faults.engine_faults > 0 || faults.unexpected > 0 {
            StatusLedStates::Error
        } else if faults.overruns > 0 {
            StatusLedStates::Alert
        } else {
            StatusLedStates::Normal
        }
    }
}

/// Controls the status LEDs on separate pins
pub struct StatusLeds {
    /// Current LED state
    pub state: StatusLedStates,
    normal_led: Pin<Gpio6, FunctionSio<SioOutput>, PullDown>,
    alert_led: Pin<Gpio7, FunctionSio<SioOutput>, PullDown>,
    error_led: Pin<Gpio8, FunctionSio<SioOutput>, PullDown>,
}

impl StatusLeds {
    /// Take the LED pins, starting in [`StatusLedStates::Normal`]
    pub fn init(
        normal_led: Pin<Gpio6, FunctionNull, PullDown>,
        alert_led: Pin<Gpio7, FunctionNull, PullDown>,
        error_led: Pin<Gpio8, FunctionNull, PullDown>,
    ) -> Self {
        Self {
            state: StatusLedStates::Normal,
            normal_led: normal_led.into_push_pull_output_in_state(PinState::High),
            alert_led: alert_led.into_push_pull_output_in_state(PinState::Low),
            error_led: error_led.into_push_pull_output_in_state(PinState::Low),
        }
    }

    /// Show the state matching `faults`. Only touches the pins when the state changes.
    pub fn update(&mut self, faults: &FaultReport) {
        let state = StatusLedStates::from_faults(faults);
        if state == self.state {
            return;
        }
        debug!("Status LEDs: {:?} -> {:?}", self.state, state);

        // Pin errors are infallible on the RP2040
        let _ = self
            .normal_led
            .set_state((state == StatusLedStates::Normal).into());
        let _ = self
            .alert_led
            .set_state((state == StatusLedStates::Alert).into());
        let _ = self
            .error_led
            .set_state((state == StatusLedStates::Error).into());
        self.state = state;
    }
}
