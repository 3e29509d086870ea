//! Acquisition parameters.

/// Samples per window, per buffer
pub const BUFFER_SIZE: usize = 256;

/// Default sampling rate
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// ADC clock on the RP2040 (USB PLL)
pub const ADC_CLOCK_HZ: u32 = 48_000_000;

/// Where samples come from and how fast they arrive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    /// Address of the register every transfer reads from
    pub source_address: u32,
    /// Rate of the trigger pacing conversions
    pub sample_rate_hz: u32,
}

impl AcquisitionConfig {
    /// Source at `source_address`, sampled at [`SAMPLE_RATE_HZ`]
    pub const fn new(source_address: u32) -> Self {
        Self {
            source_address,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }

    /// Override the sampling rate
    pub const fn with_sample_rate(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    /// Integer and fractional (1/256) parts of the ADC clock divider for this rate.
    ///
    /// Conversions start every `1 + int + frac / 256` ADC clock cycles. A conversion takes 96
    /// cycles, so faster rates fall back to `(0, 0)`, which runs conversions back to back.
    pub fn clock_divider(&self, adc_clock_hz: u32) -> (u16, u8) {
        if self.sample_rate_hz == 0 {
            return (u16::MAX, u8::MAX);
        }
        let period = (adc_clock_hz as u64 * 256) / self.sample_rate_hz as u64;
        let Some(divider) = period.checked_sub(256) else {
            return (0, 0);
        };
        if divider < 95 * 256 {
            return (0, 0);
        }
        let int = (divider >> 8).min(u16::MAX as u64) as u16;
        (int, (divider & 0xff) as u8)
    }

    /// Time to fill one window of `samples`, in microseconds
    pub fn window_period_us(&self, samples: usize) -> u64 {
        if self.sample_rate_hz == 0 {
            return u64::MAX;
        }
        samples as u64 * 1_000_000 / self.sample_rate_hz as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_for_default_rate() {
        let config = AcquisitionConfig::new(0);
        assert_eq!(config.clock_divider(ADC_CLOCK_HZ), (2999, 0));
        assert_eq!(config.window_period_us(BUFFER_SIZE), 16_000);
    }

    #[test]
    fn divider_keeps_fraction() {
        // 48 MHz / 7 kHz = 6857.14 cycles
        let config = AcquisitionConfig::new(0).with_sample_rate(7_000);
        assert_eq!(config.clock_divider(ADC_CLOCK_HZ), (6856, 36));
    }

    #[test]
    fn divider_saturates_at_max_speed() {
        let config = AcquisitionConfig::new(0).with_sample_rate(1_000_000);
        assert_eq!(config.clock_divider(ADC_CLOCK_HZ), (0, 0));
    }
}
