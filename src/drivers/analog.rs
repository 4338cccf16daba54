//! Analog sensor conditioning: wind vane, battery voltage and two spare
//! inputs, read as raw 12-bit ADC counts and scaled with per-input
//! gain/offset pairs.

use crate::drivers::filter::LowPassFilter;
use crate::state::AnalogData;

/// 1 / ((68/(220+68)) * (4096/3.3)), trimmed against a bench supply.
const BATTERY_VOLTAGE_GAIN: f32 = 0.00355;
const BATTERY_LPF_ALPHA: f32 = 0.1;

/// The ADC behind its DMA plumbing: one call yields the latest counts for
/// all four inputs.
pub trait AnalogSource {
    type Error;

    async fn read(&mut self) -> Result<[u16; 4], Self::Error>;
}

#[derive(Clone, Copy)]
pub struct Scaling {
    pub gain: f32,
    pub offset: f32,
}

impl Scaling {
    const fn unity() -> Self {
        Self {
            gain: 1.0,
            offset: 0.0,
        }
    }

    fn apply(&self, raw: u16) -> f32 {
        raw as f32 * self.gain - self.offset
    }
}

/// Converts raw counts into engineering units. The battery rail is noisy
/// (servo load spikes), so it gets a low-pass on top of the scaling.
pub struct AnalogConditioner {
    wind_direction: Scaling,
    battery_voltage: Scaling,
    extra1: Scaling,
    extra2: Scaling,
    battery_lpf: LowPassFilter,
}

impl AnalogConditioner {
    pub fn new() -> Self {
        Self {
            wind_direction: Scaling::unity(),
            battery_voltage: Scaling {
                gain: BATTERY_VOLTAGE_GAIN,
                offset: 0.0,
            },
            extra1: Scaling::unity(),
            extra2: Scaling::unity(),
            battery_lpf: LowPassFilter::new(BATTERY_LPF_ALPHA),
        }
    }

    pub fn convert(&mut self, raw: [u16; 4]) -> AnalogData {
        AnalogData {
            wind_direction: self.wind_direction.apply(raw[0]),
            battery_voltage: self.battery_lpf.filter(self.battery_voltage.apply(raw[1])),
            extra1: self.extra1.apply(raw[2]),
            extra2: self.extra2.apply(raw[3]),
        }
    }
}

impl Default for AnalogConditioner {
    fn default() -> Self {
        Self::new()
    }
}
