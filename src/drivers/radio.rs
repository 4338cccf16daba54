//! Radio receiver input: pulse-width decoding and per-channel calibration.
//!
//! The receiver encodes each stick position as the high time of a PWM
//! channel. Edge timestamps come from a capture timer (board glue feeds them
//! in from interrupt context); everything downstream works on pulse widths
//! in µs.

use crate::state::RadioFrame;

pub const RADIO_CHANNELS: usize = 4;

/// Pulses at or below this width are treated as glitches and ignored by the
/// calibrator.
pub const MIN_VALID_PULSE_US: u16 = 100;

// ── Pulse decoder ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct EdgeState {
    awaiting_rising: bool,
    rising_val: u32,
}

impl Default for EdgeState {
    fn default() -> Self {
        Self {
            awaiting_rising: true,
            rising_val: 0,
        }
    }
}

/// Converts alternating rising/falling capture timestamps into per-channel
/// pulse widths. One decoder instance serves all four channels of the
/// capture timer.
pub struct PulseDecoder {
    timer_period: u32,
    edges: [EdgeState; RADIO_CHANNELS],
    widths: [u16; RADIO_CHANNELS],
}

impl PulseDecoder {
    /// `timer_period` is the capture timer's auto-reload value, needed to
    /// un-wrap pulses that straddle a counter overflow.
    pub fn new(timer_period: u32) -> Self {
        Self {
            timer_period,
            edges: [EdgeState::default(); RADIO_CHANNELS],
            widths: [0; RADIO_CHANNELS],
        }
    }

    /// Feed one captured counter value for `channel`. Edges alternate
    /// rising/falling per channel; a falling edge completes a pulse and
    /// yields a fresh frame holding the latest width of every channel.
    pub fn capture(&mut self, channel: usize, counter: u32) -> Option<RadioFrame> {
        let edge = &mut self.edges[channel];
        if edge.awaiting_rising {
            edge.rising_val = counter;
            edge.awaiting_rising = false;
            return None;
        }

        let width = if counter >= edge.rising_val {
            counter - edge.rising_val
        } else {
            // Counter wrapped between the two edges.
            (self.timer_period - edge.rising_val) + counter + 1
        };
        self.widths[channel] = width as u16;
        edge.awaiting_rising = true;

        Some(RadioFrame {
            widths: self.widths,
        })
    }
}

// ── Calibration / normalization ───────────────────────────────────────────────

/// Observed pulse-width bounds for one channel. Starts empty (`min > max`)
/// and only ever widens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for ChannelBounds {
    fn default() -> Self {
        Self {
            min: u32::MAX,
            max: 0,
        }
    }
}

/// Per-channel min/max pulse widths accumulated in Calibration mode.
///
/// Owned exclusively by the control engine; the board glue loads a persisted
/// copy at startup and writes it back when the engine leaves Calibration
/// mode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RadioCalibration {
    pub channels: [ChannelBounds; RADIO_CHANNELS],
}

const BLOB_MAGIC: u32 = 0x52434131; // "RCA1"

/// Serialized size of a calibration blob.
pub const CALIBRATION_BLOB_LEN: usize = 4 + RADIO_CHANNELS * 8;

impl RadioCalibration {
    /// Widen the observed bounds from one frame of raw widths. Widths at or
    /// below the glitch threshold leave the bounds untouched.
    pub fn update(&mut self, frame: &RadioFrame) {
        for (bounds, &width) in self.channels.iter_mut().zip(frame.widths.iter()) {
            if width > MIN_VALID_PULSE_US {
                let width = width as u32;
                if width < bounds.min {
                    bounds.min = width;
                }
                if width > bounds.max {
                    bounds.max = width;
                }
            }
        }
    }

    /// Normalize a raw width for `channel` into [0,1]. An uncalibrated
    /// channel (`max <= min`) reads as 0.0 by definition.
    pub fn normalize(&self, channel: usize, width: u16) -> f32 {
        let bounds = &self.channels[channel];
        if bounds.max <= bounds.min {
            return 0.0;
        }
        let span = (bounds.max - bounds.min) as f32;
        let offset = (width as u32).saturating_sub(bounds.min) as f32;
        (offset / span).clamp(0.0, 1.0)
    }

    /// Serialize for non-volatile storage.
    pub fn to_bytes(&self) -> [u8; CALIBRATION_BLOB_LEN] {
        let mut buf = [0u8; CALIBRATION_BLOB_LEN];
        buf[0..4].copy_from_slice(&BLOB_MAGIC.to_le_bytes());
        for (i, bounds) in self.channels.iter().enumerate() {
            let at = 4 + i * 8;
            buf[at..at + 4].copy_from_slice(&bounds.min.to_le_bytes());
            buf[at + 4..at + 8].copy_from_slice(&bounds.max.to_le_bytes());
        }
        buf
    }

    /// Deserialize a stored blob; `None` when the magic tag is missing
    /// (blank or foreign flash content).
    pub fn from_bytes(buf: &[u8; CALIBRATION_BLOB_LEN]) -> Option<Self> {
        let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != BLOB_MAGIC {
            return None;
        }
        let mut cal = Self::default();
        for (i, bounds) in cal.channels.iter_mut().enumerate() {
            let at = 4 + i * 8;
            bounds.min = u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
            bounds.max =
                u32::from_le_bytes([buf[at + 4], buf[at + 5], buf[at + 6], buf[at + 7]]);
        }
        Some(cal)
    }
}

/// Map a normalized radio value onto a mechanical angle range. The input is
/// clamped first: calibration drift can push a live width slightly outside
/// the recorded bounds.
pub fn map_radio(radio_val: f32, min_angle: f32, max_angle: f32) -> f32 {
    radio_val.clamp(0.0, 1.0) * (max_angle - min_angle) + min_angle
}

// ── Persistence seam ──────────────────────────────────────────────────────────

/// Non-volatile storage for the calibration blob (external flash, EEPROM
/// emulation, a file in the simulator).
pub trait CalibrationStore {
    type Error;

    fn load(&mut self) -> Result<Option<RadioCalibration>, Self::Error>;
    fn save(&mut self, calibration: &RadioCalibration) -> Result<(), Self::Error>;
}
