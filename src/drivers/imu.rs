//! IMU adapter: sensor seam plus the derived scalar speed estimate.
//!
//! The fused sensor itself (orientation, rates, acceleration, magnetometer)
//! lives behind `ImuSensor`; this module owns what the firmware derives from
//! it.

use micromath::F32Ext;

use crate::drivers::filter::LowPassFilter;
use crate::state::ImuSample;

/// Gravity magnitude subtracted from the acceleration norm, m/s².
const GRAVITY_MS2: f32 = 9.81;
/// Below this residual acceleration the boat is considered stationary and
/// the integrated speed is zeroed, so the estimate cannot wander off during
/// calm stretches.
const SPEED_RESET_THRESHOLD_MS2: f32 = 0.3;
/// Smoothing factor for the published speed value.
const SPEED_LPF_ALPHA: f32 = 0.9;

// ── Sensor seam ───────────────────────────────────────────────────────────────

/// The fused IMU, e.g. a BNO055 behind I2C. `init` may be retried; `read`
/// errors mark the sensor unhealthy until an `init` succeeds again.
pub trait ImuSensor {
    type Error;

    async fn init(&mut self) -> Result<(), Self::Error>;

    /// One full snapshot: orientation (deg), rates (deg/s), acceleration
    /// (m/s², gravity-compensated), magnetometer (µT).
    async fn read(&mut self) -> Result<ImuReading, Self::Error>;
}

/// Raw quantities produced by the sensor; `ImuSample` adds derived state.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImuReading {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub mag: [f32; 3],
}

// ── Speed estimator ───────────────────────────────────────────────────────────

/// Low-pass-filtered integral of the residual acceleration magnitude.
///
/// Crude but good enough as a telemetry signal: |a| − g integrates into a
/// speed that hard-resets to zero whenever the residual drops under the
/// stationary threshold.
pub struct SpeedEstimator {
    speed: f32,
    lpf: LowPassFilter,
    last_tick_ms: u64,
}

impl SpeedEstimator {
    pub fn new() -> Self {
        Self {
            speed: 0.0,
            lpf: LowPassFilter::new(SPEED_LPF_ALPHA),
            last_tick_ms: 0,
        }
    }

    /// Advance the estimate with one accelerometer sample taken at `now_ms`.
    pub fn update(&mut self, now_ms: u64, accel: [f32; 3]) -> f32 {
        let dt = if self.last_tick_ms != 0 {
            now_ms.saturating_sub(self.last_tick_ms) as f32 * 1e-3
        } else {
            0.0
        };
        self.last_tick_ms = now_ms;

        let magnitude =
            (accel[0] * accel[0] + accel[1] * accel[1] + accel[2] * accel[2]).sqrt() - GRAVITY_MS2;
        self.speed += magnitude * dt;
        if magnitude < SPEED_RESET_THRESHOLD_MS2 {
            self.speed = 0.0;
        }

        self.lpf.filter(self.speed)
    }
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble the published sample from a raw reading and the running speed
/// estimate.
pub fn build_sample(reading: &ImuReading, speed: f32) -> ImuSample {
    ImuSample {
        roll: reading.roll,
        pitch: reading.pitch,
        yaw: reading.yaw,
        accel: reading.accel,
        gyro: reading.gyro,
        mag: reading.mag,
        speed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_sensor_reads_zero_speed() {
        let mut est = SpeedEstimator::new();
        // 1 g straight down, no residual.
        let mut now = 1;
        for _ in 0..10 {
            let speed = est.update(now, [0.0, 0.0, 9.81]);
            assert_eq!(speed, 0.0);
            now += 10;
        }
    }

    #[test]
    fn sustained_acceleration_integrates_up() {
        let mut est = SpeedEstimator::new();
        let accel = [0.0, 0.0, 9.81 + 2.0]; // 2 m/s² residual
        let mut now = 1;
        let mut last = 0.0;
        for _ in 0..100 {
            last = est.update(now, accel);
            now += 10;
        }
        // ~2 m/s² for ~1 s, smoothed.
        assert!(last > 1.0 && last < 2.5, "speed estimate was {last}");
    }

    #[test]
    fn first_update_adds_no_integral() {
        let mut est = SpeedEstimator::new();
        let speed = est.update(1_000_000, [0.0, 0.0, 9.81 + 5.0]);
        assert_eq!(speed, 0.0);
    }

    #[test]
    fn residual_below_threshold_resets_speed() {
        let mut est = SpeedEstimator::new();
        let mut now = 1;
        for _ in 0..50 {
            est.update(now, [0.0, 0.0, 9.81 + 2.0]);
            now += 10;
        }
        // Drop to rest: the integrator snaps back to zero and the filter
        // drains toward it.
        let mut speed = f32::MAX;
        for _ in 0..80 {
            speed = est.update(now, [0.0, 0.0, 9.81]);
            now += 10;
        }
        assert!(speed < 0.01, "speed did not decay, still {speed}");
    }
}
