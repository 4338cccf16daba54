//! Shared state types for inter-task communication via mailboxes.
//!
//! All types are `Copy` to minimise overhead when sent through mailboxes.

// ── Data types ────────────────────────────────────────────────────────────────

/// Raw radio pulse widths in µs, one slot per receiver channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RadioFrame {
    pub widths: [u16; 4],
}

/// Conditioned ADC readings.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnalogData {
    pub wind_direction: f32,
    pub battery_voltage: f32,
    pub extra1: f32,
    pub extra2: f32,
}

/// One IMU snapshot. Orientation in degrees, rates in deg/s, acceleration in
/// m/s² (gravity-compensated), magnetometer in µT. `speed` is the integrated
/// scalar speed estimate, see `drivers::imu::SpeedEstimator`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImuSample {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub mag: [f32; 3],
    pub speed: f32,
}

/// IMU snapshot plus the sensor health flag the control engine gates the
/// auto modes on.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImuUpdate {
    pub sample: ImuSample,
    pub healthy: bool,
}

/// Mechanical angle commands for the four control surfaces, produced once
/// per control cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlOutput {
    pub rudder: f32,
    pub twist: f32,
    pub trim: f32,
    pub extra: f32,
}

/// Externally-mutable configuration, assembled by the command task from
/// inbound telemetry lines and drained once per control cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigUpdate {
    /// Requested mode as a raw integer (`MOD` key, float truncated).
    /// See `control::ControlMode::from_raw`.
    pub mode_raw: i32,

    // Direct servo-angle overrides, applied only in Calibration mode.
    pub rudder_servo_angle: f32,
    pub trim_servo_angle: f32,
    pub twist_servo_angle: f32,
    pub extra_servo_angle: f32,

    pub kp_roll: f32,
    pub ki_roll: f32,
    pub kp_yaw: f32,
    pub ki_yaw: f32,
}

impl Default for ConfigUpdate {
    fn default() -> Self {
        Self {
            mode_raw: crate::control::ControlMode::DirectInput.as_raw(),
            rudder_servo_angle: 0.0,
            trim_servo_angle: 0.0,
            twist_servo_angle: 0.0,
            extra_servo_angle: 0.0,
            kp_roll: 1.0,
            ki_roll: 0.1,
            kp_yaw: 1.0,
            ki_yaw: 0.1,
        }
    }
}

/// Scheduler run-time counters used to derive the CPU telemetry value.
/// Produced by the board glue from whatever run-time accounting the
/// executor provides.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuStats {
    pub idle_time: u32,
    pub total_time: u32,
}

impl CpuStats {
    /// CPU utilisation percentage; `None` until any time has been accounted.
    pub fn usage_percent(&self) -> Option<f32> {
        if self.total_time == 0 {
            return None;
        }
        let idle = (self.idle_time as f32 * 100.0) / self.total_time as f32;
        Some(100.0 - idle)
    }
}
