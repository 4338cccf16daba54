//! Control engine: mode state machine and per-cycle control dispatch.
//!
//! Owns all mutable control state. The control task feeds it drained
//! mailbox values once per cycle and acts on the returned `CycleOutcome`;
//! the engine itself does no I/O.

use crate::drivers::pi::PiController;
use crate::drivers::radio::{map_radio, RadioCalibration};
use crate::drivers::servo::{
    EXTRA_MAX_ANGLE, EXTRA_MIN_ANGLE, RUDDER_MAX_ANGLE, RUDDER_MIN_ANGLE, TRIM_MAX_ANGLE,
    TRIM_MIN_ANGLE, TWIST_MAX_ANGLE, TWIST_MIN_ANGLE,
};
use crate::state::{ConfigUpdate, ControlOutput, ImuUpdate, RadioFrame};

// ── Modes ─────────────────────────────────────────────────────────────────────

/// Steady operating modes. Reset is deliberately not here: it is a one-shot
/// command (`MODE_RESET_RAW`), never a state the engine can sit in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    Calibration,
    DirectInput,
    Auto1,
    Auto2,
    Auto3,
    Auto4,
}

/// Raw `MOD` value that requests a full system restart.
pub const MODE_RESET_RAW: i32 = 5;

impl ControlMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(Self::Calibration),
            0 => Some(Self::DirectInput),
            1 => Some(Self::Auto1),
            2 => Some(Self::Auto2),
            3 => Some(Self::Auto3),
            4 => Some(Self::Auto4),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Calibration => -1,
            Self::DirectInput => 0,
            Self::Auto1 => 1,
            Self::Auto2 => 2,
            Self::Auto3 => 3,
            Self::Auto4 => 4,
        }
    }
}

// ── Cycle outcome ─────────────────────────────────────────────────────────────

/// Direct servo-angle overrides applied in Calibration mode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ServoOverrides {
    pub rudder: f32,
    pub trim: f32,
    pub twist: f32,
    pub extra: f32,
}

/// What the control task must do with the servos this cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CycleOutcome {
    /// Restart the whole system, unconditionally. Short-circuits the cycle.
    Reset,
    /// Calibration mode: drive raw servo angles, skip control entirely.
    Calibrate(ServoOverrides),
    /// Normal operation: drive mechanical angles and publish them.
    Drive(ControlOutput),
    /// Fail-safe: stop all PWM, publish nothing.
    Disabled,
}

// ── Setpoint ranges ───────────────────────────────────────────────────────────

/// Yaw-rate command range mapped onto the stick in Auto2/Auto3, deg/s.
const MIN_YAW_RATE: f32 = -5.0;
const MAX_YAW_RATE: f32 = 5.0;

/// Roll error band inside which the roll integrator is cleared, degrees.
const ROLL_RESET_DEADBAND_DEG: f32 = 1.0;

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct ControlEngine {
    mode: ControlMode,
    calibration: RadioCalibration,
    calibration_dirty: bool,

    radio: RadioFrame,
    imu: crate::state::ImuSample,
    imu_healthy: bool,

    overrides: ServoOverrides,

    /// Roll-stabilization loop; actuates twist.
    roll_pi: PiController,
    /// Yaw-rate-tracking loop; actuates the rudder.
    yaw_pi: PiController,
}

impl ControlEngine {
    pub fn new() -> Self {
        Self::with_calibration(RadioCalibration::default())
    }

    /// Start from a calibration restored out of non-volatile storage.
    pub fn with_calibration(calibration: RadioCalibration) -> Self {
        let defaults = ConfigUpdate::default();
        Self {
            mode: ControlMode::DirectInput,
            calibration,
            calibration_dirty: false,
            radio: RadioFrame::default(),
            imu: crate::state::ImuSample::default(),
            imu_healthy: false,
            overrides: ServoOverrides::default(),
            roll_pi: PiController::new(
                defaults.kp_roll,
                defaults.ki_roll,
                TWIST_MIN_ANGLE,
                TWIST_MAX_ANGLE,
                Some(ROLL_RESET_DEADBAND_DEG),
            ),
            yaw_pi: PiController::new(
                defaults.kp_yaw,
                defaults.ki_yaw,
                RUDDER_MIN_ANGLE,
                RUDDER_MAX_ANGLE,
                None,
            ),
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn calibration(&self) -> &RadioCalibration {
        &self.calibration
    }

    /// Calibration snapshot to persist, handed out once per edit session
    /// (set when the engine leaves Calibration mode).
    pub fn take_calibration_to_save(&mut self) -> Option<RadioCalibration> {
        if self.calibration_dirty {
            self.calibration_dirty = false;
            Some(self.calibration)
        } else {
            None
        }
    }

    /// One control cycle. `now_ms` is the monotonic millisecond tick; the
    /// three options are whatever the task drained from its mailboxes this
    /// iteration (at most one value each, latest wins).
    pub fn cycle(
        &mut self,
        now_ms: u64,
        config: Option<ConfigUpdate>,
        radio: Option<RadioFrame>,
        imu: Option<ImuUpdate>,
    ) -> CycleOutcome {
        // 1) Adopt config: mode transition, reset, gain retune.
        let mut invalid_mode_requested = false;
        if let Some(cfg) = config {
            if cfg.mode_raw == MODE_RESET_RAW {
                return CycleOutcome::Reset;
            }
            match ControlMode::from_raw(cfg.mode_raw) {
                Some(new_mode) => {
                    if self.mode == ControlMode::Calibration && new_mode != ControlMode::Calibration
                    {
                        self.calibration_dirty = true;
                    }
                    self.mode = new_mode;
                }
                // Mode is retained, but this cycle fails safe (see below).
                None => invalid_mode_requested = true,
            }
            // Gains apply on the next controller update regardless of mode.
            self.roll_pi.set_gains(cfg.kp_roll, cfg.ki_roll);
            self.yaw_pi.set_gains(cfg.kp_yaw, cfg.ki_yaw);
            self.overrides = ServoOverrides {
                rudder: cfg.rudder_servo_angle,
                trim: cfg.trim_servo_angle,
                twist: cfg.twist_servo_angle,
                extra: cfg.extra_servo_angle,
            };
        }

        // 2) Latest sensor snapshots. A missing IMU sample keeps the last
        // known values; an unhealthy one only flips the health gate.
        if let Some(frame) = radio {
            self.radio = frame;
        }
        if let Some(update) = imu {
            self.imu_healthy = update.healthy;
            if update.healthy {
                self.imu = update.sample;
            }
        }

        if invalid_mode_requested {
            return CycleOutcome::Disabled;
        }

        // 3) Dispatch on mode.
        match self.mode {
            ControlMode::Calibration => {
                self.calibration.update(&self.radio);
                CycleOutcome::Calibrate(self.overrides)
            }
            ControlMode::DirectInput => CycleOutcome::Drive(self.direct_input()),
            ControlMode::Auto1 | ControlMode::Auto2 | ControlMode::Auto3 | ControlMode::Auto4 => {
                if self.imu_healthy {
                    CycleOutcome::Drive(self.auto_dispatch(now_ms))
                } else {
                    // An auto mode with no working IMU is as good as an
                    // unknown mode.
                    CycleOutcome::Disabled
                }
            }
        }
    }

    // ── Per-mode wiring ──────────────────────────────────────────────────────

    fn channel(&self, index: usize) -> f32 {
        self.calibration.normalize(index, self.radio.widths[index])
    }

    /// 1:1 stick passthrough on every surface.
    fn direct_input(&self) -> ControlOutput {
        ControlOutput {
            rudder: map_radio(self.channel(0), RUDDER_MIN_ANGLE, RUDDER_MAX_ANGLE),
            twist: map_radio(self.channel(1), TWIST_MIN_ANGLE, TWIST_MAX_ANGLE),
            trim: map_radio(self.channel(2), TRIM_MIN_ANGLE, TRIM_MAX_ANGLE),
            extra: map_radio(self.channel(3), EXTRA_MIN_ANGLE, EXTRA_MAX_ANGLE),
        }
    }

    fn auto_dispatch(&mut self, now_ms: u64) -> ControlOutput {
        match self.mode {
            ControlMode::Auto1 => self.auto_mode1(now_ms),
            ControlMode::Auto2 => self.auto_mode2(now_ms),
            ControlMode::Auto3 => self.auto_mode3(now_ms),
            // Auto4 is a reserved extension point: all surfaces neutral.
            _ => ControlOutput::default(),
        }
    }

    /// Roll stabilization: rudder steered from ch2, twist closes the roll
    /// loop around a zero-roll setpoint.
    fn auto_mode1(&mut self, now_ms: u64) -> ControlOutput {
        ControlOutput {
            rudder: map_radio(self.channel(1), RUDDER_MIN_ANGLE, RUDDER_MAX_ANGLE),
            trim: map_radio(self.channel(2), TRIM_MIN_ANGLE, TRIM_MAX_ANGLE),
            twist: self.roll_pi.update(now_ms, 0.0, self.imu.roll),
            extra: 0.0,
        }
    }

    /// Yaw-rate tracking: ch1 commands a turn rate, the rudder loop tracks
    /// it against the z gyro; twist stays manual.
    fn auto_mode2(&mut self, now_ms: u64) -> ControlOutput {
        let desired_yaw_rate = map_radio(self.channel(0), MIN_YAW_RATE, MAX_YAW_RATE);
        ControlOutput {
            rudder: self.yaw_pi.update(now_ms, desired_yaw_rate, self.imu.gyro[2]),
            trim: map_radio(self.channel(2), TRIM_MIN_ANGLE, TRIM_MAX_ANGLE),
            twist: map_radio(self.channel(1), TWIST_MIN_ANGLE, TWIST_MAX_ANGLE),
            extra: 0.0,
        }
    }

    /// Both loops closed: yaw-rate tracking on the rudder, roll
    /// stabilization on twist.
    fn auto_mode3(&mut self, now_ms: u64) -> ControlOutput {
        let desired_yaw_rate = map_radio(self.channel(0), MIN_YAW_RATE, MAX_YAW_RATE);
        ControlOutput {
            rudder: self.yaw_pi.update(now_ms, desired_yaw_rate, self.imu.gyro[2]),
            trim: map_radio(self.channel(2), TRIM_MIN_ANGLE, TRIM_MAX_ANGLE),
            twist: self.roll_pi.update(now_ms, 0.0, self.imu.roll),
            extra: 0.0,
        }
    }
}

impl Default for ControlEngine {
    fn default() -> Self {
        Self::new()
    }
}
