//! Servo output mapping: mechanical angle → calibrated servo angle → PWM
//! compare value.
//!
//! Each surface has its own mechanical range and servo calibration. The
//! rudder linkage is nonlinear, so it goes through a measured lookup table;
//! the other surfaces map linearly. The trim winch runs a multi-turn drum,
//! hence its much wider angle range and its narrower pulse window.

use micromath::F32Ext;

// ── Surface geometry ──────────────────────────────────────────────────────────

pub const RUDDER_MIN_ANGLE: f32 = -35.0;
pub const RUDDER_MAX_ANGLE: f32 = 35.0;

pub const TRIM_MIN_ANGLE: f32 = -180.0;
pub const TRIM_MAX_ANGLE: f32 = 180.0;

pub const TWIST_MIN_ANGLE: f32 = 0.0;
pub const TWIST_MAX_ANGLE: f32 = 45.0;

pub const EXTRA_MIN_ANGLE: f32 = 0.0;
pub const EXTRA_MAX_ANGLE: f32 = 180.0;

pub const RUDDER_SERVO_RANGE: f32 = 180.0;
pub const TRIM_SERVO_RANGE: f32 = 1800.0;
pub const TWIST_SERVO_RANGE: f32 = 180.0;
pub const EXTRA_SERVO_RANGE: f32 = 180.0;

// ── Pulse generation constants ────────────────────────────────────────────────

const SERVO_PULSE_MIN_MS: f32 = 0.6;
const SERVO_PULSE_MAX_MS: f32 = 2.4;

// The trim winch servo accepts a narrower pulse window, and its drum
// calibration was measured over a 2160° sweep rather than the nominal
// 1800° servo range.
const TRIM_PULSE_MIN_MS: f32 = 0.85;
const TRIM_PULSE_MAX_MS: f32 = 2.05;
const TRIM_SWEEP_DEG: f32 = 2160.0;

/// Timer auto-reload value for the servo PWM timer.
pub const TIMER_PERIOD: f32 = 59_999.0;
/// PWM frame length in ms (50 Hz).
pub const TIMER_FRAME_MS: f32 = 20.0;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Linearly map `x` from [in_min, in_max] to [out_min, out_max], saturating
/// both input and output.
fn map(x: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let x = x.clamp(in_min, in_max);
    let out = (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min;
    out.clamp(out_min.min(out_max), out_min.max(out_max))
}

// ── Servo angle → compare value ───────────────────────────────────────────────

/// Map a servo angle in [0, servo_range] onto the standard pulse window and
/// scale it to a timer compare value.
pub fn servo_angle_to_pulse(servo_angle: f32, servo_range: f32) -> u32 {
    let pulse_ms = map(
        servo_angle,
        0.0,
        servo_range,
        SERVO_PULSE_MIN_MS,
        SERVO_PULSE_MAX_MS,
    );
    (pulse_ms * TIMER_PERIOD / TIMER_FRAME_MS) as u32
}

/// Trim variant: dedicated pulse window over the measured drum sweep.
pub fn servo_angle_to_pulse_trim(servo_angle: f32) -> u32 {
    let pulse_ms = map(
        servo_angle,
        0.0,
        TRIM_SWEEP_DEG,
        TRIM_PULSE_MIN_MS,
        TRIM_PULSE_MAX_MS,
    );
    (pulse_ms * TIMER_PERIOD / TIMER_FRAME_MS) as u32
}

// ── Mechanical angle → servo angle ────────────────────────────────────────────

/// Rudder calibration table: mechanical angle breakpoints (strictly
/// increasing) and the measured servo angle at each one.
const RUDDER_MECH_ANGLES: [f32; 11] = [
    -35.00, -27.22, -19.44, -11.67, -3.89, 0.00, 3.89, 11.67, 19.44, 27.22, 35.00,
];
const RUDDER_SERVO_ANGLES: [f32; 11] = [
    150.06, 136.15, 124.51, 113.64, 102.98, 97.61, 92.19, 81.04, 69.27, 56.49, 41.98,
];

/// Piecewise-linear rudder lookup. Out-of-range angles clamp to the table
/// endpoints.
pub fn mech_to_servo_rudder(mech_angle: f32) -> f32 {
    if mech_angle <= RUDDER_MIN_ANGLE {
        return RUDDER_SERVO_ANGLES[0];
    }
    if mech_angle >= RUDDER_MAX_ANGLE {
        return RUDDER_SERVO_ANGLES[10];
    }

    for i in 0..RUDDER_MECH_ANGLES.len() - 1 {
        if mech_angle >= RUDDER_MECH_ANGLES[i] && mech_angle <= RUDDER_MECH_ANGLES[i + 1] {
            let mech_span = RUDDER_MECH_ANGLES[i + 1] - RUDDER_MECH_ANGLES[i];
            let servo_span = RUDDER_SERVO_ANGLES[i + 1] - RUDDER_SERVO_ANGLES[i];
            let ratio = (mech_angle - RUDDER_MECH_ANGLES[i]) / mech_span;
            return RUDDER_SERVO_ANGLES[i] + ratio * servo_span;
        }
    }

    // Unreachable while the table stays strictly monotonic and the endpoint
    // clamps above hold; falls back to the entry nearest 0° mechanical.
    let mut nearest = 0;
    for i in 1..RUDDER_MECH_ANGLES.len() {
        if RUDDER_MECH_ANGLES[i].abs() < RUDDER_MECH_ANGLES[nearest].abs() {
            nearest = i;
        }
    }
    RUDDER_SERVO_ANGLES[nearest]
}

pub fn mech_to_servo_trim(mech_angle: f32) -> f32 {
    map(
        mech_angle,
        TRIM_MIN_ANGLE,
        TRIM_MAX_ANGLE,
        0.0,
        TRIM_SERVO_RANGE,
    )
}

pub fn mech_to_servo_twist(mech_angle: f32) -> f32 {
    map(
        mech_angle,
        TWIST_MIN_ANGLE,
        TWIST_MAX_ANGLE,
        0.0,
        TWIST_SERVO_RANGE,
    )
}

pub fn mech_to_servo_extra(mech_angle: f32) -> f32 {
    map(
        mech_angle,
        EXTRA_MIN_ANGLE,
        EXTRA_MAX_ANGLE,
        0.0,
        EXTRA_SERVO_RANGE,
    )
}

// ── Output seam ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServoChannel {
    Rudder,
    Trim,
    Twist,
    Extra,
}

pub const SERVO_CHANNELS: [ServoChannel; 4] = [
    ServoChannel::Rudder,
    ServoChannel::Trim,
    ServoChannel::Twist,
    ServoChannel::Extra,
];

/// PWM sink: the board glue implements this over the servo timer. A compare
/// value of 0 stops the pulse train and lets the servo freewheel.
pub trait PwmSink {
    fn set_compare(&mut self, channel: ServoChannel, compare: u32);
}

/// The four servo outputs behind a `PwmSink`.
pub struct ServoBank<P: PwmSink> {
    pwm: P,
}

impl<P: PwmSink> ServoBank<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm }
    }

    // Mechanical-angle commands (normal operation).

    pub fn set_rudder(&mut self, mech_angle: f32) {
        let servo_angle = mech_to_servo_rudder(mech_angle);
        self.pwm.set_compare(
            ServoChannel::Rudder,
            servo_angle_to_pulse(servo_angle, RUDDER_SERVO_RANGE),
        );
    }

    pub fn set_trim(&mut self, mech_angle: f32) {
        let servo_angle = mech_to_servo_trim(mech_angle);
        self.pwm
            .set_compare(ServoChannel::Trim, servo_angle_to_pulse_trim(servo_angle));
    }

    pub fn set_twist(&mut self, mech_angle: f32) {
        let servo_angle = mech_to_servo_twist(mech_angle);
        self.pwm.set_compare(
            ServoChannel::Twist,
            servo_angle_to_pulse(servo_angle, TWIST_SERVO_RANGE),
        );
    }

    pub fn set_extra(&mut self, mech_angle: f32) {
        let servo_angle = mech_to_servo_extra(mech_angle);
        self.pwm.set_compare(
            ServoChannel::Extra,
            servo_angle_to_pulse(servo_angle, EXTRA_SERVO_RANGE),
        );
    }

    // Raw servo-angle commands (Calibration mode overrides).

    pub fn set_servo_rudder(&mut self, servo_angle: f32) {
        self.pwm.set_compare(
            ServoChannel::Rudder,
            servo_angle_to_pulse(servo_angle, RUDDER_SERVO_RANGE),
        );
    }

    pub fn set_servo_trim(&mut self, servo_angle: f32) {
        self.pwm
            .set_compare(ServoChannel::Trim, servo_angle_to_pulse_trim(servo_angle));
    }

    pub fn set_servo_twist(&mut self, servo_angle: f32) {
        self.pwm.set_compare(
            ServoChannel::Twist,
            servo_angle_to_pulse(servo_angle, TWIST_SERVO_RANGE),
        );
    }

    pub fn set_servo_extra(&mut self, servo_angle: f32) {
        self.pwm.set_compare(
            ServoChannel::Extra,
            servo_angle_to_pulse(servo_angle, EXTRA_SERVO_RANGE),
        );
    }

    /// Fail-safe: stop PWM on every channel so the actuators freewheel.
    pub fn disable_all(&mut self) {
        for ch in SERVO_CHANNELS {
            self.pwm.set_compare(ch, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_scaling_matches_timer_constants() {
        // 0° → 0.6 ms → 0.6 * 59999 / 20
        assert_eq!(servo_angle_to_pulse(0.0, 180.0), 1799);
        // Full range → 2.4 ms
        assert_eq!(servo_angle_to_pulse(180.0, 180.0), 7199);
        // Input saturates at the range ends.
        assert_eq!(servo_angle_to_pulse(500.0, 180.0), 7199);
        assert_eq!(servo_angle_to_pulse(-20.0, 180.0), 1799);
    }

    #[test]
    fn trim_uses_its_own_pulse_window() {
        // 0.85 ms and 2.05 ms end points.
        assert_eq!(servo_angle_to_pulse_trim(0.0), 2549);
        assert_eq!(servo_angle_to_pulse_trim(2160.0), 6149);
        assert!(servo_angle_to_pulse_trim(1080.0) > servo_angle_to_pulse_trim(0.0));
    }

    #[test]
    fn rudder_lut_clamps_to_endpoints() {
        assert_eq!(mech_to_servo_rudder(-90.0), 150.06);
        assert_eq!(mech_to_servo_rudder(-35.0), 150.06);
        assert_eq!(mech_to_servo_rudder(35.0), 41.98);
        assert_eq!(mech_to_servo_rudder(90.0), 41.98);
    }

    #[test]
    fn rudder_lut_interpolates_between_breakpoints() {
        // Exact breakpoint.
        assert!((mech_to_servo_rudder(0.0) - 97.61).abs() < 1e-4);
        // Midway between -3.89 (102.98) and 0.0 (97.61).
        let mid = mech_to_servo_rudder(-3.89 / 2.0);
        assert!((mid - (102.98 + 97.61) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn rudder_lut_is_monotonically_decreasing() {
        let mut prev = f32::MAX;
        let mut angle = -35.0;
        while angle <= 35.0 {
            let servo = mech_to_servo_rudder(angle);
            assert!(servo <= prev, "LUT not monotonic at {angle}");
            prev = servo;
            angle += 0.5;
        }
    }

    #[test]
    fn linear_surfaces_map_their_full_range() {
        assert_eq!(mech_to_servo_twist(0.0), 0.0);
        assert_eq!(mech_to_servo_twist(45.0), 180.0);
        assert_eq!(mech_to_servo_trim(-180.0), 0.0);
        assert_eq!(mech_to_servo_trim(180.0), 1800.0);
        assert_eq!(mech_to_servo_extra(90.0), 90.0);
    }

    struct RecordingPwm {
        compares: [(ServoChannel, u32); 4],
        len: usize,
    }

    impl PwmSink for RecordingPwm {
        fn set_compare(&mut self, channel: ServoChannel, compare: u32) {
            self.compares[self.len] = (channel, compare);
            self.len += 1;
        }
    }

    #[test]
    fn disable_all_zeroes_every_channel() {
        let pwm = RecordingPwm {
            compares: [(ServoChannel::Rudder, u32::MAX); 4],
            len: 0,
        };
        let mut bank = ServoBank::new(pwm);
        bank.disable_all();
        assert_eq!(bank.pwm.len, 4);
        for (i, ch) in SERVO_CHANNELS.iter().enumerate() {
            assert_eq!(bank.pwm.compares[i], (*ch, 0));
        }
    }
}
