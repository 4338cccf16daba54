//! Anti-windup PI controller used by the roll and yaw-rate loops.

use micromath::F32Ext;

/// PI controller with back-calculation anti-windup and an optional
/// integrator-reset deadband.
///
/// Output saturation bounds are fixed per loop (the mechanical range of the
/// actuated surface); gains are retuned at runtime from telemetry.
pub struct PiController {
    kp: f32,
    ki: f32,
    integrator: f32,
    /// Millisecond tick of the previous update; 0 means "never run", which
    /// forces dt = 0 on the first call so a huge startup dt cannot kick the
    /// integrator.
    last_tick_ms: u64,
    out_min: f32,
    out_max: f32,
    /// When the measurement sits within this band of the setpoint the
    /// integrator is zeroed, bounding long-run drift accumulation during
    /// steady near-target operation.
    reset_deadband: Option<f32>,
}

impl PiController {
    pub fn new(kp: f32, ki: f32, out_min: f32, out_max: f32, reset_deadband: Option<f32>) -> Self {
        Self {
            kp,
            ki,
            integrator: 0.0,
            last_tick_ms: 0,
            out_min,
            out_max,
            reset_deadband,
        }
    }

    pub fn set_gains(&mut self, kp: f32, ki: f32) {
        self.kp = kp;
        self.ki = ki;
    }

    pub fn integrator(&self) -> f32 {
        self.integrator
    }

    /// One PI step. `now_ms` is a monotonic millisecond tick; the caller
    /// passes the cycle timestamp so the controller stays clock-free.
    pub fn update(&mut self, now_ms: u64, setpoint: f32, measurement: f32) -> f32 {
        let dt = self.delta_seconds(now_ms);
        let error = setpoint - measurement;

        let unsat = self.kp * error + self.integrator;
        let out = unsat.clamp(self.out_min, self.out_max);

        // Back-calculation: while saturated, (out - unsat) pulls the
        // integrator back toward the achievable output.
        let kp_safe = if self.kp > 0.0 { self.kp } else { 1.0 };
        let dw = (out - unsat) / kp_safe;
        self.integrator += self.ki * dt * (error + dw);

        if let Some(band) = self.reset_deadband {
            if (setpoint - measurement).abs() < band {
                self.integrator = 0.0;
            }
        }

        out
    }

    fn delta_seconds(&mut self, now_ms: u64) -> f32 {
        let dt = if self.last_tick_ms != 0 {
            now_ms.saturating_sub(self.last_tick_ms) as f32 * 1e-3
        } else {
            0.0
        };
        self.last_tick_ms = now_ms;
        dt.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_leaves_integrator_untouched() {
        let mut pi = PiController::new(1.0, 0.5, -35.0, 35.0, None);
        let before = pi.integrator();
        pi.update(123_456, 5.0, 0.0);
        assert_eq!(pi.integrator(), before);
    }

    #[test]
    fn output_always_within_bounds() {
        let mut pi = PiController::new(10.0, 50.0, -35.0, 35.0, None);
        let mut now = 1;
        for _ in 0..500 {
            let out = pi.update(now, 100.0, -100.0);
            assert!((-35.0..=35.0).contains(&out));
            now += 10;
        }
        // And back the other way with a wound-up integrator.
        for _ in 0..500 {
            let out = pi.update(now, -100.0, 100.0);
            assert!((-35.0..=35.0).contains(&out));
            now += 10;
        }
    }

    #[test]
    fn integrator_accumulates_proportionally_to_dt() {
        let mut pi = PiController::new(1.0, 1.0, -1000.0, 1000.0, None);
        pi.update(1000, 2.0, 0.0); // dt = 0, no contribution
        assert_eq!(pi.integrator(), 0.0);
        pi.update(1100, 2.0, 0.0); // dt = 0.1 s, unsaturated
        assert!((pi.integrator() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn anti_windup_limits_integrator_growth() {
        let mut unguarded = 0.0f32;
        let mut pi = PiController::new(2.0, 1.0, -1.0, 1.0, None);
        let mut now = 1;
        for _ in 0..100 {
            pi.update(now, 10.0, 0.0);
            unguarded += 1.0 * 0.01 * 10.0; // plain Ki*dt*error integration
            now += 10;
        }
        // Back-calculation keeps the stored integrator well below the
        // unguarded sum while the output is pinned at +1.
        assert!(pi.integrator() < unguarded / 2.0);
    }

    #[test]
    fn zero_kp_does_not_divide_by_zero() {
        let mut pi = PiController::new(0.0, 1.0, -1.0, 1.0, None);
        pi.update(1, 1.0, 0.0);
        let out = pi.update(50, 1.0, 0.0);
        assert!(out.is_finite());
        assert!(pi.integrator().is_finite());
    }

    #[test]
    fn deadband_resets_integrator_near_setpoint() {
        let mut pi = PiController::new(1.0, 1.0, -35.0, 35.0, Some(1.0));
        pi.update(1, 0.0, 20.0);
        pi.update(101, 0.0, 20.0);
        assert!(pi.integrator() != 0.0);
        pi.update(201, 0.0, 0.5); // within the deadband
        assert_eq!(pi.integrator(), 0.0);
    }

    #[test]
    fn updated_gains_take_effect_immediately() {
        let mut pi = PiController::new(1.0, 0.0, -100.0, 100.0, None);
        assert_eq!(pi.update(1, 10.0, 0.0), 10.0);
        pi.set_gains(2.5, 0.0);
        assert_eq!(pi.update(11, 10.0, 0.0), 25.0);
    }
}
