//! First-order low-pass filter shared by the analog and IMU conditioning
//! paths.

/// Classic exponential smoother: `out = alpha * in + (1 - alpha) * prev`.
pub struct LowPassFilter {
    alpha: f32,
    last_output: f32,
    initialized: bool,
}

impl LowPassFilter {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            last_output: 0.0,
            initialized: false,
        }
    }

    /// First sample passes through unfiltered to avoid a startup ramp from 0.
    pub fn filter(&mut self, input: f32) -> f32 {
        if !self.initialized {
            self.last_output = input;
            self.initialized = true;
        } else {
            self.last_output = self.alpha * input + (1.0 - self.alpha) * self.last_output;
        }
        self.last_output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_passes_through() {
        let mut lpf = LowPassFilter::new(0.1);
        assert_eq!(lpf.filter(12.0), 12.0);
    }

    #[test]
    fn smooths_toward_input() {
        let mut lpf = LowPassFilter::new(0.1);
        lpf.filter(0.0);
        let out = lpf.filter(10.0);
        assert!((out - 1.0).abs() < 1e-6);
        let out2 = lpf.filter(10.0);
        assert!(out2 > out && out2 < 10.0);
    }

    #[test]
    fn alpha_one_tracks_exactly() {
        let mut lpf = LowPassFilter::new(1.0);
        lpf.filter(3.0);
        assert_eq!(lpf.filter(-7.5), -7.5);
    }
}
