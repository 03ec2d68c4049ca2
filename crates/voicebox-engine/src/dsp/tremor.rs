use std::f64::consts::PI;

use super::{saturate, VoiceEffect};

/// Slow amplitude modulation that makes the voice tremble. The gain swings
/// between 1.0 and 1 - depth at `rate` cycles per second.
pub struct Tremor {
    rate: f32,
    depth: f32,
    phase: f64,
}

impl Tremor {
    pub fn new(rate: f32, depth: f32) -> Self {
        Self {
            rate,
            depth,
            phase: 0.0,
        }
    }
}

impl Default for Tremor {
    fn default() -> Self {
        Self::new(6.0, 0.5)
    }
}

impl VoiceEffect for Tremor {
    fn name(&self) -> &str {
        "Tremor"
    }

    fn process(&mut self, input: &[i16], sample_rate: u32) -> Vec<i16> {
        let increment = 2.0 * PI * self.rate as f64 / sample_rate as f64;

        let mut out = Vec::with_capacity(input.len());
        for &s in input {
            let modulation = 1.0 - self.depth as f64 * (0.5 + 0.5 * self.phase.sin());
            out.push(saturate((s as f64 * modulation) as f32));
            self.phase += increment;
            if self.phase > 2.0 * PI {
                self.phase -= 2.0 * PI;
            }
        }
        out
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: u32 = 44_100;

    #[test]
    fn gain_swings_between_one_and_one_minus_depth() {
        let rate = 6.0f32;
        let depth = 0.5f32;
        let mut fx = Tremor::new(rate, depth);

        let period = SR as f64 / rate as f64;
        let n = (2.0 * period) as usize;
        let out = fx.process(&vec![20_000i16; n], SR);

        // Sine maximum at a quarter period => gain 1 - depth; minimum at
        // three quarters => gain 1.
        let quarter = (period / 4.0).round() as usize;
        let three_quarters = (3.0 * period / 4.0).round() as usize;
        assert_relative_eq!(
            out[quarter] as f64 / 20_000.0,
            (1.0 - depth) as f64,
            epsilon = 2e-3
        );
        assert_relative_eq!(out[three_quarters] as f64 / 20_000.0, 1.0, epsilon = 2e-3);
    }

    #[test]
    fn oscillation_period_matches_rate() {
        let rate = 10.0f32;
        let mut fx = Tremor::new(rate, 1.0);
        let period = (SR as f64 / rate as f64).round() as usize;
        let out = fx.process(&vec![20_000i16; 3 * period], SR);
        // One full period apart the modulation repeats.
        for i in 0..period {
            assert!((out[i] as i32 - out[i + period] as i32).abs() <= 2, "sample {i}");
        }
    }

    #[test]
    fn stays_in_bounds_on_extremes() {
        let mut fx = Tremor::default();
        let input: Vec<i16> = (0..4096)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let out = fx.process(&input, SR);
        assert_eq!(out.len(), input.len());
        // Modulation never exceeds unity gain.
        for (&o, &i) in out.iter().zip(&input) {
            assert!((o as i32).abs() <= (i as i32).abs());
        }
    }
}
