use std::f64::consts::PI;

use super::{saturate, VoiceEffect};

/// Ring modulation against a sine carrier. 150 Hz gives the classic robot
/// timbre, 300 Hz something more alien.
pub struct RobotVoice {
    carrier_hz: f32,
    phase: f64,
}

impl RobotVoice {
    pub fn new(carrier_hz: f32) -> Self {
        Self {
            carrier_hz,
            phase: 0.0,
        }
    }
}

impl Default for RobotVoice {
    fn default() -> Self {
        Self::new(150.0)
    }
}

impl VoiceEffect for RobotVoice {
    fn name(&self) -> &str {
        "Robot"
    }

    fn process(&mut self, input: &[i16], sample_rate: u32) -> Vec<i16> {
        let increment = 2.0 * PI * self.carrier_hz as f64 / sample_rate as f64;

        let mut out = Vec::with_capacity(input.len());
        for &s in input {
            let carrier = self.phase.sin() as f32;
            out.push(saturate(s as f32 * carrier));
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

    const SR: u32 = 44_100;

    #[test]
    fn modulates_by_the_carrier() {
        let mut fx = RobotVoice::new(150.0);
        let input = vec![20_000i16; 512];
        let out = fx.process(&input, SR);

        let increment = 2.0 * PI * 150.0 / SR as f64;
        for (i, &s) in out.iter().enumerate() {
            let expected = saturate(20_000.0 * (increment * i as f64).sin() as f32);
            assert!((s as i32 - expected as i32).abs() <= 1, "sample {i}: {s} vs {expected}");
        }
    }

    #[test]
    fn phase_is_continuous_across_chunks() {
        let mut split = RobotVoice::new(300.0);
        let mut whole = RobotVoice::new(300.0);
        let input = vec![15_000i16; 1024];

        let mut chunked = split.process(&input[..512], SR);
        chunked.extend(split.process(&input[512..], SR));
        let reference = whole.process(&input, SR);

        for (i, (&a, &b)) in chunked.iter().zip(&reference).enumerate() {
            assert!((a as i32 - b as i32).abs() <= 1, "sample {i}");
        }
    }

    #[test]
    fn stays_in_bounds_on_extremes() {
        let mut fx = RobotVoice::default();
        let input: Vec<i16> = (0..4096)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let out = fx.process(&input, SR);
        assert_eq!(out.len(), input.len());
    }
}
