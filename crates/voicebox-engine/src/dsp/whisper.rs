use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::{saturate, VoiceEffect};

/// Replaces the voiced component with noise shaped by the input envelope,
/// leaving a faint trace of the dry signal underneath.
pub struct Whisper {
    noise_level: f32,
    rng: SmallRng,
}

impl Whisper {
    pub fn new(noise_level: f32) -> Self {
        Self {
            noise_level,
            rng: SmallRng::from_entropy(),
        }
    }
}

impl Default for Whisper {
    fn default() -> Self {
        Self::new(0.6)
    }
}

impl VoiceEffect for Whisper {
    fn name(&self) -> &str {
        "Whisper"
    }

    fn process(&mut self, input: &[i16], _sample_rate: u32) -> Vec<i16> {
        let mut out = Vec::with_capacity(input.len());
        for &s in input {
            let dry = s as f32;
            let envelope = dry.abs() / i16::MAX as f32;
            let noise = self.rng.gen_range(-1.0f32..=1.0) * i16::MAX as f32;
            let whisper = noise * envelope * self.noise_level
                + dry * (1.0 - self.noise_level) * 0.3;
            out.push(saturate(whisper));
        }
        out
    }

    // No carried state; each sample only depends on the current input.
    fn reset(&mut self) {}
}
