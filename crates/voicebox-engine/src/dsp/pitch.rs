use super::{saturate, VoiceEffect};

/// Pitch shift by linear-interpolation resampling.
///
/// factor > 1.0 raises the pitch (and shortens the chunk), factor < 1.0
/// lowers it. The fractional read position left over at the end of a chunk
/// is carried into the next one so the resampling stays phase-continuous
/// across chunk boundaries.
pub struct PitchShift {
    name: String,
    factor: f32,
    residual_phase: f32,
}

impl PitchShift {
    pub fn new(name: impl Into<String>, factor: f32) -> Self {
        Self {
            name: name.into(),
            factor,
            residual_phase: 0.0,
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn residual_phase(&self) -> f32 {
        self.residual_phase
    }
}

impl VoiceEffect for PitchShift {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, input: &[i16], _sample_rate: u32) -> Vec<i16> {
        if self.factor == 1.0 {
            return input.to_vec();
        }

        let out_len = (input.len() as f32 / self.factor).round() as usize;
        let mut out = vec![0i16; out_len];

        for (i, slot) in out.iter_mut().enumerate() {
            let src = i as f32 * self.factor + self.residual_phase;
            let base = src as usize;
            // A read past the end of the chunk leaves the tail silent; the
            // output keeps its nominal length either way.
            if base + 1 >= input.len() {
                break;
            }
            let frac = src - base as f32;
            let a = input[base] as f32;
            let b = input[base + 1] as f32;
            *slot = saturate(a + frac * (b - a));
        }

        let advanced = out_len as f32 * self.factor + self.residual_phase;
        self.residual_phase = advanced.fract();

        out
    }

    fn reset(&mut self) {
        self.residual_phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: u32 = 44_100;

    #[test]
    fn unity_factor_is_identity() {
        let mut fx = PitchShift::new("Identity", 1.0);
        let input: Vec<i16> = (0..512).map(|i| (i * 37 % 1000) as i16 - 500).collect();
        assert_eq!(fx.process(&input, SR), input);
        assert_eq!(fx.residual_phase(), 0.0);
    }

    #[test]
    fn output_length_tracks_factor() {
        for &(factor, n) in &[
            (0.5f32, 1000usize),
            (0.1, 1000),
            (1.6, 1000),
            (2.2, 777),
            (0.7, 2048),
        ] {
            let mut fx = PitchShift::new("t", factor);
            let input = vec![100i16; n];
            let out = fx.process(&input, SR);
            let nominal = (n as f32 / factor).round() as usize;
            assert_eq!(out.len(), nominal, "factor {factor}");
        }
    }

    #[test]
    fn chunk_tail_is_padded_with_silence() {
        // Slowing down reads past the chunk end; those slots stay silent
        // instead of shortening the output.
        let mut fx = PitchShift::new("t", 0.5);
        let input = vec![1000i16; 100];
        let out = fx.process(&input, SR);
        assert_eq!(out.len(), 200);
        assert_eq!(*out.last().unwrap(), 0);
        assert!(out.iter().any(|&s| s == 1000));
    }

    #[test]
    fn residual_phase_accumulates_across_chunks() {
        let factor = 1.3f32;
        let mut fx = PitchShift::new("t", factor);
        let input = vec![0i16; 441];
        let mut expected_phase = 0.0f32;
        for _ in 0..5 {
            let out_len = (input.len() as f32 / factor).round() as usize;
            fx.process(&input, SR);
            expected_phase = (out_len as f32 * factor + expected_phase).fract();
            assert_relative_eq!(fx.residual_phase(), expected_phase, epsilon = 1e-3);
        }
    }

    #[test]
    fn halving_doubles_and_stays_in_bounds() {
        // 1000-sample alternating-extremes chunk through PitchShift(0.5).
        let input: Vec<i16> = (0..1000)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let mut fx = PitchShift::new("Monster", 0.5);
        let out = fx.process(&input, SR);
        assert_eq!(out.len(), 2000);
        // Even-index reads land on input samples, odd ones midway between the
        // two rails; both must survive saturation without wrapping.
        assert!(out.iter().any(|&s| s == i16::MAX || s == i16::MIN));
    }

    #[test]
    fn reset_clears_phase() {
        let mut fx = PitchShift::new("t", 1.7);
        fx.process(&vec![5i16; 300], SR);
        assert_ne!(fx.residual_phase(), 0.0);
        fx.reset();
        assert_eq!(fx.residual_phase(), 0.0);
    }
}
