use super::{saturate, VoiceEffect};

/// Schroeder reverb: four parallel comb filters with mutually prime delay
/// lengths, averaged into the wet signal.
const COMB_DELAYS: [usize; 4] = [1116, 1188, 1277, 1356];

struct Comb {
    buf: Vec<f32>,
    idx: usize,
}

impl Comb {
    fn new(delay: usize) -> Self {
        Self {
            buf: vec![0.0; delay],
            idx: 0,
        }
    }

    fn tick(&mut self, dry: f32, feedback: f32) -> f32 {
        let delayed = self.buf[self.idx];
        self.buf[self.idx] = dry + delayed * feedback;
        self.idx = (self.idx + 1) % self.buf.len();
        delayed
    }
}

pub struct Reverb {
    room_size: f32,
    wet_mix: f32,
    combs: [Comb; 4],
}

impl Reverb {
    pub fn new(room_size: f32, wet_mix: f32) -> Self {
        Self {
            room_size,
            wet_mix,
            combs: COMB_DELAYS.map(Comb::new),
        }
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new(0.6, 0.3)
    }
}

impl VoiceEffect for Reverb {
    fn name(&self) -> &str {
        "Reverb"
    }

    fn process(&mut self, input: &[i16], _sample_rate: u32) -> Vec<i16> {
        let mut out = Vec::with_capacity(input.len());
        for &s in input {
            let dry = s as f32 / i16::MAX as f32;

            let mut wet = 0.0;
            for comb in &mut self.combs {
                wet += comb.tick(dry, self.room_size);
            }
            wet /= self.combs.len() as f32;

            let mixed = (dry * (1.0 - self.wet_mix) + wet * self.wet_mix) * i16::MAX as f32;
            out.push(saturate(mixed));
        }
        out
    }

    fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.buf.fill(0.0);
            comb.idx = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44_100;

    #[test]
    fn silence_in_silence_out_after_reset() {
        let mut fx = Reverb::default();
        fx.process(&vec![12_000i16; 4096], SR);
        fx.reset();
        let out = fx.process(&vec![0i16; 2048], SR);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn dry_only_before_first_reflection() {
        let mut fx = Reverb::new(0.6, 0.3);
        let input = vec![10_000i16; 1000];
        let out = fx.process(&input, SR);
        // Shortest comb is 1116 samples, so the first 1000 outputs carry no
        // wet signal at all.
        let expected = saturate(10_000.0 / i16::MAX as f32 * 0.7 * i16::MAX as f32);
        assert!(out.iter().all(|&s| (s as i32 - expected as i32).abs() <= 1));
    }

    #[test]
    fn stays_in_bounds_on_extremes() {
        let mut fx = Reverb::new(0.9, 1.0);
        let input: Vec<i16> = (0..8192)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        for _ in 0..4 {
            let out = fx.process(&input, SR);
            assert_eq!(out.len(), input.len());
        }
    }
}
