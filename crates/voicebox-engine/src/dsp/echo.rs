use super::{saturate, VoiceEffect};

/// Echo via a circular delay line with feedback.
pub struct Echo {
    delay_ms: u32,
    decay: f32,
    mix: f32,
    buf: Vec<f32>,
    pos: usize,
}

impl Echo {
    pub fn new(delay_ms: u32, decay: f32, mix: f32) -> Self {
        Self {
            delay_ms,
            decay,
            mix,
            buf: Vec::new(),
            pos: 0,
        }
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::new(250, 0.5, 0.4)
    }
}

impl VoiceEffect for Echo {
    fn name(&self) -> &str {
        "Echo"
    }

    fn process(&mut self, input: &[i16], sample_rate: u32) -> Vec<i16> {
        let delay_samples = (sample_rate as u64 * self.delay_ms as u64 / 1000) as usize;
        if delay_samples == 0 {
            return input.to_vec();
        }
        // Rebuild the line if the sample rate (and thus the delay) changed;
        // the write cursor restarts with it.
        if self.buf.len() != delay_samples {
            self.buf = vec![0.0; delay_samples];
            self.pos = 0;
        }

        let mut out = Vec::with_capacity(input.len());
        for &s in input {
            let dry = s as f32;
            let delayed = self.buf[self.pos];

            self.buf[self.pos] = dry + delayed * self.decay;
            self.pos = (self.pos + 1) % self.buf.len();

            out.push(saturate(dry * (1.0 - self.mix) + delayed * self.mix));
        }
        out
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }
}
