pub mod echo;
pub mod pitch;
pub mod reverb;
pub mod robot;
pub mod tremor;
pub mod whisper;

pub use echo::Echo;
pub use pitch::PitchShift;
pub use reverb::Reverb;
pub use robot::RobotVoice;
pub use tremor::Tremor;
pub use whisper::Whisper;

/// Voice transform over one chunk of mono 16-bit PCM.
/// - process() may return a different length than its input (time-scaling
///   effects do).
/// - No failure mode: arithmetic saturates into the i16 range.
/// - reset() restores construction-time state; the next chunk starts clean.
pub trait VoiceEffect: Send {
    fn name(&self) -> &str;
    fn process(&mut self, input: &[i16], sample_rate: u32) -> Vec<i16>;
    fn reset(&mut self);
}

/// Identity effect; useful as an explicit "no disguise" selection.
pub struct PassThrough;

impl VoiceEffect for PassThrough {
    fn name(&self) -> &str {
        "None"
    }

    fn process(&mut self, input: &[i16], _sample_rate: u32) -> Vec<i16> {
        input.to_vec()
    }

    fn reset(&mut self) {}
}

/// Saturating f32 -> i16 conversion used by every effect.
#[inline]
pub(crate) fn saturate(x: f32) -> i16 {
    if x > i16::MAX as f32 {
        i16::MAX
    } else if x < i16::MIN as f32 {
        i16::MIN
    } else {
        x as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturate_clamps_both_rails() {
        assert_eq!(saturate(1.0e9), i16::MAX);
        assert_eq!(saturate(-1.0e9), i16::MIN);
        assert_eq!(saturate(123.4), 123);
        assert_eq!(saturate(-123.4), -123);
    }

    #[test]
    fn pass_through_is_identity() {
        let mut fx = PassThrough;
        let input = [i16::MIN, -1, 0, 1, i16::MAX];
        assert_eq!(fx.process(&input, 44_100), input);
    }
}
