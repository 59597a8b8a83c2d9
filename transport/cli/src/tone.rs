use std::f64::consts::TAU;

use transport_types::AudioFrame;

/**
    Sine tone source standing in for a decoder.
*/
pub struct ToneGenerator {
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    channels: u16,
    phase: f64,
}

impl ToneGenerator {
    pub fn new(frequency: f64, sample_rate: u32, channels: u16) -> Self {
        Self {
            frequency,
            amplitude: 0.2,
            sample_rate,
            channels,
            phase: 0.0,
        }
    }

    /// Restart the tone, as a decoder would after a seek.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Render the next `frames` sample frames, identical on every channel.
    pub fn next_frame(&mut self, frames: usize) -> AudioFrame {
        let step = TAU * self.frequency / f64::from(self.sample_rate.max(1));
        let channels = self.channels as usize;

        let mut interleaved = Vec::with_capacity(frames * channels);
        for _ in 0..frames {
            let sample = self.amplitude * self.phase.sin() as f32;
            interleaved.extend(std::iter::repeat_n(sample, channels));
            self.phase = (self.phase + step) % TAU;
        }

        AudioFrame::from_interleaved(&interleaved, self.sample_rate, self.channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use transport_types::AudioSource;

    #[test]
    fn frames_have_requested_layout() {
        let mut tone = ToneGenerator::new(440.0, 48_000, 2);
        let frame = tone.next_frame(480);
        assert_eq!(frame.samples, 480);
        assert_eq!(frame.channels, 2);
        assert!(frame.is_valid());
        assert!(!frame.is_test_audio());
    }

    #[test]
    fn tone_is_continuous_across_frames() {
        let mut split = ToneGenerator::new(1000.0, 48_000, 1);
        let mut whole = ToneGenerator::new(1000.0, 48_000, 1);

        let mut joined = split.next_frame(100).to_f32().unwrap().into_owned();
        joined.extend_from_slice(&split.next_frame(100).to_f32().unwrap());
        let reference = whole.next_frame(200).to_f32().unwrap().into_owned();

        for (a, b) in joined.iter().zip(&reference) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn amplitude_is_bounded() {
        let mut tone = ToneGenerator::new(440.0, 44_100, 1);
        let samples = tone.next_frame(44_100).to_f32().unwrap().into_owned();
        assert!(samples.iter().all(|s| s.abs() <= 0.2 + f32::EPSILON));
    }
}
