/*!
    Decoded audio frames handed to the transport engine.
*/

use std::borrow::Cow;

use crate::{Error, Result};

/**
    Audio sample formats.

    All formats are interleaved and native-endian.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleFormat {
    /// 32-bit floating point, range [-1.0, 1.0]
    F32,
    /// 64-bit floating point
    F64,
    /// Signed 16-bit integer
    S16,
    /// Signed 32-bit integer
    S32,
    /// Unsigned 8-bit integer
    U8,
}

impl SampleFormat {
    /**
        Returns the number of bytes per sample.
    */
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /**
        Returns true if this is a floating-point format.
    */
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/**
    What the transport engine needs from a decoded frame.

    Implemented by the decode side; the engine calls it from the
    render/decode thread on every `update_buffers`.
*/
pub trait AudioSource {
    /// Returns false for frames that failed to decode or are empty.
    fn is_valid(&self) -> bool;

    /// Returns true for generated silence or test tones that should not
    /// reach the audio server.
    fn is_test_audio(&self) -> bool;

    /**
        Interleaved `f32` samples at the requested rate and channel count,
        or `None` if the frame cannot provide them.
    */
    fn interleaved_samples(&self, sample_rate: u32, channels: u16) -> Option<Cow<'_, [f32]>>;
}

/**
    A decoded audio frame.

    Contains raw sample data in the format specified by `format`.
    Samples are interleaved for multi-channel audio.
*/
#[derive(Clone, Debug)]
pub struct AudioFrame {
    /**
        Raw sample data as bytes.

        Interpret according to `format` and `channels`.
        For interleaved stereo F32: [L0, R0, L1, R1, ...]
    */
    pub data: Vec<u8>,
    /**
        Number of samples per channel.
    */
    pub samples: usize,
    /**
        Sample rate in Hz.
    */
    pub sample_rate: u32,
    /**
        Number of interleaved channels.
    */
    pub channels: u16,
    /**
        Sample format.
    */
    pub format: SampleFormat,
    /**
        Marks generated test audio.
    */
    pub test_audio: bool,
}

impl AudioFrame {
    /**
        Create a new audio frame.
    */
    pub fn new(
        data: Vec<u8>,
        samples: usize,
        sample_rate: u32,
        channels: u16,
        format: SampleFormat,
    ) -> Self {
        Self {
            data,
            samples,
            sample_rate,
            channels,
            format,
            test_audio: false,
        }
    }

    /**
        Create an F32 frame from interleaved samples.

        Trailing samples that do not fill a whole frame are dropped.
    */
    pub fn from_interleaved(interleaved: &[f32], sample_rate: u32, channels: u16) -> Self {
        let samples = if channels == 0 {
            0
        } else {
            interleaved.len() / channels as usize
        };
        let used = &interleaved[..samples * channels as usize];

        Self::new(
            bytemuck::cast_slice::<f32, u8>(used).to_vec(),
            samples,
            sample_rate,
            channels,
            SampleFormat::F32,
        )
    }

    /**
        Mark or unmark this frame as test audio.
    */
    pub fn with_test_audio(mut self, test_audio: bool) -> Self {
        self.test_audio = test_audio;
        self
    }

    /**
        Returns the duration of this frame based on sample count and rate.
    */
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.samples as f64 / self.sample_rate as f64)
    }

    /**
        Returns the total number of samples (samples per channel * channels).
    */
    pub fn total_samples(&self) -> usize {
        self.samples * self.channels as usize
    }

    /**
        Returns the expected data length in bytes.
    */
    pub fn expected_data_len(&self) -> usize {
        self.total_samples() * self.format.bytes_per_sample()
    }

    /**
        Decode the raw bytes into interleaved `f32` samples.

        Borrows the data when it already is aligned F32.
    */
    pub fn to_f32(&self) -> Result<Cow<'_, [f32]>> {
        let len = self.expected_data_len();
        if self.data.len() < len {
            return Err(Error::invalid_data(format!(
                "need {len} bytes, have {}",
                self.data.len()
            )));
        }
        let data = &self.data[..len];

        let samples = match self.format {
            SampleFormat::F32 => match bytemuck::try_cast_slice::<u8, f32>(data) {
                Ok(samples) => return Ok(Cow::Borrowed(samples)),
                Err(_) => bytemuck::pod_collect_to_vec::<u8, f32>(data),
            },
            SampleFormat::F64 => data
                .chunks_exact(8)
                .map(|b| f64::from_ne_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
                .collect(),
            SampleFormat::S16 => data
                .chunks_exact(2)
                .map(|b| i16::from_ne_bytes([b[0], b[1]]) as f32 / 32768.0)
                .collect(),
            SampleFormat::S32 => data
                .chunks_exact(4)
                .map(|b| i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0)
                .collect(),
            SampleFormat::U8 => data
                .iter()
                .map(|&b| (b as f32 - 128.0) / 128.0)
                .collect(),
        };

        Ok(Cow::Owned(samples))
    }
}

impl AudioSource for AudioFrame {
    fn is_valid(&self) -> bool {
        self.channels > 0
            && self.sample_rate > 0
            && self.samples > 0
            && self.data.len() >= self.expected_data_len()
    }

    fn is_test_audio(&self) -> bool {
        self.test_audio
    }

    /**
        Rate conversion is not done here: a frame at a different rate
        yields `None`. Channel counts are adapted by duplicating mono
        input, dropping extra channels, or padding missing ones with
        silence.
    */
    fn interleaved_samples(&self, sample_rate: u32, channels: u16) -> Option<Cow<'_, [f32]>> {
        if channels == 0 || sample_rate != self.sample_rate || !self.is_valid() {
            return None;
        }

        let samples = self.to_f32().ok()?;
        if channels == self.channels {
            return Some(samples);
        }

        let source_channels = self.channels as usize;
        let target_channels = channels as usize;
        let mut out = vec![0.0f32; self.samples * target_channels];

        for (frame, source) in out
            .chunks_exact_mut(target_channels)
            .zip(samples.chunks_exact(source_channels))
        {
            if source_channels == 1 {
                frame.fill(source[0]);
            } else {
                let shared = source_channels.min(target_channels);
                frame[..shared].copy_from_slice(&source[..shared]);
            }
        }

        Some(Cow::Owned(out))
    }
}

// Ensure frames can move to the render thread
static_assertions::assert_impl_all!(AudioFrame: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_format_bytes_per_sample() {
        assert_eq!(SampleFormat::U8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::F32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::F64.bytes_per_sample(), 8);
    }

    #[test]
    fn sample_format_is_float() {
        assert!(SampleFormat::F32.is_float());
        assert!(SampleFormat::F64.is_float());
        assert!(!SampleFormat::S16.is_float());
    }

    #[test]
    fn from_interleaved_round_trips_samples() {
        let input = [0.1f32, -0.1, 0.2, -0.2, 0.3, -0.3];
        let frame = AudioFrame::from_interleaved(&input, 48000, 2);

        assert_eq!(frame.samples, 3);
        assert_eq!(frame.total_samples(), 6);
        assert_eq!(frame.expected_data_len(), 6 * 4);
        assert_eq!(frame.to_f32().unwrap().as_ref(), &input);
    }

    #[test]
    fn from_interleaved_drops_partial_frame() {
        let frame = AudioFrame::from_interleaved(&[0.5, 0.5, 0.5], 48000, 2);
        assert_eq!(frame.samples, 1);
        assert_eq!(frame.data.len(), 8);
    }

    #[test]
    fn duration() {
        let frame = AudioFrame::new(vec![], 48000, 48000, 2, SampleFormat::F32);
        assert_eq!(frame.duration(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn f32_bytes_decode_from_any_buffer() {
        let input = [0.25f32, -0.5, 1.0];
        let data: Vec<u8> = input.iter().flat_map(|s| s.to_ne_bytes()).collect();
        let frame = AudioFrame::new(data, 3, 48000, 1, SampleFormat::F32);
        assert_eq!(frame.to_f32().unwrap().as_ref(), &input);

        // unaligned source bytes take the copying path
        let mut padded = vec![0u8];
        padded.extend(input.iter().flat_map(|s| s.to_ne_bytes()));
        let copied = bytemuck::pod_collect_to_vec::<u8, f32>(&padded[1..]);
        assert_eq!(copied, input);
    }

    #[test]
    fn s16_converts_to_unit_range() {
        let data: Vec<u8> = [i16::MIN, 0, 16384]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        let frame = AudioFrame::new(data, 3, 48000, 1, SampleFormat::S16);

        assert_eq!(frame.to_f32().unwrap().as_ref(), &[-1.0, 0.0, 0.5]);
    }

    #[test]
    fn short_data_is_invalid() {
        let frame = AudioFrame::new(vec![0; 7], 1, 48000, 2, SampleFormat::F32);
        assert!(!frame.is_valid());
        assert!(frame.to_f32().is_err());
        assert!(frame.interleaved_samples(48000, 2).is_none());
    }

    #[test]
    fn test_audio_flag() {
        let frame = AudioFrame::from_interleaved(&[0.0; 4], 48000, 2);
        assert!(!frame.is_test_audio());
        assert!(frame.with_test_audio(true).is_test_audio());
    }

    #[test]
    fn rate_mismatch_yields_nothing() {
        let frame = AudioFrame::from_interleaved(&[0.0; 4], 44100, 2);
        assert!(frame.interleaved_samples(48000, 2).is_none());
    }

    #[test]
    fn mono_is_duplicated() {
        let frame = AudioFrame::from_interleaved(&[0.25, 0.5], 48000, 1);
        let samples = frame.interleaved_samples(48000, 2).unwrap();
        assert_eq!(samples.as_ref(), &[0.25, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn extra_channels_are_dropped_and_missing_padded() {
        let frame = AudioFrame::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 48000, 3);
        let down = frame.interleaved_samples(48000, 2).unwrap();
        assert_eq!(down.as_ref(), &[1.0, 2.0, 4.0, 5.0]);

        let frame = AudioFrame::from_interleaved(&[1.0, 2.0, 3.0, 4.0], 48000, 2);
        let up = frame.interleaved_samples(48000, 3).unwrap();
        assert_eq!(up.as_ref(), &[1.0, 2.0, 0.0, 3.0, 4.0, 0.0]);
    }
}
