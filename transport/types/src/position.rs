/*!
    Positions in the two clock domains and the mapping between them.
*/

use std::fmt;

use crate::Rational;

/**
    Frame index on the editing timeline (video-frame clock).
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoPosition(pub u64);

/**
    Sample-frame index on the audio server's transport (sample-frame clock).

    Only produced transiently while mapping to or from a [`VideoPosition`].
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AudioPosition(pub u64);

impl From<u64> for VideoPosition {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<VideoPosition> for u64 {
    fn from(position: VideoPosition) -> Self {
        position.0
    }
}

impl From<u64> for AudioPosition {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<AudioPosition> for u64 {
    fn from(position: AudioPosition) -> Self {
        position.0
    }
}

impl fmt::Display for VideoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {}", self.0)
    }
}

impl fmt::Display for AudioPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sample {}", self.0)
    }
}

/**
    Map an audio sample-frame position onto the video-frame clock.

    Computes `round(frame_rate * audio / sample_rate)` in exact integer
    arithmetic. Rounding (rather than truncating) keeps repeated
    conversions from drifting downwards over long sessions.

    A non-positive frame rate or a zero sample rate maps everything to
    frame zero.
*/
pub fn to_video_position(
    audio: AudioPosition,
    sample_rate: u32,
    frame_rate: Rational,
) -> VideoPosition {
    if sample_rate == 0 || !frame_rate.is_positive() {
        return VideoPosition(0);
    }

    let (num, den) = frame_rate.magnitudes();
    let numerator = num * audio.0 as u128;
    let denominator = den * sample_rate as u128;

    // Half-up rounding: (2n + d) / 2d
    let rounded = (2 * numerator + denominator) / (2 * denominator);
    VideoPosition(u64::try_from(rounded).unwrap_or(u64::MAX))
}

/**
    Map a video frame position onto the audio sample-frame clock.

    Computes `sample_rate * video / frame_rate`, truncated toward zero so
    the result is always an exact sample index the server can locate to.

    A non-positive frame rate maps everything to sample zero.
*/
pub fn to_audio_position(
    video: VideoPosition,
    frame_rate: Rational,
    sample_rate: u32,
) -> AudioPosition {
    if !frame_rate.is_positive() {
        return AudioPosition(0);
    }

    let (num, den) = frame_rate.magnitudes();
    let samples = sample_rate as u128 * video.0 as u128 * den / num;
    AudioPosition(u64::try_from(samples).unwrap_or(u64::MAX))
}

/**
    Clock mapping bound to a fixed frame rate and sample rate.

    The engine builds one of these when it attaches to a server, since
    the sample rate is only known after connecting.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockMapper {
    frame_rate: Rational,
    sample_rate: u32,
}

impl ClockMapper {
    /**
        Create a mapper for the given timeline frame rate and server sample rate.
    */
    pub const fn new(frame_rate: Rational, sample_rate: u32) -> Self {
        Self {
            frame_rate,
            sample_rate,
        }
    }

    /**
        Get the timeline frame rate.
    */
    pub fn frame_rate(&self) -> Rational {
        self.frame_rate
    }

    /**
        Get the server sample rate.
    */
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /**
        Map a server position onto the timeline.
    */
    #[inline]
    pub fn to_video(&self, audio: AudioPosition) -> VideoPosition {
        to_video_position(audio, self.sample_rate, self.frame_rate)
    }

    /**
        Map a timeline position onto the server transport.
    */
    #[inline]
    pub fn to_audio(&self, video: VideoPosition) -> AudioPosition {
        to_audio_position(video, self.frame_rate, self.sample_rate)
    }
}
