/*!
    Shared types for the timeline transport crates.

    This crate defines the vocabulary that crosses crate boundaries: positions in
    both clock domains and the mapping between them, transport states and events,
    and the decoded audio frames handed to the engine. It has no dependency on any
    audio server binding.

    # Clock Domains

    - [`VideoPosition`] - Frame index on the editing timeline
    - [`AudioPosition`] - Sample-frame index on the audio server's transport
    - [`ClockMapper`] - Conversion between the two, see also
      [`to_video_position`] and [`to_audio_position`]
    - [`Rational`] - Exact frame rates such as 30000/1001

    # Transport

    - [`TransportState`] - State reported by the audio server
    - [`TransportEvent`] - Events raised towards the playback controller

    # Audio Frames

    - [`AudioFrame`] and [`SampleFormat`] - Decoded audio
    - [`AudioSource`] - What the engine needs from a decoded frame

    # Error Handling

    - [`Error`] and [`Result`] - Common error types
*/

mod error;
mod frame;
mod position;
mod rational;
mod state;

pub use error::{Error, Result};
pub use frame::{AudioFrame, AudioSource, SampleFormat};
pub use position::{AudioPosition, ClockMapper, VideoPosition, to_audio_position, to_video_position};
pub use rational::Rational;
pub use state::{TransportEvent, TransportState};
