/*!
    Locks a timeline playback clock to an external audio server transport.

    The [`TransportEngine`] registers as a client with an audio server,
    feeds it decoded audio through per-channel ring buffers, takes part in
    the server's transport sync handshake, and reports transport changes
    back to the timeline through a [`TransportListener`].

    The server itself sits behind the [`AudioServer`] and [`ServerClient`]
    traits, so the engine can drive any JACK-style server.

    # Example

    ```ignore
    use std::sync::Arc;
    use transport_engine::{TransportEngine, TransportEvent, VideoPosition};

    let engine = Arc::new(TransportEngine::new(server, "25".parse()?, Arc::new(
        |event: TransportEvent| println!("{event:?}"),
    )));

    engine.open("timeline", 2, 8192)?;
    engine.start_playback(true);

    // Decoder thread
    engine.update_buffers(&frame);

    // Timeline thread, after each displayed frame
    engine.set_current_position(VideoPosition(42));

    engine.close();
    ```

    # Threads

    - Caller thread(s): every public `TransportEngine` method
    - Server realtime thread: sync polls and process cycles, never blocks
    - Monitor thread: wakes on transport changes and calls the listener
*/

mod config;
mod engine;
mod error;
mod handler;
mod listener;
mod looping;
mod monitor;
mod ring;
mod server;
mod sync;

pub use config::{DEFAULT_BUFFER_SIZE, DEFAULT_CHANNELS, DEFAULT_CLIENT_NAME, EngineConfig};
pub use engine::TransportEngine;
pub use error::{Result, TransportError};
pub use listener::{NullListener, TransportListener};
pub use looping::{LoopAction, LoopController, LoopRange, LoopState};
pub use ring::{ChannelReader, ChannelWriter, PoolReader, PoolWriter, channel_ring, ring_pool};
pub use server::{AudioServer, PortId, ProcessScope, ServerClient, TransportHandler};
pub use sync::SyncVote;

pub use transport_types::{
    AudioFrame, AudioPosition, AudioSource, ClockMapper, Rational, SampleFormat, TransportEvent,
    TransportState, VideoPosition,
};
