/*!
    A software audio server for the transport engine.

    [`SoftServer`] implements the engine's server traits in process, with
    the transport semantics of a JACK server: starting and relocating poll
    every client's sync callback, and the transport rolls once all of them
    are ready or the configured sync timeout runs out. It does no I/O of
    its own; the owner drives it one period at a time with
    [`SoftServer::cycle`] and gets the mixed playback channels back, ready
    to hand to an audio device or inspect in a test.

    # Example

    ```ignore
    use transport_soft::{SoftServer, SoftServerConfig};

    let server = SoftServer::new(SoftServerConfig::new(48_000, 2));
    let engine = TransportEngine::new(Arc::new(server.clone()), rate, listener);
    engine.open("timeline", 2, 8192)?;

    // Audio callback
    if let Some(cycle) = server.cycle(512) {
        write_to_device(&cycle.playback);
    }
    ```
*/

mod client;
mod config;
mod server;

pub use client::SoftClient;
pub use config::{DEFAULT_SYNC_TIMEOUT, SoftServerConfig};
pub use server::{ClientInfo, Cycle, SoftServer, TransportStats};
