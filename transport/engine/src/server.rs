/*!
    The seam between the engine and an external audio server.

    A server implementation provides [`AudioServer`] and [`ServerClient`];
    the engine provides a [`TransportHandler`] that the server calls back
    into from its realtime thread once the client is activated.
*/

use std::sync::Arc;

use transport_types::{AudioPosition, TransportState};

use crate::Result;

/**
    Handle to an output port registered by a client.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortId(pub usize);

/**
    View of one realtime process cycle.

    Handed to [`TransportHandler::on_process`] by the server.
*/
pub trait ProcessScope {
    /// Number of sample frames in this cycle.
    fn frames(&self) -> usize;

    /// Transport state at the start of this cycle.
    fn transport_state(&self) -> TransportState;

    /// Output buffer for a registered port, `frames()` samples long.
    fn port_buffer(&mut self, port: PortId) -> Option<&mut [f32]>;
}

/**
    Callbacks a server invokes on an activated client.

    `on_sync` and `on_process` run on the server's realtime thread and
    must not block, allocate, or call back into the server.
*/
pub trait TransportHandler: Send + Sync {
    /**
        Slow-sync poll. Called while the transport is starting or after a
        relocation; returning `false` holds the transport until the next
        cycle.
    */
    fn on_sync(&self, state: TransportState, position: AudioPosition) -> bool;

    /// Fill output port buffers for one cycle.
    fn on_process(&self, scope: &mut dyn ProcessScope);

    /// The server dropped this client. No further callbacks follow.
    fn on_shutdown(&self);
}

/**
    A connection to the audio server.
*/
pub trait ServerClient: Send + Sync {
    /// Name the server assigned to this client.
    fn name(&self) -> &str;

    /// Sample rate of the server in Hz.
    fn sample_rate(&self) -> u32;

    /// Register a mono output port.
    fn register_output_port(&self, name: &str) -> Result<PortId>;

    /// Install the callbacks and start receiving process cycles.
    fn activate(&self, handler: Arc<dyn TransportHandler>) -> Result<()>;

    /**
        Connect a port to the server's `index`-th physical playback port.
        Returns `Ok(false)` if there is no such playback port.
    */
    fn connect_to_playback(&self, port: PortId, index: usize) -> Result<bool>;

    /// Current transport state and position.
    fn query(&self) -> (TransportState, AudioPosition);

    /// Request the transport to start rolling.
    fn start(&self);

    /// Request the transport to stop.
    fn stop(&self);

    /// Request the transport to relocate.
    fn locate(&self, position: AudioPosition);

    /**
        Deactivate, unregister all ports and disconnect. After this returns
        the handler is never called again. Must tolerate repeated calls.
    */
    fn close(&self);
}

/**
    Entry point to an audio server.
*/
pub trait AudioServer: Send + Sync {
    /// Open a new client connection.
    fn connect(&self, client_name: &str) -> Result<Arc<dyn ServerClient>>;

    /// Check whether a server is reachable without keeping a connection.
    fn probe(&self) -> bool;
}

/**
    Owns a client for the duration of a session and closes it on drop,
    so early returns during `open` release everything acquired so far.
*/
pub(crate) struct ClientGuard {
    client: Arc<dyn ServerClient>,
}

impl ClientGuard {
    pub(crate) fn new(client: Arc<dyn ServerClient>) -> Self {
        Self { client }
    }

    pub(crate) fn shared(&self) -> Arc<dyn ServerClient> {
        Arc::clone(&self.client)
    }
}

impl std::ops::Deref for ClientGuard {
    type Target = dyn ServerClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.client.close();
    }
}
