/*!
    Transport states and controller-facing events.
*/

use crate::VideoPosition;

/**
    Transport state as reported by the external audio server.

    The server owns this state; clients only observe it and vote on
    whether it may move from `Starting` to `Rolling`.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// Transport is not moving.
    #[default]
    Stopped,
    /// Start was requested; the server is polling clients before rolling.
    Starting,
    /// Transport is moving.
    Rolling,
}

impl TransportState {
    /**
        Returns true while the server is polling clients for readiness.
    */
    pub const fn is_syncing(self) -> bool {
        matches!(self, Self::Stopped | Self::Starting)
    }
}

/**
    Events raised towards the playback controller.

    Delivered from the engine's monitor thread, never from the realtime
    audio callback.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportEvent {
    /**
        The server transport started rolling at the given position.
    */
    PlaybackStarted(VideoPosition),
    /**
        The server transport stopped at the given position.
    */
    PlaybackStopped(VideoPosition),
    /**
        Resync request: the controller should seek the timeline to this
        position and report it back through `set_current_position`.
    */
    PlaybackSync(VideoPosition),
    /**
        The server disconnected this client. The engine stays inert until
        it is closed and opened again.
    */
    ServerShutdown,
}
