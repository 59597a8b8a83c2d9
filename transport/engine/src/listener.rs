use transport_types::TransportEvent;

/**
    Receives transport events from the engine's monitor thread.

    Listeners may call back into the engine (e.g. answer a
    `PlaybackSync` by seeking the timeline); the engine holds no locks
    while delivering.
*/
pub trait TransportListener: Send + Sync {
    fn on_event(&self, event: TransportEvent);
}

impl<F> TransportListener for F
where
    F: Fn(TransportEvent) + Send + Sync,
{
    fn on_event(&self, event: TransportEvent) {
        self(event)
    }
}

/// Listener that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl TransportListener for NullListener {
    fn on_event(&self, _event: TransportEvent) {}
}
