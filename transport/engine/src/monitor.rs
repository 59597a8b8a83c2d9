/*!
    Transport monitor thread.

    Sleeps on the transport condition variable and wakes when the realtime
    callback notices the server state drifted from the last observed one,
    or when a sync poll left a seek request behind. It is the only thread
    that calls the listener.
*/

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::MutexGuard;
use tracing::{debug, warn};
use transport_types::{TransportEvent, TransportState};

use crate::handler::Shared;
use crate::server::ServerClient;

pub(crate) struct MonitorThread {
    handle: Option<JoinHandle<()>>,
}

impl MonitorThread {
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        client: Arc<dyn ServerClient>,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name("transport-monitor".to_string())
            .spawn(move || run(shared, client))?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    /**
        Signal the thread to exit and wait for it.

        When called from the monitor thread itself (a listener closing the
        engine) the join is skipped; the loop observes the flag as soon as
        the listener returns.
    */
    pub(crate) fn shutdown(mut self, shared: &Shared) {
        shared.request_shutdown();

        let Some(handle) = self.handle.take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            debug!("transport monitor closed from its own listener, not joining");
            return;
        }

        if handle.join().is_err() {
            warn!("transport monitor panicked");
        }
    }
}

fn run(shared: Arc<Shared>, client: Arc<dyn ServerClient>) {
    debug!("transport monitor started");

    let mut status = shared.status.lock();
    while !status.shutdown {
        let (state, position) = client.query();
        let position = shared.clock.to_video(position);

        let mut transition = None;
        if state != status.reported {
            status.reported = state;
            status.requested = state;
            transition = match state {
                TransportState::Rolling => Some(TransportEvent::PlaybackStarted(position)),
                TransportState::Stopped => Some(TransportEvent::PlaybackStopped(position)),
                TransportState::Starting => None,
            };
            debug!(?state, %position, "transport state changed");
        }

        let sync = shared.sync.take_pending().map(TransportEvent::PlaybackSync);

        if transition.is_none() && sync.is_none() {
            shared.wakeup.wait(&mut status);
            continue;
        }

        // Listeners may call back into the engine
        MutexGuard::unlocked(&mut status, || {
            for event in [transition, sync].into_iter().flatten() {
                shared.listener.on_event(event);
            }
        });
    }
    drop(status);

    if shared.server_gone() {
        shared.listener.on_event(TransportEvent::ServerShutdown);
    }

    debug!("transport monitor exited");
}
