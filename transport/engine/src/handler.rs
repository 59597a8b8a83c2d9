/*!
    State shared between the caller, the monitor thread and the server's
    realtime callbacks, and the callback entry points themselves.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use transport_types::{AudioPosition, ClockMapper, TransportState};

use crate::listener::TransportListener;
use crate::looping::LoopController;
use crate::ring::PoolReader;
use crate::server::{PortId, ProcessScope, TransportHandler};
use crate::sync::SyncProtocol;

/**
    Everything guarded by the transport mutex.
*/
pub(crate) struct TransportStatus {
    /// Last state the monitor thread observed from the server.
    pub(crate) reported: TransportState,
    /// Last state requested locally, or observed if more recent.
    pub(crate) requested: TransportState,
    /// Set by `close` or by a server shutdown; the monitor exits on it.
    pub(crate) shutdown: bool,
    pub(crate) looping: LoopController,
}

pub(crate) struct Shared {
    pub(crate) clock: ClockMapper,
    pub(crate) sync: SyncProtocol,
    pub(crate) status: Mutex<TransportStatus>,
    pub(crate) wakeup: Condvar,
    /// Only the realtime callback reads; callers lock it briefly to flush.
    pub(crate) reader: Mutex<PoolReader>,
    pub(crate) listener: Arc<dyn TransportListener>,
    ports: Vec<PortId>,
    server_gone: AtomicBool,
}

impl Shared {
    pub(crate) fn new(
        clock: ClockMapper,
        ports: Vec<PortId>,
        reader: PoolReader,
        listener: Arc<dyn TransportListener>,
        initial_state: TransportState,
        transport_enabled: bool,
    ) -> Self {
        Self {
            clock,
            sync: SyncProtocol::new(transport_enabled),
            status: Mutex::new(TransportStatus {
                reported: initial_state,
                requested: initial_state,
                shutdown: false,
                looping: LoopController::new(),
            }),
            wakeup: Condvar::new(),
            reader: Mutex::new(reader),
            listener,
            ports,
            server_gone: AtomicBool::new(false),
        }
    }

    /// True once the server dropped this client.
    pub(crate) fn server_gone(&self) -> bool {
        self.server_gone.load(Ordering::Acquire)
    }

    /// Ask the monitor thread to exit.
    pub(crate) fn request_shutdown(&self) {
        let mut status = self.status.lock();
        status.shutdown = true;
        self.wakeup.notify_all();
    }
}

impl TransportHandler for Shared {
    fn on_sync(&self, state: TransportState, position: AudioPosition) -> bool {
        self.sync.on_sync(state, self.clock.to_video(position)).is_roll()
    }

    fn on_process(&self, scope: &mut dyn ProcessScope) {
        let frames = scope.frames();

        match self.reader.try_lock() {
            Some(mut reader) => {
                for (channel, port) in self.ports.iter().enumerate() {
                    if let Some(buffer) = scope.port_buffer(*port) {
                        let len = frames.min(buffer.len());
                        reader.read_channel(channel, &mut buffer[..len]);
                    }
                }
            }
            None => {
                // Being flushed by a seek, output silence
                for port in &self.ports {
                    if let Some(buffer) = scope.port_buffer(*port) {
                        buffer.fill(0.0);
                    }
                }
            }
        }

        if !self.sync.is_enabled() {
            return;
        }

        // Server rolled without our vote, e.g. after its sync timeout
        if scope.transport_state() == TransportState::Rolling && self.sync.in_progress() {
            self.sync.reset();
        }

        // Skip the wakeup if the monitor holds the lock, the next cycle retries
        if let Some(status) = self.status.try_lock() {
            if status.reported != scope.transport_state() || self.sync.has_pending() {
                self.wakeup.notify_one();
            }
        }
    }

    fn on_shutdown(&self) {
        self.server_gone.store(true, Ordering::Release);
        self.request_shutdown();
    }
}

static_assertions::assert_impl_all!(Shared: Send, Sync);
