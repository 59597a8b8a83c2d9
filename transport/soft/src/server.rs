use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use transport_engine::{
    AudioServer, PortId, ProcessScope, ServerClient, TransportError, TransportHandler,
};
use transport_types::{AudioPosition, TransportState};

use crate::client::SoftClient;
use crate::config::SoftServerConfig;

/**
    Counts of transport commands the server received, from any client.
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub starts: usize,
    pub stops: usize,
    pub locates: usize,
}

/**
    Snapshot of one registered client.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub ports: Vec<String>,
    /// Playback channel each port is connected to, by port index.
    pub connections: Vec<Option<usize>>,
    pub active: bool,
}

/**
    Output of one process cycle.
*/
#[derive(Debug, Clone)]
pub struct Cycle {
    /// Transport state the cycle ran in.
    pub state: TransportState,
    /// Transport position at the start of the cycle.
    pub position: AudioPosition,
    /// One buffer per playback channel, mixed from every connected port.
    pub playback: Vec<Vec<f32>>,
}

pub(crate) struct PortEntry {
    pub(crate) name: String,
    pub(crate) playback: Option<usize>,
}

pub(crate) struct ClientEntry {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) ports: Vec<PortEntry>,
    pub(crate) handler: Option<Arc<dyn TransportHandler>>,
}

pub(crate) struct ServerState {
    pub(crate) running: bool,
    pub(crate) transport: TransportState,
    pub(crate) position: u64,
    pub(crate) pending_locate: Option<u64>,
    /// Clients must be polled before the transport may roll.
    pub(crate) needs_sync: bool,
    /// Frames spent polling clients since the current sync round began.
    pub(crate) sync_frames: u64,
    pub(crate) clients: Vec<ClientEntry>,
    pub(crate) next_id: u64,
    pub(crate) stats: TransportStats,
}

impl ServerState {
    pub(crate) fn client(&self, id: u64) -> Option<&ClientEntry> {
        self.clients.iter().find(|client| client.id == id)
    }

    pub(crate) fn client_mut(&mut self, id: u64) -> Option<&mut ClientEntry> {
        self.clients.iter_mut().find(|client| client.id == id)
    }

    pub(crate) fn request_start(&mut self) {
        self.stats.starts += 1;
        if self.transport == TransportState::Stopped {
            self.transport = TransportState::Starting;
            self.needs_sync = true;
            self.sync_frames = 0;
        }
    }

    pub(crate) fn request_stop(&mut self) {
        self.stats.stops += 1;
        self.transport = TransportState::Stopped;
    }

    pub(crate) fn request_locate(&mut self, position: AudioPosition) {
        self.stats.locates += 1;
        self.pending_locate = Some(position.0);
    }
}

pub(crate) struct Inner {
    pub(crate) config: SoftServerConfig,
    pub(crate) state: Mutex<ServerState>,
    /// Held for a whole cycle, so closing a client waits for callbacks to finish.
    pub(crate) cycle: Mutex<()>,
}

/**
    An in-process audio server with a JACK-style transport.

    Nothing runs on its own: the owner calls [`cycle`](Self::cycle) once per
    audio period, from an audio callback or a test. Each cycle applies any
    pending relocation, polls every active client's sync callback while the
    transport is starting or relocating, runs every client's process
    callback, then mixes connected ports into the playback channels.

    Clones share the same server.
*/
#[derive(Clone)]
pub struct SoftServer {
    inner: Arc<Inner>,
}

impl SoftServer {
    pub fn new(config: SoftServerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ServerState {
                    running: true,
                    transport: TransportState::Stopped,
                    position: 0,
                    pending_locate: None,
                    needs_sync: false,
                    sync_frames: 0,
                    clients: Vec::new(),
                    next_id: 0,
                    stats: TransportStats::default(),
                }),
                cycle: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &SoftServerConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Current transport state and position.
    pub fn transport(&self) -> (TransportState, AudioPosition) {
        let state = self.inner.state.lock();
        (state.transport, AudioPosition(state.position))
    }

    pub fn stats(&self) -> TransportStats {
        self.inner.state.lock().stats
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.inner
            .state
            .lock()
            .clients
            .iter()
            .map(|client| ClientInfo {
                name: client.name.clone(),
                ports: client.ports.iter().map(|port| port.name.clone()).collect(),
                connections: client.ports.iter().map(|port| port.playback).collect(),
                active: client.handler.is_some(),
            })
            .collect()
    }

    /// Start the transport as another transport master would.
    pub fn request_start(&self) {
        self.inner.state.lock().request_start();
    }

    /// Stop the transport as another transport master would.
    pub fn request_stop(&self) {
        self.inner.state.lock().request_stop();
    }

    /// Relocate the transport as another transport master would.
    pub fn request_locate(&self, position: AudioPosition) {
        self.inner.state.lock().request_locate(position);
    }

    /**
        Run one process cycle of `frames` sample frames.

        Returns `None` once the server has shut down. Must not be called
        from inside a client callback.
    */
    pub fn cycle(&self, frames: usize) -> Option<Cycle> {
        let _cycle = self.inner.cycle.lock();

        let (state, position, polling, active) = {
            let mut server = self.inner.state.lock();
            if !server.running {
                return None;
            }

            if let Some(target) = server.pending_locate.take() {
                server.position = target;
                if server.transport == TransportState::Rolling {
                    server.transport = TransportState::Starting;
                }
                server.needs_sync = true;
                server.sync_frames = 0;
            }

            let polling = server.needs_sync || server.transport == TransportState::Starting;
            let active: Vec<_> = server
                .clients
                .iter()
                .filter_map(|client| {
                    let handler = client.handler.clone()?;
                    Some((client.id, client.ports.len(), handler))
                })
                .collect();

            (server.transport, server.position, polling, active)
        };

        // Callbacks run without the state lock, clients query it from other threads
        let mut ready = true;
        if polling {
            for (_, _, handler) in &active {
                ready &= handler.on_sync(state, AudioPosition(position));
            }
        }

        let mut scopes = Vec::with_capacity(active.len());
        for (id, ports, handler) in &active {
            let mut scope = SoftScope::new(frames, state, *ports);
            handler.on_process(&mut scope);
            scopes.push((*id, scope));
        }

        let mut server = self.inner.state.lock();

        if polling && server.pending_locate.is_none() {
            server.sync_frames = server.sync_frames.saturating_add(frames as u64);
            let timed_out = self
                .inner
                .config
                .sync_timeout
                .is_some_and(|limit| server.sync_frames >= limit);

            if ready || timed_out {
                if !ready {
                    debug!(
                        position,
                        waited = server.sync_frames,
                        "soft transport sync timed out"
                    );
                }
                server.needs_sync = false;
                server.sync_frames = 0;
                if server.transport == TransportState::Starting {
                    server.transport = TransportState::Rolling;
                    debug!(position, "soft transport rolling");
                }
            }
        }

        if state == TransportState::Rolling
            && server.transport == TransportState::Rolling
            && server.pending_locate.is_none()
        {
            server.position = server.position.saturating_add(frames as u64);
        }

        let mut playback = vec![vec![0.0; frames]; self.inner.config.playback_channels];
        for (id, scope) in &scopes {
            let Some(client) = server.client(*id) else {
                continue;
            };
            for (port, buffer) in client.ports.iter().zip(&scope.buffers) {
                let Some(output) = port.playback.and_then(|channel| playback.get_mut(channel))
                else {
                    continue;
                };
                for (out, sample) in output.iter_mut().zip(buffer) {
                    *out += sample;
                }
            }
        }

        Some(Cycle {
            state,
            position: AudioPosition(position),
            playback,
        })
    }

    /**
        Shut the server down, dropping every client.

        Each active client's shutdown callback runs once; afterwards
        cycles return `None` and new connections fail.
    */
    pub fn shutdown(&self) {
        let _cycle = self.inner.cycle.lock();

        let handlers: Vec<_> = {
            let mut server = self.inner.state.lock();
            if !server.running {
                return;
            }
            server.running = false;
            server.transport = TransportState::Stopped;
            server.pending_locate = None;
            server.needs_sync = false;
            server
                .clients
                .drain(..)
                .filter_map(|client| client.handler)
                .collect()
        };

        info!(clients = handlers.len(), "soft server shutting down");
        for handler in handlers {
            handler.on_shutdown();
        }
    }

    /// Bring a shut down server back up with no clients and a stopped transport.
    pub fn restart(&self) {
        let mut server = self.inner.state.lock();
        if !server.running {
            server.running = true;
            info!("soft server restarted");
        }
    }
}

impl Default for SoftServer {
    fn default() -> Self {
        Self::new(SoftServerConfig::default())
    }
}

impl AudioServer for SoftServer {
    fn connect(&self, client_name: &str) -> transport_engine::Result<Arc<dyn ServerClient>> {
        let mut server = self.inner.state.lock();
        if !server.running {
            return Err(TransportError::client_open(
                client_name,
                "server is not running",
            ));
        }

        // Same rule as JACK: a taken name gets a numeric suffix
        let mut name = client_name.to_string();
        let mut suffix = 1;
        while server.clients.iter().any(|client| client.name == name) {
            suffix += 1;
            name = format!("{client_name}-{suffix:02}");
        }

        let id = server.next_id;
        server.next_id += 1;
        server.clients.push(ClientEntry {
            id,
            name: name.clone(),
            ports: Vec::new(),
            handler: None,
        });
        debug!(client = %name, "soft client connected");

        Ok(Arc::new(SoftClient::new(Arc::clone(&self.inner), id, name)))
    }

    fn probe(&self) -> bool {
        self.is_running()
    }
}

struct SoftScope {
    frames: usize,
    state: TransportState,
    buffers: Vec<Vec<f32>>,
}

impl SoftScope {
    fn new(frames: usize, state: TransportState, ports: usize) -> Self {
        Self {
            frames,
            state,
            buffers: vec![vec![0.0; frames]; ports],
        }
    }
}

impl ProcessScope for SoftScope {
    fn frames(&self) -> usize {
        self.frames
    }

    fn transport_state(&self) -> TransportState {
        self.state
    }

    fn port_buffer(&mut self, port: PortId) -> Option<&mut [f32]> {
        self.buffers.get_mut(port.0).map(Vec::as_mut_slice)
    }
}

static_assertions::assert_impl_all!(SoftServer: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Writes a constant to every port and votes as told.
    struct Constant {
        value: f32,
        ready: AtomicBool,
        polls: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    impl Constant {
        fn new(value: f32, ready: bool) -> Arc<Self> {
            Arc::new(Self {
                value,
                ready: AtomicBool::new(ready),
                polls: AtomicUsize::new(0),
                shutdowns: AtomicUsize::new(0),
            })
        }
    }

    impl TransportHandler for Constant {
        fn on_sync(&self, _state: TransportState, _position: AudioPosition) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.ready.load(Ordering::SeqCst)
        }

        fn on_process(&self, scope: &mut dyn ProcessScope) {
            for port in 0..2 {
                if let Some(buffer) = scope.port_buffer(PortId(port)) {
                    buffer.fill(self.value);
                }
            }
        }

        fn on_shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn attach(server: &SoftServer, handler: Arc<Constant>) -> Arc<dyn ServerClient> {
        let client = server.connect("test").unwrap();
        let left = client.register_output_port("out_1").unwrap();
        let right = client.register_output_port("out_2").unwrap();
        client.activate(handler).unwrap();
        assert!(client.connect_to_playback(left, 0).unwrap());
        assert!(client.connect_to_playback(right, 1).unwrap());
        client
    }

    #[test]
    fn stopped_transport_stays_put() {
        let server = SoftServer::default();
        let cycle = server.cycle(64).unwrap();
        assert_eq!(cycle.state, TransportState::Stopped);
        assert_eq!(cycle.playback.len(), 2);
        assert!(cycle.playback[0].iter().all(|&s| s == 0.0));
        assert_eq!(server.transport(), (TransportState::Stopped, AudioPosition(0)));
    }

    #[test]
    fn start_rolls_after_one_ready_poll() {
        let server = SoftServer::default();
        let handler = Constant::new(0.5, true);
        let _client = attach(&server, Arc::clone(&handler));

        server.request_start();
        let first = server.cycle(128).unwrap();
        assert_eq!(first.state, TransportState::Starting);
        assert_eq!(server.transport().0, TransportState::Rolling);
        assert_eq!(handler.polls.load(Ordering::SeqCst), 1);

        let second = server.cycle(128).unwrap();
        assert_eq!(second.state, TransportState::Rolling);
        assert_eq!(second.position, AudioPosition(0));
        assert_eq!(server.transport().1, AudioPosition(128));
        assert_eq!(handler.polls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slow_client_holds_transport() {
        let server = SoftServer::default();
        let handler = Constant::new(0.0, false);
        let _client = attach(&server, Arc::clone(&handler));

        server.request_start();
        for _ in 0..5 {
            server.cycle(64).unwrap();
        }
        assert_eq!(server.transport(), (TransportState::Starting, AudioPosition(0)));

        handler.ready.store(true, Ordering::SeqCst);
        server.cycle(64).unwrap();
        assert_eq!(server.transport().0, TransportState::Rolling);
    }

    #[test]
    fn slow_client_times_out() {
        let server = SoftServer::new(SoftServerConfig::default().with_sync_timeout(Some(128)));
        let handler = Constant::new(0.0, false);
        let _client = attach(&server, Arc::clone(&handler));

        server.request_start();
        server.cycle(64).unwrap();
        assert_eq!(server.transport().0, TransportState::Starting);

        server.cycle(64).unwrap();
        assert_eq!(server.transport(), (TransportState::Rolling, AudioPosition(0)));
        assert_eq!(handler.polls.load(Ordering::SeqCst), 2);

        // a relocation starts a fresh round with the full timeout
        server.request_locate(AudioPosition(1000));
        server.cycle(64).unwrap();
        assert_eq!(server.transport().0, TransportState::Starting);
        server.cycle(64).unwrap();
        assert_eq!(server.transport(), (TransportState::Rolling, AudioPosition(1000)));
    }

    #[test]
    fn no_timeout_waits_forever() {
        let server = SoftServer::new(SoftServerConfig::default().with_sync_timeout(None));
        let _client = attach(&server, Constant::new(0.0, false));

        server.request_start();
        for _ in 0..100 {
            server.cycle(4096).unwrap();
        }
        assert_eq!(server.transport(), (TransportState::Starting, AudioPosition(0)));
    }

    #[test]
    fn locate_while_rolling_resyncs() {
        let server = SoftServer::default();
        let handler = Constant::new(0.0, true);
        let _client = attach(&server, Arc::clone(&handler));

        server.request_start();
        server.cycle(64).unwrap();
        server.cycle(64).unwrap();

        server.request_locate(AudioPosition(48_000));
        let cycle = server.cycle(64).unwrap();
        assert_eq!(cycle.state, TransportState::Starting);
        assert_eq!(cycle.position, AudioPosition(48_000));
        assert_eq!(server.transport(), (TransportState::Rolling, AudioPosition(48_000)));
        assert_eq!(server.stats().locates, 1);
    }

    #[test]
    fn locate_while_stopped_polls_clients() {
        let server = SoftServer::default();
        let handler = Constant::new(0.0, true);
        let _client = attach(&server, Arc::clone(&handler));

        server.request_locate(AudioPosition(100));
        server.cycle(64).unwrap();
        assert_eq!(handler.polls.load(Ordering::SeqCst), 1);
        assert_eq!(server.transport(), (TransportState::Stopped, AudioPosition(100)));

        server.cycle(64).unwrap();
        assert_eq!(handler.polls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connected_ports_are_mixed() {
        let server = SoftServer::default();
        let _a = attach(&server, Constant::new(0.25, true));
        let _b = attach(&server, Constant::new(0.5, true));

        let cycle = server.cycle(16).unwrap();
        assert!(cycle.playback[0].iter().all(|&s| s == 0.75));
        assert!(cycle.playback[1].iter().all(|&s| s == 0.75));
    }

    #[test]
    fn duplicate_names_get_suffix() {
        let server = SoftServer::default();
        let a = server.connect("app").unwrap();
        let b = server.connect("app").unwrap();
        assert_eq!(a.name(), "app");
        assert_eq!(b.name(), "app-02");
    }

    #[test]
    fn closed_client_is_not_called() {
        let server = SoftServer::default();
        let handler = Constant::new(1.0, true);
        let client = attach(&server, Arc::clone(&handler));

        client.close();
        client.close();
        assert!(server.clients().is_empty());

        server.request_start();
        let cycle = server.cycle(16).unwrap();
        assert!(cycle.playback[0].iter().all(|&s| s == 0.0));
        assert_eq!(handler.polls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn shutdown_notifies_once() {
        let server = SoftServer::default();
        let handler = Constant::new(0.0, true);
        let _client = attach(&server, Arc::clone(&handler));

        server.shutdown();
        server.shutdown();
        assert_eq!(handler.shutdowns.load(Ordering::SeqCst), 1);
        assert!(server.cycle(16).is_none());
        assert!(!server.probe());
        assert!(server.connect("late").is_err());

        server.restart();
        assert!(server.probe());
        assert!(server.clients().is_empty());
        assert!(server.cycle(16).is_some());
    }
}
