use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};
use transport_types::{AudioSource, ClockMapper, Rational, TransportState, VideoPosition};

use crate::config::EngineConfig;
use crate::handler::Shared;
use crate::listener::TransportListener;
use crate::looping::{LoopAction, LoopRange, LoopState};
use crate::monitor::MonitorThread;
use crate::ring::{PoolWriter, ring_pool};
use crate::server::{AudioServer, ClientGuard, PortId};
use crate::Result;

/**
    Keeps a timeline's playback clock locked to an audio server's transport.

    The engine starts out invalid. [`open`](Self::open) attaches it to the
    server; from then on it feeds decoded audio to the server's realtime
    thread, votes in the server's transport sync handshake, and reports
    transport changes to its listener from a dedicated monitor thread.
    [`close`](Self::close) detaches again.

    Every operation other than `open` is a silent no-op while the engine
    is invalid, so callers never need to guard calls.
*/
pub struct TransportEngine {
    server: Arc<dyn AudioServer>,
    frame_rate: Rational,
    listener: Arc<dyn TransportListener>,
    session: RwLock<Option<Session>>,
}

impl TransportEngine {
    /**
        Create an unattached engine for a timeline running at `frame_rate`.
    */
    pub fn new(
        server: Arc<dyn AudioServer>,
        frame_rate: Rational,
        listener: Arc<dyn TransportListener>,
    ) -> Self {
        Self {
            server,
            frame_rate,
            listener,
            session: RwLock::new(None),
        }
    }

    /// Get the timeline frame rate.
    pub fn frame_rate(&self) -> Rational {
        self.frame_rate
    }

    /// Check whether the server is reachable without attaching.
    pub fn probe(&self) -> bool {
        self.server.probe()
    }

    /**
        Attach to the server with `channels` output ports and rings of
        `buffer_size` samples each. Other settings use their defaults.
    */
    pub fn open(&self, name: &str, channels: u16, buffer_size: usize) -> Result<()> {
        self.open_with(&EngineConfig::new(name, channels, buffer_size))
    }

    /**
        Attach to the server.

        Opening an engine that is already valid does nothing. On failure
        everything acquired during this call is released and the engine
        stays invalid.
    */
    pub fn open_with(&self, config: &EngineConfig) -> Result<()> {
        config.validate()?;

        let stale = {
            let mut session = self.session.write();
            if session.as_ref().is_some_and(Session::is_live) {
                debug!("transport engine already open");
                return Ok(());
            }
            session.take()
        };
        if let Some(stale) = stale {
            debug!("releasing session left behind by a server shutdown");
            stale.shutdown();
        }

        let opened = Session::open(
            self.server.as_ref(),
            config,
            self.frame_rate,
            Arc::clone(&self.listener),
        )?;

        let mut session = self.session.write();
        if session.is_some() {
            // Lost a race against another open
            drop(session);
            opened.shutdown();
            return Ok(());
        }
        *session = Some(opened);

        Ok(())
    }

    /**
        Detach from the server.

        Stops the monitor thread, closes the client and frees the rings.
        Safe to call any number of times.
    */
    pub fn close(&self) {
        let session = self.session.write().take();
        if let Some(session) = session {
            session.shutdown();
        }
    }

    /// True between a successful `open` and `close`, unless the server went away.
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Server sample rate, while valid.
    pub fn sample_rate(&self) -> Option<u32> {
        self.live().map(|session| session.shared.clock.sample_rate())
    }

    /// Clock mapping in use, while valid.
    pub fn clock(&self) -> Option<ClockMapper> {
        self.live().map(|session| session.shared.clock)
    }

    /**
        Start the server transport.

        `reset_loop` clears any loop range first.
    */
    pub fn start_playback(&self, reset_loop: bool) {
        if let Some(session) = self.live() {
            session.start(reset_loop);
        }
    }

    /**
        Stop the server transport.

        `reset_loop` clears any loop range first.
    */
    pub fn stop_playback(&self, reset_loop: bool) {
        if let Some(session) = self.live() {
            session.stop(reset_loop);
        }
    }

    /**
        Relocate the server transport to a timeline frame.

        Queued audio is flushed since it belongs to the old position.
    */
    pub fn seek_playback(&self, position: VideoPosition, reset_loop: bool) {
        if let Some(session) = self.live() {
            session.seek(position, reset_loop);
        }
    }

    /**
        Play the range `start..end`, starting playback if needed.

        With `infinite` the transport is sent back to `start` whenever the
        reported position reaches `end`; otherwise it stops there.
    */
    pub fn loop_playback(&self, start: VideoPosition, end: VideoPosition, infinite: bool) {
        if let Some(session) = self.live() {
            session.loop_range(LoopRange {
                start,
                end,
                infinite,
            });
        }
    }

    /// Drop any loop range.
    pub fn reset_looping(&self) {
        if let Some(session) = self.live() {
            session.shared.status.lock().looping.reset();
        }
    }

    /// Current loop state.
    pub fn loop_state(&self) -> LoopState {
        self.live()
            .map(|session| session.shared.status.lock().looping.state())
            .unwrap_or_default()
    }

    /**
        Queue decoded audio for the server.

        Skipped while a sync handshake is in progress, since the audio
        would belong to a position that is about to change. Invalid frames
        and test audio are ignored as well. Samples that do not fit in the
        rings are dropped.
    */
    pub fn update_buffers<S>(&self, frame: &S)
    where
        S: AudioSource + ?Sized,
    {
        if let Some(session) = self.live() {
            session.update_buffers(frame);
        }
    }

    /// Smallest free space across the channel rings, in samples.
    pub fn buffer_space(&self) -> Option<usize> {
        self.live().map(|session| session.writer.lock().free_space())
    }

    /**
        Current server transport position on the timeline.

        Returns frame zero while invalid.
    */
    pub fn playback_position(&self) -> VideoPosition {
        self.live()
            .map(|session| {
                let (_, position) = session.client.query();
                session.shared.clock.to_video(position)
            })
            .unwrap_or_default()
    }

    /// Last transport state observed by the monitor thread.
    pub fn transport_state(&self) -> TransportState {
        self.live()
            .map(|session| session.shared.status.lock().reported)
            .unwrap_or_default()
    }

    /**
        Take part in the transport sync handshake, or let the transport
        roll without waiting for the timeline.
    */
    pub fn set_transport_enabled(&self, enabled: bool) {
        if let Some(session) = self.live() {
            session.shared.sync.set_enabled(enabled);
        }
    }

    pub fn is_transport_enabled(&self) -> bool {
        self.live()
            .map(|session| session.shared.sync.is_enabled())
            .unwrap_or(false)
    }

    /// True if playback was requested or observed and not stopped since.
    pub fn does_playback(&self) -> bool {
        self.live()
            .map(|session| session.does_playback())
            .unwrap_or(false)
    }

    /**
        Report the timeline's current frame.

        Used to confirm a `PlaybackSync` request landed, and to drive the
        loop range.
    */
    pub fn set_current_position(&self, position: VideoPosition) {
        if let Some(session) = self.live() {
            session.set_current_position(position);
        }
    }

    fn live(&self) -> Option<MappedRwLockReadGuard<'_, Session>> {
        RwLockReadGuard::try_map(self.session.read(), |session| {
            session.as_ref().filter(|session| session.is_live())
        })
        .ok()
    }
}

impl Drop for TransportEngine {
    fn drop(&mut self) {
        self.close();
    }
}

/**
    Everything acquired between `open` and `close`.

    Fields drop in order: the client guard closes the connection before
    the rings are freed.
*/
struct Session {
    monitor: Option<MonitorThread>,
    client: ClientGuard,
    shared: Arc<Shared>,
    writer: Mutex<PoolWriter>,
    channels: u16,
}

impl Session {
    fn open(
        server: &dyn AudioServer,
        config: &EngineConfig,
        frame_rate: Rational,
        listener: Arc<dyn TransportListener>,
    ) -> Result<Self> {
        let client = ClientGuard::new(server.connect(&config.client_name)?);
        let sample_rate = client.sample_rate();

        let ports = (1..=config.channels)
            .map(|n| client.register_output_port(&format!("out_{n}")))
            .collect::<Result<Vec<PortId>>>()?;

        let (writer, reader) = ring_pool(config.channels as usize, config.buffer_size);
        let (initial_state, _) = client.query();

        let shared = Arc::new(Shared::new(
            ClockMapper::new(frame_rate, sample_rate),
            ports.clone(),
            reader,
            listener,
            initial_state,
            config.transport_enabled,
        ));

        client.activate(shared.clone())?;

        if config.auto_connect {
            for (index, port) in ports.iter().enumerate() {
                match client.connect_to_playback(*port, index) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(index, "no physical playback port left to connect");
                        break;
                    }
                    Err(e) => warn!(index, error = %e, "could not connect output port"),
                }
            }
        }

        let monitor = MonitorThread::spawn(Arc::clone(&shared), client.shared())?;

        info!(
            client = client.name(),
            channels = config.channels,
            buffer_size = config.buffer_size,
            sample_rate,
            %frame_rate,
            "transport engine open"
        );

        Ok(Self {
            monitor: Some(monitor),
            client,
            shared,
            writer: Mutex::new(writer),
            channels: config.channels,
        })
    }

    fn is_live(&self) -> bool {
        !self.shared.server_gone()
    }

    /// Stop the monitor, then close the client and free the rings.
    fn shutdown(mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.shutdown(&self.shared);
        }
        info!(client = self.client.name(), "transport engine closed");
    }

    fn start(&self, reset_loop: bool) {
        {
            let mut status = self.shared.status.lock();
            if reset_loop {
                status.looping.reset();
            }
            status.requested = TransportState::Rolling;
        }
        self.shared.sync.reset();
        self.client.start();
    }

    fn stop(&self, reset_loop: bool) {
        {
            let mut status = self.shared.status.lock();
            if reset_loop {
                status.looping.reset();
            }
            status.requested = TransportState::Stopped;
        }
        self.shared.sync.reset();
        self.client.stop();
    }

    fn seek(&self, position: VideoPosition, reset_loop: bool) {
        if reset_loop {
            self.shared.status.lock().looping.reset();
        }
        self.shared.sync.reset();
        self.shared.reader.lock().clear();
        self.client.locate(self.shared.clock.to_audio(position));
    }

    fn loop_range(&self, range: LoopRange) {
        if !self.does_playback() {
            self.start(false);
        }
        self.seek(range.start, false);
        self.shared.status.lock().looping.arm(range);
        debug!(start = %range.start, end = %range.end, infinite = range.infinite, "loop armed");
    }

    fn does_playback(&self) -> bool {
        self.shared.status.lock().requested != TransportState::Stopped
    }

    fn set_current_position(&self, position: VideoPosition) {
        self.shared.sync.set_current_position(position);

        let action = self.shared.status.lock().looping.on_position(position);
        match action {
            Some(LoopAction::Seek(start)) => {
                debug!(%start, "loop wrapped");
                self.seek(start, false);
            }
            Some(LoopAction::Stop) => {
                debug!(%position, "loop finished");
                self.stop(true);
            }
            None => {}
        }
    }

    fn update_buffers<S>(&self, frame: &S)
    where
        S: AudioSource + ?Sized,
    {
        if self.shared.sync.in_progress() {
            return;
        }
        if !frame.is_valid() || frame.is_test_audio() {
            return;
        }

        let Some(samples) =
            frame.interleaved_samples(self.shared.clock.sample_rate(), self.channels)
        else {
            return;
        };

        self.writer.lock().write_interleaved(&samples);
    }
}

static_assertions::assert_impl_all!(TransportEngine: Send, Sync);
