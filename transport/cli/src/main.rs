use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transport_engine::{EngineConfig, TransportEngine, TransportListener};
use transport_soft::{SoftServer, SoftServerConfig};
use transport_types::{Rational, TransportEvent, TransportState, VideoPosition};

mod output;
mod tone;

use output::Output;
use tone::ToneGenerator;

#[derive(Parser, Debug)]
#[command(name = "transport-demo")]
#[command(about = "Plays a test tone on a timeline locked to a software audio transport")]
struct Args {
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Client name registered with the server
    #[arg(long)]
    name: Option<String>,

    /// Number of output channels
    #[arg(short, long)]
    channels: Option<u16>,

    /// Ring buffer size per channel, in samples
    #[arg(short, long)]
    buffer_size: Option<usize>,

    /// Timeline frame rate, e.g. "25" or "30000/1001"
    #[arg(long, default_value = "25")]
    fps: Rational,

    /// Server sample rate in Hz
    #[arg(long, default_value = "48000")]
    sample_rate: u32,

    /// Test tone frequency in Hz
    #[arg(long, default_value = "440")]
    frequency: f64,

    /// How long to run, in seconds
    #[arg(short, long, default_value = "5")]
    seconds: f64,

    /// Start playback from this timeline frame
    #[arg(long)]
    seek: Option<u64>,

    /// Loop start frame (needs --loop-out)
    #[arg(long, requires = "loop_out")]
    loop_in: Option<u64>,

    /// Loop end frame (needs --loop-in)
    #[arg(long, requires = "loop_in")]
    loop_out: Option<u64>,

    /// Keep looping instead of stopping at the loop end
    #[arg(long)]
    infinite: bool,

    /// Roll without waiting for the timeline to follow
    #[arg(long)]
    no_sync: bool,

    /// Drive the server from a timer instead of the audio device
    #[arg(long)]
    offline: bool,

    /// Frames per process cycle when running offline
    #[arg(long, default_value = "512")]
    period: usize,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    run(Args::parse())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

fn run(args: Args) -> anyhow::Result<()> {
    if !args.fps.is_positive() {
        bail!("frame rate must be positive, got {}", args.fps);
    }
    if args.period == 0 {
        bail!("period must be non-zero");
    }

    let config = engine_config(&args)?;
    let server = SoftServer::new(SoftServerConfig::new(
        args.sample_rate,
        config.channels as usize,
    ));

    let timeline = Arc::new(Timeline::default());
    let engine = Arc::new(TransportEngine::new(
        Arc::new(server.clone()),
        args.fps,
        timeline.clone(),
    ));
    timeline.attach(&engine);

    if !engine.probe() {
        bail!("audio server is not running");
    }
    engine.open_with(&config)?;

    let output = Output::start(server, args.offline, args.period)?;
    let mut tone = ToneGenerator::new(args.frequency, args.sample_rate, config.channels);
    feed(&engine, &mut tone, args.period);

    match (args.loop_in, args.loop_out) {
        (Some(start), Some(end)) => {
            info!(start, end, infinite = args.infinite, "looping");
            engine.loop_playback(VideoPosition(start), VideoPosition(end), args.infinite);
        }
        _ => {
            if let Some(frame) = args.seek {
                engine.seek_playback(VideoPosition(frame), true);
            }
            engine.start_playback(true);
        }
    }

    let frame_duration = Duration::from_secs_f64(1.0 / args.fps.to_f64());
    let deadline = Instant::now() + Duration::from_secs_f64(args.seconds.max(0.0));
    let mut last_report = Instant::now();

    while Instant::now() < deadline && engine.is_valid() {
        feed(&engine, &mut tone, args.period);

        // The timeline shows whatever the transport plays
        if engine.transport_state() == TransportState::Rolling {
            let position = engine.playback_position();
            timeline.show(position);
            engine.set_current_position(position);
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            info!(
                frame = timeline.frame(),
                state = ?engine.transport_state(),
                buffered = engine.buffer_space().map(|free| config.buffer_size - free),
                "timeline"
            );
        }

        thread::sleep(frame_duration);
    }

    engine.stop_playback(true);
    output.stop();
    engine.close();
    info!(frame = timeline.frame(), "done");

    Ok(())
}

fn engine_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Some(name) = &args.name {
        config.client_name = name.clone();
    }
    if let Some(channels) = args.channels {
        config.channels = channels;
    }
    if let Some(buffer_size) = args.buffer_size {
        config.buffer_size = buffer_size;
    }
    if args.no_sync {
        config.transport_enabled = false;
    }

    config.validate()?;
    Ok(config)
}

/// Top up the rings with tone until they are full or the engine stops taking audio.
fn feed(engine: &TransportEngine, tone: &mut ToneGenerator, chunk: usize) {
    while let Some(space) = engine.buffer_space() {
        if space < chunk {
            break;
        }
        engine.update_buffers(&tone.next_frame(chunk));
        if engine.buffer_space() == Some(space) {
            // Skipped while the transport syncs
            break;
        }
    }
}

/**
    Stand-in for an editor timeline: shows a frame and follows the
    transport's sync requests.
*/
#[derive(Default)]
struct Timeline {
    engine: OnceLock<Weak<TransportEngine>>,
    frame: AtomicU64,
}

impl Timeline {
    fn attach(&self, engine: &Arc<TransportEngine>) {
        let _ = self.engine.set(Arc::downgrade(engine));
    }

    fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    fn show(&self, position: VideoPosition) {
        self.frame.store(position.0, Ordering::Relaxed);
    }
}

impl TransportListener for Timeline {
    fn on_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::PlaybackSync(position) => {
                info!(%position, "timeline seeking for sync");
                self.show(position);
                if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                    engine.set_current_position(position);
                }
            }
            TransportEvent::PlaybackStarted(position) => info!(%position, "playback started"),
            TransportEvent::PlaybackStopped(position) => info!(%position, "playback stopped"),
            TransportEvent::ServerShutdown => warn!("audio server shut down"),
        }
    }
}
