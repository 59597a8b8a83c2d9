/*!
    Drives the software server's process cycles, either from an audio
    device callback or from a timer thread.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tracing::{debug, error, info};
use transport_soft::SoftServer;

/**
    Whatever keeps cycles running. Dropping it stops them.
*/
pub enum Output {
    Device(cpal::Stream),
    Offline(OfflineDriver),
}

impl Output {
    pub fn start(server: SoftServer, offline: bool, period: usize) -> anyhow::Result<Self> {
        if offline {
            return Ok(Self::Offline(OfflineDriver::spawn(server, period)?));
        }
        Ok(Self::Device(device_stream(server)?))
    }

    pub fn stop(self) {
        match self {
            Self::Device(stream) => {
                if let Err(e) = stream.pause() {
                    debug!(error = %e, "could not pause output stream");
                }
            }
            Self::Offline(driver) => drop(driver),
        }
    }
}

fn device_stream(server: SoftServer) -> anyhow::Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no audio output device found")?;

    let supported = device
        .default_output_config()
        .context("failed to query output config")?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        bail!(
            "output device wants {:?} samples, only f32 is supported",
            supported.sample_format()
        );
    }

    let channels = server.config().playback_channels;
    let config = StreamConfig {
        channels: u16::try_from(channels).context("too many playback channels")?,
        sample_rate: SampleRate(server.config().sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        device = device
            .name()
            .unwrap_or_else(|_| "unknown".to_string())
            .as_str(),
        channels,
        sample_rate = config.sample_rate.0,
        "using audio output device"
    );

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                match server.cycle(frames) {
                    Some(cycle) => interleave(&cycle.playback, data),
                    None => data.fill(0.0),
                }
            },
            move |err| {
                error!(error = %err, "audio output stream error");
            },
            None,
        )
        .context("failed to build output stream")?;

    stream.play().context("failed to start output stream")?;
    Ok(stream)
}

/**
    Runs cycles at the server's sample rate without an audio device.
*/
pub struct OfflineDriver {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OfflineDriver {
    pub fn spawn(server: SoftServer, period: usize) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let interval = Duration::from_secs_f64(
            period as f64 / f64::from(server.config().sample_rate.max(1)),
        );

        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("offline-output".to_string())
            .spawn(move || {
                debug!(period, ?interval, "offline output started");
                while !flag.load(Ordering::Acquire) {
                    if server.cycle(period).is_none() {
                        break;
                    }
                    thread::sleep(interval);
                }
                debug!("offline output stopped");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for OfflineDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Interleave per-channel buffers into a device buffer, padding with silence.
fn interleave(playback: &[Vec<f32>], output: &mut [f32]) {
    let channels = playback.len().max(1);
    for (index, frame) in output.chunks_mut(channels).enumerate() {
        for (channel, sample) in frame.iter_mut().enumerate() {
            *sample = playback
                .get(channel)
                .and_then(|buffer| buffer.get(index))
                .copied()
                .unwrap_or(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_two_channels() {
        let playback = vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]];
        let mut output = [0.0; 6];
        interleave(&playback, &mut output);
        assert_eq!(output, [1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn interleave_pads_short_buffers() {
        let playback = vec![vec![1.0], vec![2.0]];
        let mut output = [9.0; 4];
        interleave(&playback, &mut output);
        assert_eq!(output, [1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn offline_driver_advances_transport() {
        let server = SoftServer::default();
        server.request_start();

        let driver = OfflineDriver::spawn(server.clone(), 64).unwrap();
        thread::sleep(Duration::from_millis(50));
        drop(driver);

        let (_, position) = server.transport();
        assert!(position.0 > 0);
    }
}
