use serde::{Deserialize, Serialize};

/// Two seconds at 48 kHz.
pub const DEFAULT_SYNC_TIMEOUT: u64 = 96_000;

/**
    Configuration for a [`SoftServer`](crate::SoftServer).
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftServerConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of physical playback channels output ports can connect to.
    pub playback_channels: usize,
    /// Maximum number of ports a single client may register.
    pub port_limit: Option<usize>,
    /**
        Frames the transport may spend in sync polling before it rolls
        anyway. `None` waits for every client forever.
    */
    pub sync_timeout: Option<u64>,
}

impl Default for SoftServerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            playback_channels: 2,
            port_limit: None,
            sync_timeout: Some(DEFAULT_SYNC_TIMEOUT),
        }
    }
}

impl SoftServerConfig {
    pub fn new(sample_rate: u32, playback_channels: usize) -> Self {
        Self {
            sample_rate,
            playback_channels,
            port_limit: None,
            sync_timeout: Some(DEFAULT_SYNC_TIMEOUT),
        }
    }

    pub fn with_port_limit(mut self, limit: usize) -> Self {
        self.port_limit = Some(limit);
        self
    }

    pub fn with_sync_timeout(mut self, frames: Option<u64>) -> Self {
        self.sync_timeout = frames;
        self
    }
}
