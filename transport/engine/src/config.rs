/*!
    Engine configuration.
*/

use serde::{Deserialize, Serialize};

use crate::{Result, TransportError};

/// Default client name registered with the audio server
pub const DEFAULT_CLIENT_NAME: &str = "timeline";

/// Default ring buffer capacity per channel (~170ms at 48kHz)
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Default number of output channels
pub const DEFAULT_CHANNELS: u16 = 2;

/**
    Configuration for [`TransportEngine::open_with`](crate::TransportEngine::open_with).

    Missing fields fall back to their defaults when deserializing.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name the client registers under.
    pub client_name: String,
    /// Number of output ports and ring buffers.
    pub channels: u16,
    /// Ring buffer capacity per channel, in samples.
    pub buffer_size: usize,
    /// Connect `out_N` to the N-th physical playback port after activation.
    pub auto_connect: bool,
    /// Take part in the transport sync handshake.
    pub transport_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            channels: DEFAULT_CHANNELS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            auto_connect: true,
            transport_enabled: true,
        }
    }
}

impl EngineConfig {
    /**
        Create a config with the given name and layout, other fields defaulted.
    */
    pub fn new(client_name: impl Into<String>, channels: u16, buffer_size: usize) -> Self {
        Self {
            client_name: client_name.into(),
            channels,
            buffer_size,
            ..Self::default()
        }
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn with_transport_enabled(mut self, transport_enabled: bool) -> Self {
        self.transport_enabled = transport_enabled;
        self
    }

    /**
        Reject layouts that cannot carry any audio.
    */
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "client name is empty".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(TransportError::InvalidConfig(
                "at least one channel is required".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(TransportError::InvalidConfig(
                "buffer size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
