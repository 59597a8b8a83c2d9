use thiserror::Error;

/**
    Failures while attaching to an audio server.

    Only `open` reports errors; everything after a successful open
    degrades silently instead.
*/
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not open client {name:?}: {reason}")]
    ClientOpen { name: String, reason: String },

    #[error("could not register port {port:?}: {reason}")]
    PortRegistration { port: String, reason: String },

    #[error("could not activate client: {reason}")]
    Activation { reason: String },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("could not start transport monitor: {0}")]
    MonitorSpawn(#[from] std::io::Error),
}

impl TransportError {
    pub fn client_open(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ClientOpen {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn port_registration(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PortRegistration {
            port: port.into(),
            reason: reason.into(),
        }
    }

    pub fn activation(reason: impl Into<String>) -> Self {
        Self::Activation {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
