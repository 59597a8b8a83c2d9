use std::sync::Arc;

use tracing::debug;
use transport_engine::{PortId, Result, ServerClient, TransportError, TransportHandler};
use transport_types::{AudioPosition, TransportState};

use crate::server::{Inner, PortEntry};

/**
    A client connection to a [`SoftServer`](crate::SoftServer).
*/
pub struct SoftClient {
    inner: Arc<Inner>,
    id: u64,
    name: String,
}

impl SoftClient {
    pub(crate) fn new(inner: Arc<Inner>, id: u64, name: String) -> Self {
        Self { inner, id, name }
    }
}

impl ServerClient for SoftClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.inner.config.sample_rate
    }

    fn register_output_port(&self, name: &str) -> Result<PortId> {
        let mut server = self.inner.state.lock();
        if !server.running {
            return Err(TransportError::port_registration(name, "server is not running"));
        }

        let limit = self.inner.config.port_limit;
        let Some(client) = server.client_mut(self.id) else {
            return Err(TransportError::port_registration(name, "client is closed"));
        };
        if limit.is_some_and(|limit| client.ports.len() >= limit) {
            return Err(TransportError::port_registration(name, "port limit reached"));
        }
        if client.ports.iter().any(|port| port.name == name) {
            return Err(TransportError::port_registration(name, "port already exists"));
        }

        client.ports.push(PortEntry {
            name: name.to_string(),
            playback: None,
        });
        debug!(client = %self.name, port = name, "soft port registered");

        Ok(PortId(client.ports.len() - 1))
    }

    fn activate(&self, handler: Arc<dyn TransportHandler>) -> Result<()> {
        let mut server = self.inner.state.lock();
        if !server.running {
            return Err(TransportError::activation("server is not running"));
        }

        let Some(client) = server.client_mut(self.id) else {
            return Err(TransportError::activation("client is closed"));
        };
        if client.handler.is_some() {
            return Err(TransportError::activation("client is already active"));
        }

        client.handler = Some(handler);
        Ok(())
    }

    fn connect_to_playback(&self, port: PortId, index: usize) -> Result<bool> {
        let mut server = self.inner.state.lock();
        if index >= self.inner.config.playback_channels {
            return Ok(false);
        }

        let Some(client) = server.client_mut(self.id) else {
            return Err(TransportError::port_registration(
                format!("{port:?}"),
                "client is closed",
            ));
        };
        let Some(entry) = client.ports.get_mut(port.0) else {
            return Err(TransportError::port_registration(
                format!("{port:?}"),
                "unknown port",
            ));
        };

        entry.playback = Some(index);
        Ok(true)
    }

    fn query(&self) -> (TransportState, AudioPosition) {
        let server = self.inner.state.lock();
        (server.transport, AudioPosition(server.position))
    }

    fn start(&self) {
        self.inner.state.lock().request_start();
    }

    fn stop(&self) {
        self.inner.state.lock().request_stop();
    }

    fn locate(&self, position: AudioPosition) {
        self.inner.state.lock().request_locate(position);
    }

    fn close(&self) {
        // Wait out a running cycle so no callback follows
        let _cycle = self.inner.cycle.lock();

        let mut server = self.inner.state.lock();
        let before = server.clients.len();
        server.clients.retain(|client| client.id != self.id);
        if server.clients.len() != before {
            debug!(client = %self.name, "soft client closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use transport_engine::{AudioServer, ServerClient};

    use crate::{SoftServer, SoftServerConfig};

    #[test]
    fn port_limit_is_enforced() {
        let server = SoftServer::new(SoftServerConfig::default().with_port_limit(1));
        let client = server.connect("app").unwrap();
        assert!(client.register_output_port("out_1").is_ok());
        assert!(client.register_output_port("out_2").is_err());
    }

    #[test]
    fn duplicate_ports_are_rejected() {
        let server = SoftServer::default();
        let client = server.connect("app").unwrap();
        client.register_output_port("out_1").unwrap();
        assert!(client.register_output_port("out_1").is_err());
    }

    #[test]
    fn playback_connection_out_of_range() {
        let server = SoftServer::default();
        let client = server.connect("app").unwrap();
        let port = client.register_output_port("out_1").unwrap();
        assert!(!client.connect_to_playback(port, 2).unwrap());
        assert!(client.connect_to_playback(port, 1).unwrap());
        assert_eq!(server.clients()[0].connections, [Some(1)]);
    }

    #[test]
    fn closed_client_cannot_register() {
        let server = SoftServer::default();
        let client = server.connect("app").unwrap();
        client.close();
        assert!(client.register_output_port("out_1").is_err());
    }

    #[test]
    fn transport_commands_are_counted() {
        let server = SoftServer::default();
        let client = server.connect("app").unwrap();
        client.start();
        client.stop();
        client.stop();
        let stats = server.stats();
        assert_eq!((stats.starts, stats.stops, stats.locates), (1, 2, 0));
    }
}
