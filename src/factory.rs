//! Multi-server fixture.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tracing::debug;

use crate::client::ClientStream;
use crate::config::MockConfig;
use crate::engine::MockServer;
use crate::error::{MockError, Result};

/// Creates mock servers from one configuration and tears them all down at once.
///
/// Each server gets its own OS-assigned port, whatever port the configuration
/// names.
#[derive(Debug)]
pub struct MockServerFactory {
    config: MockConfig,
    servers: Mutex<BTreeMap<u16, MockServer>>,
}

impl MockServerFactory {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            servers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Start a new server and remember it by port.
    pub async fn spawn(&self) -> Result<MockServer> {
        let server = MockServer::start(self.config.clone().with_port(0)).await?;
        debug!(port = server.port(), "factory spawned server");
        self.servers.lock().insert(server.port(), server.clone());
        Ok(server)
    }

    pub fn server(&self, port: u16) -> Option<MockServer> {
        self.servers.lock().get(&port).cloned()
    }

    pub fn ports(&self) -> Vec<u16> {
        self.servers.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.lock().is_empty()
    }

    /// Open an intercepted connection to the server listening on `port`.
    pub async fn connect(&self, port: u16) -> Result<ClientStream<TcpStream>> {
        let server = self.server(port).ok_or(MockError::UnknownPort { port })?;
        server.connect().await
    }

    /// Expect every healthy server to see a clean disconnect, stop them all,
    /// and return the first failure.
    pub async fn stop(&self) -> Result<()> {
        let servers: Vec<MockServer> = self.servers.lock().values().cloned().collect();

        let mut first_error = None;
        for server in servers {
            if !server.join_already_failed() && !server.is_stopped() {
                if let Err(err) = server.expect_disconnect() {
                    first_error.get_or_insert(err);
                }
            }
            if let Err(err) = server.stop().await {
                debug!(port = server.port(), error = %err, "server stopped with failure");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_forces_ephemeral_ports() {
        let factory = MockServerFactory::new(MockConfig::default().with_port(0));
        let a = factory.spawn().await.unwrap();
        let b = factory.spawn().await.unwrap();

        assert_ne!(a.port(), b.port());
        assert_eq!(factory.len(), 2);
        assert!(factory.server(a.port()).is_some());

        let mut ports = vec![a.port(), b.port()];
        ports.sort_unstable();
        assert_eq!(factory.ports(), ports);

        a.stop().await.unwrap();
        b.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_unknown_port() {
        let factory = MockServerFactory::new(MockConfig::default());
        assert!(factory.is_empty());
        let err = factory.connect(1).await.unwrap_err();
        assert!(matches!(err, MockError::UnknownPort { port: 1 }));
    }

    #[tokio::test]
    async fn test_stop_with_no_servers() {
        let factory = MockServerFactory::new(MockConfig::default());
        factory.stop().await.unwrap();
    }
}
