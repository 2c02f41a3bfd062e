//! Mock endpoint configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::config_error;
use crate::constants::{DEFAULT_BIND_ADDR, DEFAULT_MAX_FRAME_LEN, DEFAULT_STEP_TIMEOUT};
use crate::error::Result;

/// Configuration for one mock endpoint
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Address the listener binds to (port 0 = OS-assigned)
    pub bind_addr: SocketAddr,
    /// Timeout for declarations that do not name one
    pub default_timeout: Duration,
    /// Largest frame payload accepted by `expect_frame`
    pub max_frame_len: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            default_timeout: DEFAULT_STEP_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl MockConfig {
    /// Create a configuration listening on `bind_addr`
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    /// Reject values the engine cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout.is_zero() {
            return Err(config_error!("default_timeout must be non-zero"));
        }
        if self.max_frame_len == 0 || self.max_frame_len > u32::MAX as usize {
            return Err(config_error!(
                "max_frame_len must be in 1..={}, got {}",
                u32::MAX,
                self.max_frame_len
            ));
        }
        Ok(())
    }
}
