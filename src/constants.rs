//! Mock endpoint defaults.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Per-step timeout used when a declaration does not name one
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(1);

/// Listener address; port 0 lets the OS pick a free port
pub const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));

/// Slack the evaluator allows past an action's own deadline before it
/// stops waiting for that action's event
pub const EVENT_GRACE: Duration = Duration::from_millis(250);

/// Length prefix of a frame: big-endian u32
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest frame payload the mock will read
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024; // 16 MiB
