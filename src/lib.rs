//! mocktcp - Scripted mock TCP endpoint for testing stream-protocol clients.
//!
//! Declare what the client should do, let it run against the mock, then
//! `join` to get the first mismatch as a human-readable message.
//!
//! ```rust,no_run
//! use mocktcp::{MockConfig, MockServer};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # async fn demo() -> mocktcp::Result<()> {
//! let server = MockServer::start(MockConfig::default()).await?;
//! server.expect_connect()?;
//! server.expect_bytes(b"Hello")?;
//! server.send_bytes(b"Hi!")?;
//! server.expect_disconnect()?;
//!
//! let mut client = server.connect().await?;
//! client.write_all(b"Hello").await?;
//! let mut reply = [0u8; 3];
//! client.read_exact(&mut reply).await?;
//! client.close().await?;
//!
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
mod engine;
pub mod error;
pub mod event;
pub mod factory;
pub mod framing;
pub mod insights;
pub mod interpret;
pub mod ledger;
pub mod metrics;

pub use client::ClientStream;
pub use config::MockConfig;
pub use engine::MockServer;
pub use error::{MockError, Result};
pub use event::{ByteStr, Event};
pub use factory::MockServerFactory;
pub use framing::{encode_frame, read_frame, write_frame};
pub use insights::{init_test_tracing, init_tracing};
pub use interpret::interpret_error;
pub use metrics::{Metrics, MetricsSnapshot};
