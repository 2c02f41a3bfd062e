//! Insights - Observability for the mock endpoint.
//!
//! Every engine component logs through `tracing`. Nothing is printed until a
//! subscriber is installed.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn my_test() {
//!     mocktcp::init_test_tracing();
//!     // ...
//! }
//! ```
//! Run with `cargo test -- --nocapture` to see the engine's queue and event flow.

use tracing::Level;

/// Install a debug-level fmt subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    init_tracing(Level::DEBUG);
}

/// Install a fmt subscriber at `level` (no-op if one is already installed)
pub fn init_tracing(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .with_target(true)
        .try_init();
}

/// Record bytes written by the mock (creates a span visible to subscribers)
#[inline]
pub fn record_send(bytes: u64) {
    let _span = tracing::trace_span!("send", bytes).entered();
}

/// Record bytes read by the mock
#[inline]
pub fn record_receive(bytes: u64) {
    let _span = tracing::trace_span!("recv", bytes).entered();
}

/// Record bytes consumed by the intercepted peer
#[inline]
pub fn record_peer_read(bytes: u64) {
    let _span = tracing::trace_span!("peer_read", bytes).entered();
}
