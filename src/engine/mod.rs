//! The expectation-sequencing engine.
//!
//! A [`MockServer`] listens on one port and plays the server side of a single
//! logical connection. Test code declares the script; the engine drives the
//! transport in the background and `join` reports the first mismatch.
//!
//! ```text
//! declare ──► expectation queue ──► evaluator ──► action queue ──► executor
//!                                      ▲                               │
//!                                      └──────── event queue ◄─────────┘
//!                                                    ▲
//!                                  acceptor (Connected / DuplicateConnectionAttempt)
//! ```

mod action;
mod queue;
mod scheduler;
mod sink;
mod step;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::client::ClientStream;
use crate::config::MockConfig;
use crate::error::{MockError, Result};
use crate::event::{ByteStr, Event};
use crate::framing::encode_frame;
use crate::insights::record_peer_read;
use crate::interpret::interpret_error;
use crate::ledger::ByteLedger;
use crate::metrics::{Metrics, MetricsSnapshot};
use queue::{CompletionTracker, ExpectationQueue};
use sink::ErrorSink;
use step::Step;

/// Mutable engine state behind one lock
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    /// Set by the first accepted connection
    pub(crate) connected: bool,
    /// Set once teardown begins; declarations are rejected after this
    pub(crate) stopped: bool,
    /// Set when `join` has reported a failure
    pub(crate) join_failed: bool,
    pub(crate) ledger: ByteLedger,
}

/// State shared by the handle, the background tasks and intercepted peers
pub(crate) struct Shared {
    pub(crate) config: MockConfig,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) errors: ErrorSink,
    pub(crate) metrics: Metrics,
    /// The accepted connection; only the executor does I/O on it
    transport: tokio::sync::Mutex<Option<TcpStream>>,
    transport_ready: watch::Sender<bool>,
    events: mpsc::UnboundedSender<Event>,
    /// Latch: set once the peer has run its close-then-wait-closed sequence
    close_ack: watch::Sender<bool>,
}

impl Shared {
    fn new(config: MockConfig, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            config,
            state: Mutex::new(EngineState::default()),
            errors: ErrorSink::new(),
            metrics: Metrics::new(),
            transport: tokio::sync::Mutex::new(None),
            transport_ready: watch::channel(false).0,
            events,
            close_ack: watch::channel(false).0,
        }
    }

    pub(crate) fn publish(&self, event: Event) {
        debug!(%event, "publishing event");
        self.metrics.record_event();
        // The evaluator owns the receiver; it is only gone during teardown.
        let _ = self.events.send(event);
    }

    /// Connection-registration entry point, called once per accepted stream.
    pub(crate) async fn register_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let duplicate = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.connected, true)
        };
        self.metrics.record_connection(duplicate);

        if duplicate {
            warn!(%peer, "second connection attempted while a client is connected");
            drop(stream);
            self.publish(Event::DuplicateConnectionAttempt);
            return;
        }

        info!(%peer, "client connected");
        *self.transport.lock().await = Some(stream);
        self.transport_ready.send_replace(true);
        self.publish(Event::Connected);
    }

    /// The transport, once a client has connected, or `None` at `deadline`.
    pub(crate) async fn transport_until(
        &self,
        deadline: Instant,
    ) -> Option<tokio::sync::MutexGuard<'_, Option<TcpStream>>> {
        let mut ready = self.transport_ready.subscribe();
        let connected = timeout_at(deadline, ready.wait_for(|r| *r))
            .await
            .is_ok_and(|waited| waited.is_ok());
        if !connected {
            return None;
        }
        timeout_at(deadline, self.transport.lock()).await.ok()
    }

    pub(crate) fn record_peer_read(&self, bytes: &[u8]) {
        self.state.lock().ledger.record_read(bytes);
        record_peer_read(bytes.len() as u64);
    }

    pub(crate) fn acknowledge_close(&self) {
        debug!("peer acknowledged close");
        self.close_ack.send_replace(true);
    }

    pub(crate) async fn close_acknowledged_within(&self, wait: Duration) -> bool {
        let mut latch = self.close_ack.subscribe();
        timeout(wait, latch.wait_for(|acked| *acked))
            .await
            .is_ok_and(|waited| waited.is_ok())
    }
}

struct Tasks {
    acceptor: JoinHandle<()>,
    evaluator: JoinHandle<()>,
    executor: JoinHandle<()>,
}

impl Tasks {
    fn abort(&self) {
        self.acceptor.abort();
        self.evaluator.abort();
        self.executor.abort();
    }

    /// Cancel all three and wait until they are gone.
    async fn shutdown(self) {
        self.abort();
        for handle in [self.acceptor, self.evaluator, self.executor] {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "background task panicked");
                }
            }
        }
    }
}

struct Inner {
    shared: Arc<Shared>,
    expectations: ExpectationQueue,
    local_addr: SocketAddr,
    tasks: Mutex<Option<Tasks>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.abort();
        }
    }
}

/// Scripted mock endpoint for one logical connection.
///
/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct MockServer {
    inner: Arc<Inner>,
}

impl MockServer {
    /// Bind the listener and launch the acceptor, evaluator and executor.
    ///
    /// The listener accepts from the moment this returns, so a client may
    /// connect before `expect_connect` is declared.
    pub async fn start(config: MockConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (step_tx, step_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared::new(config, event_tx));
        let tracker = CompletionTracker::new();
        let expectations = ExpectationQueue::new(step_tx, tracker.clone());

        let tasks = Tasks {
            evaluator: tokio::spawn(scheduler::run_evaluator(
                shared.clone(),
                step_rx,
                action_tx,
                event_rx,
                tracker,
            )),
            executor: tokio::spawn(scheduler::run_executor(shared.clone(), action_rx)),
            acceptor: tokio::spawn(scheduler::run_acceptor(shared.clone(), listener)),
        };

        info!(%local_addr, "mock server listening");
        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                expectations,
                local_addr,
                tasks: Mutex::new(Some(tasks)),
            }),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Port clients should connect to
    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    /// Configuration the server was started with
    pub fn config(&self) -> &MockConfig {
        &self.shared().config
    }

    /// Point-in-time copy of the engine counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared().metrics.snapshot()
    }

    /// Everything the mock has written so far
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.shared().state.lock().ledger.sent().to_vec()
    }

    /// Everything intercepted peers have read so far
    pub fn read_bytes(&self) -> Vec<u8> {
        self.shared().state.lock().ledger.read().to_vec()
    }

    /// Every failure recorded so far, first one first
    pub fn errors(&self) -> Vec<Arc<MockError>> {
        self.shared().errors.snapshot()
    }

    /// True once `join` has reported a failure
    pub fn join_already_failed(&self) -> bool {
        self.shared().state.lock().join_failed
    }

    /// True once `stop` has begun; declarations are rejected from then on
    pub fn is_stopped(&self) -> bool {
        self.shared().state.lock().stopped
    }

    /// Open a client connection to this server, intercepted for the script.
    pub async fn connect(&self) -> Result<ClientStream<TcpStream>> {
        let stream = TcpStream::connect(self.inner.local_addr).await?;
        Ok(self.intercept(stream))
    }

    /// Wrap an already-open client stream so its reads and close are observed.
    pub fn intercept<S>(&self, stream: S) -> ClientStream<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        ClientStream::new(stream, self.inner.shared.clone())
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// A client connects within the default timeout.
    pub fn expect_connect(&self) -> Result<()> {
        self.expect_connect_within(self.default_timeout())
    }

    pub fn expect_connect_within(&self, timeout: Duration) -> Result<()> {
        self.declare(vec![Step::Connect { timeout }])
    }

    /// The client sends exactly `expected`.
    pub fn expect_bytes(&self, expected: impl AsRef<[u8]>) -> Result<()> {
        self.expect_bytes_within(expected, self.default_timeout())
    }

    pub fn expect_bytes_within(&self, expected: impl AsRef<[u8]>, timeout: Duration) -> Result<()> {
        self.declare(vec![Step::ReceiveExact {
            expected: expected.as_ref().to_vec(),
            timeout,
        }])
    }

    /// The client sends one length-prefixed frame carrying `payload`.
    pub fn expect_frame(&self, payload: impl AsRef<[u8]>) -> Result<()> {
        self.expect_frame_within(payload, self.default_timeout())
    }

    pub fn expect_frame_within(&self, payload: impl AsRef<[u8]>, timeout: Duration) -> Result<()> {
        self.declare(vec![Step::ReceiveFrame {
            expected: payload.as_ref().to_vec(),
            timeout,
        }])
    }

    /// The mock sends `data` to the client.
    pub fn send_bytes(&self, data: impl AsRef<[u8]>) -> Result<()> {
        self.declare(vec![Step::Send {
            data: data.as_ref().to_vec(),
        }])
    }

    /// The mock sends `payload` as one length-prefixed frame.
    pub fn send_frame(&self, payload: impl AsRef<[u8]>) -> Result<()> {
        self.declare(vec![Step::Send {
            data: encode_frame(payload.as_ref()),
        }])
    }

    /// The client reads to end, closes and waits for closure, leaving
    /// nothing unread.
    pub fn expect_disconnect(&self) -> Result<()> {
        self.expect_disconnect_within(self.default_timeout())
    }

    pub fn expect_disconnect_within(&self, timeout: Duration) -> Result<()> {
        // Order matters: EOF, then the close handshake, then leftovers.
        self.declare(vec![
            Step::ReceiveUntilClose { timeout },
            Step::WaitForCloseAck { timeout },
            Step::AssertNoUnreadData,
        ])
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Wait until every declared step has been processed, then report the
    /// first failure, interpreted.
    ///
    /// After one failure has been reported, later calls return `Ok(())`.
    pub async fn join(&self) -> Result<()> {
        if self.join_already_failed() {
            return Ok(());
        }

        self.inner.expectations.tracker().wait_drained().await;

        let Some(first) = self.shared().errors.first() else {
            return Ok(());
        };
        self.shared().state.lock().join_failed = true;
        let message = interpret_error(&first);
        debug!(
            errors = self.shared().errors.len(),
            first = %first,
            %message,
            "script failed"
        );
        Err(MockError::script_failed(message))
    }

    /// Join, then cancel the background tasks and release the listener and
    /// the transport. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let result = self.join().await;
        self.shared().state.lock().stopped = true;

        let tasks = self.inner.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.shutdown().await;
            self.shared().transport.lock().await.take();
            info!(local_addr = %self.inner.local_addr, metrics = %self.metrics(), "mock server stopped");
        }
        result
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.inner.shared
    }

    fn default_timeout(&self) -> Duration {
        self.shared().config.default_timeout
    }

    fn declare(&self, steps: Vec<Step>) -> Result<()> {
        if self.is_stopped() {
            return Err(MockError::Stopped);
        }
        for step in &steps {
            debug!(%step, "declared");
        }
        self.shared().metrics.record_declared(steps.len() as u64);
        self.inner.expectations.push(steps)
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("local_addr", &self.inner.local_addr)
            .field("sent", &ByteStr(&self.sent_bytes()))
            .field("outstanding", &self.inner.expectations.tracker().outstanding())
            .field("errors", &self.shared().errors.len())
            .finish()
    }
}
