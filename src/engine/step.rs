//! Expectation steps: one declared unit of expected interaction.
//!
//! Each step knows the transport action that realises it and how to judge
//! the event that action (or the acceptor, or the peer) produces.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use super::action::Action;
use super::Shared;
use crate::config::MockConfig;
use crate::constants::EVENT_GRACE;
use crate::error::{MockError, Result};
use crate::event::{ByteStr, Event};

/// Closed set of script steps
#[derive(Debug)]
pub(crate) enum Step {
    /// A client connects
    Connect { timeout: Duration },
    /// The mock receives exactly these bytes
    ReceiveExact { expected: Vec<u8>, timeout: Duration },
    /// The mock receives one frame with this payload
    ReceiveFrame { expected: Vec<u8>, timeout: Duration },
    /// The peer closes its write side without sending anything more
    ReceiveUntilClose { timeout: Duration },
    /// The mock sends these bytes
    Send { data: Vec<u8> },
    /// The peer runs its close-then-wait-closed sequence
    WaitForCloseAck { timeout: Duration },
    /// The peer consumed everything the mock sent
    AssertNoUnreadData,
}

impl Step {
    /// The transport action for this step; the executor runs it.
    pub(crate) fn produce_action(&self, config: &MockConfig) -> Action {
        match self {
            // Connection and close acknowledgment are driven by the peer.
            Step::Connect { .. } | Step::WaitForCloseAck { .. } => Action::Nothing,
            Step::ReceiveExact { expected, timeout } => Action::ReadExact {
                len: expected.len(),
                timeout: *timeout,
            },
            Step::ReceiveFrame { timeout, .. } => Action::ReadFrame {
                max_len: config.max_frame_len,
                timeout: *timeout,
            },
            Step::ReceiveUntilClose { timeout } => Action::ReadToEnd { timeout: *timeout },
            Step::Send { data } => Action::Write {
                data: data.clone(),
                wait_for_peer: config.default_timeout,
            },
            Step::AssertNoUnreadData => Action::CheckLedger,
        }
    }

    /// Wait for and judge the event this step requires.
    pub(crate) async fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<()> {
        match self {
            Step::Connect { timeout } => {
                // No action exists to publish a timeout here.
                let event = ctx.next_event_within(*timeout).await;
                match event {
                    Event::Connected => Ok(()),
                    other => Err(MockError::unexpected_event(Event::Connected, other)),
                }
            }
            Step::ReceiveExact { expected, timeout } => match ctx.action_event(*timeout).await {
                Event::BytesRead(got) if got == *expected => Ok(()),
                other => Err(MockError::unexpected_event(Event::BytesRead(expected.clone()), other)),
            },
            Step::ReceiveFrame { expected, timeout } => match ctx.action_event(*timeout).await {
                Event::FrameRead(got) if got == *expected => Ok(()),
                other => Err(MockError::unexpected_event(Event::FrameRead(expected.clone()), other)),
            },
            Step::ReceiveUntilClose { timeout } => match ctx.action_event(*timeout).await {
                Event::EndOfStream => Ok(()),
                other => Err(MockError::unexpected_event(Event::EndOfStream, other)),
            },
            Step::Send { .. } => Ok(()),
            Step::WaitForCloseAck { timeout } => {
                if ctx.shared.close_acknowledged_within(*timeout).await {
                    Ok(())
                } else {
                    Err(MockError::unexpected_event(Event::PeerAcknowledgedClose, Event::TimedOut))
                }
            }
            Step::AssertNoUnreadData => match ctx.action_event(Duration::ZERO).await {
                Event::NoUnreadData => Ok(()),
                other => Err(MockError::unexpected_event(Event::NoUnreadData, other)),
            },
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Connect { timeout } => write!(f, "ExpectConnect(timeout={timeout:?})"),
            Step::ReceiveExact { expected, timeout } => {
                write!(f, "ExpectBytes(expected={}, timeout={timeout:?})", ByteStr(expected))
            }
            Step::ReceiveFrame { expected, timeout } => {
                write!(f, "ExpectFrame(expected={}, timeout={timeout:?})", ByteStr(expected))
            }
            Step::ReceiveUntilClose { timeout } => write!(f, "ExpectReadZeroBytes(timeout={timeout:?})"),
            Step::Send { data } => write!(f, "SendBytes(data={})", ByteStr(data)),
            Step::WaitForCloseAck { timeout } => write!(f, "ExpectCloseAck(timeout={timeout:?})"),
            Step::AssertNoUnreadData => f.write_str("ExpectClientReadAllSentBytes"),
        }
    }
}

/// What a step's evaluation may touch: the engine state and the event queue.
pub(crate) struct EvalContext<'a> {
    pub(crate) shared: &'a Shared,
    events: &'a mut mpsc::UnboundedReceiver<Event>,
}

impl<'a> EvalContext<'a> {
    pub(crate) fn new(shared: &'a Shared, events: &'a mut mpsc::UnboundedReceiver<Event>) -> Self {
        Self { shared, events }
    }

    /// Next event, however long it takes.
    pub(crate) async fn next_event(&mut self) -> Event {
        let event = match self.events.recv().await {
            Some(event) => event,
            None => Event::ActionFailed(std::sync::Arc::new(MockError::unexpected("event queue closed"))),
        };
        tracing::debug!(%event, "next event");
        event
    }

    /// Event published by this step's action.
    ///
    /// The action enforces `step_timeout` itself, but it may sit behind an
    /// earlier send that holds the executor for up to the default timeout.
    /// Past both plus [`EVENT_GRACE`] the evaluator gives up with `TimedOut`.
    pub(crate) async fn action_event(&mut self, step_timeout: Duration) -> Event {
        let backstop = step_timeout + self.shared.config.default_timeout + EVENT_GRACE;
        self.next_event_within(backstop).await
    }

    /// Next event, or `TimedOut` once `wait` elapses.
    pub(crate) async fn next_event_within(&mut self, wait: Duration) -> Event {
        match timeout(wait, self.next_event()).await {
            Ok(event) => event,
            Err(_) => {
                tracing::debug!(?wait, "no event before timeout");
                Event::TimedOut
            }
        }
    }
}
