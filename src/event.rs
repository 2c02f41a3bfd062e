//! Events observed on the mock side of the connection.
//!
//! Every completed action yields at most one [`Event`]; the connect event is
//! the exception, injected by the acceptor instead of an action.

use std::fmt;
use std::sync::Arc;

use crate::error::MockError;

/// Everything that can happen on the mock side of the connection
#[derive(Debug, Clone)]
pub enum Event {
    /// First client connection accepted
    Connected,
    /// A client connected while one was already active
    DuplicateConnectionAttempt,
    /// Bytes read from the transport
    BytesRead(Vec<u8>),
    /// One length-prefixed frame read from the transport
    FrameRead(Vec<u8>),
    /// Zero-byte read: the peer closed its write side (or reset)
    EndOfStream,
    /// The peer ran its close-then-wait-closed sequence
    PeerAcknowledgedClose,
    /// The peer consumed every byte the mock sent
    NoUnreadData,
    /// Suffix of the sent bytes the peer never consumed
    UnreadData(Vec<u8>),
    /// The step's timeout elapsed
    TimedOut,
    /// The action itself raised
    ActionFailed(Arc<MockError>),
}

impl Event {
    /// Variant name without payload, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Connected => "Connected",
            Event::DuplicateConnectionAttempt => "DuplicateConnectionAttempt",
            Event::BytesRead(_) => "BytesRead",
            Event::FrameRead(_) => "FrameRead",
            Event::EndOfStream => "EndOfStream",
            Event::PeerAcknowledgedClose => "PeerAcknowledgedClose",
            Event::NoUnreadData => "NoUnreadData",
            Event::UnreadData(_) => "UnreadData",
            Event::TimedOut => "TimedOut",
            Event::ActionFailed(_) => "ActionFailed",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::BytesRead(bytes) | Event::FrameRead(bytes) | Event::UnreadData(bytes) => {
                write!(f, "{}({})", self.kind(), ByteStr(bytes))
            }
            Event::ActionFailed(err) => write!(f, "ActionFailed({err})"),
            _ => f.write_str(self.kind()),
        }
    }
}

/// Renders a byte slice as a Rust byte-string literal: `b"Hello\n"`
pub struct ByteStr<'a>(pub &'a [u8]);

impl fmt::Display for ByteStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b\"{}\"", self.0.escape_ascii())
    }
}

impl fmt::Debug for ByteStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
