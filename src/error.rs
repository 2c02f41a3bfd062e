//! Error types and handling for the mock endpoint

use thiserror::Error;

use crate::event::{ByteStr, Event};

/// Result type alias for mock endpoint operations
pub type Result<T> = std::result::Result<T, MockError>;

/// Main error type for the mock endpoint
#[derive(Error, Debug)]
pub enum MockError {
    /// I/O errors from the listener or the accepted transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration parameter
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message describing the configuration issue
        message: String,
    },

    /// A declaration arrived after teardown began
    #[error("Fixture is stopped")]
    Stopped,

    /// A transport action ran before any client connected
    #[error("No client is connected")]
    NotConnected,

    /// `connect` was asked for a port no engine owns
    #[error("No mock server is listening on port {port}")]
    UnknownPort {
        /// The requested port
        port: u16,
    },

    /// A step's evaluation saw an event other than the one it requires
    #[error("UnexpectedEvent(expected={expected}, actual={actual})")]
    UnexpectedEvent {
        /// The event the step was waiting for
        expected: Event,
        /// The event that actually arrived
        actual: Event,
    },

    /// The bytes consumed by the peer are not a prefix of the bytes sent
    #[error("Byte ledger corrupted: read {} is not a prefix of sent {}", ByteStr(read), ByteStr(sent))]
    LedgerCorrupted {
        /// Everything the mock sent
        sent: Vec<u8>,
        /// Everything the peer consumed
        read: Vec<u8>,
    },

    /// The interpreted first failure of a script, raised from `join`/`stop`
    #[error("{message}")]
    ScriptFailed {
        /// Human-readable diagnosis
        message: String,
    },

    /// Generic error for unexpected conditions.
    /// Used for situations that should not happen in a correctly
    /// functioning engine, such as a background task dying.
    #[error("Unexpected error: {message}")]
    Unexpected {
        /// Error message describing the unexpected condition
        message: String,
    },
}

impl MockError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub(crate) fn unexpected_event(expected: Event, actual: Event) -> Self {
        Self::UnexpectedEvent { expected, actual }
    }

    pub(crate) fn script_failed(message: impl Into<String>) -> Self {
        Self::ScriptFailed {
            message: message.into(),
        }
    }

    /// Check if this error is the interpreted failure of a script
    pub fn is_script_failure(&self) -> bool {
        matches!(self, Self::ScriptFailed { .. })
    }

    /// Check if this error came from the transport
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::NotConnected)
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::MockError::config(format!($($arg)*))
    };
}
