//! Diagnostic messages for the first recorded failure of a script.

use crate::error::MockError;
use crate::event::{ByteStr, Event};

/// Translate a recorded failure into the message a test author sees.
///
/// Covers the confusions a script author is likely to hit; anything else
/// falls back to `Cannot interpret <error>`.
pub fn interpret_error(error: &MockError) -> String {
    if let MockError::UnexpectedEvent { expected, actual } = error {
        if let Some(message) = interpret_mismatch(expected, actual) {
            return message;
        }
    }
    format!("Cannot interpret {error}")
}

fn interpret_mismatch(expected: &Event, actual: &Event) -> Option<String> {
    use Event::*;

    let message = match (expected, actual) {
        (EndOfStream, DuplicateConnectionAttempt) => {
            "While waiting for client to disconnect a second connection was attempted".to_string()
        }
        (EndOfStream, TimedOut) => {
            "Timed out waiting for client to disconnect. Remember to call `close()`.".to_string()
        }
        (EndOfStream, BytesRead(data)) => format!(
            "Received unexpected data while waiting for client to disconnect. Data is {}.",
            ByteStr(data)
        ),

        (Connected, TimedOut) => "Timed out waiting for client to connect".to_string(),

        (BytesRead(want), TimedOut) => format!("Timed out waiting for {}", ByteStr(want)),
        (BytesRead(want), Connected) => format!(
            "Missing `expect_connect()` before `expect_bytes({})`",
            ByteStr(want)
        ),
        (BytesRead(want), BytesRead(got)) => format!(
            "Expected to read {} but actually read {}",
            ByteStr(want),
            ByteStr(got)
        ),
        (BytesRead(want), EndOfStream) => {
            format!("Client disconnected while waiting for {}", ByteStr(want))
        }

        (FrameRead(want), TimedOut) => format!("Timed out waiting for frame {}", ByteStr(want)),
        (FrameRead(want), Connected) => format!(
            "Missing `expect_connect()` before `expect_frame({})`",
            ByteStr(want)
        ),
        (FrameRead(want), FrameRead(got)) => format!(
            "Expected to get frame {} but actually got frame {}",
            ByteStr(want),
            ByteStr(got)
        ),
        (FrameRead(want), EndOfStream) => {
            format!("Client disconnected while waiting for frame {}", ByteStr(want))
        }

        (PeerAcknowledgedClose, TimedOut) => {
            "Timed out waiting for client to call `close().await`.".to_string()
        }

        (NoUnreadData, UnreadData(unread)) => format!(
            "There is data sent by server that was not read by client before \
             `expect_disconnect()` completed: unread_bytes={}.",
            ByteStr(unread)
        ),

        _ => return None,
    };
    Some(message)
}
