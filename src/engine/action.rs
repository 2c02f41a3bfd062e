//! Transport-facing side effects, run by the executor task.

use std::fmt;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::Shared;
use crate::error::{MockError, Result};
use crate::event::{ByteStr, Event};
use crate::framing::read_frame_bounded;
use crate::insights::{record_receive, record_send};

/// Owned description of one transport action
#[derive(Debug)]
pub(crate) enum Action {
    /// Nothing to do; the event comes from outside the pipeline
    Nothing,
    /// Read exactly `len` bytes (fewer if the peer closes first)
    ReadExact { len: usize, timeout: Duration },
    /// Read one length-prefixed frame
    ReadFrame { max_len: usize, timeout: Duration },
    /// Read until end-of-stream
    ReadToEnd { timeout: Duration },
    /// Write and ledger `data` within a deadline; failures are logged, never reported
    Write { data: Vec<u8>, wait_for_peer: Duration },
    /// Compare sent bytes with bytes the peer consumed
    CheckLedger,
}

impl Action {
    /// Perform the action. `Ok(None)` means the action publishes no event.
    pub(crate) async fn execute(self, shared: &Shared) -> Result<Option<Event>> {
        match self {
            Action::Nothing => Ok(None),
            Action::ReadExact { len, timeout } => read_exact(shared, len, timeout).await.map(Some),
            Action::ReadFrame { max_len, timeout } => {
                read_frame(shared, max_len, timeout).await.map(Some)
            }
            Action::ReadToEnd { timeout } => read_to_end(shared, timeout).await.map(Some),
            Action::Write { data, wait_for_peer } => {
                let (written, outcome) = write(shared, &data, wait_for_peer).await;
                if written > 0 {
                    shared.metrics.record_send(written as u64);
                    record_send(written as u64);
                }
                match outcome {
                    Ok(()) => debug!(data = %ByteStr(&data), "bytes written"),
                    Err(err) => warn!(error = %err, written, len = data.len(), "send_bytes failed"),
                }
                Ok(None)
            }
            Action::CheckLedger => {
                let unread = shared.state.lock().ledger.unread();
                unread.map(Some)
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Nothing => f.write_str("nothing"),
            Action::ReadExact { len, .. } => write!(f, "read_exact({len})"),
            Action::ReadFrame { .. } => f.write_str("read_frame"),
            Action::ReadToEnd { .. } => f.write_str("read_to_end"),
            Action::Write { data, .. } => write!(f, "write({})", ByteStr(data)),
            Action::CheckLedger => f.write_str("check_ledger"),
        }
    }
}

async fn read_exact(shared: &Shared, len: usize, timeout: Duration) -> Result<Event> {
    let deadline = Instant::now() + timeout;
    let Some(mut transport) = shared.transport_until(deadline).await else {
        return Ok(Event::TimedOut);
    };
    let stream = transport.as_mut().ok_or(MockError::NotConnected)?;

    let mut received = Vec::with_capacity(len);
    match timeout_at(deadline, read_up_to(stream, len, &mut received)).await {
        Err(_) => Ok(Event::TimedOut),
        Ok(result) => {
            result?;
            shared.metrics.record_receive(received.len() as u64);
            record_receive(received.len() as u64);
            if received.is_empty() && len > 0 {
                Ok(Event::EndOfStream)
            } else {
                Ok(Event::BytesRead(received))
            }
        }
    }
}

/// Read until `buf` holds `len` bytes or the peer closes.
async fn read_up_to(stream: &mut TcpStream, len: usize, buf: &mut Vec<u8>) -> io::Result<()> {
    let mut chunk = vec![0u8; len];
    while buf.len() < len {
        let want = len - buf.len();
        let n = stream.read(&mut chunk[..want]).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}

async fn read_frame(shared: &Shared, max_len: usize, timeout: Duration) -> Result<Event> {
    let deadline = Instant::now() + timeout;
    let Some(mut transport) = shared.transport_until(deadline).await else {
        return Ok(Event::TimedOut);
    };
    let stream = transport.as_mut().ok_or(MockError::NotConnected)?;

    match timeout_at(deadline, read_frame_bounded(stream, max_len)).await {
        Err(_) => Ok(Event::TimedOut),
        Ok(Ok(Some(payload))) => {
            shared.metrics.record_receive(payload.len() as u64);
            record_receive(payload.len() as u64);
            Ok(Event::FrameRead(payload))
        }
        Ok(Ok(None)) => Ok(Event::EndOfStream),
        Ok(Err(err)) => Err(err.into()),
    }
}

async fn read_to_end(shared: &Shared, timeout: Duration) -> Result<Event> {
    let deadline = Instant::now() + timeout;
    let Some(mut transport) = shared.transport_until(deadline).await else {
        return Ok(Event::TimedOut);
    };
    let stream = transport.as_mut().ok_or(MockError::NotConnected)?;

    let mut received = Vec::new();
    match timeout_at(deadline, stream.read_to_end(&mut received)).await {
        Err(_) => Ok(Event::TimedOut),
        Ok(Ok(_)) if received.is_empty() => Ok(Event::EndOfStream),
        Ok(Ok(_)) => {
            shared.metrics.record_receive(received.len() as u64);
            record_receive(received.len() as u64);
            Ok(Event::BytesRead(received))
        }
        // Reset counts as end-of-stream.
        Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionReset => {
            debug!("connection reset while waiting for end-of-stream");
            Ok(Event::EndOfStream)
        }
        Ok(Err(err)) => Err(err.into()),
    }
}

/// Write `data` within `wait_for_peer`, ledgering each chunk as it lands.
///
/// Returns how many bytes reached the socket alongside the outcome, so a peer
/// that stops reading still leaves the partial write in the ledger.
async fn write(shared: &Shared, data: &[u8], wait_for_peer: Duration) -> (usize, Result<()>) {
    let deadline = Instant::now() + wait_for_peer;
    let Some(mut transport) = shared.transport_until(deadline).await else {
        return (0, Err(MockError::NotConnected));
    };
    let Some(stream) = transport.as_mut() else {
        return (0, Err(MockError::NotConnected));
    };

    let mut written = 0;
    let outcome = timeout_at(deadline, async {
        while written < data.len() {
            let n = stream.write(&data[written..]).await?;
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero));
            }
            shared.state.lock().ledger.record_sent(&data[written..written + n]);
            written += n;
        }
        stream.flush().await
    })
    .await;

    let result = match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("peer did not drain {} bytes within {wait_for_peer:?}", data.len() - written),
        )
        .into()),
    };
    (written, result)
}
