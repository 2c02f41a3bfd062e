//! Length-prefixed framing: a big-endian `u32` length followed by the payload.
//!
//! The mock uses [`read_frame_bounded`] for `expect_frame`; clients under test
//! can use [`write_frame`] / [`read_frame`] directly.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::FRAME_HEADER_LEN;

/// Prefix `payload` with its length
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Write one frame and flush
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > u32::MAX as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame payload exceeds u32::MAX"));
    }
    writer.write_all(&encode_frame(payload)).await?;
    writer.flush().await
}

/// Read one frame.
///
/// Returns an empty payload once the stream is closed, so callers can keep
/// polling after the peer hangs up.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    Ok(read_frame_bounded(reader, u32::MAX as usize).await?.unwrap_or_default())
}

/// Read one frame of at most `max_len` payload bytes.
///
/// `Ok(None)` means clean end-of-stream before any header byte arrived.
pub async fn read_frame_bounded<R>(reader: &mut R, max_len: usize) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed after {filled} of {FRAME_HEADER_LEN} header bytes"),
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds limit {max_len}"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
