//! Peer-side interception.
//!
//! A [`ClientStream`] wraps the stream the client under test talks through.
//! Every byte it reads is credited to the engine's ledger, and [`close`]
//! completes the close handshake `expect_disconnect` waits for.
//!
//! [`close`]: ClientStream::close

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

use crate::engine::Shared;

/// Client end of a connection to a mock server
pub struct ClientStream<S = TcpStream> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S> ClientStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(inner: S, shared: Arc<Shared>) -> Self {
        Self { inner, shared }
    }

    /// Shut down the write side, then acknowledge the close to the mock.
    ///
    /// The acknowledgment is recorded even if the shutdown fails, so the
    /// mock's view matches what the client attempted.
    pub async fn close(&mut self) -> io::Result<()> {
        let result = self.inner.shutdown().await;
        self.shared.acknowledge_close();
        result
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap the stream; reads through it are no longer recorded.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> AsyncRead for ClientStream<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let fresh = &buf.filled()[before..];
        if !fresh.is_empty() {
            this.shared.record_peer_read(fresh);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S> AsyncWrite for ClientStream<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

impl<S> std::fmt::Debug for ClientStream<S>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientStream").field("inner", &self.inner).finish()
    }
}
