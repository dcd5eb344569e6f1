//! Connections that can be torn down from outside the task serving them.
//!
//! # Responsibilities
//! - Wrap accepted streams so reads and writes fail once a token is cancelled
//! - Wake the connection task on cancellation, even while it is idle on IO
//! - Provide an axum listener that wraps every accepted stream
//!
//! # Design Decisions
//! - Servers spawn one task per connection, so aborting the accept loop
//!   leaves those tasks alive; failing their IO ends them

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tonic::transport::server::Connected;

/// A stream whose IO fails with `ConnectionAborted` once `force` is cancelled.
pub struct ForceClosable<IO> {
    inner: IO,
    force: CancellationToken,
    closed: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<IO> ForceClosable<IO> {
    pub fn new(inner: IO, force: CancellationToken) -> Self {
        let closed = Box::pin(force.clone().cancelled_owned());
        Self {
            inner,
            force,
            closed,
        }
    }

    pub fn get_ref(&self) -> &IO {
        &self.inner
    }

    /// Whether the stream was force-closed. Registers the task for wakeup
    /// otherwise.
    fn poll_forced(&mut self, cx: &mut Context<'_>) -> bool {
        if self.force.is_cancelled() {
            return true;
        }
        self.closed.as_mut().poll(cx).is_ready()
    }
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "connection force-closed")
}

impl<IO: AsyncRead + Unpin> AsyncRead for ForceClosable<IO> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_forced(cx) {
            return Poll::Ready(Err(aborted()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<IO: AsyncWrite + Unpin> AsyncWrite for ForceClosable<IO> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.poll_forced(cx) {
            return Poll::Ready(Err(aborted()));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.poll_forced(cx) {
            return Poll::Ready(Err(aborted()));
        }
        Pin::new(&mut this.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_forced(cx) {
            return Poll::Ready(Err(aborted()));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl<IO: Connected> Connected for ForceClosable<IO> {
    type ConnectInfo = IO::ConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.inner.connect_info()
    }
}

/// A TCP listener for `axum::serve` whose connections close on `force`.
pub struct ForceCloseListener {
    inner: TcpListener,
    force: CancellationToken,
}

impl ForceCloseListener {
    pub fn new(inner: TcpListener, force: CancellationToken) -> Self {
        Self { inner, force }
    }
}

impl axum::serve::Listener for ForceCloseListener {
    type Io = ForceClosable<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let (io, addr) = axum::serve::Listener::accept(&mut self.inner).await;
        (ForceClosable::new(io, self.force.clone()), addr)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}
