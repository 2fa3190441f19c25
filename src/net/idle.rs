//! Socket inactivity deadline.
//!
//! Every accepted connection is wrapped before any TLS or HTTP layer sees it.
//! Each completed read or write pushes the deadline forward; a read that is
//! still pending when the deadline passes fails with `TimedOut`, which makes
//! the HTTP layer drop the connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum_server::accept::Accept;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};

/// Stream that fails reads after `idle` without traffic.
pub struct IdleStream<I> {
    inner: I,
    idle: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl<I> IdleStream<I> {
    /// `None` disables the deadline.
    pub fn new(inner: I, idle: Option<Duration>) -> Self {
        Self {
            inner,
            idle,
            deadline: idle.map(|idle| Box::pin(tokio::time::sleep(idle))),
        }
    }

    fn touch(&mut self) {
        if let (Some(idle), Some(deadline)) = (self.idle, self.deadline.as_mut()) {
            deadline.as_mut().reset(Instant::now() + idle);
        }
    }

    fn expired(&mut self, cx: &mut Context<'_>) -> bool {
        match self.deadline.as_mut() {
            Some(deadline) => deadline.as_mut().poll(cx).is_ready(),
            None => false,
        }
    }
}

impl<I: AsyncRead + Unpin> AsyncRead for IdleStream<I> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.touch();
                Poll::Ready(result)
            }
            Poll::Pending if this.expired(cx) => {
                tracing::debug!("Closing idle connection");
                Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection idle timeout",
                )))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<I: AsyncWrite + Unpin> AsyncWrite for IdleStream<I> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        let result = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = result {
            if written > 0 {
                this.touch();
            }
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        let result = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(written)) = result {
            if written > 0 {
                this.touch();
            }
        }
        result
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }
}

/// Acceptor that applies the inactivity deadline, then hands the stream on.
#[derive(Debug, Clone)]
pub struct IdleAcceptor<A> {
    inner: A,
    idle: Option<Duration>,
}

impl<A> IdleAcceptor<A> {
    pub fn new(inner: A, idle: Option<Duration>) -> Self {
        Self { inner, idle }
    }
}

impl<I, S, A> Accept<I, S> for IdleAcceptor<A>
where
    A: Accept<IdleStream<I>, S>,
{
    type Stream = A::Stream;
    type Service = A::Service;
    type Future = A::Future;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        self.inner.accept(IdleStream::new(stream, self.idle), service)
    }
}
