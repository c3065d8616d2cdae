//! Per-connection read, write and idle deadlines.
//!
//! hyper's own header-read timer starts as soon as it waits for a request
//! head, including the quiet time between keep-alive requests, so it cannot
//! tell "idle" from "slow". [`TimeoutIo`] wraps the socket instead and
//! watches the bytes going through it:
//!
//! | Phase | Starts | Deadline |
//! |---|---|---|
//! | head | accept, or the first byte after idle | `read` until `\r\n\r\n` arrives |
//! | open | end of the request head | none (handler runs, body reads) |
//! | idle | a response has been flushed | `idle` until the next byte |
//!
//! Independently, each response must be written and flushed within `write`
//! of its first byte. HTTP/2 connections (prior-knowledge preface) only get
//! the write deadline.
//!
//! A missed deadline surfaces as an `io::ErrorKind::TimedOut` error, which
//! makes hyper close the connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Sleep, sleep};

const HEAD_END: u32 = u32::from_be_bytes(*b"\r\n\r\n");
const H2_PREFACE_START: &[u8] = b"PRI * HTTP/2";

/// Connection timeouts, mirroring a classic server's read/write/idle trio.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timeouts {
    /// Time allowed to receive a complete request head.
    pub read: Duration,
    /// Time allowed to write and flush one response.
    pub write: Duration,
    /// Time a keep-alive connection may sit between requests.
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(5),
            write: Duration::from_secs(10),
            idle: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Head,
    Open,
    Idle,
    Http2,
}

/// Socket wrapper enforcing [`Timeouts`].
pub(crate) struct TimeoutIo<T> {
    inner: T,
    timeouts: Timeouts,
    phase: Phase,
    first_read: bool,
    // Last four bytes of the request head seen so far.
    window: u32,
    read_deadline: Option<Pin<Box<Sleep>>>,
    write_deadline: Option<Pin<Box<Sleep>>>,
}

impl<T> TimeoutIo<T> {
    pub(crate) fn new(inner: T, timeouts: Timeouts) -> Self {
        Self {
            inner,
            timeouts,
            phase: Phase::Head,
            first_read: true,
            window: 0,
            read_deadline: Some(Box::pin(sleep(timeouts.read))),
            write_deadline: None,
        }
    }

    fn observe_read(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if std::mem::take(&mut self.first_read) && bytes.starts_with(H2_PREFACE_START) {
            self.phase = Phase::Http2;
            self.read_deadline = None;
            return;
        }
        if self.phase == Phase::Idle {
            self.phase = Phase::Head;
            self.window = 0;
            self.read_deadline = Some(Box::pin(sleep(self.timeouts.read)));
        }
        if self.phase != Phase::Head {
            return;
        }
        for &b in bytes {
            self.window = (self.window << 8) | u32::from(b);
            if self.window == HEAD_END {
                self.phase = Phase::Open;
                self.read_deadline = None;
                return;
            }
        }
    }

    fn response_flushed(&mut self) {
        self.write_deadline = None;
        if self.phase == Phase::Open {
            self.phase = Phase::Idle;
            self.read_deadline = Some(Box::pin(sleep(self.timeouts.idle)));
        }
    }
}

fn expired(deadline: &mut Option<Pin<Box<Sleep>>>, cx: &mut Context<'_>) -> bool {
    deadline
        .as_mut()
        .is_some_and(|timer| timer.as_mut().poll(cx).is_ready())
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{what} timed out"))
}

impl<T: AsyncRead + Unpin> AsyncRead for TimeoutIo<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.observe_read(&buf.filled()[before..]);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => {
                if expired(&mut this.read_deadline, cx) {
                    let what = if this.phase == Phase::Idle { "idle connection" } else { "request read" };
                    return Poll::Ready(Err(timed_out(what)));
                }
                Poll::Pending
            }
        }
    }
}

impl<T: AsyncWrite + Unpin> TimeoutIo<T> {
    fn check_write<R>(&mut self, cx: &mut Context<'_>, poll: Poll<io::Result<R>>) -> Poll<io::Result<R>> {
        match poll {
            Poll::Pending if expired(&mut self.write_deadline, cx) => {
                Poll::Ready(Err(timed_out("response write")))
            }
            other => other,
        }
    }

    fn start_write(&mut self) {
        if self.write_deadline.is_none() {
            self.write_deadline = Some(Box::pin(sleep(self.timeouts.write)));
        }
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for TimeoutIo<T> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.start_write();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.check_write(cx, poll)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.start_write();
        let poll = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        this.check_write(cx, poll)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_flush(cx) {
            Poll::Ready(Ok(())) => {
                if this.write_deadline.is_some() {
                    this.response_flushed();
                }
                Poll::Ready(Ok(()))
            }
            other => this.check_write(cx, other),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;

    fn short() -> Timeouts {
        Timeouts {
            read: Duration::from_millis(100),
            write: Duration::from_millis(100),
            idle: Duration::from_millis(400),
        }
    }

    #[tokio::test]
    async fn incomplete_head_times_out() {
        let (mut client, server) = duplex(1024);
        let mut io = TimeoutIo::new(server, short());
        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = io.read(&mut buf).await.unwrap();
        assert!(n > 0);
        let err = io.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn no_read_deadline_once_head_is_complete() {
        let (mut client, server) = duplex(1024);
        let mut io = TimeoutIo::new(server, short());
        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        io.read(&mut buf).await.unwrap();
        assert_eq!(io.phase, Phase::Open);

        // Longer than `read`: a handler running while hyper watches for EOF.
        let pending = tokio::time::timeout(Duration::from_millis(250), io.read(&mut buf)).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn idle_allows_more_than_the_read_window() {
        let (mut client, server) = duplex(1024);
        let mut io = TimeoutIo::new(server, short());
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        io.read(&mut buf).await.unwrap();
        io.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await.unwrap();
        io.flush().await.unwrap();
        assert_eq!(io.phase, Phase::Idle);

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = io.read(&mut buf).await?;
            Ok::<_, io::Error>((n, io))
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        client.write_all(b"GET /next HTTP/1.1\r\n\r\n").await.unwrap();

        let (n, io) = reader.await.unwrap().unwrap();
        assert!(n > 0);
        assert_eq!(io.phase, Phase::Open);
    }

    #[tokio::test]
    async fn idle_connection_times_out() {
        let (mut client, server) = duplex(1024);
        let mut io = TimeoutIo::new(server, short());
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        io.read(&mut buf).await.unwrap();
        io.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await.unwrap();
        io.flush().await.unwrap();

        let err = io.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn stalled_write_times_out() {
        // The client never reads, so the pipe fills up.
        let (_client, server) = duplex(16);
        let mut io = TimeoutIo::new(server, short());

        let err = io.write_all(&[b'x'; 1024]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn http2_preface_disables_read_deadlines() {
        let (mut client, server) = duplex(1024);
        let mut io = TimeoutIo::new(server, short());
        client.write_all(b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        io.read(&mut buf).await.unwrap();
        assert_eq!(io.phase, Phase::Http2);
        assert!(io.read_deadline.is_none());
    }
}
