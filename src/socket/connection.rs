//! The byte stream handed to callers by a dial or a race.
//!
//! A [`Connection`] owns its socket and carries its own read and write
//! deadlines, independent of the deadline that governed the dial. Both are
//! unset when the dialer returns the connection.

use futures::task::noop_waker_ref;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{Instant, Sleep};

/// A connected stream socket with per-direction deadlines.
///
/// Reads and writes that do not complete by their deadline fail with
/// [`io::ErrorKind::TimedOut`]. A clean close by the peer reads as `Ok(0)`.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    read_deadline: Option<Instant>,
    write_deadline: Option<Instant>,
    read_timer: Option<Pin<Box<Sleep>>>,
    write_timer: Option<Pin<Box<Sleep>>>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_deadline: None,
            write_deadline: None,
            read_timer: None,
            write_timer: None,
        }
    }

    /// Set both the read and the write deadline. `None` clears them.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.set_read_deadline(deadline);
        self.set_write_deadline(deadline);
    }

    /// Deadline for pending and future reads. `None` clears it.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) {
        self.read_deadline = deadline;
    }

    /// Deadline for pending and future writes. `None` clears it.
    pub fn set_write_deadline(&mut self, deadline: Option<Instant>) {
        self.write_deadline = deadline;
    }

    pub fn read_deadline(&self) -> Option<Instant> {
        self.read_deadline
    }

    pub fn write_deadline(&self) -> Option<Instant> {
        self.write_deadline
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Lightweight liveness probe: peeks without consuming data.
    /// EOF or a socket error means the peer is gone.
    pub fn is_connected(&self) -> bool {
        if self.stream.peer_addr().is_err() {
            return false;
        }

        let mut cx = Context::from_waker(noop_waker_ref());
        let mut byte = [0u8; 1];
        let mut buf = ReadBuf::new(&mut byte);
        match self.stream.poll_peek(&mut cx, &mut buf) {
            Poll::Ready(Ok(0)) => false, // EOF - connection closed
            Poll::Ready(Ok(_)) => true,  // Data available, still connected
            Poll::Ready(Err(_)) => false,
            Poll::Pending => true, // No data, but connected
        }
    }

    /// Shut down the write side and release the socket.
    ///
    /// A peer that already went away is not an error.
    pub async fn close(mut self) -> io::Result<()> {
        match self.stream.shutdown().await {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    /// Give up deadline handling and take the raw stream.
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

impl From<TcpStream> for Connection {
    fn from(stream: TcpStream) -> Self {
        Connection::new(stream)
    }
}

fn deadline_exceeded(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{} deadline exceeded", op))
}

/// Poll the timer for `deadline`, re-arming it if the deadline moved.
/// Without a deadline this never completes.
fn poll_deadline(
    timer: &mut Option<Pin<Box<Sleep>>>,
    deadline: Option<Instant>,
    cx: &mut Context<'_>,
) -> Poll<()> {
    let Some(deadline) = deadline else {
        return Poll::Pending;
    };
    let sleep = timer.get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
    if sleep.deadline() != deadline {
        sleep.as_mut().reset(deadline);
    }
    sleep.as_mut().poll(cx)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if expired(this.read_deadline) {
            return Poll::Ready(Err(deadline_exceeded("read")));
        }
        match Pin::new(&mut this.stream).poll_read(cx, buf) {
            Poll::Pending => match poll_deadline(&mut this.read_timer, this.read_deadline, cx) {
                Poll::Ready(()) => Poll::Ready(Err(deadline_exceeded("read"))),
                Poll::Pending => Poll::Pending,
            },
            ready => ready,
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if expired(this.write_deadline) {
            return Poll::Ready(Err(deadline_exceeded("write")));
        }
        match Pin::new(&mut this.stream).poll_write(cx, buf) {
            Poll::Pending => match poll_deadline(&mut this.write_timer, this.write_deadline, cx) {
                Poll::Ready(()) => Poll::Ready(Err(deadline_exceeded("write"))),
                Poll::Pending => Poll::Pending,
            },
            ready => ready,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if expired(this.write_deadline) {
            return Poll::Ready(Err(deadline_exceeded("write")));
        }
        Pin::new(&mut this.stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, Connection) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let client = Connection::new(client.unwrap());
        let server = Connection::new(accepted.unwrap().0);
        (client, server)
    }

    #[tokio::test]
    async fn test_new_connection_has_no_deadlines() {
        let (client, _server) = pair().await;
        assert!(client.read_deadline().is_none());
        assert!(client.write_deadline().is_none());
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_past_deadline_fails_immediately() {
        let (mut client, _server) = pair().await;
        client.set_read_deadline(Some(Instant::now()));

        let mut buf = [0u8; 1];
        let err = client.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_deadline_can_be_extended() {
        let (mut client, mut server) = pair().await;
        client.set_read_deadline(Some(Instant::now() + Duration::from_millis(20)));

        let mut buf = [0u8; 1];
        let err = client.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        client.set_read_deadline(Some(Instant::now() + Duration::from_secs(5)));
        server.write_all(b"x").await.unwrap();
        assert_eq!(client.read(&mut buf).await.unwrap(), 1);
        assert_eq!(&buf, b"x");
    }

    #[tokio::test]
    async fn test_is_connected_detects_peer_close() {
        let (client, server) = pair().await;
        server.close().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!client.is_connected());
    }
}
