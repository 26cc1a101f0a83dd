//! Connection Deadline Tests
//!
//! A dialed connection keeps its own read/write deadlines, separate from
//! the scope that governed the dial.

use racenet::base::neterror::NetError;
use racenet::socket::{Connection, Dialer, Network};
use racenet::ExecutionScope;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[tokio::test]
async fn test_read_deadline_then_clean_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (sync_tx, mut sync_rx) = mpsc::channel::<()>(1);

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(stream);
        conn.set_deadline(Some(Instant::now() + Duration::from_millis(200)));

        // Nothing arrives before the deadline.
        let mut buf = [0u8; 1];
        let err = conn.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(NetError::from(err).is_timeout());

        sync_tx.send(()).await.unwrap();

        conn.set_read_deadline(Some(Instant::now() + Duration::from_secs(5)));
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(n, 1);
        conn.close().await.unwrap();
    });

    let scope = ExecutionScope::with_timeout(Duration::from_secs(5));
    let mut conn = Dialer::new()
        .dial(&scope, Network::Tcp, &addr.to_string())
        .await
        .unwrap();

    sync_rx.recv().await.unwrap();
    conn.write_all(b"1").await.unwrap();

    let mut buf = [0u8; 1];
    let n = conn.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "expected clean close by the server");

    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_outlives_dial_scope() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        stream.write_all(&buf).await.unwrap();
    });

    let scope = ExecutionScope::with_timeout(Duration::from_millis(100));
    let mut conn = Dialer::new()
        .dial(&scope, Network::Tcp4, &addr.to_string())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(scope.is_done());

    // The expired dial scope does not reach the connection.
    conn.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    conn.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    server.await.unwrap();
}

#[tokio::test]
async fn test_write_deadline_when_peer_stops_reading() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        // Accept and hold the socket without reading from it.
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });

    let scope = ExecutionScope::new();
    let mut conn = Dialer::new()
        .dial(&scope, Network::Tcp, &addr.to_string())
        .await
        .unwrap();
    conn.set_write_deadline(Some(Instant::now() + Duration::from_millis(200)));

    let chunk = vec![0u8; 64 * 1024];
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Err(e) = conn.write_all(&chunk).await {
                return e;
            }
        }
    })
    .await;

    let err = result.expect("write deadline never fired");
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    server.abort();
}

#[tokio::test]
async fn test_clearing_a_deadline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        stream.write_all(b"x").await.unwrap();
    });

    let scope = ExecutionScope::new();
    let mut conn = Dialer::new()
        .dial(&scope, Network::Tcp, &addr.to_string())
        .await
        .unwrap();
    conn.set_read_deadline(Some(Instant::now() + Duration::from_millis(10)));
    conn.set_read_deadline(None);
    assert!(conn.read_deadline().is_none());

    let mut buf = [0u8; 1];
    assert_eq!(conn.read(&mut buf).await.unwrap(), 1);
    server.await.unwrap();
}
