//! Integration tests for the TCP transport and the connect loop.
//!
//! These open real loopback sockets. Binding to port 0 lets the OS pick
//! a free port, which we then read back from the listener.

use std::time::Duration;

use hydra_transport::{connect, ReconnectPolicy, TcpTransport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Finds a port with nothing listening on it.
async fn closed_port_addr() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn test_accept_and_exchange_bytes() {
    let mut transport = TcpTransport::bind("127.0.0.1:0").await.expect("bind");
    let addr = transport.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (mut stream, _) = transport.accept().await.expect("accept");
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        stream.write_all(b"world").await.unwrap();
        buf
    });

    let mut client = connect(&addr, &ReconnectPolicy::default())
        .await
        .expect("connect");
    client.write_all(b"hello").await.unwrap();
    let mut reply = [0u8; 5];
    client.read_exact(&mut reply).await.unwrap();

    assert_eq!(&server.await.unwrap(), b"hello");
    assert_eq!(&reply, b"world");
}

#[tokio::test]
async fn test_bind_std_then_from_std_accepts() {
    let std_listener = TcpTransport::bind_std("127.0.0.1:0").expect("bind");
    let addr = std_listener.local_addr().unwrap();
    let mut transport = TcpTransport::from_std(std_listener).expect("wrap");
    assert_eq!(transport.local_addr().unwrap(), addr);

    let accept = tokio::spawn(async move { transport.accept().await.map(|(_, a)| a) });
    let _client = tokio::net::TcpStream::connect(addr).await.unwrap();

    assert!(accept.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_bind_address_in_use_fails() {
    let first = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = first.local_addr().unwrap().to_string();

    let second = TcpTransport::bind(&addr).await;

    assert!(matches!(second, Err(TransportError::BindFailed(_))));
}

#[tokio::test]
async fn test_connect_refused_gives_up_after_max_attempts() {
    let addr = closed_port_addr().await;
    let policy = ReconnectPolicy::immediate().with_max_attempts(3);

    let result = connect(&addr, &policy).await;

    match result {
        Err(TransportError::ConnectFailed { attempts, source }) => {
            assert_eq!(attempts, 3);
            assert_eq!(source.kind(), std::io::ErrorKind::ConnectionRefused);
        }
        other => panic!("expected ConnectFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_retries_until_server_appears() {
    let addr = closed_port_addr().await;
    let policy = ReconnectPolicy::polling(Duration::from_millis(10));

    let connecting = {
        let addr = addr.clone();
        tokio::spawn(async move { connect(&addr, &policy).await })
    };

    // Let a few attempts get refused before the server starts.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut transport = TcpTransport::bind(&addr).await.expect("rebind");
    let accepted = tokio::spawn(async move { transport.accept().await.is_ok() });

    let stream = tokio::time::timeout(Duration::from_secs(5), connecting)
        .await
        .expect("connect loop should finish")
        .unwrap();
    assert!(stream.is_ok());
    assert!(accepted.await.unwrap());
}

#[tokio::test]
async fn test_drop_transport_closes_listener() {
    let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();

    drop(transport);

    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
