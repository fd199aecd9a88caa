//! Integration tests for the session pump over loopback sockets.

use std::sync::Arc;
use std::time::Duration;

use hydra_protocol::{MessageHeader, MessageType, NetworkMessage};
use hydra_session::{
    event_queue, EventQueue, SessionConfig, SessionEvent, SessionHandle, SessionState,
    TcpSession,
};
use hydra_transport::SessionId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (client.unwrap(), accepted.unwrap().0)
}

fn start_with(stream: TcpStream, config: SessionConfig) -> (SessionHandle, EventQueue) {
    let (events, queue) = event_queue();
    let handle = TcpSession::new(SessionId::new(1), stream, config, Arc::new(events)).start();
    (handle, queue)
}

/// Collects messages from the queue until `count` have arrived.
async fn collect_messages(queue: &mut EventQueue, count: usize) -> Vec<NetworkMessage> {
    let mut messages = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while messages.len() < count {
            match queue.recv().await {
                Some(SessionEvent::Messages { messages: batch, .. }) => messages.extend(batch),
                Some(_) => {}
                None => break,
            }
        }
    })
    .await
    .expect("messages should arrive");
    messages
}

#[tokio::test]
async fn test_writes_arrive_in_queue_order() {
    let (local, mut peer) = socket_pair().await;
    let (handle, _queue) = start_with(local, SessionConfig::default());

    let mut expected = Vec::new();
    for i in 0..500u32 {
        let payload = i.to_le_bytes().repeat(1 + (i as usize % 7));
        expected.extend_from_slice(&payload);
        handle.write(payload);
    }

    let mut got = vec![0u8; expected.len()];
    peer.read_exact(&mut got).await.unwrap();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn test_large_write_completes_across_partial_writes() {
    let (local, mut peer) = socket_pair().await;
    let (handle, _queue) = start_with(local, SessionConfig::default());

    // Bigger than any socket buffer, so the write must be resumed.
    let big: Vec<u8> = (0..8 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    handle.write(big.clone());
    handle.write(b"tail".to_vec());

    let mut got = vec![0u8; big.len() + 4];
    tokio::time::timeout(Duration::from_secs(10), peer.read_exact(&mut got))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&got[..big.len()], &big[..]);
    assert_eq!(&got[big.len()..], b"tail");
}

#[tokio::test]
async fn test_send_message_round_trip_between_sessions() {
    let (a, b) = socket_pair().await;
    let (left, _left_events) = start_with(a, SessionConfig::default());
    let (_right, mut right_events) = start_with(b, SessionConfig::default());

    let sent: Vec<NetworkMessage> = (0..20u8)
        .map(|i| NetworkMessage::new(MessageType::ATTACK, vec![i; i as usize]).unwrap())
        .collect();
    for message in &sent {
        left.send_message(message);
    }

    assert_eq!(collect_messages(&mut right_events, sent.len()).await, sent);
}

#[tokio::test]
async fn test_tiny_read_buffer_still_reassembles() {
    let (local, mut peer) = socket_pair().await;
    let config = SessionConfig {
        read_buffer_size: 3,
        ..SessionConfig::default()
    };
    let (_handle, mut queue) = start_with(local, config);

    let first = NetworkMessage::new(MessageType::CREATURE, b"goblin".to_vec()).unwrap();
    let second = NetworkMessage::new(MessageType::MOVE, Vec::new()).unwrap();
    let mut wire = first.encode();
    second.encode_into(&mut wire);
    peer.write_all(&wire).await.unwrap();

    assert_eq!(collect_messages(&mut queue, 2).await, vec![first, second]);
}

#[tokio::test]
async fn test_oversized_frame_stops_after_delivering_earlier_messages() {
    let (local, mut peer) = socket_pair().await;
    let config = SessionConfig {
        max_payload_size: 64,
        ..SessionConfig::default()
    };
    let (handle, mut queue) = start_with(local, config);

    let ok = NetworkMessage::new(MessageType::TEST_MESSAGE, b"fine".to_vec()).unwrap();
    let mut wire = ok.encode();
    wire.extend_from_slice(&MessageHeader::new(MessageType::TEST_MESSAGE, 65).to_bytes());
    peer.write_all(&wire).await.unwrap();

    assert_eq!(collect_messages(&mut queue, 1).await, vec![ok]);
    tokio::time::timeout(Duration::from_secs(5), handle.stopped())
        .await
        .unwrap();
    assert_eq!(handle.state(), SessionState::Stopped);

    // The session closed its end.
    let mut rest = Vec::new();
    let _ = peer.read_to_end(&mut rest).await;
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_stop_reports_destroyed_once() {
    let (local, _peer) = socket_pair().await;
    let (handle, mut queue) = start_with(local, SessionConfig::default());

    handle.stop();
    handle.stop();
    handle.stopped().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let destroyed = queue
        .drain()
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Destroyed(_)))
        .count();
    assert_eq!(destroyed, 1);
}

#[tokio::test]
async fn test_read_after_stop_is_not_delivered() {
    let (local, mut peer) = socket_pair().await;
    let message = NetworkMessage::new(MessageType::MOVE, b"north".to_vec()).unwrap();

    // Bytes are already waiting when the session is told to stop.
    peer.write_all(&message.encode()).await.unwrap();
    let (handle, mut queue) = start_with(local, SessionConfig::default());
    handle.stop();
    handle.stopped().await;

    let _ = peer.write_all(&message.encode()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(queue.drain(), vec![SessionEvent::Destroyed(SessionId::new(1))]);
}
