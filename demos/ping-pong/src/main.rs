use std::time::{Duration, Instant};

use hydra::prelude::*;
use serde::{Deserialize, Serialize};

const ROUNDS: u32 = 10;
const FRAME: Duration = Duration::from_millis(16);

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Pong {
    seq: u32,
    echo: String,
}

/// The server's reply to one client message, if it deserves one.
fn respond(message: &NetworkMessage) -> Result<Option<NetworkMessage>, HydraError> {
    if message.message_type() != MessageType::TEST_MESSAGE {
        tracing::warn!(kind = %message.message_type(), "ignoring unexpected message");
        return Ok(None);
    }
    let ping: Ping = JsonCodec.unpack(message)?;
    let pong = Pong {
        seq: ping.seq,
        echo: format!("pong #{}", ping.seq),
    };
    Ok(Some(JsonCodec.package(MessageType::TEST_MESSAGE, &pong)?))
}

// ---------------------------------------------------------------------------
// Game loop
// ---------------------------------------------------------------------------

fn main() -> Result<(), HydraError> {
    init_logging(tracing::Level::INFO);

    let mut server = GameServer::builder().bind("127.0.0.1:0").build()?;
    let mut client = GameClient::builder()
        .server_addr(&server.local_addr().to_string())
        .start()?;

    let started = Instant::now();
    let mut next_seq = 0;
    let mut received = 0;

    while received < ROUNDS {
        if started.elapsed() > Duration::from_secs(10) {
            tracing::error!(received, "gave up waiting for pongs");
            break;
        }

        // Server frame.
        for event in server.events().drain() {
            match event {
                SessionEvent::Created(id) => tracing::info!(%id, "client joined"),
                SessionEvent::Messages { session, messages } => {
                    for message in &messages {
                        if let Some(reply) = respond(message)? {
                            server.send_message(session, &reply)?;
                        }
                    }
                }
                SessionEvent::Destroyed(id) => tracing::info!(%id, "client left"),
            }
        }

        // Client frame.
        if client.is_connected() && next_seq == received {
            client.send_message(&JsonCodec.package(MessageType::TEST_MESSAGE, &Ping { seq: next_seq })?)?;
            next_seq += 1;
        }
        for event in client.events().drain() {
            if let SessionEvent::Messages { messages, .. } = event {
                for message in &messages {
                    let pong: Pong = JsonCodec.unpack(message)?;
                    tracing::info!(seq = pong.seq, echo = %pong.echo, "got pong");
                    received += 1;
                }
            }
        }

        std::thread::sleep(FRAME);
    }

    client.stop();
    server.stop();
    tracing::info!(rounds = received, elapsed_ms = started.elapsed().as_millis() as u64, "done");
    Ok(())
}
