//! Shared helpers for broker integration tests
//!
//! Spins up a real broker on a loopback port and talks to it with a plain
//! tokio-tungstenite client, the way an actual streamer or player would.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use pixelsig_broker::{Broker, BrokerConfig};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn find_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a broker on a fresh port. The serve task runs until the test ends.
pub async fn start_broker(mut config: BrokerConfig) -> (Arc<Broker>, u16) {
    let port = find_available_port().await;
    config.host = "127.0.0.1".to_string();
    config.unified_port = port;
    let broker = Arc::new(Broker::new(config));

    let serve = Arc::clone(&broker);
    tokio::spawn(async move {
        let _ = serve.serve().await;
    });

    // Give the listener a moment to bind.
    tokio::time::sleep(Duration::from_millis(100)).await;
    (broker, port)
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// One peer connection to the broker.
pub struct TestClient {
    write: WsSink,
    read: WsSource,
}

impl TestClient {
    pub async fn connect(port: u16, path: &str) -> Self {
        let url = format!("ws://127.0.0.1:{port}{path}");
        let (stream, _) = connect_async(&url).await.expect("websocket connect");
        let (write, read) = stream.split();
        Self { write, read }
    }

    pub async fn send_json(&mut self, frame: &str) {
        self.write
            .send(WsMessage::Text(frame.to_string()))
            .await
            .expect("send frame");
    }

    /// Next text frame as JSON, skipping protocol ping/pong.
    pub async fn recv_json(&mut self) -> Value {
        tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                match self.read.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        return serde_json::from_str(&text).expect("frame is JSON")
                    }
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                    other => panic!("expected text frame, got {other:?}"),
                }
            }
        })
        .await
        .expect("timed out waiting for frame")
    }

    /// Receive until a frame of the given type arrives; earlier frames of
    /// other types are discarded.
    pub async fn recv_type(&mut self, msg_type: &str) -> Value {
        tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                let frame = self.recv_json().await;
                if frame["type"] == msg_type {
                    return frame;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for '{msg_type}'"))
    }

    /// True when a WebSocket-level ping arrives within `max_wait`.
    pub async fn recv_ping_within(&mut self, max_wait: Duration) -> bool {
        tokio::time::timeout(max_wait, async {
            loop {
                match self.read.next().await {
                    Some(Ok(WsMessage::Ping(_))) => return true,
                    Some(Ok(_)) => continue,
                    _ => return false,
                }
            }
        })
        .await
        .unwrap_or(false)
    }

    /// True when the server closes the connection within `max_wait`.
    pub async fn closed_within(&mut self, max_wait: Duration) -> bool {
        tokio::time::timeout(max_wait, async {
            loop {
                match self.read.next().await {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => return true,
                    _ => continue,
                }
            }
        })
        .await
        .unwrap_or(false)
    }

    pub async fn close(mut self) {
        let _ = self.write.send(WsMessage::Close(None)).await;
    }
}

/// Identify a streamer and swallow its `config` reply.
pub async fn identified_streamer(port: u16, streamer_id: &str) -> TestClient {
    let mut streamer = TestClient::connect(port, "/streamer").await;
    streamer
        .send_json(&format!(r#"{{"type":"identify","streamerId":"{streamer_id}"}}"#))
        .await;
    streamer.recv_type("config").await;
    streamer
}

/// Identify a player and swallow its `config` reply.
pub async fn identified_player(port: u16, player_id: &str) -> TestClient {
    let mut player = TestClient::connect(port, "/player").await;
    player
        .send_json(&format!(r#"{{"type":"identify","playerId":"{player_id}"}}"#))
        .await;
    player.recv_type("config").await;
    player
}

/// Condition-based wait, no fixed sleeps.
pub async fn wait_for<F>(mut check: F, max_wait: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
