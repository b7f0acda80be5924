//! Per-socket connection primitive
//!
//! Each accepted WebSocket gets a writer task and a reader task. The writer
//! drains a bounded outbound queue onto the sink and emits a protocol-level
//! ping whenever the queue has been idle for the keepalive interval. The
//! reader enforces the reader-idle deadline, discards non-text frames, and
//! surfaces text frames and closure as [`SocketEvent`]s.
//!
//! Backpressure contract: `send` never blocks. When the queue is full the
//! oldest non-critical frame is evicted to make room; critical frames
//! (`error`, `disconnect`) are never evicted and are queued even at capacity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace};

use crate::error::TransportError;

/// Outbound queue depth per connection.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Grace window for draining queued frames after `close`.
pub const CLOSE_DRAIN_WINDOW: Duration = Duration::from_millis(500);

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_DEPTH: usize = 64;

/// Result of a non-blocking send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame queued.
    Queued,
    /// Frame queued after evicting the oldest non-critical frame.
    QueuedEvicted,
    /// Frame dropped: the queue holds only critical frames and this one is not.
    Dropped,
    /// The socket is closed or closing.
    Closed,
}

impl SendOutcome {
    /// True when a frame (this one or an older one) was lost.
    pub fn dropped_any(&self) -> bool {
        matches!(self, SendOutcome::QueuedEvicted | SendOutcome::Dropped)
    }
}

/// Inbound events surfaced to the owner of the connection.
#[derive(Debug)]
pub enum SocketEvent {
    /// A complete text frame.
    Frame(String),
    /// The socket is gone. Emitted exactly once, last.
    Closed { reason: Option<String> },
}

struct QueuedFrame {
    text: String,
    critical: bool,
}

struct Shared {
    queue: Mutex<VecDeque<QueuedFrame>>,
    /// Wakes the writer when a frame is queued or close is requested.
    wake_writer: Notify,
    /// Wakes the reader so it can exit without waiting for the peer.
    wake_reader: Notify,
    closing: AtomicBool,
}

impl Shared {
    fn request_close(&self) -> bool {
        let first = !self.closing.swap(true, Ordering::SeqCst);
        if first {
            // notify_one stores a permit, so a task that is between polls
            // still observes the wakeup on its next notified().
            self.wake_writer.notify_one();
            self.wake_reader.notify_one();
        }
        first
    }
}

/// Handle to the outbound side of a socket. Cheap to clone.
#[derive(Clone)]
pub struct SocketHandle {
    shared: Arc<Shared>,
}

impl SocketHandle {
    /// Queue a text frame. Non-blocking; see the module docs for the
    /// eviction policy.
    pub fn send(&self, text: String, critical: bool) -> SendOutcome {
        if self.shared.closing.load(Ordering::SeqCst) {
            return SendOutcome::Closed;
        }

        let outcome = {
            let mut queue = self.shared.queue.lock();
            if queue.len() < OUTBOUND_QUEUE_DEPTH {
                queue.push_back(QueuedFrame { text, critical });
                SendOutcome::Queued
            } else if let Some(pos) = queue.iter().position(|f| !f.critical) {
                queue.remove(pos);
                queue.push_back(QueuedFrame { text, critical });
                SendOutcome::QueuedEvicted
            } else if critical {
                // Critical frames are never dropped; allow the queue to
                // exceed its depth by the handful of criticals a session
                // can produce.
                queue.push_back(QueuedFrame { text, critical });
                SendOutcome::Queued
            } else {
                SendOutcome::Dropped
            }
        };

        if outcome != SendOutcome::Dropped {
            self.shared.wake_writer.notify_one();
        }
        outcome
    }

    /// Begin a graceful close: queued frames drain for up to
    /// [`CLOSE_DRAIN_WINDOW`], a close frame (code 1000) follows, then the
    /// socket is abandoned. Idempotent.
    pub fn close(&self) {
        if self.shared.request_close() {
            trace!("close requested");
        }
    }

    /// Whether the socket is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.shared.closing.load(Ordering::SeqCst)
    }

    /// Handle with no task pair behind it; queued frames simply accumulate.
    /// Lets tests exercise queueing, eviction, and close without a socket.
    pub fn detached() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::with_capacity(OUTBOUND_QUEUE_DEPTH)),
                wake_writer: Notify::new(),
                wake_reader: Notify::new(),
                closing: AtomicBool::new(false),
            }),
        }
    }

    /// Drain and return the queued frames. Test aid; in production the
    /// writer task is the only consumer.
    pub fn drain_queued(&self) -> Vec<String> {
        self.shared.queue.lock().drain(..).map(|f| f.text).collect()
    }
}

/// Receiving half handed to the connection's owner.
pub struct SocketReceiver {
    rx: mpsc::Receiver<SocketEvent>,
}

impl SocketReceiver {
    /// Next inbound event. `None` only after `Closed` has been delivered
    /// and the channel is drained.
    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.rx.recv().await
    }
}

/// Spawn the writer/reader pair for an upgraded WebSocket.
pub(crate) fn spawn_connection(
    ws_stream: WebSocketStream<TcpStream>,
    ping_interval: Duration,
    connection_timeout: Duration,
) -> (SocketHandle, SocketReceiver) {
    let (sink, stream) = ws_stream.split();
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(OUTBOUND_QUEUE_DEPTH)),
        wake_writer: Notify::new(),
        wake_reader: Notify::new(),
        closing: AtomicBool::new(false),
    });
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);

    tokio::spawn(writer_task(sink, Arc::clone(&shared), ping_interval));
    tokio::spawn(reader_task(
        stream,
        Arc::clone(&shared),
        event_tx,
        connection_timeout,
    ));

    (SocketHandle { shared }, SocketReceiver { rx: event_rx })
}

async fn writer_task(
    mut sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
    shared: Arc<Shared>,
    ping_interval: Duration,
) {
    loop {
        if shared.closing.load(Ordering::SeqCst) {
            break;
        }

        let frame = shared.queue.lock().pop_front();
        match frame {
            Some(f) => {
                if let Err(e) = sink.send(WsMessage::Text(f.text)).await {
                    debug!("write failed: {e}");
                    shared.request_close();
                    return;
                }
            }
            None => {
                tokio::select! {
                    _ = shared.wake_writer.notified() => {}
                    _ = tokio::time::sleep(ping_interval) => {
                        // Writer idle: protocol-level keepalive.
                        if let Err(e) = sink.send(WsMessage::Ping(Vec::new())).await {
                            debug!("keepalive write failed: {e}");
                            shared.request_close();
                            return;
                        }
                    }
                }
            }
        }
    }

    // Graceful shutdown: bounded drain, then the close frame.
    let drain = async {
        loop {
            let frame = shared.queue.lock().pop_front();
            match frame {
                Some(f) => {
                    if sink.send(WsMessage::Text(f.text)).await.is_err() {
                        return;
                    }
                }
                None => break,
            }
        }
        let _ = sink
            .send(WsMessage::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            })))
            .await;
        let _ = sink.flush().await;
    };
    if tokio::time::timeout(CLOSE_DRAIN_WINDOW, drain).await.is_err() {
        debug!("drain window elapsed, abandoning socket");
    }
}

async fn reader_task(
    mut stream: SplitStream<WebSocketStream<TcpStream>>,
    shared: Arc<Shared>,
    event_tx: mpsc::Sender<SocketEvent>,
    connection_timeout: Duration,
) {
    let reason = loop {
        if shared.closing.load(Ordering::SeqCst) {
            break None;
        }
        let next = tokio::select! {
            _ = shared.wake_reader.notified() => break None,
            next = tokio::time::timeout(connection_timeout, stream.next()) => next,
        };

        match next {
            // Reader idle past the deadline: evict.
            Err(_) => break Some(TransportError::IdleTimeout.to_string()),
            Ok(None) => break Some(TransportError::SocketClosed.to_string()),
            Ok(Some(Err(e))) => break Some(e.to_string()),
            Ok(Some(Ok(msg))) => match msg {
                WsMessage::Text(text) => {
                    if event_tx.send(SocketEvent::Frame(text)).await.is_err() {
                        // Owner went away; nothing left to deliver to.
                        break None;
                    }
                }
                WsMessage::Binary(data) => {
                    debug!(len = data.len(), "discarding binary frame");
                }
                WsMessage::Close(frame) => {
                    break frame.map(|f| f.reason.to_string());
                }
                // Protocol ping/pong is handled by the framing layer.
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                WsMessage::Frame(_) => {}
            },
        }
    };

    shared.request_close();
    let _ = event_tx.send(SocketEvent::Closed { reason }).await;
}
