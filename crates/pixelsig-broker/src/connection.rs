//! Connection records
//!
//! One [`Connection`] per live socket. The registry holds the strong
//! reference; everything else keeps the [`ConnectionId`] and re-resolves, so
//! player/streamer back-references never form an ownership cycle.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use uuid::Uuid;

use pixelsig_core::{Envelope, Role};
use pixelsig_transport::{SendOutcome, SocketHandle};

/// Opaque 128-bit internal identifier, assigned at acceptance time.
///
/// Distinct from the peer-supplied streamer/player/SFU id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// First eight hex digits, used for auto-generated peer ids.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered peer connection.
pub struct Connection {
    id: ConnectionId,
    role: Role,
    /// Peer-supplied logical id (`streamerId` / `playerId` / `sfuId`).
    peer_id: RwLock<Option<String>>,
    socket: SocketHandle,
    connected_at: Instant,
    last_activity: RwLock<Instant>,
}

impl Connection {
    pub fn new(role: Role, socket: SocketHandle) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            role,
            peer_id: RwLock::new(None),
            socket,
            connected_at: now,
            last_activity: RwLock::new(now),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_id(&self) -> Option<String> {
        self.peer_id.read().clone()
    }

    pub fn set_peer_id(&self, id: impl Into<String>) {
        *self.peer_id.write() = Some(id.into());
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.read()
    }

    /// Record activity. `Instant` is monotonic, so the timestamp never moves
    /// backwards.
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn idle_duration(&self) -> Duration {
        self.last_activity.read().elapsed()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_open()
    }

    /// Queue a message; non-blocking. Criticality comes from the message
    /// type, so `error` and `disconnect` survive backpressure.
    pub fn send(&self, env: &Envelope) -> SendOutcome {
        self.socket.send(env.serialize(), env.is_critical())
    }

    /// Queue an already-serialized frame (broadcast path serializes once).
    pub fn send_text(&self, text: String, critical: bool) -> SendOutcome {
        self.socket.send(text, critical)
    }

    pub fn close(&self) {
        self.socket.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("peer_id", &*self.peer_id.read())
            .field("connected", &self.is_connected())
            .finish()
    }
}
