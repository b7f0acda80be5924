//! Peer roles and the signalling message vocabulary

use std::fmt;

/// Role of a connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Downstream interactive consumer
    Player,
    /// Upstream peer producing media
    Streamer,
    /// Selective forwarding unit aggregating players behind a streamer
    Sfu,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Streamer => "streamer",
            Role::Sfu => "sfu",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message type tags.
///
/// These match the wire vocabulary of the Pixel Streaming signalling protocol;
/// unknown tags are routed as opaque forwards by the role handlers, so this
/// list is the set the broker itself reacts to.
pub mod msg {
    // Connection lifecycle
    pub const CONFIG: &str = "config";
    pub const IDENTIFY: &str = "identify";
    pub const DISCONNECT: &str = "disconnect";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";

    // WebRTC signalling
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "iceCandidate";
    pub const ICE_CANDIDATE_ERROR: &str = "iceCandidateError";

    // Player management
    pub const PLAYER_COUNT: &str = "playerCount";
    pub const PLAYER_CONNECTED: &str = "playerConnected";
    pub const PLAYER_DISCONNECTED: &str = "playerDisconnected";
    pub const LIST_STREAMERS: &str = "listStreamers";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";

    // Streamer management
    pub const STREAMER_ID_CHANGED: &str = "streamerIdChanged";
    pub const STREAMER_DATA_CHANNELS: &str = "streamerDataChannels";
    pub const STREAMER_DISCONNECTED: &str = "streamerDisconnected";
    pub const STREAMER_LIST: &str = "streamerList";

    // SFU
    pub const SFU_RECV_DATA_CHANNEL_READY: &str = "sfuRecvDataChannelReady";
    pub const SFU_PEER_DATA_CHANNELS_READY: &str = "sfuPeerDataChannelsReady";
    pub const LAYER_PREFERENCE: &str = "layerPreference";

    // Data channels
    pub const DATA_CHANNEL_REQUEST: &str = "dataChannelRequest";

    // Errors
    pub const ERROR: &str = "error";

    /// Critical messages survive outbound backpressure; everything else may
    /// be evicted when a connection's queue is full.
    pub fn is_critical(msg_type: &str) -> bool {
        matches!(msg_type, ERROR | DISCONNECT)
    }
}
