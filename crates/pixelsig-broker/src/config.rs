//! Broker configuration
//!
//! Field names follow the wire-level option vocabulary (`unifiedPort`,
//! `pingIntervalSeconds`, ...), so a partial JSON or YAML document
//! deserializes over the defaults. Loading such documents is the binary's
//! concern; the library only defines the shape.

use std::time::Duration;

use serde::Deserialize;

use pixelsig_core::{
    DEFAULT_HTTP_PORT, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_SUBSCRIBERS, DEFAULT_PLAYER_PORT,
    DEFAULT_SFU_PORT, DEFAULT_STREAMER_PORT, DEFAULT_UNIFIED_PORT,
};
use pixelsig_transport::{ListenerConfig, PathMap, RoleDispatch};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrokerConfig {
    /// Bind address.
    pub host: String,
    /// Single-port mode: all roles on one port, dispatched by path.
    pub unified_port: u16,
    pub enable_unified_port: bool,
    /// Legacy split-mode ports, one role per port.
    pub player_port: u16,
    pub streamer_port: u16,
    pub sfu_port: u16,
    /// REST admin surface port (served by an external collaborator).
    pub http_port: u16,
    /// Per-streamer subscriber cap.
    pub max_subscribers: usize,
    /// When false, `/sfu` upgrades are refused with 404.
    pub enable_sfu: bool,
    /// Inbound WebSocket frame cap in bytes.
    pub max_frame_size: usize,
    /// WebSocket-level keepalive interval.
    pub ping_interval_seconds: u64,
    /// Reader-idle threshold.
    pub connection_timeout_seconds: u64,
    /// Routing paths, case-sensitive exact match.
    pub player_path: String,
    pub streamer_path: String,
    pub sfu_path: String,
    pub unreal_path: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            unified_port: DEFAULT_UNIFIED_PORT,
            enable_unified_port: true,
            player_port: DEFAULT_PLAYER_PORT,
            streamer_port: DEFAULT_STREAMER_PORT,
            sfu_port: DEFAULT_SFU_PORT,
            http_port: DEFAULT_HTTP_PORT,
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            enable_sfu: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            ping_interval_seconds: 30,
            connection_timeout_seconds: 60,
            player_path: "/player".to_string(),
            streamer_path: "/streamer".to_string(),
            sfu_path: "/sfu".to_string(),
            unreal_path: "/unreal".to_string(),
        }
    }
}

impl BrokerConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn path_map(&self) -> PathMap {
        PathMap {
            player_path: self.player_path.clone(),
            streamer_path: self.streamer_path.clone(),
            sfu_path: self.sfu_path.clone(),
            unreal_path: self.unreal_path.clone(),
            enable_sfu: self.enable_sfu,
        }
    }

    pub fn listener_config(&self, dispatch: RoleDispatch) -> ListenerConfig {
        ListenerConfig {
            dispatch,
            max_frame_size: self.max_frame_size,
            ping_interval: self.ping_interval(),
            connection_timeout: self.connection_timeout(),
        }
    }
}
