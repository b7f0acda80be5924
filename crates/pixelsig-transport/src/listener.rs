//! WebSocket listener with path-based role dispatch
//!
//! One listener per configured port. In unified mode the request path picks
//! the peer role; in split mode the listener is hard-wired to a single role.
//! Unknown paths (and `/sfu` when the SFU role is disabled) refuse the
//! upgrade with HTTP 404 during the handshake.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::{debug, info};

use pixelsig_core::Role;

use crate::error::{Result, TransportError};
use crate::socket::{spawn_connection, SocketHandle, SocketReceiver};

/// Path-to-role table for unified mode.
///
/// Matching is case-sensitive and exact. `/unreal` clients run the full
/// player state machine; the legacy root path maps to streamer.
#[derive(Debug, Clone)]
pub struct PathMap {
    pub player_path: String,
    pub streamer_path: String,
    pub sfu_path: String,
    pub unreal_path: String,
    pub enable_sfu: bool,
}

impl Default for PathMap {
    fn default() -> Self {
        Self {
            player_path: "/player".to_string(),
            streamer_path: "/streamer".to_string(),
            sfu_path: "/sfu".to_string(),
            unreal_path: "/unreal".to_string(),
            enable_sfu: true,
        }
    }
}

impl PathMap {
    pub fn resolve(&self, path: &str) -> Option<Role> {
        if path == self.player_path || path == self.unreal_path {
            Some(Role::Player)
        } else if path == self.streamer_path {
            Some(Role::Streamer)
        } else if path == self.sfu_path {
            self.enable_sfu.then_some(Role::Sfu)
        } else if path == "/" {
            // Legacy streamers connect at the root.
            Some(Role::Streamer)
        } else {
            None
        }
    }
}

/// How an accepted connection gets its role.
#[derive(Debug, Clone)]
pub enum RoleDispatch {
    /// Unified mode: resolve the role from the request path.
    ByPath(PathMap),
    /// Split mode: every connection on this port has the same role.
    Fixed(Role),
}

/// Per-listener knobs.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub dispatch: RoleDispatch,
    /// Inbound frame/message cap in bytes.
    pub max_frame_size: usize,
    /// Keepalive ping when the writer has been idle this long.
    pub ping_interval: Duration,
    /// Reader-idle deadline; expiry closes the connection.
    pub connection_timeout: Duration,
}

/// A bound signalling listener.
pub struct WsListener {
    listener: TcpListener,
    config: ListenerConfig,
}

impl WsListener {
    pub async fn bind(addr: &str, config: ListenerConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed(format!("{addr}: {e}")))?;
        info!(%addr, "signalling listener bound");
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one connection and run the upgrade pipeline: HTTP parse with
    /// the frame-size envelope cap, upgrade validation, path resolution,
    /// RFC 6455 handshake, then the reader/writer pair with idle handling
    /// installed.
    pub async fn accept(&self) -> Result<(SocketHandle, SocketReceiver, Role, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::AcceptFailed(e.to_string()))?;
        debug!(%addr, "tcp connection accepted");

        let (handle, receiver, role) = self.upgrade(stream, addr).await?;
        Ok((handle, receiver, role, addr))
    }

    async fn upgrade(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<(SocketHandle, SocketReceiver, Role)> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_frame_size);
        ws_config.max_frame_size = Some(self.config.max_frame_size);

        let dispatch = self.config.dispatch.clone();
        let mut resolved: Option<Role> = None;
        let callback = |req: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            let path = req.uri().path();
            let role = match &dispatch {
                RoleDispatch::ByPath(map) => map.resolve(path),
                RoleDispatch::Fixed(role) => Some(*role),
            };
            match role {
                Some(role) => {
                    resolved = Some(role);
                    Ok(response)
                }
                None => {
                    let mut refusal =
                        ErrorResponse::new(Some("no signalling endpoint at this path".into()));
                    *refusal.status_mut() = StatusCode::NOT_FOUND;
                    Err(refusal)
                }
            }
        };

        let ws_stream =
            match tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config))
                .await
            {
                Ok(ws) => ws,
                Err(WsError::Http(response)) => {
                    debug!(%addr, status = response.status().as_u16(), "upgrade refused");
                    return Err(TransportError::HandshakeRejected {
                        status: response.status().as_u16(),
                    });
                }
                Err(e) => {
                    debug!(%addr, "handshake failed: {e}");
                    return Err(TransportError::HandshakeFailed(e.to_string()));
                }
            };

        // The callback ran on the accepted request, so the role is set.
        let role = resolved.ok_or_else(|| {
            TransportError::HandshakeFailed("upgrade completed without role".to_string())
        })?;
        info!(%addr, %role, "websocket connected");

        let (handle, receiver) = spawn_connection(
            ws_stream,
            self.config.ping_interval,
            self.config.connection_timeout,
        );
        Ok((handle, receiver, role))
    }
}
