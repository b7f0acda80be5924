//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("accept failed: {0}")]
    AcceptFailed(String),

    /// The HTTP upgrade was refused (unknown path, disabled role, bad headers).
    #[error("handshake rejected with status {status}")]
    HandshakeRejected { status: u16 },

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("socket closed")]
    SocketClosed,

    #[error("outbound queue full")]
    QueueFull,

    #[error("idle timeout")]
    IdleTimeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
