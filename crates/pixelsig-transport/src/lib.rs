//! Pixelsig Transport
//!
//! WebSocket front-end for the signalling broker: a TCP listener that
//! performs the HTTP upgrade with path-based role dispatch, and a per-socket
//! connection primitive (bounded outbound queue, writer task with keepalive,
//! reader task with idle detection).
//!
//! The transport deals in raw text frames; envelope parsing and routing
//! happen above it.

pub mod error;
pub mod listener;
pub mod socket;

pub use error::{Result, TransportError};
pub use listener::{ListenerConfig, PathMap, RoleDispatch, WsListener};
pub use socket::{SendOutcome, SocketEvent, SocketHandle, SocketReceiver};
