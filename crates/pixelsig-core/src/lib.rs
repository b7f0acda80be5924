//! Pixelsig Core
//!
//! Protocol primitives for the Pixelsig signalling broker.
//!
//! This crate provides:
//! - The signalling envelope codec ([`Envelope`])
//! - The message-type vocabulary ([`msg`])
//! - Peer roles ([`Role`])
//! - Protocol errors ([`ProtocolError`])
//!
//! The broker is a field-preserving proxy: it understands the `type` tag and
//! the routing `id` of each message and carries everything else verbatim.

pub mod envelope;
pub mod error;
pub mod types;

pub use envelope::Envelope;
pub use error::{ProtocolError, Result};
pub use types::{msg, Role};

/// Default unified signalling port
pub const DEFAULT_UNIFIED_PORT: u16 = 8888;

/// Legacy split-mode ports (streamer, player, SFU)
pub const DEFAULT_STREAMER_PORT: u16 = 8888;
pub const DEFAULT_PLAYER_PORT: u16 = 8889;
pub const DEFAULT_SFU_PORT: u16 = 8890;

/// Default REST admin port (served by an external collaborator)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default inbound WebSocket frame cap in bytes
pub const DEFAULT_MAX_FRAME_SIZE: usize = 65536;

/// Default per-streamer subscriber cap
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 100;
