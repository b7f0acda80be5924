//! Pixelsig Broker
//!
//! The concurrent connection and routing engine of the signalling broker:
//! the process-wide connection registry, the player/streamer subscription
//! graph with per-streamer capacity, and the per-role message state machines
//! that classify, transform, and route signalling frames.
//!
//! Media never touches this crate; once the WebRTC peer connections are up,
//! the broker is out of the data path.

pub mod broker;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod registry;
mod roles;
pub mod subscription;

pub use broker::Broker;
pub use config::BrokerConfig;
pub use connection::{Connection, ConnectionId};
pub use error::{BrokerError, Result};
pub use metrics::{AtomicMetrics, MetricsSink};
pub use registry::{ConnectionStats, Registry};
pub use subscription::{BindOutcome, SubscriptionGraph};
