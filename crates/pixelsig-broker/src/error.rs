//! Broker error types
//!
//! The user-visible variants double as the wire text of the `error`
//! envelopes the role handlers send back, so the vocabulary lives in one
//! place.

use thiserror::Error;

use pixelsig_transport::TransportError;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Error, Debug)]
pub enum BrokerError {
    /// A subscription bind hit the per-streamer cap.
    #[error("streamer at capacity")]
    CapacityExceeded,

    /// A player tried to forward without a subscribed streamer.
    #[error("no active streamer")]
    NoActiveStreamer,

    /// A streamer forward named a player the broker does not know.
    #[error("unknown forward target: {0}")]
    TargetUnknown(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
