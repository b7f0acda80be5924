//! Protocol error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame was not a JSON object or lacked a string `type` member.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::MalformedFrame(e.to_string())
    }
}
