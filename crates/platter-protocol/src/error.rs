//! Channel and wire errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection attempt timed out")]
    Timeout,

    #[error("channel not connected")]
    NotConnected,

    #[error("outgoing buffer full")]
    Backpressure,

    #[error("serialisation error: {0}")]
    Serialization(String),

    #[error("deserialisation error: {0}")]
    Deserialization(String),

    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
