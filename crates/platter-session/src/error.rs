//! Session errors.

use platter_types::ActuatorId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not in control")]
    NotInControl,

    #[error("unknown actuator: {0}")]
    UnknownActuator(ActuatorId),

    #[error("session loop has stopped")]
    Stopped,

    #[error("protocol error: {0}")]
    Protocol(#[from] platter_protocol::ProtocolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
