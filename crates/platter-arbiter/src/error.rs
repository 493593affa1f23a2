//! Arbiter errors.

use thiserror::Error;

use crate::queue::ClientId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArbiterError {
    #[error("client {0} is not connected")]
    UnknownClient(ClientId),

    #[error("client {0} is already connected")]
    AlreadyConnected(ClientId),
}
