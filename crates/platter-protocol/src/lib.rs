//! Event channel adapter and wire format for platter-control.
//!
//! This crate wraps an unreliable, reconnecting event channel behind a
//! typed surface: lifecycle events and decoded [`InboundEvent`]s flow out of
//! a single receiver, [`OutboundEvent`]s are published fire-and-forget
//! through a [`ChannelHandle`]. The concrete transport is pluggable via the
//! [`Transport`] trait.
//!
//! [`InboundEvent`]: platter_types::InboundEvent
//! [`OutboundEvent`]: platter_types::OutboundEvent

pub mod channel;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod transport;
pub mod websocket;
pub mod wire;

pub use channel::{Channel, ChannelConfig, ChannelEvent, ChannelHandle};
pub use error::ProtocolError;
pub use transport::{Link, Transport};
pub use websocket::WebSocketTransport;
