//! Shared types for platter-control.
//!
//! This crate contains the types shared across the platter-control
//! workspace: actuator identifiers, full actuator commands, and the event
//! payloads exchanged with the arbitration server.

pub mod actuator;
pub mod message;

pub use actuator::{
    ActuatorCommand, ActuatorId, Direction, ValueError, DEFAULT_ACTUATOR_COUNT, DEFAULT_MAX_SPEED,
    MAX_BRAKE,
};
pub use message::{InboundEvent, MotorCommand, MotorSnapshot, OutboundEvent};
