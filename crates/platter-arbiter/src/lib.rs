//! Reference arbitration for platter-control.
//!
//! Decides who controls the actuators: a FIFO queue of clients where the
//! head holds control, time-boxed only while someone else is waiting. The
//! [`Arbiter`] turns client activity into addressed server events.

pub mod arbiter;
pub mod error;
pub mod queue;

pub use arbiter::{Arbiter, Outgoing, Recipient};
pub use error::ArbiterError;
pub use queue::{ClientId, QueueManager};
