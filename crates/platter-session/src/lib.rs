//! Control-session core for platter-control.
//!
//! Implements the control-session state machine (queue admission,
//! exclusive-control grant/revoke, timeout eviction, resynchronization after
//! reconnects), the actuator state store, the rate-limited command
//! dispatcher, and the session loop that owns them all.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod machine;
pub mod session;
pub mod setup;
pub mod state;
pub mod store;
pub mod timer;

pub use config::Config;
pub use error::SessionError;
pub use session::{Intent, Notice, Session, SessionHandle, SessionStatus};
pub use state::{ControlStatus, LinkStatus};
