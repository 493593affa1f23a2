//! Control and link status values.

use tokio::time::Instant;

/// Who controls the actuators, from this client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlStatus {
    /// No open channel, for whatever reason.
    #[default]
    Disconnected,
    /// Channel open, waiting for the server to place us.
    Connecting,
    /// Waiting in line. `None` after a timeout, until the next status update.
    Queued { position: Option<u32> },
    /// Holding exclusive control since `since`.
    InControl { since: Instant, time_limited: bool },
}

impl ControlStatus {
    pub fn is_in_control(&self) -> bool {
        matches!(self, Self::InControl { .. })
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// When control was acquired, if held.
    pub fn since(&self) -> Option<Instant> {
        match self {
            Self::InControl { since, .. } => Some(*since),
            _ => None,
        }
    }

    /// One-line summary for the status area.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::InControl { .. } => "You have control!",
            Self::Queued { .. } => "Waiting for your turn...",
            Self::Connecting => "Connecting...",
            Self::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Queued {
                position: Some(position),
            } => write!(f, "Queued (position {position})"),
            Self::Queued { position: None } => write!(f, "Queued"),
            Self::InControl {
                time_limited: true, ..
            } => write!(f, "InControl (time limited)"),
            Self::InControl { .. } => write!(f, "InControl"),
        }
    }
}

/// Connection state shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// Not started yet.
    #[default]
    Idle,
    Connected,
    Reconnecting,
    ConnectionFailed,
    Disconnected,
    /// The transport never became available. Terminal.
    Unavailable,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Starting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting…"),
            Self::ConnectionFailed => write!(f, "Connection failed"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Unavailable => write!(f, "Transport not available"),
        }
    }
}
