//! Transport abstraction underneath the channel adapter.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProtocolError;

/// Buffer size for each direction of a link.
pub const LINK_BUFFER: usize = 256;

/// One established connection carrying ordered text frames both ways.
///
/// The link is closed by the remote side when `incoming` yields `None`, and
/// by the local side when `outgoing` is dropped.
pub struct Link {
    pub outgoing: mpsc::Sender<String>,
    pub incoming: mpsc::Receiver<String>,
}

impl Link {
    /// Create a link and the far-side endpoints `(to_local, from_local)`.
    pub fn pair() -> (Self, mpsc::Sender<String>, mpsc::Receiver<String>) {
        let (out_tx, out_rx) = mpsc::channel(LINK_BUFFER);
        let (in_tx, in_rx) = mpsc::channel(LINK_BUFFER);
        (
            Self {
                outgoing: out_tx,
                incoming: in_rx,
            },
            in_tx,
            out_rx,
        )
    }
}

/// Establishes links to the arbitration server.
///
/// Implementations only open single connections; retry, backoff, and the
/// watchdog live in [`Channel`](crate::Channel).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Whether the transport capability is present and usable yet.
    fn is_ready(&self) -> bool {
        true
    }

    /// Open one connection.
    async fn open(&self) -> Result<Link, ProtocolError>;
}
