//! In-memory transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use platter_types::{InboundEvent, OutboundEvent};
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::transport::{Link, Transport};
use crate::wire;

/// What the next call to `open()` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenBehavior {
    /// Establish a link and hand the far side to the test.
    Accept,
    /// Fail immediately with the given reason.
    Refuse(String),
    /// Never complete.
    Hang,
}

#[derive(Debug, Default)]
struct MockState {
    /// Readiness checks that report "not ready" before the first "ready".
    not_ready_for: u32,
    readiness_checks: u32,
    script: VecDeque<OpenBehavior>,
    opens: u32,
}

/// Scriptable transport. Unscripted opens are accepted.
///
/// Every accepted open delivers a [`MockServerEnd`] on the receiver
/// returned by [`MockTransport::new`]; tests use it to play the server.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    server_tx: mpsc::UnboundedSender<MockServerEnd>,
}

impl MockTransport {
    /// Create a mock transport and the stream of server-side link ends.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockServerEnd>) {
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let transport = Self {
            state: Arc::new(Mutex::new(MockState::default())),
            server_tx,
        };
        (transport, server_rx)
    }

    /// Report "not ready" for the first `checks` readiness checks.
    pub fn not_ready_for(&self, checks: u32) {
        self.state.lock().unwrap().not_ready_for = checks;
    }

    /// Never report ready.
    pub fn never_ready(&self) {
        self.not_ready_for(u32::MAX);
    }

    /// Queue behaviours for the next opens, in order.
    pub fn script(&self, behaviors: impl IntoIterator<Item = OpenBehavior>) {
        self.state.lock().unwrap().script.extend(behaviors);
    }

    /// Number of times `open()` has been called.
    pub fn opens(&self) -> u32 {
        self.state.lock().unwrap().opens
    }

    /// Number of readiness checks made so far.
    pub fn readiness_checks(&self) -> u32 {
        self.state.lock().unwrap().readiness_checks
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn is_ready(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.readiness_checks += 1;
        state.readiness_checks > state.not_ready_for
    }

    async fn open(&self) -> Result<Link, ProtocolError> {
        let behavior = {
            let mut state = self.state.lock().unwrap();
            state.opens += 1;
            state.script.pop_front().unwrap_or(OpenBehavior::Accept)
        };

        match behavior {
            OpenBehavior::Accept => {
                let (link, to_client, from_client) = Link::pair();
                self.server_tx
                    .send(MockServerEnd {
                        to_client,
                        from_client,
                    })
                    .map_err(|_| ProtocolError::Connection("mock server gone".to_string()))?;
                Ok(link)
            }
            OpenBehavior::Refuse(reason) => Err(ProtocolError::Connection(reason)),
            OpenBehavior::Hang => std::future::pending().await,
        }
    }
}

/// The server side of one mock link. Dropping it closes the link.
pub struct MockServerEnd {
    pub to_client: mpsc::Sender<String>,
    pub from_client: mpsc::Receiver<String>,
}

impl MockServerEnd {
    /// Send an event to the client.
    pub async fn send(&self, event: &InboundEvent) {
        let frame = wire::encode_frame(event).unwrap();
        self.to_client.send(frame).await.unwrap();
    }

    /// Send a raw text frame to the client.
    pub async fn send_raw(&self, frame: &str) {
        self.to_client.send(frame.to_string()).await.unwrap();
    }

    /// Receive the next event the client published.
    pub async fn recv(&mut self) -> Option<OutboundEvent> {
        let frame = self.from_client.recv().await?;
        Some(wire::decode_frame(&frame).unwrap())
    }

    /// Receive an already-published event without waiting.
    pub fn try_recv(&mut self) -> Option<OutboundEvent> {
        let frame = self.from_client.try_recv().ok()?;
        Some(wire::decode_frame(&frame).unwrap())
    }
}
