//! Channel adapter: readiness polling, bounded reconnection, watchdog.
//!
//! [`Channel::connect`] returns immediately. A driver task owns the
//! connection lifecycle and reports it as [`ChannelEvent`]s in the order the
//! underlying link delivered them. Publishing goes through a
//! [`ChannelHandle`] and never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use platter_types::{InboundEvent, OutboundEvent};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::error::ProtocolError;
use crate::transport::{Link, Transport};
use crate::wire;

/// Timing and retry policy for the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Interval between transport readiness checks.
    pub ready_poll_interval: Duration,
    /// Readiness re-checks before giving up as unavailable.
    pub ready_poll_attempts: u32,
    /// Deadline after connecting for the link to be open.
    pub watchdog: Duration,
    /// Reconnection attempts per outage.
    pub reconnection_attempts: u32,
    /// Fixed delay before each reconnection attempt.
    pub reconnection_delay: Duration,
    /// Timeout for a single connection attempt.
    pub attempt_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ready_poll_interval: Duration::from_millis(200),
            ready_poll_attempts: 50,
            watchdog: Duration::from_secs(10),
            reconnection_attempts: 10,
            reconnection_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything the channel reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A link is open; publishes will be carried.
    Open,
    /// A connection attempt failed.
    Error(String),
    /// An open link was lost.
    Close,
    /// About to make reconnection attempt `n` (1-based).
    Reconnecting(u32),
    /// A reconnection attempt succeeded. Always followed by `Open`.
    Reconnected,
    /// The watchdog deadline passed without an open link.
    ConnectionFailed,
    /// The transport never became ready. Terminal.
    Unavailable,
    /// A decoded event from the server.
    Message(InboundEvent),
}

enum DriverCommand {
    /// One extra connection attempt, requested by the watchdog.
    Kick,
    Shutdown,
}

type LinkSlot = Option<mpsc::Sender<String>>;

/// Cloneable publishing side of a channel.
#[derive(Clone)]
pub struct ChannelHandle {
    link: watch::Receiver<LinkSlot>,
    commands: mpsc::UnboundedSender<DriverCommand>,
}

impl ChannelHandle {
    /// Whether a link is currently open.
    pub fn is_open(&self) -> bool {
        self.link.borrow().is_some()
    }

    /// Publish an event on the current link.
    ///
    /// Returns [`ProtocolError::NotConnected`] and drops the event when no
    /// link is open. A successful return does not imply delivery.
    pub fn publish(&self, event: &OutboundEvent) -> Result<(), ProtocolError> {
        let frame = wire::encode_frame(event)?;
        let Some(tx) = self.link.borrow().clone() else {
            return Err(ProtocolError::NotConnected);
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ProtocolError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => ProtocolError::NotConnected,
        })?;
        trace!(event = event.name(), "published");
        Ok(())
    }

    /// Shut the channel down. The event stream ends afterwards.
    pub fn close(&self) {
        let _ = self.commands.send(DriverCommand::Shutdown);
    }
}

/// Entry point for establishing a channel.
pub struct Channel;

impl Channel {
    /// Start establishing a channel over `transport` without blocking.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        transport: Arc<dyn Transport>,
        config: ChannelConfig,
    ) -> (ChannelHandle, mpsc::Receiver<ChannelEvent>) {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (link_tx, link_rx) = watch::channel(None);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            transport,
            config,
            events: event_tx,
            link: link_tx,
            commands: command_rx,
            kick: Some(command_tx.clone()),
        };
        tokio::spawn(driver.run());

        (
            ChannelHandle {
                link: link_rx,
                commands: command_tx,
            },
            event_rx,
        )
    }
}

enum Readiness {
    Ready,
    Unavailable,
    Stopped,
}

enum LinkOutcome {
    Lost,
    Stopped,
}

struct Driver {
    transport: Arc<dyn Transport>,
    config: ChannelConfig,
    events: mpsc::Sender<ChannelEvent>,
    link: watch::Sender<LinkSlot>,
    commands: mpsc::UnboundedReceiver<DriverCommand>,
    kick: Option<mpsc::UnboundedSender<DriverCommand>>,
}

impl Driver {
    async fn run(mut self) {
        match self.wait_until_ready().await {
            Readiness::Ready => {}
            Readiness::Unavailable => {
                warn!(
                    attempts = self.config.ready_poll_attempts,
                    "transport never became ready"
                );
                self.emit(ChannelEvent::Unavailable).await;
                return;
            }
            Readiness::Stopped => return,
        }

        self.spawn_watchdog();

        // Reconnection attempt within the current outage; 0 = initial connect.
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 && !self.wait_before_attempt(attempt).await {
                break;
            }

            let result =
                match tokio::time::timeout(self.config.attempt_timeout, self.transport.open())
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProtocolError::Timeout),
                };

            match result {
                Ok(Link { outgoing, incoming }) => {
                    self.link.send_replace(Some(outgoing));
                    if attempt > 0 {
                        info!(attempt, "reconnected");
                        if !self.emit(ChannelEvent::Reconnected).await {
                            break;
                        }
                    }
                    info!("channel open");
                    if !self.emit(ChannelEvent::Open).await {
                        break;
                    }
                    let outcome = self.pump(incoming).await;
                    self.link.send_replace(None);
                    match outcome {
                        LinkOutcome::Stopped => break,
                        LinkOutcome::Lost => {
                            warn!("channel closed");
                            if !self.emit(ChannelEvent::Close).await {
                                break;
                            }
                            attempt = 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "connection attempt failed");
                    if !self.emit(ChannelEvent::Error(e.to_string())).await {
                        break;
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }

        self.link.send_replace(None);
        debug!("channel driver stopped");
    }

    async fn wait_until_ready(&mut self) -> Readiness {
        let mut checks = 0;
        loop {
            if self.transport.is_ready() {
                return Readiness::Ready;
            }
            if checks >= self.config.ready_poll_attempts {
                return Readiness::Unavailable;
            }
            checks += 1;
            trace!(checks, "transport not ready yet");
            tokio::select! {
                () = tokio::time::sleep(self.config.ready_poll_interval) => {}
                cmd = self.commands.recv() => {
                    if matches!(cmd, Some(DriverCommand::Shutdown) | None) {
                        return Readiness::Stopped;
                    }
                }
            }
        }
    }

    /// Wait out the backoff for `attempt`. Returns `false` on shutdown.
    async fn wait_before_attempt(&mut self, attempt: u32) -> bool {
        if attempt > self.config.reconnection_attempts {
            // Budget spent: only a watchdog kick triggers another attempt.
            debug!("reconnection attempts exhausted, idling");
            return loop {
                match self.commands.recv().await {
                    Some(DriverCommand::Kick) => {
                        info!("watchdog retry");
                        break true;
                    }
                    Some(DriverCommand::Shutdown) | None => break false,
                }
            };
        }

        info!(attempt, "reconnecting");
        if !self.emit(ChannelEvent::Reconnecting(attempt)).await {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(self.config.reconnection_delay) => true,
            cmd = self.commands.recv() => matches!(cmd, Some(DriverCommand::Kick)),
        }
    }

    async fn pump(&mut self, mut incoming: mpsc::Receiver<String>) -> LinkOutcome {
        loop {
            tokio::select! {
                frame = incoming.recv() => {
                    let Some(frame) = frame else {
                        return LinkOutcome::Lost;
                    };
                    match wire::decode_frame::<InboundEvent>(&frame) {
                        Ok(event) => {
                            trace!(event = event.name(), "received");
                            if !self.emit(ChannelEvent::Message(event)).await {
                                return LinkOutcome::Stopped;
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping undecodable frame"),
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(DriverCommand::Kick) => {}
                    Some(DriverCommand::Shutdown) | None => return LinkOutcome::Stopped,
                },
            }
        }
    }

    fn spawn_watchdog(&mut self) {
        let Some(kick) = self.kick.take() else {
            return;
        };
        let deadline = self.config.watchdog;
        let mut link = self.link.subscribe();
        let events = self.events.clone();
        tokio::spawn(async move {
            // Resolves once a link has been open, or when the driver is gone.
            let opened = async {
                loop {
                    if link.borrow_and_update().is_some() {
                        return;
                    }
                    if link.changed().await.is_err() {
                        return;
                    }
                }
            };
            if tokio::time::timeout(deadline, opened).await.is_err() {
                warn!(?deadline, "channel not open before watchdog deadline");
                let _ = events.send(ChannelEvent::ConnectionFailed).await;
                let _ = kick.send(DriverCommand::Kick);
            }
        });
    }

    /// Deliver an event. Returns `false` once the consumer is gone.
    async fn emit(&self, event: ChannelEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}
