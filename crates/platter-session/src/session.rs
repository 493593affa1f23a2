//! Session event loop.
//!
//! Owns the state machine, the actuator store and the dispatcher, and
//! processes one channel event, intent, timer tick or debounce expiry at a
//! time. The UI side talks to it through a [`SessionHandle`], observes it
//! through a `watch` of [`SessionStatus`], and receives [`Notice`]s.

use std::time::Duration;

use platter_protocol::{ChannelEvent, ChannelHandle};
use platter_types::{ActuatorCommand, ActuatorId, Direction, InboundEvent};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatcher::CommandDispatcher;
use crate::error::SessionError;
use crate::machine::ControlMachine;
pub use crate::machine::Notice;
use crate::state::{ControlStatus, LinkStatus};
use crate::timer::TimerDisplay;

/// A user request to change the actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SetSpeed { id: ActuatorId, speed: u8 },
    SetDirection { id: ActuatorId, direction: Direction },
    SetBrakeHeld { id: ActuatorId, held: bool },
    StopAll,
}

/// Events processed by the session loop besides channel traffic.
#[derive(Debug)]
pub enum SessionEvent {
    Intent(Intent),
    Shutdown,
}

/// Everything the UI needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub control: ControlStatus,
    pub link: LinkStatus,
    pub queue_length: Option<u32>,
    pub timer: TimerDisplay,
    pub actuators: Vec<(ActuatorId, ActuatorCommand)>,
}

impl SessionStatus {
    pub fn actuator(&self, id: ActuatorId) -> Option<ActuatorCommand> {
        self.actuators
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, command)| *command)
    }

    /// Whether actuator controls should be enabled.
    pub fn controls_enabled(&self) -> bool {
        self.control.is_in_control()
    }
}

/// Cloneable handle for feeding a running session.
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Queue an intent. Fails only once the loop has stopped.
    pub fn send(&self, intent: Intent) -> Result<(), SessionError> {
        self.events
            .send(SessionEvent::Intent(intent))
            .map_err(|_| SessionError::Stopped)
    }

    pub fn set_speed(&self, id: ActuatorId, speed: u8) -> Result<(), SessionError> {
        self.send(Intent::SetSpeed { id, speed })
    }

    pub fn set_direction(&self, id: ActuatorId, direction: Direction) -> Result<(), SessionError> {
        self.send(Intent::SetDirection { id, direction })
    }

    pub fn set_brake_held(&self, id: ActuatorId, held: bool) -> Result<(), SessionError> {
        self.send(Intent::SetBrakeHeld { id, held })
    }

    pub fn stop_all(&self) -> Result<(), SessionError> {
        self.send(Intent::StopAll)
    }

    /// Ask the loop to stop and close the channel.
    pub fn shutdown(&self) {
        let _ = self.events.send(SessionEvent::Shutdown);
    }
}

/// The client-side control session.
pub struct Session {
    machine: ControlMachine,
    dispatcher: CommandDispatcher,
    channel: ChannelHandle,
    channel_events: mpsc::Receiver<ChannelEvent>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    status_tx: watch::Sender<SessionStatus>,
    notice_tx: mpsc::UnboundedSender<Notice>,
    tick: Duration,
}

impl Session {
    /// Build a session around an already connecting channel.
    pub fn new(
        config: &Config,
        channel: ChannelHandle,
        channel_events: mpsc::Receiver<ChannelEvent>,
    ) -> (
        Self,
        SessionHandle,
        watch::Receiver<SessionStatus>,
        mpsc::UnboundedReceiver<Notice>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let machine = ControlMachine::new(config.session.turn());
        let dispatcher = CommandDispatcher::new(channel.clone(), &config.dispatch);
        let initial = SessionStatus {
            actuators: dispatcher.store().commands(),
            ..SessionStatus::default()
        };
        let (status_tx, status_rx) = watch::channel(initial);

        let session = Self {
            machine,
            dispatcher,
            channel,
            channel_events,
            event_rx,
            status_tx,
            notice_tx,
            tick: config.session.tick(),
        };
        (session, SessionHandle { events: event_tx }, status_rx, notice_rx)
    }

    /// Run the session loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut channel_done = false;

        info!("session running");

        loop {
            let flush_at = self.dispatcher.next_deadline();
            let timer_armed = self.machine.timer().is_armed();

            tokio::select! {
                event = self.channel_events.recv(), if !channel_done => {
                    match event {
                        Some(event) => self.handle_channel_event(event),
                        None => {
                            debug!("channel event stream ended");
                            channel_done = true;
                        }
                    }
                }
                event = self.event_rx.recv() => {
                    match event {
                        Some(SessionEvent::Intent(intent)) => self.handle_intent(intent),
                        Some(SessionEvent::Shutdown) | None => {
                            info!("shutting down");
                            break;
                        }
                    }
                }
                _ = ticker.tick(), if timer_armed => {
                    self.machine.tick(Instant::now());
                }
                () = sleep_until_flush(flush_at), if flush_at.is_some() => {
                    self.dispatcher.flush_due(Instant::now());
                }
            }

            self.publish_status();
        }

        self.channel.close();
        Ok(())
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        if let ChannelEvent::Message(inbound) = &event {
            self.apply_actuator_state(inbound);
        }

        let was_in_control = self.machine.status().is_in_control();
        if let Some(notice) = self.machine.handle_channel(&event, Instant::now()) {
            let _ = self.notice_tx.send(notice);
        }
        if was_in_control && !self.machine.status().is_in_control() {
            self.dispatcher.cancel_pending();
        }
    }

    fn apply_actuator_state(&mut self, event: &InboundEvent) {
        match event {
            InboundEvent::MotorUpdated(update) => {
                self.dispatcher
                    .store_mut()
                    .apply_authoritative(update.motor_id, update.command());
            }
            InboundEvent::MotorState { state } => {
                self.dispatcher.store_mut().merge_snapshot(state);
            }
            InboundEvent::AllStopped {} => info!("all actuators stopped"),
            _ => {}
        }
    }

    fn handle_intent(&mut self, intent: Intent) {
        match self.apply_intent(intent) {
            Ok(()) => {}
            Err(SessionError::NotInControl) => warn!(
                ?intent,
                status = %self.machine.status(),
                "rejecting intent while not in control"
            ),
            Err(e) => warn!(?intent, error = %e, "intent not delivered"),
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Result<(), SessionError> {
        if !self.machine.status().is_in_control() {
            return Err(SessionError::NotInControl);
        }
        match intent {
            Intent::SetSpeed { id, speed } => self.dispatcher.set_speed(id, speed, Instant::now()),
            Intent::SetDirection { id, direction } => self.dispatcher.set_direction(id, direction),
            Intent::SetBrakeHeld { id, held } => self.dispatcher.set_brake_held(id, held),
            Intent::StopAll => self.dispatcher.stop_all(),
        }
    }

    fn publish_status(&self) {
        let next = SessionStatus {
            control: self.machine.status(),
            link: self.machine.link(),
            queue_length: self.machine.queue_length(),
            timer: self.machine.display(),
            actuators: self.dispatcher.store().commands(),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn sleep_until_flush(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}
