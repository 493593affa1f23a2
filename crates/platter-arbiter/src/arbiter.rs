//! Client activity to server events.
//!
//! Every operation returns the events to deliver, each addressed to one
//! client or to everyone. The caller owns delivery and the clock.

use std::time::{Duration, Instant};

use platter_types::{
    ActuatorCommand, ActuatorId, InboundEvent, MotorSnapshot, OutboundEvent, MAX_BRAKE,
};
use tracing::{debug, info};

use crate::error::ArbiterError;
use crate::queue::{ClientId, QueueManager};

const NOT_IN_CONTROL: &str = "You do not have control";

/// Who an event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Client(ClientId),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Recipient,
    pub event: InboundEvent,
}

impl Outgoing {
    fn to(client: ClientId, event: InboundEvent) -> Self {
        Self {
            to: Recipient::Client(client),
            event,
        }
    }

    fn all(event: InboundEvent) -> Self {
        Self {
            to: Recipient::All,
            event,
        }
    }

    /// Whether `client` should receive this event.
    pub fn reaches(&self, client: ClientId) -> bool {
        match self.to {
            Recipient::Client(target) => target == client,
            Recipient::All => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Arbiter {
    queue: QueueManager,
    actuators: u8,
    motors: MotorSnapshot,
}

impl Arbiter {
    pub fn new(actuators: u8, turn: Duration) -> Self {
        let motors = ActuatorId::all(actuators)
            .map(|id| (id, ActuatorCommand::default()))
            .collect();
        Self {
            queue: QueueManager::new(turn),
            actuators,
            motors,
        }
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn motors(&self) -> &MotorSnapshot {
        &self.motors
    }

    /// Admit a client: grant control or queue it, and send it the current
    /// actuator state.
    pub fn connect(
        &mut self,
        client: ClientId,
        now: Instant,
    ) -> Result<Vec<Outgoing>, ArbiterError> {
        if self.queue.position(client).is_some() {
            return Err(ArbiterError::AlreadyConnected(client));
        }
        let position = self.queue.add(client, now);
        info!(client, position, "client connected");

        let mut out = if position == 0 {
            self.grant(client)
        } else {
            vec![
                Outgoing::to(
                    client,
                    InboundEvent::Queued {
                        position,
                        message: Some(format!("You are #{position} in queue")),
                    },
                ),
                Outgoing::to(client, self.status(false, position)),
            ]
        };
        out.push(Outgoing::to(
            client,
            InboundEvent::MotorState {
                state: self.motors.clone(),
            },
        ));
        out.push(self.queue_update());
        Ok(out)
    }

    /// Drop a client. A departing controller's actuators are stopped and
    /// control passes to the next in line.
    pub fn disconnect(
        &mut self,
        client: ClientId,
        now: Instant,
    ) -> Result<Vec<Outgoing>, ArbiterError> {
        let was_controlling = self.queue.is_controlling(client);
        if !self.queue.remove(client, now) {
            return Err(ArbiterError::UnknownClient(client));
        }
        info!(client, was_controlling, "client disconnected");

        let mut out = Vec::new();
        if was_controlling {
            self.stop_motors();
            if let Some(next) = self.queue.current() {
                out.extend(self.grant(next));
            }
            out.push(self.snapshot());
        }
        out.push(self.queue_update());
        Ok(out)
    }

    /// Handle an event published by a client.
    pub fn handle(
        &mut self,
        client: ClientId,
        event: &OutboundEvent,
    ) -> Result<Vec<Outgoing>, ArbiterError> {
        if self.queue.position(client).is_none() {
            return Err(ArbiterError::UnknownClient(client));
        }
        if !self.queue.is_controlling(client) {
            debug!(client, event = event.name(), "command from non-controller");
            return Ok(vec![Outgoing::to(
                client,
                InboundEvent::Error {
                    message: NOT_IN_CONTROL.to_string(),
                },
            )]);
        }

        match event {
            OutboundEvent::MotorControl(command) => {
                if !command.motor_id.within(self.actuators) {
                    debug!(actuator = %command.motor_id, "ignoring out-of-range actuator");
                    return Ok(Vec::new());
                }
                self.motors.insert(command.motor_id, command.command());
                Ok(vec![Outgoing::all(InboundEvent::MotorUpdated(*command))])
            }
            OutboundEvent::StopAll {} => {
                self.stop_motors();
                Ok(vec![
                    Outgoing::all(InboundEvent::AllStopped {}),
                    self.snapshot(),
                ])
            }
        }
    }

    /// Rotate the controller out if its turn is over.
    pub fn check_timeout(&mut self, now: Instant) -> Vec<Outgoing> {
        let Some(timed_out) = self.queue.check_timeout(now) else {
            return Vec::new();
        };
        info!(client = timed_out, "turn timed out");
        self.stop_motors();

        let position = self.queue.position(timed_out).unwrap_or_default();
        let mut out = vec![
            Outgoing::to(
                timed_out,
                InboundEvent::Timeout {
                    message: Some("Your time is up".to_string()),
                },
            ),
            Outgoing::to(timed_out, self.status(false, position)),
        ];
        if let Some(next) = self.queue.current() {
            out.extend(self.grant(next));
        }
        out.push(self.queue_update());
        out.push(self.snapshot());
        out
    }

    fn grant(&self, client: ClientId) -> Vec<Outgoing> {
        vec![
            Outgoing::to(
                client,
                InboundEvent::ControlGranted {
                    message: Some("You have control".to_string()),
                },
            ),
            Outgoing::to(client, self.status(true, 0)),
        ]
    }

    fn status(&self, controlling: bool, position: u32) -> InboundEvent {
        InboundEvent::StatusUpdate {
            controlling,
            position,
            queue_length: self.queue.len(),
        }
    }

    fn queue_update(&self) -> Outgoing {
        Outgoing::all(InboundEvent::QueueUpdate {
            queue_length: self.queue.len(),
        })
    }

    fn snapshot(&self) -> Outgoing {
        Outgoing::all(InboundEvent::MotorState {
            state: self.motors.clone(),
        })
    }

    /// Zero speed and apply full brake on every actuator.
    fn stop_motors(&mut self) {
        for command in self.motors.values_mut() {
            command.speed = 0;
            command.brake = MAX_BRAKE;
        }
    }
}
