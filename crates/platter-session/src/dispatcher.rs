//! Command dispatch with per-actuator speed debouncing.
//!
//! Speed changes are coalesced with a trailing-edge debounce, one window
//! per actuator. Direction and brake changes publish at once. Every publish
//! carries the full current command for the actuator.

use std::collections::BTreeMap;
use std::time::Duration;

use platter_protocol::ChannelHandle;
use platter_types::{ActuatorCommand, ActuatorId, Direction, MotorCommand, OutboundEvent};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::DispatchConfig;
use crate::error::SessionError;
use crate::store::ActuatorStore;

pub struct CommandDispatcher {
    channel: ChannelHandle,
    store: ActuatorStore,
    debounce: Duration,
    max_speed: u8,
    held_brake: u8,
    /// Trailing-edge deadline per actuator with a pending speed publish.
    pending: BTreeMap<ActuatorId, Instant>,
}

impl CommandDispatcher {
    pub fn new(channel: ChannelHandle, config: &DispatchConfig) -> Self {
        Self {
            channel,
            store: ActuatorStore::new(config.actuators),
            debounce: config.debounce(),
            max_speed: config.max_speed,
            held_brake: config.held_brake.min(platter_types::MAX_BRAKE),
            pending: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &ActuatorStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ActuatorStore {
        &mut self.store
    }

    /// Record a new speed and (re)start the actuator's debounce window.
    pub fn set_speed(
        &mut self,
        id: ActuatorId,
        speed: u8,
        now: Instant,
    ) -> Result<(), SessionError> {
        let max_speed = self.max_speed;
        self.store.update_local(id, |c| {
            *c = ActuatorCommand { speed, ..*c }.clamped(max_speed);
        })?;
        self.pending.insert(id, now + self.debounce);
        trace!(actuator = %id, speed, "speed change debounced");
        Ok(())
    }

    pub fn set_direction(
        &mut self,
        id: ActuatorId,
        direction: Direction,
    ) -> Result<(), SessionError> {
        let command = self.store.update_local(id, |c| c.direction = direction)?;
        self.publish(id, command)
    }

    /// Apply the held brake level while `held`, release to zero otherwise.
    pub fn set_brake_held(&mut self, id: ActuatorId, held: bool) -> Result<(), SessionError> {
        let brake = if held { self.held_brake } else { 0 };
        let command = self.store.update_local(id, |c| c.brake = brake)?;
        self.publish(id, command)
    }

    /// Zero every actuator locally and publish a single stop-all.
    pub fn stop_all(&mut self) -> Result<(), SessionError> {
        self.pending.clear();
        let ids: Vec<ActuatorId> = self.store.ids().collect();
        for id in ids {
            self.store.update_local(id, |c| {
                c.speed = 0;
                c.brake = 0;
            })?;
        }
        debug!("stop all");
        self.send(&OutboundEvent::StopAll {})
    }

    /// Earliest pending debounce deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Publish every speed change whose window has elapsed by `now`.
    ///
    /// Publishes the store's current command, so an authoritative update
    /// that arrived during the window is what goes out.
    pub fn flush_due(&mut self, now: Instant) {
        let due: Vec<ActuatorId> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in due {
            self.pending.remove(&id);
            let Some(command) = self.store.get(id) else {
                continue;
            };
            if let Err(e) = self.publish(id, command) {
                warn!(actuator = %id, error = %e, "dropped debounced speed");
            }
        }
    }

    /// Forget pending speed publishes without sending them.
    pub fn cancel_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!(pending = self.pending.len(), "cancelling pending speed changes");
            self.pending.clear();
        }
    }

    fn publish(&self, id: ActuatorId, command: ActuatorCommand) -> Result<(), SessionError> {
        self.send(&OutboundEvent::MotorControl(MotorCommand::new(id, command)))
    }

    fn send(&self, event: &OutboundEvent) -> Result<(), SessionError> {
        self.channel.publish(event)?;
        Ok(())
    }
}
