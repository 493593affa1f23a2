//! Last-known actuator state.
//!
//! Two producers write here: optimistic local writes from the dispatcher
//! (before the server has seen them) and authoritative writes from server
//! broadcasts and snapshots. Writes are applied in event order, so the next
//! authoritative write for an actuator always replaces an optimistic one.

use std::collections::BTreeMap;

use platter_types::{ActuatorCommand, ActuatorId, MotorSnapshot};
use tracing::{debug, warn};

use crate::error::SessionError;

/// Where the current value of an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Process-start default.
    Initial,
    /// Local write not yet confirmed by the server.
    Optimistic,
    /// Reported by the server.
    Authoritative,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    command: ActuatorCommand,
    origin: Origin,
}

/// State of every actuator in the configured set.
#[derive(Debug, Clone)]
pub struct ActuatorStore {
    entries: BTreeMap<ActuatorId, Entry>,
}

impl ActuatorStore {
    /// Create a store for actuators `1..=count`, all at the neutral default.
    pub fn new(count: u8) -> Self {
        let entries = ActuatorId::all(count)
            .map(|id| {
                (
                    id,
                    Entry {
                        command: ActuatorCommand::default(),
                        origin: Origin::Initial,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn contains(&self, id: ActuatorId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: ActuatorId) -> Option<ActuatorCommand> {
        self.entries.get(&id).map(|e| e.command)
    }

    pub fn origin(&self, id: ActuatorId) -> Option<Origin> {
        self.entries.get(&id).map(|e| e.origin)
    }

    pub fn ids(&self) -> impl Iterator<Item = ActuatorId> + '_ {
        self.entries.keys().copied()
    }

    /// Current state of every actuator, in id order.
    pub fn commands(&self) -> Vec<(ActuatorId, ActuatorCommand)> {
        self.entries.iter().map(|(id, e)| (*id, e.command)).collect()
    }

    /// Apply a local change on top of the last-known state.
    ///
    /// Returns the full resulting command.
    pub fn update_local(
        &mut self,
        id: ActuatorId,
        change: impl FnOnce(&mut ActuatorCommand),
    ) -> Result<ActuatorCommand, SessionError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(SessionError::UnknownActuator(id))?;
        change(&mut entry.command);
        entry.origin = Origin::Optimistic;
        Ok(entry.command)
    }

    /// Record a server-reported command for one actuator.
    ///
    /// Returns `false` if the id is not part of the set.
    pub fn apply_authoritative(&mut self, id: ActuatorId, command: ActuatorCommand) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            warn!(actuator = %id, "ignoring state for unknown actuator");
            return false;
        };
        entry.command = command;
        entry.origin = Origin::Authoritative;
        true
    }

    /// Merge a server snapshot: present entries overwrite, absent ones stay.
    ///
    /// Returns the number of actuators updated.
    pub fn merge_snapshot(&mut self, snapshot: &MotorSnapshot) -> usize {
        let mut applied = 0;
        for (id, command) in snapshot {
            if self.apply_authoritative(*id, *command) {
                applied += 1;
            }
        }
        debug!(applied, entries = snapshot.len(), "merged motor snapshot");
        applied
    }
}
