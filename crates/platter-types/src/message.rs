//! Event payloads exchanged with the arbitration server.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Event names and payload field names are the compatibility contract with
//! the server and must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorCommand, ActuatorId, Direction};

/// Full actuator state keyed by id, as carried by `motor_state`.
pub type MotorSnapshot = BTreeMap<ActuatorId, ActuatorCommand>;

/// A full command addressed to one actuator (`motor_control`, `motor_updated`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorCommand {
    pub motor_id: ActuatorId,
    pub speed: u8,
    pub direction: Direction,
    pub brake: u8,
}

impl MotorCommand {
    pub fn new(motor_id: ActuatorId, command: ActuatorCommand) -> Self {
        Self {
            motor_id,
            speed: command.speed,
            direction: command.direction,
            brake: command.brake,
        }
    }

    /// The command without its address.
    pub fn command(&self) -> ActuatorCommand {
        ActuatorCommand {
            speed: self.speed,
            direction: self.direction,
            brake: self.brake,
        }
    }
}

/// Events the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// This client now holds exclusive control.
    ControlGranted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// This client is waiting at `position` (1 = next in line).
    Queued {
        position: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Authoritative per-client status.
    StatusUpdate {
        controlling: bool,
        position: u32,
        queue_length: u32,
    },

    /// Broadcast after every queue membership change.
    QueueUpdate { queue_length: u32 },

    /// The controller's turn ended while others were waiting.
    Timeout {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// An accepted command, echoed to observers.
    MotorUpdated(MotorCommand),

    /// The controlled system performed a full stop.
    AllStopped {},

    /// Full state snapshot. Actuators without an entry are left untouched.
    MotorState { state: MotorSnapshot },

    /// Protocol-level rejection (e.g. commanding without control).
    Error { message: String },
}

impl InboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ControlGranted { .. } => "control_granted",
            Self::Queued { .. } => "queued",
            Self::StatusUpdate { .. } => "status_update",
            Self::QueueUpdate { .. } => "queue_update",
            Self::Timeout { .. } => "timeout",
            Self::MotorUpdated(_) => "motor_updated",
            Self::AllStopped {} => "all_stopped",
            Self::MotorState { .. } => "motor_state",
            Self::Error { .. } => "error",
        }
    }
}

/// Events a client publishes to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Full command for one actuator.
    MotorControl(MotorCommand),

    /// Immediate full stop across all actuators.
    StopAll {},
}

impl OutboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MotorControl(_) => "motor_control",
            Self::StopAll {} => "stop_all",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: u8) -> ActuatorId {
        ActuatorId::new(raw).unwrap()
    }

    #[test]
    fn motor_control_wire_shape() {
        let event = OutboundEvent::MotorControl(MotorCommand {
            motor_id: id(2),
            speed: 40,
            direction: Direction::Reverse,
            brake: 0,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "motor_control",
                "data": {"motor_id": 2, "speed": 40, "direction": 0, "brake": 0}
            })
        );
        assert_eq!(event.name(), "motor_control");
    }

    #[test]
    fn stop_all_wire_shape() {
        assert_eq!(
            serde_json::to_value(OutboundEvent::StopAll {}).unwrap(),
            json!({"event": "stop_all", "data": {}})
        );
    }

    #[test]
    fn status_update_parses() {
        let event: InboundEvent = serde_json::from_value(json!({
            "event": "status_update",
            "data": {"controlling": false, "position": 2, "queue_length": 3}
        }))
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::StatusUpdate {
                controlling: false,
                position: 2,
                queue_length: 3
            }
        );
        assert_eq!(event.name(), "status_update");
    }

    #[test]
    fn informational_message_is_optional() {
        let granted: InboundEvent = serde_json::from_value(json!({
            "event": "control_granted",
            "data": {"message": "You have control"}
        }))
        .unwrap();
        assert_eq!(
            granted,
            InboundEvent::ControlGranted {
                message: Some("You have control".to_string())
            }
        );

        let timeout: InboundEvent =
            serde_json::from_value(json!({"event": "timeout", "data": {}})).unwrap();
        assert_eq!(timeout, InboundEvent::Timeout { message: None });
    }

    #[test]
    fn motor_state_keys_are_decimal_ids() {
        let event: InboundEvent = serde_json::from_value(json!({
            "event": "motor_state",
            "data": {"state": {
                "1": {"speed": 10, "direction": 1, "brake": 0},
                "3": {"speed": 0, "direction": 0, "brake": 100}
            }}
        }))
        .unwrap();
        let InboundEvent::MotorState { state } = event else {
            panic!("expected motor_state");
        };
        assert_eq!(state.len(), 2);
        assert_eq!(state[&id(1)].speed, 10);
        assert_eq!(state[&id(3)].brake, 100);
        assert!(!state.contains_key(&id(2)));
    }

    #[test]
    fn motor_updated_carries_full_command() {
        let event: InboundEvent = serde_json::from_value(json!({
            "event": "motor_updated",
            "data": {"motor_id": 3, "speed": 55, "direction": 1, "brake": 20}
        }))
        .unwrap();
        let InboundEvent::MotorUpdated(update) = event else {
            panic!("expected motor_updated");
        };
        assert_eq!(update.motor_id, id(3));
        assert_eq!(
            update.command(),
            ActuatorCommand {
                speed: 55,
                direction: Direction::Forward,
                brake: 20
            }
        );
    }

    #[test]
    fn zero_motor_id_is_rejected() {
        let result: Result<InboundEvent, _> = serde_json::from_value(json!({
            "event": "motor_updated",
            "data": {"motor_id": 0, "speed": 1, "direction": 1, "brake": 0}
        }));
        assert!(result.is_err());
    }
}
