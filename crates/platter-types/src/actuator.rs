//! Actuator identity and command types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of actuators on the reference rig.
pub const DEFAULT_ACTUATOR_COUNT: u8 = 3;

/// Upper bound for the speed field as exposed to clients (percent).
pub const DEFAULT_MAX_SPEED: u8 = 100;

/// Upper bound for the brake field (percent braking force).
pub const MAX_BRAKE: u8 = 100;

/// Errors raised when raw wire values do not map onto domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid actuator id: {0}")]
    InvalidActuator(u8),

    #[error("invalid direction: {0}")]
    InvalidDirection(i64),
}

/// Identifier of a single actuator (motor).
///
/// Ids start at 1. Whether an id belongs to the configured actuator set is
/// checked by whoever owns that set; this type only rejects 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ActuatorId(u8);

impl ActuatorId {
    /// Create an id, rejecting 0.
    pub fn new(raw: u8) -> Result<Self, ValueError> {
        Self::try_from(raw)
    }

    /// Get the raw wire value.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Iterate over the ids `1..=count`.
    pub fn all(count: u8) -> impl Iterator<Item = Self> {
        (1..=count).map(Self)
    }

    /// Whether this id is part of a set of `count` actuators.
    pub fn within(self, count: u8) -> bool {
        self.0 <= count
    }
}

impl TryFrom<u8> for ActuatorId {
    type Error = ValueError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        if raw == 0 {
            return Err(ValueError::InvalidActuator(raw));
        }
        Ok(Self(raw))
    }
}

impl From<ActuatorId> for u8 {
    fn from(id: ActuatorId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rotation direction. Carried on the wire as the level of the direction line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Direction {
    Reverse,
    #[default]
    Forward,
}

impl TryFrom<i64> for Direction {
    type Error = ValueError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Reverse),
            1 => Ok(Self::Forward),
            other => Err(ValueError::InvalidDirection(other)),
        }
    }
}

impl From<Direction> for i64 {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Reverse => 0,
            Direction::Forward => 1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reverse => write!(f, "reverse"),
            Self::Forward => write!(f, "forward"),
        }
    }
}

/// Full command state of one actuator.
///
/// All three fields are always present; partial updates are merged against
/// the last known state before they ever reach the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub speed: u8,
    pub direction: Direction,
    /// Braking force in percent.
    pub brake: u8,
}

impl ActuatorCommand {
    /// Bound speed to `[0, max_speed]` and brake to `[0, MAX_BRAKE]`.
    #[must_use]
    pub fn clamped(self, max_speed: u8) -> Self {
        Self {
            speed: self.speed.min(max_speed),
            direction: self.direction,
            brake: self.brake.min(MAX_BRAKE),
        }
    }

    /// Whether any braking force is applied.
    pub fn is_braking(&self) -> bool {
        self.brake >= 1
    }
}
