//! Advisory countdown for a time-boxed turn.
//!
//! The server enforces the time box. This timer only drives the display and
//! never ends a session by itself.

use std::time::Duration;

use tokio::time::Instant;

/// Default length of a turn under contention.
pub const DEFAULT_TURN: Duration = Duration::from_secs(120);

/// What the countdown area shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerDisplay {
    /// Nothing (not in control).
    #[default]
    Hidden,
    /// In control with nobody waiting.
    NoLimit,
    /// In control under contention.
    Remaining(Duration),
}

impl std::fmt::Display for TimerDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hidden => Ok(()),
            Self::NoLimit => write!(f, "No time limit"),
            Self::Remaining(remaining) => {
                let ms = remaining.as_millis();
                write!(f, "Time: {}:{:02}", ms / 60_000, (ms % 60_000) / 1000)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionTimer {
    turn: Duration,
    deadline: Option<Instant>,
}

impl SessionTimer {
    pub fn new(turn: Duration) -> Self {
        Self {
            turn,
            deadline: None,
        }
    }

    pub fn turn(&self) -> Duration {
        self.turn
    }

    pub fn arm(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Arm with a full turn starting at `start`.
    pub fn arm_from(&mut self, start: Instant) {
        self.arm(start + self.turn);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left at `now`, or `None` when disarmed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Advance the countdown. Disarms itself once nothing is left.
    pub fn tick(&mut self, now: Instant) -> Option<Duration> {
        let remaining = self.remaining(now)?;
        if remaining.is_zero() {
            self.disarm();
        }
        Some(remaining)
    }
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new(DEFAULT_TURN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        assert_eq!(TimerDisplay::Hidden.to_string(), "");
        assert_eq!(TimerDisplay::NoLimit.to_string(), "No time limit");
        assert_eq!(
            TimerDisplay::Remaining(Duration::from_secs(60)).to_string(),
            "Time: 1:00"
        );
        assert_eq!(
            TimerDisplay::Remaining(Duration::from_millis(119_950)).to_string(),
            "Time: 1:59"
        );
        assert_eq!(
            TimerDisplay::Remaining(Duration::from_millis(9_999)).to_string(),
            "Time: 0:09"
        );
    }

    #[test]
    fn counts_down_and_disarms_at_zero() {
        let start = Instant::now();
        let mut timer = SessionTimer::default();
        timer.arm_from(start);
        assert_eq!(
            timer.tick(start + Duration::from_secs(60)),
            Some(Duration::from_secs(60))
        );
        assert!(timer.is_armed());

        assert_eq!(timer.tick(start + Duration::from_secs(125)), Some(Duration::ZERO));
        assert!(!timer.is_armed());
        assert_eq!(timer.tick(start + Duration::from_secs(126)), None);
    }

    #[test]
    fn rearming_replaces_the_deadline() {
        let start = Instant::now();
        let mut timer = SessionTimer::new(Duration::from_secs(10));
        timer.arm_from(start);
        timer.arm_from(start + Duration::from_secs(8));
        assert_eq!(
            timer.remaining(start + Duration::from_secs(9)),
            Some(Duration::from_secs(9))
        );
        timer.disarm();
        assert_eq!(timer.remaining(start), None);
    }
}
