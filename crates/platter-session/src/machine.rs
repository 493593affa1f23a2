//! Control session state machine.
//!
//! The single authority on this client's control/queue status. Every
//! channel event is applied here, one at a time, with the current time
//! passed in so transitions stay deterministic.
//!
//! Contention means `queue_length > 1`. Under contention the holder's turn
//! is time-boxed; every `queue_update` that reports contention restarts the
//! countdown with a full turn, so a newly arriving contender gives the
//! holder a fresh window. The countdown is advisory: only the server's
//! `timeout` event ends a turn.

use std::time::Duration;

use platter_protocol::ChannelEvent;
use platter_types::InboundEvent;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::state::{ControlStatus, LinkStatus};
use crate::timer::{SessionTimer, TimerDisplay};

/// One-time messages the user must acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The turn ended; this client is back in the queue.
    TimedOut,
    /// The server rejected something.
    ServerError(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut => write!(
                f,
                "Your time is up! You have been moved to the back of the queue."
            ),
            Self::ServerError(message) => write!(f, "{message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlMachine {
    status: ControlStatus,
    link: LinkStatus,
    queue_length: Option<u32>,
    timer: SessionTimer,
    display: TimerDisplay,
}

impl ControlMachine {
    pub fn new(turn: Duration) -> Self {
        Self {
            status: ControlStatus::Disconnected,
            link: LinkStatus::Idle,
            queue_length: None,
            timer: SessionTimer::new(turn),
            display: TimerDisplay::Hidden,
        }
    }

    pub fn status(&self) -> ControlStatus {
        self.status
    }

    pub fn link(&self) -> LinkStatus {
        self.link
    }

    pub fn queue_length(&self) -> Option<u32> {
        self.queue_length
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn display(&self) -> TimerDisplay {
        self.display
    }

    /// Whether at least one other party is waiting.
    pub fn contended(&self) -> bool {
        self.queue_length.is_some_and(|len| len > 1)
    }

    /// Apply a channel lifecycle event or inbound message.
    pub fn handle_channel(&mut self, event: &ChannelEvent, now: Instant) -> Option<Notice> {
        match event {
            ChannelEvent::Open => {
                info!("channel open, awaiting placement");
                self.link = LinkStatus::Connected;
                self.status = ControlStatus::Connecting;
                self.queue_length = None;
                self.stop_timer(TimerDisplay::Hidden);
                None
            }
            ChannelEvent::Close => {
                self.link = LinkStatus::Disconnected;
                self.drop_session();
                None
            }
            ChannelEvent::Error(reason) => {
                debug!(%reason, "channel error");
                self.link = LinkStatus::ConnectionFailed;
                self.drop_session();
                None
            }
            ChannelEvent::Reconnecting(attempt) => {
                debug!(attempt, "reconnecting");
                self.link = LinkStatus::Reconnecting;
                None
            }
            ChannelEvent::Reconnected => {
                self.link = LinkStatus::Connected;
                None
            }
            ChannelEvent::ConnectionFailed => {
                self.link = LinkStatus::ConnectionFailed;
                None
            }
            ChannelEvent::Unavailable => {
                self.link = LinkStatus::Unavailable;
                self.drop_session();
                None
            }
            ChannelEvent::Message(inbound) => self.handle_inbound(inbound, now),
        }
    }

    /// Apply an inbound server event.
    pub fn handle_inbound(&mut self, event: &InboundEvent, now: Instant) -> Option<Notice> {
        match event {
            InboundEvent::ControlGranted { .. } => {
                info!(contended = self.contended(), "control granted");
                self.status = ControlStatus::InControl {
                    since: now,
                    time_limited: self.contended(),
                };
                self.evaluate_timer(now, true);
                None
            }
            InboundEvent::Queued { position, .. } => {
                info!(position, "queued");
                self.status = ControlStatus::Queued {
                    position: Some(*position),
                };
                self.stop_timer(TimerDisplay::Hidden);
                None
            }
            InboundEvent::StatusUpdate {
                controlling,
                position,
                queue_length,
            } => {
                self.queue_length = Some(*queue_length);
                if *controlling {
                    let since = self.status.since().unwrap_or(now);
                    self.status = ControlStatus::InControl {
                        since,
                        time_limited: self.contended(),
                    };
                    self.evaluate_timer(now, false);
                } else {
                    self.status = ControlStatus::Queued {
                        position: Some(*position),
                    };
                    self.stop_timer(TimerDisplay::Hidden);
                }
                debug!(status = %self.status, queue_length, "status update");
                None
            }
            InboundEvent::QueueUpdate { queue_length } => {
                self.queue_length = Some(*queue_length);
                if let ControlStatus::InControl { since, .. } = self.status {
                    self.status = ControlStatus::InControl {
                        since,
                        time_limited: self.contended(),
                    };
                    self.evaluate_timer(now, true);
                }
                debug!(queue_length, "queue update");
                None
            }
            InboundEvent::Timeout { .. } => {
                if !self.status.is_in_control() {
                    debug!(status = %self.status, "ignoring timeout while not in control");
                    return None;
                }
                info!("turn timed out");
                self.status = ControlStatus::Queued { position: None };
                self.stop_timer(TimerDisplay::Hidden);
                Some(Notice::TimedOut)
            }
            InboundEvent::Error { message } => {
                warn!(%message, "server error");
                Some(Notice::ServerError(message.clone()))
            }
            InboundEvent::MotorUpdated(_)
            | InboundEvent::AllStopped {}
            | InboundEvent::MotorState { .. } => None,
        }
    }

    /// Refresh the countdown display.
    pub fn tick(&mut self, now: Instant) {
        if let Some(remaining) = self.timer.tick(now) {
            self.display = TimerDisplay::Remaining(remaining);
        }
    }

    /// Arm or disarm the timer for the current contention.
    ///
    /// With `restart`, an armed timer gets a fresh turn from `now`;
    /// otherwise an already armed timer is left alone.
    fn evaluate_timer(&mut self, now: Instant, restart: bool) {
        if self.contended() {
            if restart || !self.timer.is_armed() {
                self.timer.arm_from(now);
            }
            let remaining = self.timer.remaining(now).unwrap_or(self.timer.turn());
            self.display = TimerDisplay::Remaining(remaining);
        } else {
            self.stop_timer(TimerDisplay::NoLimit);
        }
    }

    fn stop_timer(&mut self, display: TimerDisplay) {
        self.timer.disarm();
        self.display = display;
    }

    /// Forget everything learned on the lost connection; the next one
    /// starts from the server's word alone.
    fn drop_session(&mut self) {
        if self.status.is_in_control() {
            info!("lost channel while in control");
        }
        self.status = ControlStatus::Disconnected;
        self.queue_length = None;
        self.stop_timer(TimerDisplay::Hidden);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURN: Duration = Duration::from_secs(120);

    fn machine() -> ControlMachine {
        ControlMachine::new(TURN)
    }

    fn queue_update(n: u32) -> InboundEvent {
        InboundEvent::QueueUpdate { queue_length: n }
    }

    fn granted() -> InboundEvent {
        InboundEvent::ControlGranted { message: None }
    }

    fn status(controlling: bool, position: u32, queue_length: u32) -> InboundEvent {
        InboundEvent::StatusUpdate {
            controlling,
            position,
            queue_length,
        }
    }

    #[test]
    fn open_moves_to_connecting() {
        let mut m = machine();
        let now = Instant::now();
        assert_eq!(m.status(), ControlStatus::Disconnected);
        m.handle_channel(&ChannelEvent::Open, now);
        assert_eq!(m.status(), ControlStatus::Connecting);
        assert_eq!(m.link(), LinkStatus::Connected);
    }

    #[test]
    fn grant_without_contention_has_no_limit() {
        let mut m = machine();
        let now = Instant::now();
        m.handle_channel(&ChannelEvent::Open, now);
        m.handle_inbound(&granted(), now);
        m.handle_inbound(&queue_update(1), now);

        assert!(m.status().is_in_control());
        assert!(!m.timer().is_armed());
        assert_eq!(m.display().to_string(), "No time limit");
    }

    #[test]
    fn contention_arms_a_full_turn() {
        let mut m = machine();
        let t0 = Instant::now();
        m.handle_inbound(&granted(), t0);
        m.handle_inbound(&queue_update(3), t0);

        assert_eq!(m.timer().deadline(), Some(t0 + TURN));
        assert!(matches!(
            m.status(),
            ControlStatus::InControl {
                time_limited: true,
                ..
            }
        ));

        m.tick(t0 + Duration::from_secs(60));
        assert_eq!(m.display().to_string(), "Time: 1:00");
    }

    #[test]
    fn queue_updates_arm_iff_latest_is_contended() {
        let t0 = Instant::now();
        let sequences: [&[u32]; 5] = [&[1], &[2], &[3, 1], &[1, 1, 4], &[2, 5, 1, 0, 2]];
        for seq in sequences {
            let mut m = machine();
            m.handle_inbound(&granted(), t0);
            for n in seq {
                m.handle_inbound(&queue_update(*n), t0);
            }
            let last = *seq.last().unwrap();
            assert_eq!(m.timer().is_armed(), last > 1, "sequence {seq:?}");
        }
    }

    #[test]
    fn new_contender_restarts_the_countdown() {
        let mut m = machine();
        let t0 = Instant::now();
        m.handle_inbound(&granted(), t0);
        m.handle_inbound(&queue_update(2), t0);

        let later = t0 + Duration::from_secs(90);
        m.handle_inbound(&queue_update(3), later);
        assert_eq!(m.timer().deadline(), Some(later + TURN));
    }

    #[test]
    fn queue_update_while_queued_only_records_length() {
        let mut m = machine();
        let now = Instant::now();
        m.handle_inbound(
            &InboundEvent::Queued {
                position: 2,
                message: None,
            },
            now,
        );
        m.handle_inbound(&queue_update(4), now);
        assert_eq!(m.status(), ControlStatus::Queued { position: Some(2) });
        assert_eq!(m.queue_length(), Some(4));
        assert!(!m.timer().is_armed());
        assert_eq!(m.display(), TimerDisplay::Hidden);
    }

    #[test]
    fn timeout_falls_back_to_queue_with_one_notice() {
        let mut m = machine();
        let t0 = Instant::now();
        m.handle_inbound(&granted(), t0);
        m.handle_inbound(&queue_update(2), t0);
        assert!(m.timer().is_armed());

        let notice = m.handle_inbound(&InboundEvent::Timeout { message: None }, t0);
        assert_eq!(notice, Some(Notice::TimedOut));
        assert_eq!(m.status(), ControlStatus::Queued { position: None });
        assert!(!m.timer().is_armed());

        // A duplicate timeout (e.g. replayed after reconnect) is not shown again.
        let again = m.handle_inbound(&InboundEvent::Timeout { message: None }, t0);
        assert_eq!(again, None);
    }

    #[test]
    fn repeated_queued_status_is_idempotent() {
        let mut m = machine();
        let now = Instant::now();
        m.handle_inbound(&status(false, 2, 3), now);
        let first = m.status();
        m.handle_inbound(&status(false, 2, 3), now);
        assert_eq!(m.status(), first);
        assert_eq!(first, ControlStatus::Queued { position: Some(2) });
        assert!(!m.timer().is_armed());
    }

    #[test]
    fn status_update_keeps_existing_since() {
        let mut m = machine();
        let t0 = Instant::now();
        m.handle_inbound(&granted(), t0);
        m.handle_inbound(&status(true, 0, 1), t0 + Duration::from_secs(5));
        assert_eq!(m.status().since(), Some(t0));
    }

    #[test]
    fn disconnect_and_resync_rearms_fresh() {
        let mut m = machine();
        let t0 = Instant::now();
        m.handle_channel(&ChannelEvent::Open, t0);
        m.handle_inbound(&granted(), t0);
        m.handle_inbound(&queue_update(2), t0);

        m.handle_channel(&ChannelEvent::Close, t0 + Duration::from_secs(30));
        assert_eq!(m.status(), ControlStatus::Disconnected);
        assert!(!m.timer().is_armed());

        let t1 = t0 + Duration::from_secs(31);
        m.handle_channel(&ChannelEvent::Reconnected, t1);
        m.handle_channel(&ChannelEvent::Open, t1);
        m.handle_inbound(&status(true, 0, 2), t1);

        assert_eq!(m.status().since(), Some(t1));
        assert_eq!(m.timer().deadline(), Some(t1 + TURN));
        assert_eq!(m.link(), LinkStatus::Connected);
    }

    #[test]
    fn grant_after_reconnect_ignores_old_queue_length() {
        let mut m = machine();
        let t0 = Instant::now();
        m.handle_channel(&ChannelEvent::Open, t0);
        m.handle_inbound(&granted(), t0);
        m.handle_inbound(&queue_update(3), t0);

        m.handle_channel(&ChannelEvent::Close, t0);
        assert_eq!(m.queue_length(), None);

        let t1 = t0 + Duration::from_secs(5);
        m.handle_channel(&ChannelEvent::Reconnected, t1);
        m.handle_channel(&ChannelEvent::Open, t1);
        m.handle_inbound(&granted(), t1);
        assert_eq!(
            m.status(),
            ControlStatus::InControl {
                since: t1,
                time_limited: false
            }
        );
        assert!(!m.timer().is_armed());
        assert_eq!(m.display().to_string(), "No time limit");

        m.handle_inbound(&queue_update(2), t1);
        assert_eq!(m.timer().deadline(), Some(t1 + TURN));
    }

    #[test]
    fn channel_error_means_disconnected() {
        let mut m = machine();
        let now = Instant::now();
        m.handle_inbound(&granted(), now);
        m.handle_channel(&ChannelEvent::Error("refused".to_string()), now);
        assert_eq!(m.status(), ControlStatus::Disconnected);
        assert_eq!(m.link(), LinkStatus::ConnectionFailed);
    }

    #[test]
    fn unavailable_is_terminal_status() {
        let mut m = machine();
        m.handle_channel(&ChannelEvent::Unavailable, Instant::now());
        assert_eq!(m.status(), ControlStatus::Disconnected);
        assert_eq!(m.link(), LinkStatus::Unavailable);
    }

    #[test]
    fn server_error_does_not_change_status() {
        let mut m = machine();
        let now = Instant::now();
        m.handle_inbound(&granted(), now);
        let before = m.status();
        let notice = m.handle_inbound(
            &InboundEvent::Error {
                message: "You do not have control".to_string(),
            },
            now,
        );
        assert_eq!(
            notice,
            Some(Notice::ServerError("You do not have control".to_string()))
        );
        assert_eq!(m.status(), before);
    }
}
