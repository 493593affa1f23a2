//! FIFO control queue.
//!
//! The head of the queue is the controller. A controller's turn is only
//! limited while at least one other client waits; once it has lasted a full
//! turn it rotates to the back and the next client's clock starts.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::debug;

/// Opaque per-connection client identifier.
pub type ClientId = u64;

/// Default turn length under contention.
pub const DEFAULT_TURN: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct QueueManager {
    queue: VecDeque<ClientId>,
    turn: Duration,
    /// When each controller's turn started.
    started: HashMap<ClientId, Instant>,
}

impl QueueManager {
    pub fn new(turn: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            turn,
            started: HashMap::new(),
        }
    }

    pub fn turn(&self) -> Duration {
        self.turn
    }

    /// Append a client. Returns its position, 0 meaning it now controls.
    ///
    /// A client already in the queue keeps its place.
    pub fn add(&mut self, client: ClientId, now: Instant) -> u32 {
        if let Some(position) = self.position(client) {
            return position;
        }
        self.queue.push_back(client);
        let position = self.queue.len() - 1;
        if position == 0 {
            self.started.insert(client, now);
        }
        to_position(position)
    }

    /// Remove a client. If it was controlling, the next client's turn
    /// starts at `now`.
    pub fn remove(&mut self, client: ClientId, now: Instant) -> bool {
        let Some(index) = self.queue.iter().position(|c| *c == client) else {
            return false;
        };
        self.queue.remove(index);
        self.started.remove(&client);
        if index == 0 {
            if let Some(next) = self.queue.front() {
                self.started.insert(*next, now);
            }
        }
        true
    }

    pub fn is_controlling(&self, client: ClientId) -> bool {
        self.queue.front() == Some(&client)
    }

    pub fn current(&self) -> Option<ClientId> {
        self.queue.front().copied()
    }

    pub fn position(&self, client: ClientId) -> Option<u32> {
        self.queue
            .iter()
            .position(|c| *c == client)
            .map(to_position)
    }

    pub fn len(&self) -> u32 {
        to_position(self.queue.len())
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Rotate the controller to the back if its turn is over.
    ///
    /// Returns the client that timed out. Nobody times out while alone.
    pub fn check_timeout(&mut self, now: Instant) -> Option<ClientId> {
        if self.queue.len() < 2 {
            return None;
        }
        let current = *self.queue.front()?;
        let started = *self.started.get(&current)?;
        if now.saturating_duration_since(started) < self.turn {
            return None;
        }

        self.queue.rotate_left(1);
        self.started.remove(&current);
        if let Some(next) = self.queue.front() {
            self.started.insert(*next, now);
            debug!(timed_out = current, next, "turn rotated");
        }
        Some(current)
    }

    /// Time left in `client`'s turn, if it controls and someone waits.
    pub fn time_remaining(&self, client: ClientId, now: Instant) -> Option<Duration> {
        if !self.is_controlling(client) || self.queue.len() < 2 {
            return None;
        }
        let Some(started) = self.started.get(&client) else {
            return Some(self.turn);
        };
        Some(self.turn.saturating_sub(now.saturating_duration_since(*started)))
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new(DEFAULT_TURN)
    }
}

fn to_position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
