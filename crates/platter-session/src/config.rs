//! Client configuration loaded from TOML.

use std::time::Duration;

use platter_protocol::ChannelConfig;
use platter_types::{DEFAULT_ACTUATOR_COUNT, DEFAULT_MAX_SPEED, MAX_BRAKE};
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub channel: ChannelSettings,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Where the arbitration server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

/// Connection establishment and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    #[serde(default = "default_ready_poll_interval_ms")]
    pub ready_poll_interval_ms: u64,
    #[serde(default = "default_ready_poll_attempts")]
    pub ready_poll_attempts: u32,
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_ms: u64,
    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,
    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl ChannelSettings {
    /// Build the channel adapter policy from these settings.
    pub fn to_channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            ready_poll_interval: Duration::from_millis(self.ready_poll_interval_ms),
            ready_poll_attempts: self.ready_poll_attempts,
            watchdog: Duration::from_millis(self.watchdog_ms),
            reconnection_attempts: self.reconnection_attempts,
            reconnection_delay: Duration::from_millis(self.reconnection_delay_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            ready_poll_interval_ms: default_ready_poll_interval_ms(),
            ready_poll_attempts: default_ready_poll_attempts(),
            watchdog_ms: default_watchdog_ms(),
            reconnection_attempts: default_reconnection_attempts(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

/// Control session timing and process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Length of one time-boxed turn under contention.
    #[serde(default = "default_turn_ms")]
    pub turn_ms: u64,
    /// Countdown refresh cadence.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl SessionConfig {
    pub fn turn(&self) -> Duration {
        Duration::from_millis(self.turn_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_ms: default_turn_ms(),
            tick_ms: default_tick_ms(),
            log_level: default_log_level(),
        }
    }
}

/// Command dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of actuators, addressed as `1..=actuators`.
    #[serde(default = "default_actuators")]
    pub actuators: u8,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Upper bound for speed values.
    #[serde(default = "default_max_speed")]
    pub max_speed: u8,
    /// Brake level applied while the brake is held.
    #[serde(default = "default_held_brake")]
    pub held_brake: u8,
}

impl DispatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            actuators: default_actuators(),
            debounce_ms: default_debounce_ms(),
            max_speed: default_max_speed(),
            held_brake: default_held_brake(),
        }
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:5000/ws".to_string()
}

fn default_ready_poll_interval_ms() -> u64 {
    200
}

fn default_ready_poll_attempts() -> u32 {
    50
}

fn default_watchdog_ms() -> u64 {
    10_000
}

fn default_reconnection_attempts() -> u32 {
    10
}

fn default_reconnection_delay_ms() -> u64 {
    500
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

fn default_turn_ms() -> u64 {
    120_000
}

fn default_tick_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_actuators() -> u8 {
    DEFAULT_ACTUATOR_COUNT
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_max_speed() -> u8 {
    DEFAULT_MAX_SPEED
}

fn default_held_brake() -> u8 {
    MAX_BRAKE
}
