//! Hub configuration loaded from environment variables.
//!
//! DESIGN
//! ======
//! Only `PORT` matters for a typical deployment. Everything else is a tuning
//! knob with a sensible default; unparseable values fall back silently so a
//! typo never prevents the hub from starting.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ROOM_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_STATE_SWEEP_INTERVAL_SECS: u64 = 30 * 60;
const DEFAULT_RATE_LIMIT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_RATE_LIMIT_BURST: u32 = 40;
const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 20;
const DEFAULT_RATE_LIMIT_IDLE_SECS: u64 = 10 * 60;
const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;
const DEFAULT_SNAPSHOT_MAX_BYTES: usize = 3 * 1024 * 1024;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;

/// Tuning knobs for the hub.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub port: u16,
    /// Inactivity window after which board/prompt/game type/match state is evicted.
    pub room_ttl: Duration,
    /// Lifetime of a snapshot from creation.
    pub snapshot_ttl: Duration,
    pub state_sweep_interval: Duration,
    pub rate_limit_sweep_interval: Duration,
    /// Token bucket capacity per connection.
    pub rate_limit_burst: u32,
    /// Token refill rate per connection.
    pub rate_limit_per_sec: u32,
    /// Buckets untouched for this long are dropped by the limiter sweep.
    pub rate_limit_idle: Duration,
    /// Inbound WebSocket text frames larger than this are dropped.
    pub max_frame_bytes: usize,
    /// Request body cap for `POST /api/snapshots`.
    pub snapshot_max_bytes: usize,
    /// Outbound queue depth per connection.
    pub client_channel_capacity: usize,
}

impl HubConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            room_ttl: Duration::from_secs(env_parse("ROOM_TTL_SECS", DEFAULT_ROOM_TTL_SECS)),
            snapshot_ttl: Duration::from_secs(env_parse("SNAPSHOT_TTL_SECS", DEFAULT_SNAPSHOT_TTL_SECS)),
            state_sweep_interval: Duration::from_secs(env_parse(
                "STATE_SWEEP_INTERVAL_SECS",
                DEFAULT_STATE_SWEEP_INTERVAL_SECS,
            )),
            rate_limit_sweep_interval: Duration::from_secs(env_parse(
                "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                DEFAULT_RATE_LIMIT_SWEEP_INTERVAL_SECS,
            )),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST),
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", DEFAULT_RATE_LIMIT_PER_SEC),
            rate_limit_idle: Duration::from_secs(env_parse("RATE_LIMIT_IDLE_SECS", DEFAULT_RATE_LIMIT_IDLE_SECS)),
            max_frame_bytes: env_parse("MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES),
            snapshot_max_bytes: env_parse("SNAPSHOT_MAX_BYTES", DEFAULT_SNAPSHOT_MAX_BYTES),
            client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            room_ttl: Duration::from_secs(DEFAULT_ROOM_TTL_SECS),
            snapshot_ttl: Duration::from_secs(DEFAULT_SNAPSHOT_TTL_SECS),
            state_sweep_interval: Duration::from_secs(DEFAULT_STATE_SWEEP_INTERVAL_SECS),
            rate_limit_sweep_interval: Duration::from_secs(DEFAULT_RATE_LIMIT_SWEEP_INTERVAL_SECS),
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            rate_limit_per_sec: DEFAULT_RATE_LIMIT_PER_SEC,
            rate_limit_idle: Duration::from_secs(DEFAULT_RATE_LIMIT_IDLE_SECS),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            snapshot_max_bytes: DEFAULT_SNAPSHOT_MAX_BYTES,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
