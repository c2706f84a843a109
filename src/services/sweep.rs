//! Sweep scheduler: periodic TTL eviction.
//!
//! DESIGN
//! ======
//! Two independent background tasks:
//! - rate-limiter bookkeeping: drops idle token buckets (default every 5 min)
//! - state eviction: snapshots older than 24h, room state untouched for 1h
//!   (default every 30 min)
//!
//! Each TTL store is swept under its own lock, one after another, so a
//! sweep never holds more than one category at a time and never touches
//! a room's membership lock.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::state::AppState;

/// Per-category eviction counts from one state sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub snapshots: usize,
    pub boards: usize,
    pub prompts: usize,
    pub game_types: usize,
    pub matches: usize,
}

impl SweepReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.snapshots + self.boards + self.prompts + self.game_types + self.matches
    }
}

/// Spawn both sweep loops. Returns their handles for shutdown.
pub fn spawn_sweep_tasks(state: AppState) -> (JoinHandle<()>, JoinHandle<()>) {
    // tokio::time::interval panics on a zero period.
    let rate_every = state.config.rate_limit_sweep_interval.max(Duration::from_secs(1));
    let state_every = state.config.state_sweep_interval.max(Duration::from_secs(1));
    info!(rate_limit_secs = rate_every.as_secs(), state_secs = state_every.as_secs(), "sweep intervals configured");

    let limiter_state = state.clone();
    let limiter_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(rate_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            let dropped = limiter_state
                .rate_limiter
                .sweep(Instant::now(), limiter_state.config.rate_limit_idle);
            if dropped > 0 {
                info!(dropped, "sweep: rate limiter buckets");
            }
        }
    });

    let state_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(state_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            let report = sweep_state(&state, Instant::now());
            if report.total() > 0 {
                info!(?report, "sweep: evicted expired state");
            }
        }
    });

    (limiter_task, state_task)
}

/// Evict expired snapshots and room state as of `now`.
pub fn sweep_state(state: &AppState, now: Instant) -> SweepReport {
    let room_ttl = state.config.room_ttl;
    let rooms = &state.rooms;
    SweepReport {
        snapshots: state.snapshots.entries.sweep(now, state.config.snapshot_ttl),
        boards: rooms.boards.sweep(now, room_ttl),
        prompts: rooms.prompts.sweep(now, room_ttl),
        game_types: rooms.game_types.sweep(now, room_ttl),
        matches: rooms.matches.sweep(now, room_ttl),
    }
}

#[cfg(test)]
#[path = "sweep_test.rs"]
mod tests;
