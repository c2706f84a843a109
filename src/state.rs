//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is the hub: one value constructed at startup that owns every
//! store (room registry, snapshots, rate limiter) and is injected into Axum
//! handlers via the `State` extractor. There is no process-global state, so
//! tests build an isolated hub per case.

use crate::config::HubConfig;
use crate::rate_limit::RateLimiter;
use crate::services::room::RoomRegistry;
use crate::services::snapshot::SnapshotStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-backed or Copy.
#[derive(Clone)]
pub struct AppState {
    pub rooms: RoomRegistry,
    pub snapshots: SnapshotStore,
    pub rate_limiter: RateLimiter,
    pub config: HubConfig,
}

impl AppState {
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            snapshots: SnapshotStore::new(),
            rate_limiter: RateLimiter::new(&config),
            config,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
