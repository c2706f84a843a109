//! Domain services used by the socket router and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room membership, game state and the snapshot store
//! so route handlers can stay focused on protocol translation.

pub mod hostinfo;
pub mod pvp;
pub mod room;
pub mod roster;
pub mod snapshot;
pub mod sweep;
