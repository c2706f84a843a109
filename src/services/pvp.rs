//! PvP coordinator: one competitive match per room.
//!
//! DESIGN
//! ======
//! A match moves `Configured → InProgress → Resolved`. Completions upsert
//! the sender's record (a repeat completion overwrites the earlier one).
//! Resolution is checked against the ids of the players *currently
//! connected*, so a player who leaves before finishing never blocks the
//! others. Results are produced exactly once per match; the resolved match
//! stays in place until a new ready round replaces it or `end_game` clears it.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Configured,
    InProgress,
    Resolved,
}

/// One player's completion record.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub score: f64,
    pub elapsed_ms: f64,
    pub completed: bool,
    /// Milliseconds since Unix epoch.
    pub completed_at: u64,
}

/// One line of the aggregated results broadcast.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub player_id: String,
    pub score: f64,
    pub time: f64,
}

#[derive(Debug, Clone)]
pub struct PvpMatch {
    /// Opaque configuration supplied by whoever started the match.
    pub config: Value,
    pub players: HashMap<String, PlayerRecord>,
    phase: MatchPhase,
}

impl PvpMatch {
    #[must_use]
    pub fn new(config: Value) -> Self {
        Self { config, players: HashMap::new(), phase: MatchPhase::Configured }
    }

    #[must_use]
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Upsert a completion for `player_id`. Moves a configured match into
    /// progress; a resolved match keeps its phase.
    pub fn record_completion(&mut self, player_id: &str, score: f64, elapsed_ms: f64) {
        self.players.insert(
            player_id.to_owned(),
            PlayerRecord { score, elapsed_ms, completed: true, completed_at: now_ms() },
        );
        if self.phase == MatchPhase::Configured {
            self.phase = MatchPhase::InProgress;
        }
    }

    /// Resolve the match if every id in `connected` has completed.
    ///
    /// Returns the results the first time the condition holds, `None`
    /// otherwise (including every call after resolution). An empty
    /// `connected` set never resolves.
    pub fn try_resolve<'a>(&mut self, connected: impl IntoIterator<Item = &'a str>) -> Option<Vec<PlayerResult>> {
        if self.phase != MatchPhase::InProgress {
            return None;
        }

        let mut any = false;
        for id in connected {
            any = true;
            if !self.players.get(id).is_some_and(|r| r.completed) {
                return None;
            }
        }
        if !any {
            return None;
        }

        self.phase = MatchPhase::Resolved;
        Some(self.results())
    }

    /// Every completed record, best score first and fastest time breaking ties.
    #[must_use]
    pub fn results(&self) -> Vec<PlayerResult> {
        let mut results: Vec<PlayerResult> = self
            .players
            .iter()
            .filter(|(_, r)| r.completed)
            .map(|(id, r)| PlayerResult { player_id: id.clone(), score: r.score, time: r.elapsed_ms })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.time.total_cmp(&b.time))
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        results
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "pvp_test.rs"]
mod tests;
