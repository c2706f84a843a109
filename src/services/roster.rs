//! Presence and roster: pure derivations over a room's live members.
//!
//! Only player-role connections count. The roster additionally requires a
//! submitted profile: a player who has not sent one is absent from the list
//! rather than shown as unready.

use uuid::Uuid;

use crate::frame::{Frame, Presence, Roster, RosterEntry};
use crate::services::room::Room;

/// Colors handed out when a requested color is already taken.
pub const PALETTE: [&str; 8] = [
    "#FF5252", "#FF9800", "#FFEB3B", "#4CAF50", "#00BCD4", "#2196F3", "#9C27B0", "#E91E63",
];

#[must_use]
pub fn presence(room: &Room) -> Presence {
    Presence { count: room.connections().filter(|c| c.is_player).count() }
}

#[must_use]
pub fn roster(room: &Room) -> Roster {
    let players = room
        .connections()
        .filter(|c| c.is_player)
        .filter_map(|c| {
            let profile = c.profile.as_ref()?;
            Some(RosterEntry {
                id: c.id.clone(),
                color: profile.color.clone(),
                label: profile.label.clone(),
                image: c.image.clone(),
                answer_title: c.answer_title.clone(),
                ready: c.ready,
            })
        })
        .collect();
    Roster { players }
}

pub fn broadcast_presence(room: &Room) {
    room.broadcast(&Frame::Presence(presence(room)), None);
}

pub fn broadcast_roster(room: &Room) {
    room.broadcast(&Frame::Roster(roster(room)), None);
}

/// Pick a color for `key`, avoiding colors held by other *ready* members.
///
/// The requested color wins if nobody else holds it; otherwise the first
/// free palette color. With the palette exhausted the request is kept.
#[must_use]
pub fn assign_color(room: &Room, key: Uuid, requested: &str) -> String {
    let taken: Vec<&str> = room
        .connections()
        .filter(|c| c.key != key && c.ready)
        .filter_map(|c| c.profile.as_ref().map(|p| p.color.as_str()))
        .collect();
    let is_taken = |color: &str| taken.iter().any(|t| t.eq_ignore_ascii_case(color));

    if !requested.is_empty() && !is_taken(requested) {
        return requested.to_owned();
    }
    PALETTE
        .iter()
        .find(|c| !is_taken(c))
        .map_or_else(|| requested.to_owned(), |c| (*c).to_owned())
}

#[cfg(test)]
#[path = "roster_test.rs"]
mod tests;
