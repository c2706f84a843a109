//! Room registry: membership, device de-duplication, and shared room state.
//!
//! DESIGN
//! ======
//! Live membership is a map of room code → `Arc<Mutex<Room>>`. Every frame
//! that touches a room runs with that room's lock held, which serializes
//! mutation per room while different rooms proceed in parallel. Outbound
//! delivery uses `try_send` on per-connection channels, so nothing awaits
//! while the lock is held and a slow client cannot stall its room.
//!
//! Board state, prompt, game type and PvP match live in separate TTL stores
//! keyed by room code. They outlive the membership set on purpose: a room
//! whose last member left keeps its state until the sweep evicts it, so a
//! late rejoin can resume.
//!
//! LIFECYCLE
//! =========
//! A room's membership set is created by the first admission and dropped
//! when the last member leaves or `end_game` runs. A dropped set is marked
//! `closed`; an admission racing with the drop sees the flag and retries
//! against a fresh set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{BoardState, ErrorCode, Frame, GameType};
use crate::services::pvp::{MatchPhase, PvpMatch};
use crate::services::roster;
use crate::ttl::TtlStore;
use crate::validate;

/// Close code for a refused admission (bad room code).
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Close code for a connection displaced by a newer one from the same device.
pub const CLOSE_REPLACED: u16 = 4001;
/// Close code sent to every member when the game ends.
pub const CLOSE_GAME_ENDED: u16 = 1000;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("invalid room code: {0:?}")]
    InvalidRoomCode(String),
}

impl ErrorCode for AdmissionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRoomCode(_) => "E_INVALID_ROOM",
        }
    }
}

/// Why the hub is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: &'static str,
}

impl CloseReason {
    pub const REPLACED: Self = Self { code: CLOSE_REPLACED, reason: "replaced by same device" };
    pub const GAME_ENDED: Self = Self { code: CLOSE_GAME_ENDED, reason: "game ended" };
}

/// Identity a player submitted with a `profile` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub label: String,
    pub color: String,
}

/// One admitted socket.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Hub-assigned membership key. Unique even when client ids repeat.
    pub key: Uuid,
    /// Client-supplied (or generated) id, used in roster and PvP records.
    pub id: String,
    /// Normalized room code.
    pub room: String,
    pub device_id: Option<String>,
    /// Player-role devices count toward presence and roster.
    pub is_player: bool,
    pub profile: Option<Profile>,
    pub ready: bool,
    pub answer_title: Option<String>,
    pub image: Option<String>,
}

impl Connection {
    #[must_use]
    pub fn new(id: impl Into<String>, room: &str, device_id: Option<String>, is_player: bool) -> Self {
        Self {
            key: Uuid::new_v4(),
            id: id.into(),
            room: validate::normalize_room_code(room),
            device_id: device_id.filter(|d| !d.trim().is_empty()),
            is_player,
            profile: None,
            ready: false,
            answer_title: None,
            image: None,
        }
    }
}

/// A connection plus its outbound plumbing.
pub struct Member {
    pub conn: Connection,
    tx: mpsc::Sender<Frame>,
    closer: Option<oneshot::Sender<CloseReason>>,
}

impl Member {
    /// Best-effort enqueue. A full or closed channel is logged and skipped.
    fn send(&self, frame: &Frame) -> bool {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(e) => {
                warn!(room = %self.conn.room, client_id = %self.conn.id, error = %e, "room: dropped outbound frame");
                false
            }
        }
    }

    fn close(&mut self, reason: CloseReason) {
        if let Some(closer) = self.closer.take() {
            // Receiver already gone means the socket loop has exited.
            let _ = closer.send(reason);
        }
    }
}

/// Live membership of one room.
pub struct Room {
    pub code: String,
    pub members: Vec<Member>,
    closed: bool,
}

impl Room {
    fn new(code: String) -> Self {
        Self { code, members: Vec::new(), closed: false }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn connection(&self, key: Uuid) -> Option<&Connection> {
        self.members.iter().find(|m| m.conn.key == key).map(|m| &m.conn)
    }

    pub fn connection_mut(&mut self, key: Uuid) -> Option<&mut Connection> {
        self.members.iter_mut().find(|m| m.conn.key == key).map(|m| &mut m.conn)
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.members.iter().map(|m| &m.conn)
    }

    /// Distinct ids of connected player-role members.
    #[must_use]
    pub fn connected_player_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.connections()
            .filter(|c| c.is_player && seen.insert(c.id.as_str()))
            .map(|c| c.id.clone())
            .collect()
    }

    /// Fan a frame out to every member except `exclude`. Returns how many
    /// members the frame was queued for.
    pub fn broadcast(&self, frame: &Frame, exclude: Option<Uuid>) -> usize {
        self.members
            .iter()
            .filter(|m| exclude != Some(m.conn.key))
            .filter(|m| m.send(frame))
            .count()
    }

    /// Send to a single member.
    pub fn send_to(&self, key: Uuid, frame: &Frame) -> bool {
        self.members
            .iter()
            .find(|m| m.conn.key == key)
            .is_some_and(|m| m.send(frame))
    }

    /// Close every member and mark the set as dropped.
    pub fn close_all(&mut self, reason: CloseReason) {
        for member in &mut self.members {
            member.close(reason);
        }
        self.members.clear();
        self.closed = true;
    }
}

pub type RoomHandle = Arc<Mutex<Room>>;

/// A successful admission. The room stays locked until `guard` is dropped so
/// the caller can deliver the join sequence before any other traffic.
pub struct Admission {
    pub key: Uuid,
    pub handle: RoomHandle,
    pub guard: OwnedMutexGuard<Room>,
    pub close_rx: oneshot::Receiver<CloseReason>,
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
    pub boards: TtlStore<String, BoardState>,
    pub prompts: TtlStore<String, String>,
    pub game_types: TtlStore<String, GameType>,
    pub matches: TtlStore<String, PvpMatch>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection into its room.
    ///
    /// The room code is checked before anything is touched. An existing
    /// member presenting the same non-empty device id is closed and evicted
    /// first, so at most one connection per `(room, device)` survives.
    ///
    /// # Errors
    ///
    /// Returns `AdmissionError::InvalidRoomCode` if the code is malformed.
    pub async fn admit(&self, conn: Connection, tx: mpsc::Sender<Frame>) -> Result<Admission, AdmissionError> {
        if !validate::is_valid_room_code(&conn.room) {
            return Err(AdmissionError::InvalidRoomCode(conn.room));
        }
        let code = conn.room.clone();

        loop {
            let handle = self.get_or_create(&code).await;
            let mut room = Arc::clone(&handle).lock_owned().await;
            if room.closed {
                drop(room);
                self.forget(&code, &handle).await;
                continue;
            }

            if let Some(device) = conn.device_id.as_deref() {
                evict_device(&mut room, device);
            }

            let (closer, close_rx) = oneshot::channel();
            let key = conn.key;
            info!(room = %code, client_id = %conn.id, device = ?conn.device_id, player = conn.is_player, "room: admitted");
            room.members.push(Member { conn: conn.clone(), tx: tx.clone(), closer: Some(closer) });
            self.touch(&code);

            return Ok(Admission { key, handle, guard: room, close_rx });
        }
    }

    /// Remove a member after its socket closed, then refresh the survivors.
    ///
    /// Remaining members get fresh presence and roster frames, and an
    /// in-progress match is re-checked so a leaver cannot block resolution.
    /// When the last member leaves, the membership set is dropped but the
    /// room's TTL-governed state is left for a late rejoin.
    pub async fn remove(&self, handle: &RoomHandle, key: Uuid) {
        let mut room = handle.lock().await;
        let Some(pos) = room.members.iter().position(|m| m.conn.key == key) else {
            return;
        };
        let member = room.members.remove(pos);
        info!(room = %room.code, client_id = %member.conn.id, remaining = room.members.len(), "room: member left");
        self.touch(&room.code);

        if room.members.is_empty() {
            room.closed = true;
            let code = room.code.clone();
            drop(room);
            self.forget(&code, handle).await;
            debug!(room = %code, "room: dropped empty membership set");
            return;
        }

        roster::broadcast_presence(&room);
        roster::broadcast_roster(&room);
        self.resolve_match(&room);
    }

    /// Look up a live room.
    #[cfg(test)]
    pub async fn get(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Drop a membership set from the map if it is still the registered one.
    pub async fn forget(&self, code: &str, handle: &RoomHandle) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(code).is_some_and(|h| Arc::ptr_eq(h, handle)) {
            rooms.remove(code);
        }
    }

    #[cfg(test)]
    pub async fn live_room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn get_or_create(&self, code: &str) -> RoomHandle {
        if let Some(handle) = self.rooms.read().await.get(code) {
            return Arc::clone(handle);
        }
        let mut rooms = self.rooms.write().await;
        Arc::clone(
            rooms
                .entry(code.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(Room::new(code.to_owned())))),
        )
    }

    // -------------------------------------------------------------------------
    // Room state
    // -------------------------------------------------------------------------

    /// Last-write-wins board overwrite.
    pub fn set_board_state(&self, code: &str, board: BoardState) {
        self.boards.put(code.to_owned(), board);
    }

    #[must_use]
    pub fn board_state(&self, code: &str) -> Option<BoardState> {
        self.boards.get(code)
    }

    pub fn set_prompt(&self, code: &str, text: &str) {
        self.prompts.put(code.to_owned(), text.to_owned());
    }

    #[must_use]
    pub fn prompt(&self, code: &str) -> Option<String> {
        self.prompts.get(code)
    }

    /// Returns `true` if the game type was newly set.
    pub fn set_game_type_if_absent(&self, code: &str, game_type: GameType) -> bool {
        self.game_types.insert_if_absent(code.to_owned(), game_type)
    }

    /// Explicit declaration from `start_game`; overwrites.
    pub fn set_game_type(&self, code: &str, game_type: GameType) {
        self.game_types.put(code.to_owned(), game_type);
    }

    #[must_use]
    pub fn game_type(&self, code: &str) -> Option<GameType> {
        self.game_types.get(code)
    }

    /// Clear board, prompt and match. The game type is left to the sweep.
    pub fn clear_game(&self, code: &str) {
        self.boards.delete(code);
        self.prompts.delete(code);
        self.matches.delete(code);
    }

    /// Config of the room's open match. A missing or resolved match is
    /// replaced by a fresh one with a null config.
    pub fn open_match(&self, code: &str) -> Value {
        let open = self
            .matches
            .update(code, |m| (m.phase() != MatchPhase::Resolved).then(|| m.config.clone()))
            .flatten();
        open.unwrap_or_else(|| {
            self.matches.put(code.to_owned(), PvpMatch::new(Value::Null));
            Value::Null
        })
    }

    /// Refresh the TTL of every state category held for `code`.
    pub fn touch(&self, code: &str) {
        self.boards.touch(code);
        self.prompts.touch(code);
        self.game_types.touch(code);
        self.matches.touch(code);
    }

    /// The join sequence, run while the admission still holds the room lock:
    /// presence to all, roster to all, then late state to the newcomer.
    pub fn announce_join(&self, room: &Room, key: Uuid) {
        roster::broadcast_presence(room);
        roster::broadcast_roster(room);
        self.deliver_late_state(room, key);
    }

    /// Send a newcomer the room's existing board, game type and prompt, in that order.
    ///
    /// When no game type was declared but other members already submitted
    /// profiles, the room is reported as competitive. The inferred type is
    /// not stored.
    pub fn deliver_late_state(&self, room: &Room, key: Uuid) {
        if let Some(board) = self.board_state(&room.code) {
            room.send_to(key, &Frame::State(board));
        }

        let game_type = self.game_type(&room.code).or_else(|| {
            room.connections()
                .any(|c| c.key != key && c.profile.is_some())
                .then_some(GameType::Competitive)
        });
        if let Some(game_type) = game_type {
            room.send_to(key, &Frame::game_type(game_type));
        }

        if let Some(prompt) = self.prompt(&room.code) {
            room.send_to(key, &Frame::prompt(&prompt));
        }
    }

    /// Resolve the room's match if every connected player has completed,
    /// broadcasting results to the whole room. Returns `true` if results went out.
    pub fn resolve_match(&self, room: &Room) -> bool {
        let ids = room.connected_player_ids();
        let results = self
            .matches
            .update(room.code.as_str(), |m| m.try_resolve(ids.iter().map(String::as_str)))
            .flatten();
        let Some(results) = results else {
            return false;
        };
        info!(room = %room.code, players = results.len(), "pvp: match resolved");
        room.broadcast(&Frame::pvp_results(&results), None);
        true
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn evict_device(room: &mut Room, device: &str) {
    let mut i = 0;
    while i < room.members.len() {
        if room.members[i].conn.device_id.as_deref() == Some(device) {
            let mut old = room.members.remove(i);
            info!(room = %room.code, client_id = %old.conn.id, device, "room: replacing connection from same device");
            old.close(CloseReason::REPLACED);
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
