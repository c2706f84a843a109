//! WebSocket handler: room admission and the message router.
//!
//! DESIGN
//! ======
//! On upgrade, the connection is admitted into its room and enters a
//! `select!` loop:
//! - Incoming client frames → rate limit, validate, dispatch by kind
//! - Frames queued by room peers → forward to client
//! - A close request from the room (device replaced, game ended) → close
//!
//! Handler functions hold the room lock, mutate state, and return an
//! `Outcome`. The dispatch layer applies it: reply to sender, broadcast to
//! peers, or end the game. Nothing awaits while the room lock is held.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → admit (bad room code closes with 1008)
//! 2. Join sequence: presence, roster, then late state to the newcomer
//! 3. Client sends frames → dispatch → handler returns Outcome
//! 4. Close → remove from room → survivors get presence and roster

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{ClientAction, Frame, GameType};
use crate::services::pvp::PvpMatch;
use crate::services::room::{
    Admission, CLOSE_POLICY_VIOLATION, CloseReason, Connection, Profile, Room, RoomHandle,
};
use crate::services::roster;
use crate::state::AppState;
use crate::validate::{self, Inbound};

const MAX_NAME_CHARS: usize = 20;
const MAX_COLOR_CHARS: usize = 16;
const MAX_ANSWER_CHARS: usize = 60;
const MAX_IMAGE_CHARS: usize = 500;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what.
enum Outcome {
    /// Nothing to send.
    Done,
    /// Send to the sender only.
    Reply(Frame),
    /// Send to every member including the sender.
    Broadcast(Frame),
    /// Send to every member except the sender.
    BroadcastExcludeSender(Frame),
    /// Several outcomes, applied in order.
    Many(Vec<Outcome>),
    /// Tell the peers the game ended, then close the whole room.
    EndGame,
}

/// The admitted connection a socket loop is serving.
struct Session {
    key: Uuid,
    client_id: String,
    room: String,
    handle: RoomHandle,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let conn = connection_from_params(&params);
    ws.on_upgrade(move |socket| run_ws(socket, state, conn))
}

/// Build a connection from upgrade query parameters. The room code is
/// validated on admission, not here.
fn connection_from_params(params: &HashMap<String, String>) -> Connection {
    let room = params.get("room").map_or("", String::as_str);
    let id = params
        .get("id")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
    let device = params.get("device").cloned();
    Connection::new(id, room, device, is_player(params))
}

fn is_player(params: &HashMap<String, String>) -> bool {
    let flag = |name: &str| {
        params
            .get(name)
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    };
    flag("mobile") || flag("player") || params.get("role").is_some_and(|r| r.eq_ignore_ascii_case("player"))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, conn: Connection) {
    let capacity = state.config.client_channel_capacity.max(1);
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(capacity);
    let client_id = conn.id.clone();

    let Admission { key, handle, guard, mut close_rx } = match state.rooms.admit(conn, client_tx).await {
        Ok(admission) => admission,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: admission refused");
            let _ = socket.send(close_message(CLOSE_POLICY_VIOLATION, "invalid room code")).await;
            return;
        }
    };

    // Join sequence runs before any other frame can touch the room.
    state.rooms.announce_join(&guard, key);
    let session = Session { key, client_id, room: guard.code.clone(), handle };
    drop(guard);

    info!(room = %session.room, client_id = %session.client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        if let Some(reply) = dispatch_frame(&state, &session, text.as_str()).await
                            && send_frame(&mut socket, &reply).await.is_err()
                        {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
            reason = &mut close_rx => {
                if let Ok(reason) = reason {
                    // Flush what the room queued before asking us to close.
                    while let Ok(frame) = client_rx.try_recv() {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            break;
                        }
                    }
                    info!(room = %session.room, client_id = %session.client_id, code = reason.code, "ws: closing on room request");
                    let _ = socket.send(close_message(reason.code, reason.reason)).await;
                }
                break;
            }
        }
    }

    state.rooms.remove(&session.handle, session.key).await;
    info!(room = %session.room, client_id = %session.client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Process one inbound frame with panics contained to that frame.
async fn dispatch_frame(state: &AppState, session: &Session, text: &str) -> Option<Frame> {
    match AssertUnwindSafe(process_inbound_text(state, session, text)).catch_unwind().await {
        Ok(reply) => reply,
        Err(_) => {
            warn!(room = %session.room, client_id = %session.client_id, "ws: frame handler panicked, frame dropped");
            None
        }
    }
}

/// Rate-limit, validate and dispatch one inbound text frame.
///
/// Returns a frame for the sender only when the rate limiter rejects it.
/// Everything else is delivered through the room's member channels so it
/// stays ordered with broadcasts.
async fn process_inbound_text(state: &AppState, session: &Session, text: &str) -> Option<Frame> {
    if let Err(e) = state.rate_limiter.check(&session.client_id).into_result() {
        warn!(room = %session.room, client_id = %session.client_id, retry_after_ms = e.retry_after_ms(), "ws: rate limited");
        return Some(Frame::error_from(&e).with_data("retryAfterMs", e.retry_after_ms()));
    }

    let inbound = match validate::validate(text, state.config.max_frame_bytes) {
        Ok(inbound) => inbound,
        Err(e) => {
            debug!(room = %session.room, client_id = %session.client_id, error = %e, "ws: dropped invalid frame");
            return None;
        }
    };

    let mut room = session.handle.lock().await;
    if room.is_closed() || room.connection(session.key).is_none() {
        debug!(room = %session.room, client_id = %session.client_id, "ws: frame from evicted connection ignored");
        return None;
    }

    let outcome = handle_inbound(state, &mut room, session.key, inbound);
    state.rooms.touch(&room.code);
    if apply_outcome(&mut room, session.key, outcome) {
        drop(room);
        state.rooms.forget(&session.room, &session.handle).await;
        info!(room = %session.room, client_id = %session.client_id, "ws: game ended, room closed");
    }
    None
}

/// Apply an outcome. Returns `true` if the room was closed.
fn apply_outcome(room: &mut Room, key: Uuid, outcome: Outcome) -> bool {
    match outcome {
        Outcome::Done => false,
        Outcome::Reply(frame) => {
            room.send_to(key, &frame);
            false
        }
        Outcome::Broadcast(frame) => {
            room.broadcast(&frame, None);
            false
        }
        Outcome::BroadcastExcludeSender(frame) => {
            room.broadcast(&frame, Some(key));
            false
        }
        Outcome::Many(outcomes) => {
            let mut closed = false;
            for outcome in outcomes {
                closed |= apply_outcome(room, key, outcome);
            }
            closed
        }
        Outcome::EndGame => {
            room.broadcast(&Frame::game_ended(), Some(key));
            room.close_all(CloseReason::GAME_ENDED);
            true
        }
    }
}

fn handle_inbound(state: &AppState, room: &mut Room, key: Uuid, inbound: Inbound) -> Outcome {
    match inbound {
        Inbound::Ping => Outcome::Done,
        Inbound::State(board) => {
            state.rooms.set_board_state(&room.code, board);
            Outcome::Done
        }
        Inbound::Action { action, raw } => match action {
            ClientAction::Profile { name, color, answer, image } => {
                handle_profile(state, room, key, &name, &color, answer.as_deref(), image.as_deref())
            }
            ClientAction::Ready { ready } => handle_ready(state, room, key, ready),
            ClientAction::Prompt { text } => {
                if !text.trim().is_empty() {
                    state.rooms.set_prompt(&room.code, &text);
                }
                Outcome::BroadcastExcludeSender(raw)
            }
            ClientAction::PromptRequest => state
                .rooms
                .prompt(&room.code)
                .map_or(Outcome::Done, |text| Outcome::Reply(Frame::prompt(&text))),
            ClientAction::Answer { title, image } => handle_answer(room, key, &title, &image),
            ClientAction::StartGame { game_type, play_type, config } => {
                handle_start_game(state, room, game_type.as_deref(), play_type.as_deref(), config)
            }
            ClientAction::PvpComplete { score, time } => handle_pvp_complete(state, room, key, score, time),
            ClientAction::EndGame => {
                state.rooms.clear_game(&room.code);
                Outcome::EndGame
            }
            ClientAction::Other => Outcome::BroadcastExcludeSender(raw),
        },
    }
}

// =============================================================================
// PLAYER HANDLERS
// =============================================================================

fn handle_profile(
    state: &AppState,
    room: &mut Room,
    key: Uuid,
    name: &str,
    requested: &str,
    answer: Option<&str>,
    image: Option<&str>,
) -> Outcome {
    let requested = validate::sanitize(requested, MAX_COLOR_CHARS);
    let requested = requested.as_str();
    let color = roster::assign_color(room, key, requested);
    let Some(conn) = room.connection_mut(key) else {
        return Outcome::Done;
    };
    conn.profile = Some(Profile { label: validate::sanitize(name, MAX_NAME_CHARS), color: color.clone() });
    conn.ready = true;
    if let Some(answer) = answer {
        conn.answer_title = Some(validate::sanitize(answer, MAX_ANSWER_CHARS));
    }
    if let Some(image) = image {
        conn.image = Some(validate::sanitize(image, MAX_IMAGE_CHARS));
    }

    let mut outcomes = vec![Outcome::Broadcast(Frame::Roster(roster::roster(room)))];
    if color != requested {
        debug!(room = %room.code, %color, requested, "ws: color reassigned");
        outcomes.push(Outcome::Reply(Frame::color_assigned(&color, requested)));
    }
    if state.rooms.set_game_type_if_absent(&room.code, GameType::Competitive) {
        outcomes.push(Outcome::Broadcast(Frame::game_type(GameType::Competitive)));
    }
    Outcome::Many(outcomes)
}

fn handle_ready(state: &AppState, room: &mut Room, key: Uuid, ready: bool) -> Outcome {
    let Some(conn) = room.connection_mut(key) else {
        return Outcome::Done;
    };
    conn.ready = ready;

    let mut outcomes = vec![Outcome::Broadcast(Frame::Roster(roster::roster(room)))];

    let players: Vec<bool> = room.connections().filter(|c| c.is_player).map(|c| c.ready).collect();
    if players.len() >= 2 && players.iter().all(|ready| *ready) {
        let code = room.code.as_str();
        state.rooms.set_game_type_if_absent(code, GameType::Competitive);
        let game_type = state.rooms.game_type(code).unwrap_or(GameType::Competitive);
        let config = state.rooms.open_match(code);
        info!(room = %code, players = players.len(), game_type = game_type.as_str(), "ws: all players ready, starting pvp");
        outcomes.push(Outcome::Broadcast(Frame::game_started(game_type, true, Some(config))));
    }
    Outcome::Many(outcomes)
}

fn handle_answer(room: &mut Room, key: Uuid, title: &str, image: &str) -> Outcome {
    let Some(conn) = room.connection_mut(key) else {
        return Outcome::Done;
    };
    conn.image = Some(validate::sanitize(image, MAX_IMAGE_CHARS));
    conn.answer_title = Some(validate::sanitize(title, MAX_ANSWER_CHARS));
    conn.ready = true;
    Outcome::Broadcast(Frame::Roster(roster::roster(room)))
}

// =============================================================================
// GAME HANDLERS
// =============================================================================

fn handle_start_game(
    state: &AppState,
    room: &Room,
    game_type: Option<&str>,
    play_type: Option<&str>,
    config: Option<Value>,
) -> Outcome {
    let game_type = game_type.and_then(GameType::parse).unwrap_or(GameType::Collaborative);
    let pvp = play_type.is_some_and(|p| p.eq_ignore_ascii_case("pvp"));

    state.rooms.set_game_type(&room.code, game_type);
    if pvp {
        state
            .rooms
            .matches
            .put(room.code.clone(), PvpMatch::new(config.clone().unwrap_or(Value::Null)));
    }
    info!(room = %room.code, game_type = game_type.as_str(), pvp, "ws: game started");
    Outcome::BroadcastExcludeSender(Frame::game_started(game_type, pvp, config))
}

fn handle_pvp_complete(state: &AppState, room: &Room, key: Uuid, score: Option<f64>, time: Option<f64>) -> Outcome {
    let Some(conn) = room.connection(key) else {
        return Outcome::Done;
    };
    let score = score.unwrap_or(0.0);
    let elapsed = time.unwrap_or(0.0);
    let recorded = state
        .rooms
        .matches
        .update(room.code.as_str(), |m| m.record_completion(&conn.id, score, elapsed))
        .is_some();
    if !recorded {
        debug!(room = %room.code, client_id = %conn.id, "ws: pvp_complete without a match ignored");
        return Outcome::Done;
    }
    state.rooms.resolve_match(room);
    Outcome::Done
}

// =============================================================================
// HELPERS
// =============================================================================

fn close_message(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame { code, reason: reason.into() }))
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match frame.to_text() {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if let Frame::Error(data) = frame {
        let code = data.get("code").and_then(Value::as_str).unwrap_or("-");
        debug!(code, "ws: send error frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
