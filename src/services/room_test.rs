use super::*;
use crate::frame::Presence;
use crate::state::test_helpers::{self, TestClient, drain, join, join_player, recv};
use serde_json::json;
use std::time::{Duration, Instant};

async fn set_profile(client: &TestClient, label: &str, color: &str, ready: bool) {
    let mut room = client.handle.lock().await;
    let conn = room.connection_mut(client.key).expect("member should exist");
    conn.profile = Some(Profile { label: label.into(), color: color.into() });
    conn.ready = ready;
}

// =============================================================================
// Admission
// =============================================================================

#[tokio::test]
async fn invalid_room_code_is_rejected_without_state() {
    let state = test_helpers::test_app_state();
    let (tx, _rx) = mpsc::channel(8);
    let conn = Connection::new("a", "AB0", None, true);

    let result = state.rooms.admit(conn, tx).await;
    assert!(matches!(result, Err(AdmissionError::InvalidRoomCode(_))));
    assert_eq!(state.rooms.live_room_count().await, 0);
}

#[tokio::test]
async fn room_code_is_normalized_to_upper_case() {
    let state = test_helpers::test_app_state();
    let client = join(&state, "abcd", "a", None, true).await;
    assert_eq!(client.handle.lock().await.code, "ABCD");
    assert!(state.rooms.get("ABCD").await.is_some());
}

#[tokio::test]
async fn first_joiner_gets_presence_then_roster_only() {
    let state = test_helpers::test_app_state();
    let mut a = join(&state, "ABCD", "a", None, true).await;

    let frames = drain(&mut a.rx);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], Frame::Presence(Presence { count: 1 }));
    assert!(matches!(&frames[1], Frame::Roster(r) if r.players.is_empty()));
}

#[tokio::test]
async fn late_joiner_receives_state_in_order() {
    let state = test_helpers::test_app_state();
    let _host = join(&state, "ABCD", "host", None, false).await;

    let board = BoardState { items: json!([{"id": "n1"}]), connections: json!([]) };
    state.rooms.set_board_state("ABCD", board.clone());
    state.rooms.set_game_type("ABCD", GameType::Collaborative);
    state.rooms.set_prompt("ABCD", "movies with dogs");

    let mut late = join(&state, "ABCD", "late", None, true).await;
    let frames = drain(&mut late.rx);

    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0].type_name(), "presence");
    assert_eq!(frames[1].type_name(), "roster");
    assert_eq!(frames[2], Frame::State(board));
    assert_eq!(frames[3], Frame::game_type(GameType::Collaborative));
    assert_eq!(frames[4], Frame::prompt("movies with dogs"));
}

#[tokio::test]
async fn late_joiner_infers_competitive_from_existing_profiles() {
    let state = test_helpers::test_app_state();
    let a = join_player(&state, "ABCD", "a").await;
    set_profile(&a, "Ann", "#FF5252", true).await;

    let mut b = join(&state, "ABCD", "b", None, true).await;
    let frames = drain(&mut b.rx);

    assert!(frames.contains(&Frame::game_type(GameType::Competitive)));
    // Inference is reported, not stored.
    assert!(state.rooms.game_type("ABCD").is_none());
}

#[tokio::test]
async fn same_device_replaces_existing_member() {
    let state = test_helpers::test_app_state();
    let mut first = join(&state, "ABCD", "a", Some("phone-1"), true).await;
    let _second = join(&state, "ABCD", "a2", Some("phone-1"), true).await;

    let reason = first.close_rx.try_recv().expect("displaced member should be closed");
    assert_eq!(reason, CloseReason::REPLACED);

    let room = first.handle.lock().await;
    let with_device = room
        .connections()
        .filter(|c| c.device_id.as_deref() == Some("phone-1"))
        .count();
    assert_eq!(with_device, 1);
    assert!(room.connection(first.key).is_none());
}

#[tokio::test]
async fn empty_device_id_never_deduplicates() {
    let state = test_helpers::test_app_state();
    let mut a = join(&state, "ABCD", "a", Some(""), true).await;
    let _b = join(&state, "ABCD", "b", Some(""), true).await;

    assert!(a.close_rx.try_recv().is_err());
    assert_eq!(a.handle.lock().await.members.len(), 2);
}

#[tokio::test]
async fn same_device_in_other_room_is_untouched() {
    let state = test_helpers::test_app_state();
    let mut a = join(&state, "ABCD", "a", Some("tablet"), true).await;
    let _b = join(&state, "WXYZ", "a", Some("tablet"), true).await;
    assert!(a.close_rx.try_recv().is_err());
}

// =============================================================================
// Presence
// =============================================================================

#[tokio::test]
async fn presence_counts_only_players() {
    let state = test_helpers::test_app_state();
    let _display = join(&state, "ABCD", "tv", None, false).await;
    let _p1 = join(&state, "ABCD", "p1", None, true).await;
    let mut p2 = join(&state, "ABCD", "p2", None, true).await;

    let frames = drain(&mut p2.rx);
    assert_eq!(frames[0], Frame::Presence(Presence { count: 2 }));
}

// =============================================================================
// Removal
// =============================================================================

#[tokio::test]
async fn remove_refreshes_presence_for_survivors() {
    let state = test_helpers::test_app_state();
    let mut a = join_player(&state, "ABCD", "a").await;
    let b = join_player(&state, "ABCD", "b").await;
    drain(&mut a.rx);

    state.rooms.remove(&b.handle, b.key).await;

    assert_eq!(recv(&mut a.rx).await, Frame::Presence(Presence { count: 1 }));
    assert_eq!(recv(&mut a.rx).await.type_name(), "roster");
}

#[tokio::test]
async fn last_member_leaving_drops_set_but_keeps_state() {
    let state = test_helpers::test_app_state();
    let a = join_player(&state, "ABCD", "a").await;
    state.rooms.set_prompt("ABCD", "keep me");
    state.rooms.set_game_type("ABCD", GameType::Solo);

    state.rooms.remove(&a.handle, a.key).await;

    assert!(state.rooms.get("ABCD").await.is_none());
    assert!(a.handle.lock().await.is_closed());
    assert_eq!(state.rooms.prompt("ABCD").as_deref(), Some("keep me"));

    let mut back = join(&state, "ABCD", "a", None, true).await;
    let frames = drain(&mut back.rx);
    assert!(frames.contains(&Frame::prompt("keep me")));
    assert!(frames.contains(&Frame::game_type(GameType::Solo)));
    assert!(!Arc::ptr_eq(&back.handle, &a.handle));
}

#[tokio::test]
async fn leaving_refreshes_room_state() {
    let state = test_helpers::test_app_state();
    let _a = join_player(&state, "ABCD", "a").await;
    let b = join_player(&state, "ABCD", "b").await;
    let base = Instant::now();
    state.rooms.prompts.put_at("ABCD".into(), "prompt".into(), base);
    tokio::time::sleep(Duration::from_millis(20)).await;

    state.rooms.remove(&b.handle, b.key).await;

    let later = base + state.config.room_ttl + Duration::from_millis(10);
    assert_eq!(state.rooms.prompts.sweep(later, state.config.room_ttl), 0);
    assert_eq!(state.rooms.prompt("ABCD").as_deref(), Some("prompt"));
}

#[tokio::test]
async fn removing_unknown_key_is_a_no_op() {
    let state = test_helpers::test_app_state();
    let mut a = join_player(&state, "ABCD", "a").await;
    state.rooms.remove(&a.handle, Uuid::new_v4()).await;
    assert!(drain(&mut a.rx).is_empty());
    assert_eq!(a.handle.lock().await.members.len(), 1);
}

#[tokio::test]
async fn leaver_does_not_block_match_resolution() {
    let state = test_helpers::test_app_state();
    let mut a = join_player(&state, "ABCD", "a").await;
    let b = join_player(&state, "ABCD", "b").await;
    drain(&mut a.rx);

    let mut m = PvpMatch::new(json!(null));
    m.record_completion("a", 7.0, 1000.0);
    state.rooms.matches.put("ABCD".into(), m);

    state.rooms.remove(&b.handle, b.key).await;

    let frames = drain(&mut a.rx);
    let results = test_helpers::actions_of(&frames, "pvp_results");
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn closed_room_is_replaced_on_admission() {
    let state = test_helpers::test_app_state();
    let a = join_player(&state, "ABCD", "a").await;
    a.handle.lock().await.close_all(CloseReason::GAME_ENDED);

    let b = join_player(&state, "ABCD", "b").await;
    assert!(!Arc::ptr_eq(&a.handle, &b.handle));
    assert_eq!(b.handle.lock().await.members.len(), 1);
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn broadcast_skips_excluded_and_survives_full_channel() {
    let state = test_helpers::test_app_state();
    let mut a = join_player(&state, "ABCD", "a").await;
    let mut b = join_player(&state, "ABCD", "b").await;
    drain(&mut a.rx);

    // A member whose queue is already full.
    let (tx_full, _rx_full) = mpsc::channel(1);
    tx_full.try_send(Frame::Ping).unwrap();
    let stuck = Connection::new("stuck", "ABCD", None, false);
    let admission = state.rooms.admit(stuck, tx_full).await.unwrap();
    drop(admission.guard);
    drain(&mut a.rx);
    drain(&mut b.rx);

    let room = a.handle.lock().await;
    let delivered = room.broadcast(&Frame::prompt("hi"), Some(b.key));
    assert_eq!(delivered, 1);
    drop(room);

    assert_eq!(recv(&mut a.rx).await, Frame::prompt("hi"));
    assert!(drain(&mut b.rx).is_empty());
}

#[tokio::test]
async fn clear_game_keeps_game_type() {
    let state = test_helpers::test_app_state();
    state.rooms.set_board_state("ABCD", BoardState { items: json!([]), connections: json!([]) });
    state.rooms.set_prompt("ABCD", "p");
    state.rooms.set_game_type("ABCD", GameType::Competitive);
    state.rooms.matches.put("ABCD".into(), PvpMatch::new(json!(null)));

    state.rooms.clear_game("ABCD");

    assert!(state.rooms.board_state("ABCD").is_none());
    assert!(state.rooms.prompt("ABCD").is_none());
    assert!(!state.rooms.matches.contains("ABCD"));
    assert_eq!(state.rooms.game_type("ABCD"), Some(GameType::Competitive));
}

#[test]
fn set_game_type_if_absent_only_sets_once() {
    let rooms = RoomRegistry::new();
    assert!(rooms.set_game_type_if_absent("ABCD", GameType::Competitive));
    assert!(!rooms.set_game_type_if_absent("ABCD", GameType::Solo));
    assert_eq!(rooms.game_type("ABCD"), Some(GameType::Competitive));
}
