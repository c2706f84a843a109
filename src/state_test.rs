use super::*;

#[tokio::test]
async fn new_state_is_empty() {
    let state = test_helpers::test_app_state();
    assert_eq!(state.rooms.live_room_count().await, 0);
    assert!(state.snapshots.entries.is_empty());
    assert_eq!(state.rate_limiter.tracked_clients(), 0);
}

#[tokio::test]
async fn clones_share_stores() {
    let state = test_helpers::test_app_state();
    let other = state.clone();

    state.rooms.set_prompt("ABCD", "draw a cat");
    let code = state.snapshots.create(serde_json::json!({"k": 1})).unwrap();

    assert_eq!(other.rooms.prompt("ABCD").as_deref(), Some("draw a cat"));
    assert!(other.snapshots.get(&code).is_ok());
}

#[tokio::test]
async fn separate_hubs_are_isolated() {
    let a = test_helpers::test_app_state();
    let b = test_helpers::test_app_state();
    a.rooms.set_prompt("ABCD", "only in a");
    assert!(b.rooms.prompt("ABCD").is_none());
}
