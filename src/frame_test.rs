use super::*;
use serde_json::json;

#[test]
fn ping_serializes_without_payload() {
    let text = Frame::Ping.to_text().unwrap();
    assert_eq!(text, r#"{"type":"ping"}"#);
    let back: Frame = serde_json::from_str(&text).unwrap();
    assert_eq!(back, Frame::Ping);
}

#[test]
fn state_defaults_missing_arrays() {
    let frame: Frame = serde_json::from_str(r#"{"type":"state","payload":{"items":[1]}}"#).unwrap();
    let Frame::State(board) = frame else {
        panic!("expected state frame");
    };
    assert_eq!(board.items, json!([1]));
    assert_eq!(board.connections, json!([]));
}

#[test]
fn presence_wire_shape() {
    let value = serde_json::to_value(Frame::Presence(Presence { count: 3 })).unwrap();
    assert_eq!(value, json!({"type": "presence", "payload": {"count": 3}}));
}

#[test]
fn roster_entry_uses_camel_case() {
    let roster = Roster {
        players: vec![RosterEntry {
            id: "a".into(),
            color: "#FF5252".into(),
            label: "Ann".into(),
            image: None,
            answer_title: Some("Alien".into()),
            ready: true,
        }],
    };
    let value = serde_json::to_value(Frame::Roster(roster)).unwrap();
    assert_eq!(value["payload"]["players"][0]["answerTitle"], "Alien");
    assert_eq!(value["payload"]["players"][0]["ready"], true);
}

#[test]
fn action_builder_sets_kind() {
    let frame = Frame::color_assigned("#FF9800", "#FF5252");
    assert_eq!(frame.kind(), Some("color_assigned"));
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["payload"]["color"], "#FF9800");
    assert_eq!(value["payload"]["requested"], "#FF5252");
}

#[test]
fn game_started_carries_config_only_for_pvp() {
    let pvp = serde_json::to_value(Frame::game_started(GameType::Competitive, true, Some(json!({"mode": "race"})))).unwrap();
    assert_eq!(pvp["payload"]["playType"], "pvp");
    assert_eq!(pvp["payload"]["config"]["mode"], "race");

    let coop =
        serde_json::to_value(Frame::game_started(GameType::Collaborative, false, Some(json!({"x": 1})))).unwrap();
    assert!(coop["payload"]["playType"].is_null());
    assert!(coop["payload"]["config"].is_null());
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("slow down")]
    struct Busy;

    impl ErrorCode for Busy {
        fn error_code(&self) -> &'static str {
            "E_BUSY"
        }

        fn retryable(&self) -> bool {
            true
        }
    }

    let frame = Frame::error_from(&Busy).with_data("retryAfterMs", 250);
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["payload"]["code"], "E_BUSY");
    assert_eq!(value["payload"]["message"], "slow down");
    assert_eq!(value["payload"]["retryable"], true);
    assert_eq!(value["payload"]["retryAfterMs"], 250);
}

// =============================================================================
// ClientAction decoding
// =============================================================================

fn data(value: serde_json::Value) -> Data {
    value.as_object().cloned().unwrap()
}

#[test]
fn decodes_profile() {
    let action = ClientAction::from_data(&data(json!({"kind": "profile", "name": "Ann", "color": "#FF5252"}))).unwrap();
    assert_eq!(
        action,
        ClientAction::Profile { name: "Ann".into(), color: "#FF5252".into(), answer: None, image: None }
    );
}

#[test]
fn decodes_start_game_camel_case() {
    let action = ClientAction::from_data(&data(json!({
        "kind": "start_game",
        "gameType": "competitive",
        "playType": "pvp",
        "config": {"items": []}
    })))
    .unwrap();
    let ClientAction::StartGame { game_type, play_type, config } = action else {
        panic!("expected start_game");
    };
    assert_eq!(game_type.as_deref(), Some("competitive"));
    assert_eq!(play_type.as_deref(), Some("pvp"));
    assert_eq!(config, Some(json!({"items": []})));
}

#[test]
fn unknown_kind_decodes_as_other() {
    let action = ClientAction::from_data(&data(json!({"kind": "drag", "x": 1}))).unwrap();
    assert_eq!(action, ClientAction::Other);
}

#[test]
fn unit_kinds_ignore_extra_fields() {
    let action = ClientAction::from_data(&data(json!({"kind": "end_game", "reason": "host"}))).unwrap();
    assert_eq!(action, ClientAction::EndGame);
}

#[test]
fn mistyped_field_is_rejected() {
    assert!(ClientAction::from_data(&data(json!({"kind": "ready", "ready": "yes"}))).is_err());
    assert!(ClientAction::from_data(&data(json!({"kind": "pvp_complete", "score": "lots"}))).is_err());
}

#[test]
fn game_type_parse_is_lenient() {
    assert_eq!(GameType::parse("Competitive"), Some(GameType::Competitive));
    assert_eq!(GameType::parse("solo"), Some(GameType::Solo));
    assert_eq!(GameType::parse("chess"), None);
}
