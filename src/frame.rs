//! Frame: the JSON envelope exchanged over the room socket.
//!
//! ARCHITECTURE
//! ============
//! Every WebSocket text message is `{"type": ..., "payload": ...}`. Clients
//! send `ping`, `state` and `action` frames; the hub additionally emits
//! `presence`, `roster` and `error`. Action payloads are flat objects
//! discriminated by `kind`, and the router dispatches on that kind.
//!
//! DESIGN
//! ======
//! - Action payloads stay as raw `Data` on the envelope so unknown kinds can
//!   be relayed to peers byte-for-byte in meaning.
//! - Recognized kinds are additionally decoded into `ClientAction`, which
//!   gives handlers typed fields without re-reading the map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::pvp::PlayerResult;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Action payload key carrying the discriminator.
pub const FRAME_KIND: &str = "kind";

/// Error payload key for human-readable messages.
pub const FRAME_MESSAGE: &str = "message";

/// Error payload key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Error payload key for the retryable flag.
pub const FRAME_RETRYABLE: &str = "retryable";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = serde_json::Map<String, Value>;

/// The universal message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum Frame {
    Ping,
    State(BoardState),
    Action(Data),
    Presence(Presence),
    Roster(Roster),
    Error(Data),
}

/// Last-known shared board. The hub never looks inside `items` or `connections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardState {
    #[serde(default = "empty_array")]
    pub items: Value,
    #[serde(default = "empty_array")]
    pub connections: Value,
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub players: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: String,
    pub color: String,
    pub label: String,
    pub image: Option<String>,
    pub answer_title: Option<String>,
    pub ready: bool,
}

/// The room's declared mode of play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Solo,
    Collaborative,
    Competitive,
}

impl GameType {
    /// Lenient parse: anything unrecognized is `None` rather than an error.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solo" => Some(Self::Solo),
            "collaborative" | "collab" | "coop" => Some(Self::Collaborative),
            "competitive" | "pvp" => Some(Self::Competitive),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Collaborative => "collaborative",
            Self::Competitive => "competitive",
        }
    }
}

/// Typed view of a recognized inbound action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientAction {
    Profile {
        #[serde(default)]
        name: String,
        #[serde(default)]
        color: String,
        #[serde(default)]
        answer: Option<String>,
        #[serde(default)]
        image: Option<String>,
    },
    Ready {
        ready: bool,
    },
    Prompt {
        #[serde(default)]
        text: String,
    },
    PromptRequest,
    Answer {
        #[serde(default)]
        title: String,
        #[serde(default)]
        image: String,
    },
    #[serde(rename_all = "camelCase")]
    StartGame {
        #[serde(default)]
        game_type: Option<String>,
        #[serde(default)]
        play_type: Option<String>,
        #[serde(default)]
        config: Option<Value>,
    },
    PvpComplete {
        #[serde(default)]
        score: Option<f64>,
        #[serde(default)]
        time: Option<f64>,
    },
    EndGame,
    /// Any kind the hub does not interpret; relayed to peers.
    #[serde(other)]
    Other,
}

impl ClientAction {
    /// Decode an action payload.
    ///
    /// # Errors
    ///
    /// Returns the serde error if a recognized kind carries mistyped fields.
    pub fn from_data(data: &Data) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(data.clone()))
    }
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    /// Build an action frame of the given kind with extra fields.
    #[must_use]
    pub fn action(kind: &str, mut fields: Data) -> Self {
        fields.insert(FRAME_KIND.into(), Value::String(kind.to_owned()));
        Self::Action(fields)
    }

    #[must_use]
    pub fn game_type(game_type: GameType) -> Self {
        let mut data = Data::new();
        data.insert("gameType".into(), Value::String(game_type.as_str().into()));
        Self::action("game_type", data)
    }

    #[must_use]
    pub fn prompt(text: &str) -> Self {
        let mut data = Data::new();
        data.insert("text".into(), Value::String(text.to_owned()));
        Self::action("prompt", data)
    }

    #[must_use]
    pub fn color_assigned(color: &str, requested: &str) -> Self {
        let mut data = Data::new();
        data.insert("color".into(), Value::String(color.to_owned()));
        data.insert("requested".into(), Value::String(requested.to_owned()));
        Self::action("color_assigned", data)
    }

    /// The "game started" event. `config` is only present for PvP rounds.
    #[must_use]
    pub fn game_started(game_type: GameType, pvp: bool, config: Option<Value>) -> Self {
        let mut data = Data::new();
        data.insert("gameType".into(), Value::String(game_type.as_str().into()));
        data.insert(
            "playType".into(),
            if pvp { Value::String("pvp".into()) } else { Value::Null },
        );
        data.insert("config".into(), if pvp { config.unwrap_or(Value::Null) } else { Value::Null });
        Self::action("start_game", data)
    }

    #[must_use]
    pub fn pvp_results(results: &[PlayerResult]) -> Self {
        let mut data = Data::new();
        data.insert("results".into(), serde_json::to_value(results).unwrap_or_else(|_| empty_array()));
        Self::action("pvp_results", data)
    }

    #[must_use]
    pub fn game_ended() -> Self {
        Self::action("end_game", Data::new())
    }

    /// Create a structured error frame from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_CODE.into(), Value::String(err.error_code().to_owned()));
        data.insert(FRAME_MESSAGE.into(), Value::String(err.to_string()));
        data.insert(FRAME_RETRYABLE.into(), Value::Bool(err.retryable()));
        Self::Error(data)
    }
}

// =============================================================================
// BUILDERS / ACCESSORS
// =============================================================================

impl Frame {
    /// Add a field to an action or error payload. Other variants are returned unchanged.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Self::Action(data) | Self::Error(data) = &mut self {
            data.insert(key.into(), value.into());
        }
        self
    }

    /// Wire-level `type` tag.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::State(_) => "state",
            Self::Action(_) => "action",
            Self::Presence(_) => "presence",
            Self::Roster(_) => "roster",
            Self::Error(_) => "error",
        }
    }

    /// Action kind, if this is an action frame with a string `kind`.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Action(data) => data.get(FRAME_KIND).and_then(Value::as_str),
            _ => None,
        }
    }

    /// Encode as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the payload cannot be serialized.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
