//! Inbound payload validation and text sanitizing.
//!
//! SYSTEM CONTEXT
//! ==============
//! The router calls `validate` on every inbound text frame after the rate
//! limiter has admitted it. Anything that fails here is dropped without a
//! reply so attacker-controlled content is never reflected back.

use crate::frame::{ClientAction, Frame};

/// Room code alphabet: upper-case letters and digits minus `0 O 1 I`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const ROOM_CODE_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("frame too large ({len} bytes, max {max})")]
    TooLarge { len: usize, max: usize },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame type `{0}` is not accepted from clients")]
    ServerOnlyType(&'static str),
    #[error("action without kind")]
    MissingKind,
}

/// A frame that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Ping,
    State(crate::frame::BoardState),
    /// `raw` is the validated envelope, used for verbatim relays.
    Action { action: ClientAction, raw: Frame },
}

/// Parse and validate one inbound text frame.
///
/// # Errors
///
/// Returns a `ValidationError` for oversize text, malformed JSON, frame
/// types only the hub may send, and actions with no `kind` or mistyped fields.
pub fn validate(raw: &str, max_bytes: usize) -> Result<Inbound, ValidationError> {
    if raw.len() > max_bytes {
        return Err(ValidationError::TooLarge { len: raw.len(), max: max_bytes });
    }

    let frame: Frame = serde_json::from_str(raw)?;
    match &frame {
        Frame::Ping => Ok(Inbound::Ping),
        Frame::State(board) => Ok(Inbound::State(board.clone())),
        Frame::Action(data) => {
            if frame.kind().is_none_or(|k| k.trim().is_empty()) {
                return Err(ValidationError::MissingKind);
            }
            let action = ClientAction::from_data(data)?;
            Ok(Inbound::Action { action, raw: frame.clone() })
        }
        other => Err(ValidationError::ServerOnlyType(other.type_name())),
    }
}

/// Strip control characters and angle brackets, trim, and cap at `max_chars`.
#[must_use]
pub fn sanitize(text: &str, max_chars: usize) -> String {
    text.chars()
        .filter(|c| !c.is_control() && *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .chars()
        .take(max_chars)
        .collect()
}

/// Upper-case a room code for storage and comparison.
#[must_use]
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// True if `code` (any case) is a well-formed room code.
#[must_use]
pub fn is_valid_room_code(code: &str) -> bool {
    let normalized = normalize_room_code(code);
    normalized.len() == ROOM_CODE_LEN && normalized.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
