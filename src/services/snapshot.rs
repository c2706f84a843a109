//! Snapshot store: short codes for handing room configuration between devices.
//!
//! DESIGN
//! ======
//! A host posts an arbitrary JSON configuration and gets back a 4-character
//! code suitable for a QR code or for typing by hand. Codes draw from the
//! same unambiguous alphabet as room codes but live in their own namespace
//! with a much longer TTL. Snapshots are immutable once created.
//!
//! ERROR HANDLING
//! ==============
//! Code generation retries on collision up to `MAX_CODE_ATTEMPTS` times.
//! Exhaustion is reported as a retryable failure; the caller may simply
//! try the whole create again.

use rand::Rng;
use serde_json::Value;
use tracing::{info, warn};

use crate::frame::ErrorCode;
use crate::ttl::TtlStore;
use crate::validate::CODE_ALPHABET;

pub const SNAPSHOT_CODE_LEN: usize = 4;
pub const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("could not allocate a free snapshot code after {0} attempts")]
    CodeExhausted(usize),
    #[error("snapshot not found: {0}")]
    NotFound(String),
}

impl ErrorCode for SnapshotError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::CodeExhausted(_) => "E_CODE_EXHAUSTED",
            Self::NotFound(_) => "E_SNAPSHOT_NOT_FOUND",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::CodeExhausted(_))
    }
}

#[derive(Clone, Default)]
pub struct SnapshotStore {
    pub entries: TtlStore<String, Value>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payload` under a freshly generated code.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::CodeExhausted` if every attempt collided.
    pub fn create(&self, payload: Value) -> Result<String, SnapshotError> {
        let mut rng = rand::rng();
        self.create_with(payload, || random_code(&mut rng))
    }

    /// `create` with an injectable code generator.
    pub(crate) fn create_with(
        &self,
        payload: Value,
        mut next_code: impl FnMut() -> String,
    ) -> Result<String, SnapshotError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = next_code().to_ascii_uppercase();
            if self.entries.insert_if_absent(code.clone(), payload.clone()) {
                info!(%code, attempt, "snapshot: created");
                return Ok(code);
            }
        }
        warn!(attempts = MAX_CODE_ATTEMPTS, "snapshot: code space exhausted");
        Err(SnapshotError::CodeExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Fetch a snapshot. Codes compare case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::NotFound` for unknown or expired codes.
    pub fn get(&self, code: &str) -> Result<Value, SnapshotError> {
        let code = code.trim().to_ascii_uppercase();
        self.entries.get(&code).ok_or(SnapshotError::NotFound(code))
    }
}

/// Draw a code from the unambiguous alphabet.
pub fn random_code(rng: &mut impl Rng) -> String {
    (0..SNAPSHOT_CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
