/// Editor and card identity helpers.
///
/// The editor name is a free-text label supplied once per session. It is
/// never verified; the only rule is that it is non-empty after trimming.
/// It is passed explicitly into every mutation instead of living in a
/// process-wide global.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use unicode_normalization::UnicodeNormalization;

use crate::error::BoardError;

/// Self-declared display name of the person editing the board.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditorIdentity(String);

impl EditorIdentity {
    /// Trim and NFC-normalize `name`. Blank names are rejected.
    pub fn new(name: &str) -> Result<Self, BoardError> {
        let normalized: String = name.trim().nfc().collect();
        if normalized.is_empty() {
            return Err(BoardError::IdentityRequired);
        }
        Ok(Self(normalized))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static CARD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new card id (12 hex chars).
/// An atomic counter gives intra-process uniqueness; the nanosecond
/// timestamp separates processes. Both are hashed via SHA-256.
pub fn generate_card_id() -> String {
    use sha2::{Digest, Sha256};
    let seq = CARD_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(ts.to_le_bytes());
    hex::encode(&hasher.finalize()[..6])
}
