/// Recognizes the store's own writes when the watcher reports them back.
///
/// The store registers a fingerprint right before each atomic write. When
/// the watcher fires, the file is fingerprinted again: a pending match is our
/// own write and is consumed; anything else came from outside.
/// Entries older than the TTL are dropped on cleanup.
use std::time::{Duration, Instant};

use super::types::ContentFingerprint;

const FINGERPRINT_TTL: Duration = Duration::from_secs(10);

/// Pending fingerprints for a single store file.
#[derive(Debug, Default)]
pub struct SelfWriteTracker {
    pending: Vec<(ContentFingerprint, Instant)>,
}

impl SelfWriteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, content: &str) {
        self.pending
            .push((ContentFingerprint::from_content(content), Instant::now()));
    }

    /// True (and consumed) when `current_content` matches a pending write.
    pub fn check_and_consume(&mut self, current_content: &str) -> bool {
        let fingerprint = ContentFingerprint::from_content(current_content);
        match self.pending.iter().position(|(fp, _)| *fp == fingerprint) {
            Some(pos) => {
                self.pending.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn cleanup_expired(&mut self) {
        let now = Instant::now();
        self.pending
            .retain(|(_, at)| now.duration_since(*at) < FINGERPRINT_TTL);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
