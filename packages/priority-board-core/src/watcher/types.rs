/// Event types emitted by the store file watcher.

use std::path::PathBuf;

/// SHA-256 fingerprint of a store document, line endings normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(pub String);

impl ContentFingerprint {
    pub fn from_content(content: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(content.replace("\r\n", "\n").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

/// What happened to the store file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFileEvent {
    Changed { path: PathBuf },
    Created { path: PathBuf },
    Deleted { path: PathBuf },
}

impl StoreFileEvent {
    pub fn path(&self) -> &PathBuf {
        match self {
            StoreFileEvent::Changed { path }
            | StoreFileEvent::Created { path }
            | StoreFileEvent::Deleted { path } => path,
        }
    }
}
