/// Local filesystem card store.
///
/// Keeps the whole collection in one JSON document:
/// `{"revision": <u64>, "cards": [<card>, ...]}`
///
/// - Atomic writes (write to .tmp, fsync, rename, fsync directory)
/// - Every persist re-reads the file so writes from other processes are
///   upserted into, not clobbered
/// - Malformed card documents are skipped with a warning
/// - Self-write suppression for the optional file watcher
/// - File I/O of `persist_all` runs on tokio's blocking pool
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{upsert_by_id, validate_batch, CardSnapshot, CardStore, StoreError, Subscription};
use crate::types::Card;
use crate::watcher::self_write::SelfWriteTracker;
use crate::watcher::types::{ContentFingerprint, StoreFileEvent};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Serialize)]
struct StoreDocument<'a> {
    revision: u64,
    cards: &'a [Card],
}

#[derive(Deserialize, Default)]
struct RawDocument {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    cards: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    revision: u64,
    docs: Vec<Card>,
    fingerprint: Option<ContentFingerprint>,
}

/// JSON-file-backed card store.
pub struct LocalCardStore {
    inner: Arc<StoreFile>,
}

impl LocalCardStore {
    /// Open the store at `path`. A missing file is an empty collection;
    /// it is created on the first persist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            inner: Arc::new(StoreFile::open(path)?),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Snapshot of what the store last read or wrote.
    pub fn current(&self) -> CardSnapshot {
        self.inner.current()
    }

    /// Re-read the file and publish the result to subscribers.
    pub fn reload(&self) -> Result<CardSnapshot, StoreError> {
        self.inner.reload()
    }

    /// React to a watcher event on the store file.
    pub fn handle_file_event(&self, event: &StoreFileEvent) {
        self.inner.handle_file_event(event)
    }

    /// Check if the current file content is one of our own writes.
    /// A match consumes the pending fingerprint.
    pub fn check_self_write(&self, path: &Path) -> bool {
        self.inner.check_self_write(path)
    }
}

/// State behind a `LocalCardStore`, shared with blocking write tasks.
struct StoreFile {
    path: PathBuf,
    state: RwLock<StoreState>,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
    self_write_tracker: Mutex<SelfWriteTracker>,
    tx: broadcast::Sender<CardSnapshot>,
}

impl StoreFile {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let store = Self {
            path: path.to_path_buf(),
            state: RwLock::new(StoreState::default()),
            write_lock: Mutex::new(()),
            self_write_tracker: Mutex::new(SelfWriteTracker::new()),
            tx,
        };
        if path.exists() {
            store.load_from_disk()?;
        }
        log::info!(
            "[board.storage.local] Opened card store at {:?} (revision {})",
            store.path,
            store.current().revision
        );
        Ok(store)
    }

    fn current(&self) -> CardSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        CardSnapshot {
            revision: state.revision,
            cards: state.docs.clone(),
        }
    }

    fn reload(&self) -> Result<CardSnapshot, StoreError> {
        let snapshot = self.load_from_disk()?;
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    fn handle_file_event(&self, event: &StoreFileEvent) {
        match event {
            StoreFileEvent::Changed { path } | StoreFileEvent::Created { path } => {
                if self.check_self_write(path) {
                    log::debug!("[board.storage.local] Suppressed own write to {:?}", path);
                    return;
                }
                if let Err(e) = self.reload() {
                    log::warn!(
                        "[board.storage.local] Failed to reload {:?} after external change: {}",
                        path,
                        e
                    );
                }
            }
            StoreFileEvent::Deleted { path } => {
                log::warn!(
                    "[board.storage.local] Store file {:?} was deleted; keeping last known state",
                    path
                );
            }
        }
        self.self_write_tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cleanup_expired();
    }

    fn check_self_write(&self, path: &Path) -> bool {
        match fs::read_to_string(path) {
            Ok(content) => self
                .self_write_tracker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .check_and_consume(&content),
            Err(_) => false,
        }
    }

    fn load_from_disk(&self) -> Result<CardSnapshot, StoreError> {
        let content = fs::read_to_string(&self.path)?;
        let (revision, docs) = parse_document(&content)?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = StoreState {
            revision,
            docs,
            fingerprint: Some(ContentFingerprint::from_content(&content)),
        };
        Ok(CardSnapshot {
            revision: state.revision,
            cards: state.docs.clone(),
        })
    }

    fn publish(&self, snapshot: CardSnapshot) {
        if self.tx.send(snapshot).is_err() {
            log::debug!("[board.storage.local] No subscribers for snapshot");
        }
    }

    fn write_cards(&self, cards: &[Card]) -> Result<CardSnapshot, StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Start from what is on disk now, not from what we last saw
        let (disk_revision, mut docs) = match fs::read_to_string(&self.path) {
            Ok(content) => {
                let stored = self
                    .state
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .fingerprint
                    .clone();
                if stored.is_some_and(|fp| fp != ContentFingerprint::from_content(&content)) {
                    log::info!(
                        "[board.storage.local] {:?} changed on disk since last read, upserting into it",
                        self.path
                    );
                }
                parse_document(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (0, Vec::new()),
            Err(e) => return Err(e.into()),
        };

        upsert_by_id(&mut docs, cards);
        let known_revision = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revision;
        let revision = disk_revision.max(known_revision) + 1;
        let content = serde_json::to_string_pretty(&StoreDocument {
            revision,
            cards: &docs,
        })?;

        self.self_write_tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register(&content);
        atomic_write(&self.path, &content)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = StoreState {
            revision,
            docs,
            fingerprint: Some(ContentFingerprint::from_content(&content)),
        };
        Ok(CardSnapshot {
            revision,
            cards: state.docs.clone(),
        })
    }
}

impl CardStore for LocalCardStore {
    fn subscribe(&self) -> Result<Subscription, StoreError> {
        let updates = self.inner.tx.subscribe();
        Ok(Subscription {
            initial: self.current(),
            updates,
        })
    }

    fn persist_all(
        &self,
        cards: &[Card],
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        let batch = validate_batch(cards).map(|()| cards.to_vec());
        async move {
            let cards = batch?;
            let count = cards.len();
            let snapshot = tokio::task::spawn_blocking(move || {
                let snapshot = inner.write_cards(&cards)?;
                inner.publish(snapshot.clone());
                Ok::<_, StoreError>(snapshot)
            })
            .await
            .map_err(|e| StoreError::Unavailable(format!("write task failed: {}", e)))??;
            log::debug!(
                "[board.storage.local] Persisted {} cards (revision {})",
                count,
                snapshot.revision
            );
            Ok(())
        }
    }
}

/// Parse a store document. Card entries that fail to parse are skipped.
fn parse_document(content: &str) -> Result<(u64, Vec<Card>), StoreError> {
    if content.trim().is_empty() {
        return Ok((0, Vec::new()));
    }
    let raw: RawDocument = serde_json::from_str(content)?;
    let mut cards = Vec::with_capacity(raw.cards.len());
    for value in raw.cards {
        match serde_json::from_value::<Card>(value) {
            Ok(card) => cards.push(card),
            Err(e) => log::warn!("[board.storage.local] Skipping malformed card document: {}", e),
        }
    }
    Ok((raw.revision, cards))
}

/// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let tmp_path = path.with_extension("board-store.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;

    if let Some(dir) = path.parent() {
        if let Ok(d) = fs::File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}
