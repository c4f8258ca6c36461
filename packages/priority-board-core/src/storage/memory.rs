/// In-process card store.
///
/// Holds the collection in memory, assigns a monotonic revision on every
/// write and fans snapshots out over a broadcast channel. Used for tests and
/// for running a board without a remote backend. Writes can be made to fail
/// on demand to exercise the persistence-failure path.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use super::{upsert_by_id, validate_batch, CardSnapshot, CardStore, StoreError, Subscription};
use crate::types::Card;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct MemoryState {
    revision: u64,
    docs: Vec<Card>,
    writes: usize,
}

pub struct MemoryCardStore {
    state: Mutex<MemoryState>,
    tx: broadcast::Sender<CardSnapshot>,
    /// Number of upcoming persist calls that should fail.
    fail_next: AtomicUsize,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::with_cards(Vec::new())
    }

    /// Store pre-populated with `cards` at revision 0.
    pub fn with_cards(cards: Vec<Card>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(MemoryState {
                docs: cards,
                ..MemoryState::default()
            }),
            tx,
            fail_next: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` persist calls fail with `Unavailable`.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Current contents.
    pub fn snapshot(&self) -> CardSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        CardSnapshot {
            revision: state.revision,
            cards: state.docs.clone(),
        }
    }

    /// Number of successful persist calls.
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .writes
    }

    /// Write as another session would: no failure injection, same fan-out.
    pub fn apply_remote(&self, cards: &[Card]) -> CardSnapshot {
        self.write(cards)
    }

    /// Re-deliver an arbitrary snapshot, e.g. a stale one arriving late.
    pub fn deliver(&self, snapshot: CardSnapshot) {
        if self.tx.send(snapshot).is_err() {
            log::debug!("[board.storage.memory] No subscribers for snapshot");
        }
    }

    fn write(&self, cards: &[Card]) -> CardSnapshot {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            upsert_by_id(&mut state.docs, cards);
            state.revision += 1;
            state.writes += 1;
            CardSnapshot {
                revision: state.revision,
                cards: state.docs.clone(),
            }
        };
        self.deliver(snapshot.clone());
        snapshot
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryCardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CardStore for MemoryCardStore {
    fn subscribe(&self) -> Result<Subscription, StoreError> {
        // Subscribe under the state lock so no write slips between the
        // initial snapshot and the receiver.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Subscription {
            initial: CardSnapshot {
                revision: state.revision,
                cards: state.docs.clone(),
            },
            updates: self.tx.subscribe(),
        })
    }

    fn persist_all(
        &self,
        cards: &[Card],
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        async move {
            validate_batch(cards)?;
            if self.take_failure() {
                return Err(StoreError::Unavailable("injected write failure".into()));
            }
            self.write(cards);
            Ok(())
        }
    }
}
