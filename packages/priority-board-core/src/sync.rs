/// Snapshot subscription loop.
///
/// Subscribes to the board's card store, hands the initial snapshot to the
/// reconciliation store, then keeps applying updates. Snapshots that arrive
/// within the debounce window of each other are coalesced: only the newest
/// revision of a burst is applied.
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use crate::error::BoardError;
use crate::reconcile::ReconciliationStore;
use crate::storage::{CardSnapshot, CardStore, Subscription};

/// Running subscription. Dropping it, or calling `unsubscribe`, stops the
/// loop; no snapshot is applied afterwards.
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn unsubscribe(self) {
        // Drop aborts the task.
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribe `board` to its store and start applying snapshots.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_sync<S: CardStore>(board: Arc<ReconciliationStore<S>>) -> Result<SyncHandle, BoardError> {
    let Subscription { initial, updates } = board.store().subscribe()?;
    log::info!(
        "[board.sync] Subscribed at revision {} ({} cards)",
        initial.revision,
        initial.cards.len()
    );
    let task = tokio::spawn(run(board, initial, updates));
    Ok(SyncHandle { task })
}

async fn run<S: CardStore>(
    board: Arc<ReconciliationStore<S>>,
    initial: CardSnapshot,
    mut updates: Receiver<CardSnapshot>,
) {
    apply(&board, initial).await;

    while let Some(first) = next_snapshot(&mut updates).await {
        let latest = coalesce(&mut updates, first, &board).await;
        apply(&board, latest).await;
    }
    log::info!("[board.sync] Store closed the subscription");
}

/// Wait for the next snapshot, skipping over lag notices.
async fn next_snapshot(updates: &mut Receiver<CardSnapshot>) -> Option<CardSnapshot> {
    loop {
        match updates.recv().await {
            Ok(snapshot) => return Some(snapshot),
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("[board.sync] Fell behind, skipped {} snapshots", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Collect everything that arrives within the debounce window after `first`
/// and keep the newest revision.
async fn coalesce<S: CardStore>(
    updates: &mut Receiver<CardSnapshot>,
    first: CardSnapshot,
    board: &ReconciliationStore<S>,
) -> CardSnapshot {
    let deadline = Instant::now() + board.debounce_window();
    let mut latest = first;
    let mut merged = 0usize;
    loop {
        match timeout_at(deadline, updates.recv()).await {
            Ok(Ok(snapshot)) => {
                merged += 1;
                if snapshot.revision >= latest.revision {
                    latest = snapshot;
                }
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                log::warn!("[board.sync] Fell behind, skipped {} snapshots", skipped);
            }
            // Closed or window elapsed; a close is seen again by the caller.
            Ok(Err(RecvError::Closed)) | Err(_) => break,
        }
    }
    if merged > 0 {
        log::debug!(
            "[board.sync] Coalesced {} snapshots into revision {}",
            merged + 1,
            latest.revision
        );
    }
    latest
}

async fn apply<S: CardStore>(board: &ReconciliationStore<S>, snapshot: CardSnapshot) {
    let revision = snapshot.revision;
    if let Err(e) = board.apply_snapshot(snapshot).await {
        log::warn!("[board.sync] Could not apply snapshot {}: {}", revision, e);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::BoardConfig;
    use crate::identity::EditorIdentity;
    use crate::reconcile::SyncState;
    use crate::storage::memory::MemoryCardStore;
    use crate::types::{Card, ColumnId};

    fn card(id: &str, order: f64) -> Card {
        let editor = EditorIdentity::new("Remote").unwrap();
        Card::new(id, id, ColumnId::Todo, order, &editor, 0)
    }

    fn board_with(store: Arc<MemoryCardStore>, seed_on_empty: bool) -> Arc<ReconciliationStore<MemoryCardStore>> {
        let config = BoardConfig {
            seed_on_empty,
            ..BoardConfig::default()
        };
        Arc::new(ReconciliationStore::new(store, &config))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_snapshot_applied() {
        let store = Arc::new(MemoryCardStore::with_cards(vec![card("a", 10_000.0)]));
        let board = board_with(store, false);
        let _handle = spawn_sync(board.clone()).unwrap();
        settle().await;
        assert_eq!(board.sync_state(), SyncState::Synced { revision: 0 });
        assert_eq!(board.column(ColumnId::Todo).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_store_is_seeded_through_sync() {
        let store = Arc::new(MemoryCardStore::new());
        let board = board_with(store.clone(), true);
        let _handle = spawn_sync(board.clone()).unwrap();
        settle().await;
        assert_eq!(store.write_count(), 1);
        // The seed write's own snapshot came back and was adopted.
        assert_eq!(board.revision(), Some(1));
        assert!(!board.all_cards().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced() {
        let store = Arc::new(MemoryCardStore::new());
        let board = board_with(store.clone(), false);
        let _handle = spawn_sync(board.clone()).unwrap();
        settle().await;
        let before = board.applied_snapshots();

        store.apply_remote(&[card("a", 10_000.0)]);
        store.apply_remote(&[card("b", 20_000.0)]);
        store.apply_remote(&[card("c", 30_000.0)]);
        settle().await;

        assert_eq!(board.applied_snapshots(), before + 1);
        assert_eq!(board.revision(), Some(3));
        assert_eq!(board.column(ColumnId::Todo).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_stale_snapshot_ignored() {
        let store = Arc::new(MemoryCardStore::new());
        let board = board_with(store.clone(), false);
        let _handle = spawn_sync(board.clone()).unwrap();
        settle().await;

        store.apply_remote(&[card("a", 10_000.0)]);
        store.apply_remote(&[card("b", 20_000.0)]);
        settle().await;
        assert_eq!(board.revision(), Some(2));

        store.deliver(CardSnapshot {
            revision: 1,
            cards: vec![card("stale", 1.0)],
        });
        settle().await;
        assert_eq!(board.revision(), Some(2));
        assert!(board.card("stale").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_updates() {
        let store = Arc::new(MemoryCardStore::new());
        let board = board_with(store.clone(), false);
        let handle = spawn_sync(board.clone()).unwrap();
        settle().await;
        assert!(handle.is_running());
        handle.unsubscribe();

        store.apply_remote(&[card("a", 10_000.0)]);
        settle().await;
        assert_eq!(board.revision(), Some(0));
        assert!(board.all_cards().is_empty());
    }
}
