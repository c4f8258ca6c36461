/// Authoritative in-memory card set.
///
/// Sits between the remote snapshot stream and local edits, and is the only
/// component that writes to the card store.
///
/// Policy:
/// - First snapshot: an empty collection is seeded once with the default
///   cards; otherwise the snapshot is adopted.
/// - Later snapshots replace local state wholesale (last snapshot wins).
///   A snapshot older than the last applied revision is dropped.
/// - `mutate` applies an updater to a copy of local state, renormalizes every
///   touched column, persists the full resulting set, and only then advances
///   local state. A failed write leaves local state untouched.
///
/// Local state keeps archived cards (they stay editable); column views
/// filter them out.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::calendar::{CalendarError, CalendarEvent};
use crate::config::BoardConfig;
use crate::error::BoardError;
use crate::identity::{generate_card_id, EditorIdentity};
use crate::order::column_index;
use crate::order::planner::{self, MovePlan, PlanOutcome};
use crate::order::renormalize::RenormalizePolicy;
use crate::seed;
use crate::storage::{CardSnapshot, CardStore};
use crate::types::{now_millis, Anchor, Card, ColumnId};

/// Sync lifecycle of the card set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Synced { revision: u64 },
}

/// What `apply_snapshot` did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied,
    Seeded,
    Stale,
}

/// Result of a drag-and-drop move.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Moved(MovePlan),
    Unchanged,
}

#[derive(Debug)]
struct BoardState {
    sync: SyncState,
    cards: Vec<Card>,
    applied_snapshots: u64,
}

pub struct ReconciliationStore<S: CardStore> {
    store: Arc<S>,
    policy: RenormalizePolicy,
    seed_on_empty: bool,
    debounce_window: Duration,
    state: RwLock<BoardState>,
    /// Serializes mutations (and seeding) end to end, persistence included
    write_lock: Mutex<()>,
    /// Bumped whenever local state changes; renderers watch it
    version_tx: watch::Sender<u64>,
}

impl<S: CardStore> ReconciliationStore<S> {
    pub fn new(store: Arc<S>, config: &BoardConfig) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            store,
            policy: config.renormalize_policy(),
            seed_on_empty: config.seed_on_empty,
            debounce_window: config.debounce_window(),
            state: RwLock::new(BoardState {
                sync: SyncState::Uninitialized,
                cards: Vec::new(),
                applied_snapshots: 0,
            }),
            write_lock: Mutex::new(()),
            version_tx,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn debounce_window(&self) -> Duration {
        self.debounce_window
    }

    pub fn sync_state(&self) -> SyncState {
        self.read_state().sync
    }

    /// Revision of the last applied snapshot.
    pub fn revision(&self) -> Option<u64> {
        match self.sync_state() {
            SyncState::Synced { revision } => Some(revision),
            SyncState::Uninitialized => None,
        }
    }

    pub fn applied_snapshots(&self) -> u64 {
        self.read_state().applied_snapshots
    }

    /// Receiver that changes whenever local state advances.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Underlying collection, archived cards included.
    pub fn all_cards(&self) -> Vec<Card> {
        self.read_state().cards.clone()
    }

    pub fn card(&self, card_id: &str) -> Option<Card> {
        self.read_state()
            .cards
            .iter()
            .find(|c| c.id == card_id)
            .cloned()
    }

    /// Ordered, non-archived cards of one column.
    pub fn column(&self, column: ColumnId) -> Vec<Card> {
        let state = self.read_state();
        column_index::view(&state.cards, column)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Ordered, non-archived cards of every column.
    pub fn views(&self) -> BTreeMap<ColumnId, Vec<Card>> {
        let state = self.read_state();
        column_index::board_views(&state.cards)
            .into_iter()
            .map(|(col, view)| (col, view.into_iter().cloned().collect()))
            .collect()
    }

    /// Take in a snapshot from the card store.
    pub async fn apply_snapshot(&self, snapshot: CardSnapshot) -> Result<SnapshotOutcome, BoardError> {
        let sync = self.sync_state();
        if sync == SyncState::Uninitialized && snapshot.cards.is_empty() && self.seed_on_empty {
            return self.seed(snapshot.revision).await;
        }

        let mut state = self.write_state();
        if let SyncState::Synced { revision } = state.sync {
            if snapshot.revision < revision {
                log::debug!(
                    "[board.reconcile.snapshot] Dropping stale snapshot {} (applied {})",
                    snapshot.revision,
                    revision
                );
                return Ok(SnapshotOutcome::Stale);
            }
        }
        state.cards = column_index::sorted_projection(snapshot.cards);
        state.sync = SyncState::Synced {
            revision: snapshot.revision,
        };
        state.applied_snapshots += 1;
        log::debug!(
            "[board.reconcile.snapshot] Applied snapshot {} ({} cards)",
            snapshot.revision,
            state.cards.len()
        );
        drop(state);
        self.bump_version();
        Ok(SnapshotOutcome::Applied)
    }

    async fn seed(&self, revision: u64) -> Result<SnapshotOutcome, BoardError> {
        let _guard = self.write_lock.lock().await;
        // A snapshot may have been applied while we waited for the lock
        if self.sync_state() != SyncState::Uninitialized {
            return Ok(SnapshotOutcome::Stale);
        }
        let cards = seed::default_cards(now_millis());
        log::info!(
            "[board.reconcile.seed] Store is empty, seeding {} default cards",
            cards.len()
        );
        self.store.persist_all(&cards).await.map_err(|e| {
            log::warn!("[board.reconcile.seed] Seeding failed: {}", e);
            e
        })?;

        let mut state = self.write_state();
        if state.sync != SyncState::Uninitialized {
            return Ok(SnapshotOutcome::Stale);
        }
        state.cards = column_index::sorted_projection(cards);
        state.sync = SyncState::Synced { revision };
        state.applied_snapshots += 1;
        drop(state);
        self.bump_version();
        Ok(SnapshotOutcome::Seeded)
    }

    /// Apply `updater` to the full card set and persist the result.
    pub async fn mutate<F>(&self, updater: F) -> Result<(), BoardError>
    where
        F: FnOnce(Vec<Card>) -> Vec<Card> + Send,
    {
        self.try_mutate(|cards| {
            *cards = updater(std::mem::take(cards));
            Ok(())
        })
        .await
        .map(|(value, _)| value)
    }

    /// Returns the updater's value and the card set that was persisted.
    async fn try_mutate<T, F>(&self, updater: F) -> Result<(T, Vec<Card>), BoardError>
    where
        T: Send,
        F: FnOnce(&mut Vec<Card>) -> Result<T, BoardError> + Send,
    {
        let _guard = self.write_lock.lock().await;

        let (before, seen_snapshots) = {
            let state = self.read_state();
            (state.cards.clone(), state.applied_snapshots)
        };
        let mut next = before.clone();
        let value = updater(&mut next)?;

        for column in touched_columns(&before, &next) {
            self.policy.renormalize_column(&mut next, column);
        }
        if next == before {
            return Ok((value, next));
        }

        if let Err(e) = self.store.persist_all(&next).await {
            log::warn!(
                "[board.reconcile.persist] Write of {} cards failed, local state unchanged: {}",
                next.len(),
                e
            );
            return Err(e.into());
        }

        let mut state = self.write_state();
        if state.applied_snapshots != seen_snapshots {
            // A snapshot landed during the write; it stays authoritative
            // until the write's own snapshot comes back.
            log::debug!(
                "[board.reconcile.persist] Snapshot arrived during write, keeping it over local result"
            );
            return Ok((value, next));
        }
        state.cards = column_index::sorted_projection(next.clone());
        drop(state);
        self.bump_version();
        Ok((value, next))
    }

    /// Add a card at the bottom of `column`.
    pub async fn create_card(
        &self,
        editor: &EditorIdentity,
        column: ColumnId,
        title: &str,
    ) -> Result<Card, BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        let now = now_millis();
        let policy = self.policy;
        let (id, persisted) = self
            .try_mutate(|cards| {
                let placement = planner::plan_insertion(cards, column, &Anchor::Tail, &policy);
                placement.apply_respaced(cards);
                let card = Card::new(generate_card_id(), title, column, placement.order, editor, now);
                let id = card.id.clone();
                cards.push(card);
                Ok(id)
            })
            .await?;
        log::info!("[board.reconcile.create] {} added card {} to {}", editor, id, column);
        take_card(persisted, id)
    }

    pub async fn toggle_completed(&self, editor: &EditorIdentity, card_id: &str) -> Result<(), BoardError> {
        let now = now_millis();
        self.try_mutate(|cards| {
            let card = find_mut(cards, card_id)?;
            card.completed = !card.completed;
            card.touch(editor, now);
            Ok(())
        })
        .await
        .map(|(value, _)| value)
    }

    pub async fn rename_card(
        &self,
        editor: &EditorIdentity,
        card_id: &str,
        title: &str,
    ) -> Result<(), BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        let now = now_millis();
        self.try_mutate(|cards| {
            let card = find_mut(cards, card_id)?;
            card.title = title.to_string();
            card.touch(editor, now);
            Ok(())
        })
        .await
        .map(|(value, _)| value)
    }

    /// Soft delete: the card leaves every view but stays in the collection.
    pub async fn archive_card(&self, editor: &EditorIdentity, card_id: &str) -> Result<(), BoardError> {
        let now = now_millis();
        self.try_mutate(|cards| {
            let card = find_mut(cards, card_id)?;
            card.is_archived = true;
            card.last_moved_time = now;
            card.touch(editor, now);
            Ok(())
        })
        .await
        .map(|(value, _)| value)
    }

    /// Drag-and-drop: move `card_id` into `column` at `anchor`.
    pub async fn move_card(
        &self,
        editor: &EditorIdentity,
        card_id: &str,
        column: ColumnId,
        anchor: Anchor,
    ) -> Result<MoveOutcome, BoardError> {
        let now = now_millis();
        let policy = self.policy;
        let (outcome, _) = self
            .try_mutate(|cards| {
                match planner::plan_move_with(cards, card_id, column, &anchor, now, &policy)? {
                    PlanOutcome::NoOp => Ok(MoveOutcome::Unchanged),
                    PlanOutcome::Move(plan) => {
                        plan.apply(cards);
                        Ok(MoveOutcome::Moved(plan))
                    }
                }
            })
            .await?;
        if let MoveOutcome::Moved(plan) = &outcome {
            log::debug!(
                "[board.reconcile.move] {} moved {} from {} to {}",
                editor,
                plan.card_id,
                plan.from_column,
                plan.to_column
            );
        }
        Ok(outcome)
    }

    /// Copy a calendar event into the top of the backlog.
    pub async fn promote_event(
        &self,
        editor: &EditorIdentity,
        event: &CalendarEvent,
    ) -> Result<Card, BoardError> {
        if event.title.trim().is_empty() {
            return Err(CalendarError::EmptyTitle.into());
        }
        let now = now_millis();
        let policy = self.policy;
        let (id, persisted) = self
            .try_mutate(|cards| {
                let placement = planner::plan_insertion(cards, ColumnId::Backlog, &Anchor::Head, &policy);
                placement.apply_respaced(cards);
                let card =
                    event.to_card(generate_card_id(), ColumnId::Backlog, placement.order, editor, now);
                let id = card.id.clone();
                cards.push(card);
                Ok(id)
            })
            .await?;
        log::info!(
            "[board.reconcile.promote] {} promoted event {} to card {}",
            editor,
            event.id,
            id
        );
        take_card(persisted, id)
    }

    fn bump_version(&self) {
        self.version_tx.send_modify(|v| *v += 1);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BoardState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BoardState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The card `id` out of a persisted set.
fn take_card(persisted: Vec<Card>, id: String) -> Result<Card, BoardError> {
    persisted
        .into_iter()
        .find(|c| c.id == id)
        .ok_or(BoardError::CardNotFound(id))
}

fn find_mut<'a>(cards: &'a mut [Card], card_id: &str) -> Result<&'a mut Card, BoardError> {
    cards
        .iter_mut()
        .find(|c| c.id == card_id)
        .ok_or_else(|| BoardError::CardNotFound(card_id.to_string()))
}

/// Columns whose membership or contents differ between two card sets.
fn touched_columns(before: &[Card], after: &[Card]) -> BTreeSet<ColumnId> {
    let old: HashMap<&str, &Card> = before.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut touched = BTreeSet::new();
    for card in after {
        match old.get(card.id.as_str()) {
            Some(prev) if *prev == card => {}
            Some(prev) => {
                touched.insert(prev.column);
                touched.insert(card.column);
            }
            None => {
                touched.insert(card.column);
            }
        }
    }
    let remaining: BTreeSet<&str> = after.iter().map(|c| c.id.as_str()).collect();
    for card in before.iter().filter(|c| !remaining.contains(c.id.as_str())) {
        touched.insert(card.column);
    }
    touched
}
