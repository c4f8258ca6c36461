pub mod local;
pub mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::Card;

/// Full point-in-time view of the remote card collection.
///
/// `revision` is the store's logical update timestamp. It only grows, so a
/// late-delivered snapshot can be recognized and dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub revision: u64,
    pub cards: Vec<Card>,
}

/// Live subscription: the state at subscribe time plus every later snapshot.
/// Dropping `updates` is the only way to cancel.
#[derive(Debug)]
pub struct Subscription {
    pub initial: CardSnapshot,
    pub updates: broadcast::Receiver<CardSnapshot>,
}

/// Abstract remote document store holding the card collection.
/// Implementations: MemoryCardStore (in-process), LocalCardStore (JSON file).
pub trait CardStore: Send + Sync + 'static {
    /// Subscribe to snapshots of the collection.
    fn subscribe(&self) -> Result<Subscription, StoreError>;

    /// Upsert every card by id, overwriting each document in full.
    /// From the caller's point of view the whole set lands together or
    /// not at all.
    fn persist_all(&self, cards: &[Card]) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Refuse a batch that names the same card twice: which copy wins would
/// depend on write order.
pub(crate) fn validate_batch(cards: &[Card]) -> Result<(), StoreError> {
    let mut seen = std::collections::HashSet::with_capacity(cards.len());
    match cards.iter().find(|c| !seen.insert(c.id.as_str())) {
        Some(dup) => Err(StoreError::Rejected(format!("duplicate card id {}", dup.id))),
        None => Ok(()),
    }
}

/// Upsert `incoming` into `docs` by id, keeping first-seen order.
pub(crate) fn upsert_by_id(docs: &mut Vec<Card>, incoming: &[Card]) {
    for card in incoming {
        match docs.iter_mut().find(|d| d.id == card.id) {
            Some(existing) => *existing = card.clone(),
            None => docs.push(card.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EditorIdentity;
    use crate::types::ColumnId;

    #[test]
    fn test_upsert_by_id_overwrites_and_appends() {
        let editor = EditorIdentity::new("t").unwrap();
        let mut docs = vec![
            Card::new("a", "old", ColumnId::Todo, 1.0, &editor, 0),
            Card::new("b", "b", ColumnId::Todo, 2.0, &editor, 0),
        ];
        let incoming = vec![
            Card::new("a", "new", ColumnId::Done, 5.0, &editor, 0),
            Card::new("c", "c", ColumnId::Backlog, 1.0, &editor, 0),
        ];
        upsert_by_id(&mut docs, &incoming);
        let ids: Vec<_> = docs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(docs[0].title, "new");
        assert_eq!(docs[0].column, ColumnId::Done);
    }

    #[test]
    fn test_validate_batch_rejects_duplicate_ids() {
        let editor = EditorIdentity::new("t").unwrap();
        let a = Card::new("a", "a", ColumnId::Todo, 1.0, &editor, 0);
        let b = Card::new("b", "b", ColumnId::Todo, 2.0, &editor, 0);
        assert!(validate_batch(&[a.clone(), b]).is_ok());
        assert!(validate_batch(&[]).is_ok());
        let err = validate_batch(&[a.clone(), a]).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(msg) if msg.contains('a')));
    }
}
