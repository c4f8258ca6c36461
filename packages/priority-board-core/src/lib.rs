/// Core of the shared priority board: ordered cards in four columns,
/// reconciled against a remote card store, plus the side calendar.
pub mod calendar;
pub mod config;
pub mod error;
pub mod identity;
pub mod order;
pub mod reconcile;
pub mod seed;
pub mod storage;
pub mod sync;
pub mod types;
pub mod watcher;

pub use calendar::{CalendarError, CalendarEvent, DateClickAction};
pub use config::{load_config, BoardConfig};
pub use error::BoardError;
pub use identity::EditorIdentity;
pub use reconcile::{MoveOutcome, ReconciliationStore, SnapshotOutcome, SyncState};
pub use storage::{CardSnapshot, CardStore, StoreError};
pub use sync::{spawn_sync, SyncHandle};
pub use types::{Anchor, Card, ColumnId};
