use crate::calendar::CalendarError;
use crate::storage::StoreError;

/// Failure of a single board operation. None of these end the session.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Editor name is required")]
    IdentityRequired,

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Card title must not be empty")]
    EmptyTitle,

    #[error("Persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid calendar event: {0}")]
    Calendar(#[from] CalendarError),
}
