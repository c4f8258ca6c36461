use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identity::EditorIdentity;

/// Priority lanes of the board, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnId {
    Backlog,
    Todo,
    Doing,
    Done,
}

impl ColumnId {
    pub const ALL: [ColumnId; 4] = [
        ColumnId::Backlog,
        ColumnId::Todo,
        ColumnId::Doing,
        ColumnId::Done,
    ];

    /// Stored identifier, as written in card documents.
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnId::Backlog => "backlog",
            ColumnId::Todo => "todo",
            ColumnId::Doing => "doing",
            ColumnId::Done => "done",
        }
    }

    /// Heading shown above the lane.
    pub fn title(self) -> &'static str {
        match self {
            ColumnId::Backlog => "Backlog",
            ColumnId::Todo => "Low",
            ColumnId::Doing => "Medium",
            ColumnId::Done => "High",
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown column: {0}")]
pub struct UnknownColumn(pub String);

impl FromStr for ColumnId {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnId::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownColumn(s.to_string()))
    }
}

/// A task on the board.
///
/// Documents coming from the remote store may omit optional fields; those
/// default to `order = 0`, `completed = false`, `isArchived = false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub column: ColumnId,
    #[serde(default)]
    pub order: f64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub last_edited_by: String,
    #[serde(default)]
    pub last_edited_time: i64,
    #[serde(default)]
    pub last_moved_time: i64,
    #[serde(default)]
    pub is_archived: bool,
}

impl Card {
    /// Build a fresh card attributed to `editor`.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        column: ColumnId,
        order: f64,
        editor: &EditorIdentity,
        now: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column,
            order,
            completed: false,
            created_by: editor.name().to_string(),
            created_at: now,
            last_edited_by: editor.name().to_string(),
            last_edited_time: now,
            last_moved_time: now,
            is_archived: false,
        }
    }

    /// Stamp an edit by `editor`.
    pub fn touch(&mut self, editor: &EditorIdentity, now: i64) {
        self.last_edited_by = editor.name().to_string();
        self.last_edited_time = now;
    }

    pub fn is_visible_in(&self, column: ColumnId) -> bool {
        self.column == column && !self.is_archived
    }
}

/// Drop target of a reorder gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cardId", rename_all = "camelCase")]
pub enum Anchor {
    Head,
    Tail,
    /// Insert before the card with this id.
    Before(String),
}

/// Current wall clock as Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_roundtrip_names() {
        for col in ColumnId::ALL {
            assert_eq!(col.as_str().parse::<ColumnId>().unwrap(), col);
        }
        assert!("archive".parse::<ColumnId>().is_err());
    }

    #[test]
    fn test_card_defaults_missing_fields() {
        let json = r#"{"id":"c1","title":"Write docs","column":"todo"}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.order, 0.0);
        assert!(!card.completed);
        assert!(!card.is_archived);
        assert!(card.is_visible_in(ColumnId::Todo));
    }

    #[test]
    fn test_card_serializes_camel_case() {
        let editor = EditorIdentity::new("Ada").unwrap();
        let card = Card::new("c1", "Plan", ColumnId::Doing, 3.0, &editor, 42);
        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["column"], "doing");
        assert_eq!(value["lastEditedBy"], "Ada");
        assert_eq!(value["isArchived"], false);
        assert_eq!(value["lastMovedTime"], 42);
    }

    #[test]
    fn test_anchor_serde_shape() {
        let anchor = Anchor::Before("abc".into());
        let value = serde_json::to_value(&anchor).unwrap();
        assert_eq!(value["kind"], "before");
        assert_eq!(value["cardId"], "abc");
        let head: Anchor = serde_json::from_str(r#"{"kind":"head"}"#).unwrap();
        assert_eq!(head, Anchor::Head);
    }
}
